use crate::prelude::*;

pub mod prelude {
    pub use super::{
        TasksetFileType,
        TasksetParseError,
        parse_taskset,
    };
}

#[derive(Debug)]
#[derive(Clone, Copy)]
#[derive(PartialEq, Eq)]
#[derive(clap::ValueEnum)]
pub enum TasksetFileType {
    Auto,
    JSON,
    Plain,
}

#[derive(Debug)]
pub enum TasksetParseError {
    IOError(std::io::Error),
    JSONError(serde_json::Error),
    PlainParseError(String),
}

/// Read a task set from a file.
///
/// JSON files hold an array of task objects; plain files hold one task per
/// line as whitespace-separated `exec_time deadline period [phase]`, each
/// value an integer or a fraction `num/den`.
pub fn parse_taskset(taskset: &str, typ: TasksetFileType) -> Result<TaskSet, TasksetParseError> {
    use TasksetFileType::*;

    let path = std::path::Path::new(taskset);
    let typ = if typ == Auto {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => JSON,
            _ => Plain,
        }
    } else {
        typ
    };

    let taskset_data = std::fs::read_to_string(path)?;

    let taskset = match typ {
        Auto => unreachable!("auto type resolved above"),
        JSON => serde_json::from_str(&taskset_data)?,
        Plain => plain_deserialize_taskset(&taskset_data)?,
    };

    Ok(taskset)
}

fn plain_deserialize_taskset(data: &str) -> Result<TaskSet, TasksetParseError> {
    data.trim_ascii()
        .lines()
        .map(plain_deserialize_task)
        .collect()
}

fn plain_deserialize_task(data: &str) -> Result<Task, TasksetParseError> {
    let fields: Vec<&str> = data
        .trim_ascii()
        .split_ascii_whitespace()
        .collect();

    if fields.len() != 3 && fields.len() != 4 {
        return Err(TasksetParseError::PlainParseError(format!(
            "task parsing requires three or four fields (exec_time, deadline, period and optionally phase), got {}",
            fields.len()
        )));
    }

    let parse_field = |index: usize, name: &str| -> Result<Time, TasksetParseError> {
        fields[index].parse().map_err(|err| {
            TasksetParseError::PlainParseError(format!("Failed to parse field '{name}': {err}"))
        })
    };

    let exec_time = parse_field(0, "exec_time")?;
    let deadline = parse_field(1, "deadline")?;
    let period = parse_field(2, "period")?;

    if fields.len() == 4 {
        Ok(Task::new(parse_field(3, "phase")?, period, exec_time, deadline))
    } else {
        Ok(Task::constrained(period, exec_time, deadline))
    }
}

// =============================================================================

impl std::fmt::Display for TasksetParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Taskset Parse Error, ")?;
        match self {
            TasksetParseError::IOError(error) => write!(f, "IO: {error}")?,
            TasksetParseError::JSONError(error) => write!(f, "JSON: {error}")?,
            TasksetParseError::PlainParseError(error) => write!(f, "Plain: {error}")?,
        };

        Ok(())
    }
}

impl std::error::Error for TasksetParseError {}

impl From<std::io::Error> for TasksetParseError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<serde_json::Error> for TasksetParseError {
    fn from(value: serde_json::Error) -> Self {
        Self::JSONError(value)
    }
}

// =============================================================================
