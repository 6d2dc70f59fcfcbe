use schedsim::prelude::*;
use schedsim::schedulers::Scheduler;

pub mod prelude {
    pub use super::{
        Args,
        SchedulingPolicy,
    };
}

const DEFAULT_AFTER_HELP: &str = "Refer to the crate's documentation for further help";

#[derive(clap::Parser, Debug)]
#[command(about, after_help=DEFAULT_AFTER_HELP)]
pub struct Args {
    /// Quiet mode / Exit code as simulation result
    ///
    /// When enabled, the trace is not printed; a zero exit code means no
    /// deadline was missed, a one means a miss, any other code means that an
    /// error has happened.
    #[arg(short='q', default_value="false", action=clap::ArgAction::SetTrue)]
    pub quiet: bool,

    #[command(flatten, next_help_heading="Scheduling Policy Specification")]
    pub policy: PolicyArgs,

    #[command(flatten, next_help_heading="Taskset Specification")]
    pub taskset: TasksetArgs,
}

#[derive(clap::Args, Debug)]
pub struct PolicyArgs {
    /// Global scheduling policy
    #[arg(short='a', value_name="POLICY")]
    pub policy: SchedulingPolicy,

    /// Number of cores
    #[arg(short='n', value_name="# CORES", default_value="1")]
    pub cores: usize,

    /// Simulation horizon, an integer or a fraction num/den
    #[arg(short='t', value_name="TIME", default_value="100")]
    pub sim_time: Time,

    /// Disable early releasing of PD2 subtasks
    #[arg(long="no-early-release", default_value="false", action=clap::ArgAction::SetTrue)]
    pub no_early_release: bool,
}

#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
#[derive(clap::ValueEnum)]
pub enum SchedulingPolicy {
    #[value(name = "gedf", alias("edf"))]
    GlobalEDF,
    #[value(name = "gdm", alias("grm"))]
    GlobalDM,
    #[value(name = "gfifo", alias("fifo"))]
    GlobalFIFO,
    #[value(name = "gllf", alias("llf"))]
    GlobalLLF,
    #[value(name = "edzl")]
    EDZL,
    #[value(name = "llref")]
    LLREF,
    #[value(name = "pd2")]
    PD2,
    #[value(name = "uedf")]
    UEDF,
}

impl SchedulingPolicy {
    pub fn build(&self, early_release: bool) -> Box<dyn Scheduler> {
        match self {
            SchedulingPolicy::GlobalEDF => Box::new(GEDF),
            SchedulingPolicy::GlobalDM => Box::new(GDM),
            SchedulingPolicy::GlobalFIFO => Box::new(GFIFO),
            SchedulingPolicy::GlobalLLF => Box::new(GLLF::new()),
            SchedulingPolicy::EDZL => Box::new(EDZL),
            SchedulingPolicy::LLREF => Box::new(LLREF::new()),
            SchedulingPolicy::PD2 => Box::new(PD2::new(early_release)),
            SchedulingPolicy::UEDF => Box::new(UEDF::new()),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct TasksetArgs {
    /// Taskset data file
    #[arg(short='i', value_name="TASKSET FILE")]
    pub taskset_file: String,

    /// Taskset file type
    #[arg(value_enum, short='f', long="format", value_name="FORMAT", default_value="auto")]
    pub taskset_file_ty: TasksetFileType,
}
