use crate::prelude::*;

pub mod prelude {
    pub use super::{
        Task,
        TaskSet,
        Job,
        JobSet,
        ExecBlock,
        ExecBlockEnd,
        ExecBlockStorage,
        TaskUtils,
    };
}

use std::collections::VecDeque;

pub type TaskSet = Vec<Task>;
pub type JobSet = Vec<Job>;

/// A periodic task: immutable parameters plus the release bookkeeping the
/// engine advances as jobs are created.
#[derive(Clone)]
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub phase: Time,
    pub period: Time,
    pub exec_time: Time,
    pub relative_deadline: Time,
    #[serde(skip, default)]
    pub next_job_id: u32,
    #[serde(skip, default = "Time::zero")]
    pub next_release: Time,
}

impl Task {
    pub fn new(phase: Time, period: Time, exec_time: Time, relative_deadline: Time) -> Self {
        Self {
            phase,
            period,
            exec_time,
            relative_deadline,
            next_job_id: 0,
            next_release: phase,
        }
    }

    /// Synchronous task with a constrained deadline.
    pub fn constrained(period: Time, exec_time: Time, relative_deadline: Time) -> Self {
        Self::new(Time::ZERO, period, exec_time, relative_deadline)
    }

    /// Synchronous implicit-deadline task (deadline == period).
    pub fn implicit(period: Time, exec_time: Time) -> Self {
        Self::new(Time::ZERO, period, exec_time, period)
    }

    pub fn utilization(&self) -> Time {
        self.exec_time / self.period
    }

    pub fn has_implicit_deadline(&self) -> bool {
        self.relative_deadline == self.period
    }

    /// Create the next job of this task and advance the release cursor by one
    /// period. The task id is handled externally (index into the task set).
    pub fn next_job(&mut self, task_id: u32) -> Job {
        let job = Job::new(
            task_id,
            self.next_job_id,
            self.period,
            self.next_release,
            self.exec_time,
            self.next_release + self.relative_deadline,
        );
        self.next_job_id += 1;
        self.next_release += self.period;
        job
    }
}

/// One release of a task.
#[derive(Clone)]
#[derive(Debug)]
pub struct Job {
    pub task_id: u32,
    pub job_id: u32,
    pub period: Time,
    pub release_time: Time,
    pub exec_time: Time,
    pub deadline: Time,
    /// Work done so far; runs from zero to `exec_time`.
    pub runtime: Time,
    /// Core the job last ran on (or is running on), None if never dispatched.
    pub core: Option<usize>,
    pub running: bool,
    pub preempt_count: u32,
    pub migration_count: u32,
}

impl Job {
    pub fn new(
        task_id: u32,
        job_id: u32,
        period: Time,
        release_time: Time,
        exec_time: Time,
        deadline: Time,
    ) -> Self {
        Self {
            task_id,
            job_id,
            period,
            release_time,
            exec_time,
            deadline,
            runtime: Time::ZERO,
            core: None,
            running: false,
            preempt_count: 0,
            migration_count: 0,
        }
    }

    /// Identifier unique across the whole run.
    pub fn uid(&self) -> u64 {
        ((self.task_id as u64) << 32) | self.job_id as u64
    }

    pub fn remaining(&self) -> Time {
        self.exec_time - self.runtime
    }

    pub fn is_complete(&self) -> bool {
        self.runtime == self.exec_time
    }

    /// Laxity at `now`: slack before the job must run continuously to finish.
    pub fn laxity(&self, now: Time) -> Time {
        self.deadline - now - self.remaining()
    }
}

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
pub enum ExecBlockEnd {
    Preempted,
    Completed,
    Missed,
}

/// A contiguous stretch of execution of one job on one core.
///
/// Adjacent blocks of the same (job, core) are not merged by the producer;
/// consumers merge when they care.
#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct ExecBlock {
    pub task_id: u32,
    pub job_id: u32,
    pub core: usize,
    pub start: Time,
    pub end: Time,
    pub end_state: ExecBlockEnd,
}

/// Append-only storage of execution blocks with FIFO hand-off to consumers.
#[derive(Default)]
pub struct ExecBlockStorage {
    exec_blocks: VecDeque<ExecBlock>,
    new_blocks: VecDeque<ExecBlock>,
}

impl ExecBlockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, job: &Job, start: Time, end: Time) {
        let end_state = if job.runtime >= job.exec_time {
            ExecBlockEnd::Completed
        } else if job.deadline <= end {
            ExecBlockEnd::Missed
        } else {
            ExecBlockEnd::Preempted
        };
        self.new_blocks.push_back(ExecBlock {
            task_id: job.task_id,
            job_id: job.job_id,
            core: job.core.expect("block recorded for a job without a core"),
            start,
            end,
            end_state,
        });
    }

    pub fn clear(&mut self) {
        self.exec_blocks.clear();
        self.new_blocks.clear();
    }

    pub fn has_next(&self) -> bool {
        !self.new_blocks.is_empty()
    }

    /// Pull the next unseen block, archiving it.
    pub fn next_block(&mut self) -> Option<ExecBlock> {
        let block = self.new_blocks.pop_front()?;
        self.exec_blocks.push_back(block);
        Some(block)
    }

    /// All blocks pulled so far.
    pub fn archived(&self) -> impl Iterator<Item = &ExecBlock> {
        self.exec_blocks.iter()
    }

    /// Consumer-side merging: collapse runs of blocks for the same
    /// (job, core) whose end and start touch. The producer never merges, so
    /// renderers and statistics call this when they want contiguous spans.
    pub fn merge_adjacent(blocks: &[ExecBlock]) -> Vec<ExecBlock> {
        let mut merged: Vec<ExecBlock> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match merged.last_mut() {
                Some(prev)
                    if prev.task_id == block.task_id
                        && prev.job_id == block.job_id
                        && prev.core == block.core
                        && prev.end == block.start =>
                {
                    prev.end = block.end;
                    prev.end_state = block.end_state;
                }
                _ => merged.push(*block),
            }
        }
        merged
    }
}

pub struct TaskUtils;

impl TaskUtils {
    pub fn total_utilization(task_set: &[Task]) -> Time {
        task_set.iter()
            .map(Task::utilization)
            .sum()
    }

    pub fn largest_utilization(task_set: &[Task]) -> f64 {
        let max = task_set.iter()
            .map(|t| ordered_float::OrderedFloat(t.utilization().as_f64()))
            .max();

        match max {
            Some(max) => *max,
            None => 0f64,
        }
    }

    pub fn implicit_deadlines(task_set: &[Task]) -> bool {
        task_set.iter().all(Task::has_implicit_deadline)
    }

    /// Hyperperiod of the task set, generalized to rational periods as
    /// lcm(numerators) / gcd(denominators). Equals the usual integer LCM
    /// when every period is an integer. Saturates at [`Time::NEVER`] when
    /// the LCM grows past the sentinel.
    pub fn hyperperiod(task_set: &[Task]) -> Time {
        let mut num: i128 = 1;
        let mut den: i128 = 1;
        for task in task_set {
            let p_num = task.period.numer() as i128;
            let common = num::integer::gcd(num, p_num);
            num = match (num / common).checked_mul(p_num) {
                Some(lcm) => lcm,
                None => return Time::NEVER,
            };
            den = num::integer::gcd(den, task.period.denom() as i128);
            if num >= (i32::MAX as i128) * den {
                return Time::NEVER;
            }
        }
        Time::ratio(num as i64, den as i64)
    }
}

// =============================================================================

#[test]
fn next_job_advances_release_and_id() {
    let mut task = Task::new(Time::integer(2), Time::integer(10), Time::integer(3), Time::integer(8));

    let first = task.next_job(4);
    assert_eq!(first.uid(), (4u64 << 32) | 0);
    assert_eq!(first.release_time, Time::integer(2));
    assert_eq!(first.deadline, Time::integer(10));

    let second = task.next_job(4);
    assert_eq!(second.job_id, 1);
    assert_eq!(second.release_time, Time::integer(12));
    assert_eq!(task.next_release, Time::integer(22));
}

#[test]
fn block_end_states() {
    let mut job = Job::new(0, 0, Time::integer(10), Time::ZERO, Time::integer(4), Time::integer(10));
    job.core = Some(1);

    let mut ebs = ExecBlockStorage::new();
    job.runtime = Time::integer(2);
    ebs.add_block(&job, Time::ZERO, Time::integer(2));
    job.runtime = Time::integer(4);
    ebs.add_block(&job, Time::integer(2), Time::integer(4));

    assert_eq!(ebs.next_block().unwrap().end_state, ExecBlockEnd::Preempted);
    assert_eq!(ebs.next_block().unwrap().end_state, ExecBlockEnd::Completed);
    assert!(ebs.next_block().is_none());
    assert_eq!(ebs.archived().count(), 2);
}

#[test]
fn adjacent_blocks_merge_for_consumers() {
    let block = |job_id, core, start: i64, end: i64, end_state| ExecBlock {
        task_id: 0,
        job_id,
        core,
        start: Time::integer(start),
        end: Time::integer(end),
        end_state,
    };
    let blocks = vec![
        block(0, 0, 0, 2, ExecBlockEnd::Preempted),
        block(0, 0, 2, 3, ExecBlockEnd::Completed),
        // different core, no merge
        block(1, 1, 3, 4, ExecBlockEnd::Preempted),
        block(1, 0, 4, 5, ExecBlockEnd::Completed),
    ];

    let merged = ExecBlockStorage::merge_adjacent(&blocks);
    assert_eq!(merged.len(), 3);
    assert_eq!(merged[0].start, Time::ZERO);
    assert_eq!(merged[0].end, Time::integer(3));
    assert_eq!(merged[0].end_state, ExecBlockEnd::Completed);
}

#[test]
fn hyperperiod_of_rational_periods() {
    let task_set = vec![
        Task::implicit(Time::integer(4), Time::integer(1)),
        Task::implicit(Time::integer(6), Time::integer(1)),
    ];
    assert_eq!(TaskUtils::hyperperiod(&task_set), Time::integer(12));

    let task_set = vec![
        Task::implicit(Time::ratio(3, 2), Time::integer(1)),
        Task::implicit(Time::ratio(5, 4), Time::integer(1)),
    ];
    // lcm(3, 5) / gcd(2, 4)
    assert_eq!(TaskUtils::hyperperiod(&task_set), Time::ratio(15, 2));
}

#[test]
fn hyperperiod_saturates() {
    let task_set: TaskSet = [2_147_483_629i64, 2_147_483_647, 1_000_003]
        .iter()
        .map(|&p| Task::implicit(Time::integer(p), Time::integer(1)))
        .collect();
    assert_eq!(TaskUtils::hyperperiod(&task_set), Time::NEVER);
}
