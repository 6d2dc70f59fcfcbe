use crate::prelude::*;
use crate::schedulers::{MigrationDegree, PriorityScheme, Scheduler, helpers::*};
use crate::simulation::{ScheduleDecision, SimModel};

/// PD² (Pfair) with intra-sporadic task support and optional early release.
///
/// Works on unit quanta: a job of execution time `e` decomposes into `e`
/// subtasks, each with a pseudo-release and pseudo-deadline interleaved
/// across the job's window. Subtasks compete by pseudo-deadline, then the
/// PD² tie-breaks (heavy task, window overlap, next group deadline), packed
/// into one 64-bit key so comparisons stay cheap.
///
/// Requires an integer-time task set with deadlines below 2^31; anything
/// else is refused with an all-idle decision.
pub struct PD2 {
    early_release: bool,
    valid_task_set: bool,
}

impl PD2 {
    pub fn new(early_release: bool) -> Self {
        Self {
            early_release,
            valid_task_set: false,
        }
    }

    /// Priority of a job's next subtask, or -1 when the subtask has not
    /// pseudo-released yet (and early releasing is off).
    ///
    /// Key layout, most significant first:
    ///   bits 63..32  INT_MAX - pseudo-deadline (earlier wins)
    ///   bit 31       task is heavy (2e >= d)
    ///   bit 30       current window overlaps the next
    ///   bits 29..0   next group pseudo-deadline
    fn subtask_priority(&self, job: &Job, now: i64) -> i64 {
        let release = job.release_time.numer();
        let exec = job.exec_time.numer();
        let rel_deadline = job.deadline.numer() - release;
        let work_done = job.runtime.numer();

        // window of the k-th subtask (1-based)
        let window = |k: i64| -> (i64, i64) {
            let r = release + 0.max(((k - 1) * rel_deadline + exec) / exec - 1);
            let d = release + (rel_deadline - 1).min((k * rel_deadline + exec - 1) / exec - 1);
            (r, d)
        };

        let first = window(work_done + 1);
        if !self.early_release && first.0 > now {
            return -1;
        }

        // walk length-2 overlapping windows up to the next group deadline
        let mut subtask = work_done + 1;
        let mut curr = first;
        let mut next = window(subtask + 1);
        let first_overlaps = curr.1 == next.0;
        while subtask < exec && curr.1 == next.0 && curr.1 + 1 - curr.0 == 2 {
            subtask += 1;
            curr = next;
            next = window(subtask + 1);
        }

        let mut priority = ((i32::MAX as i64) - first.1) << 32;
        if 2 * exec >= rel_deadline {
            priority |= 1 << 31;
        }
        if first_overlaps {
            priority |= 1 << 30;
        }
        priority + curr.0 + 1
    }
}

impl Scheduler for PD2 {
    fn priority_scheme(&self) -> PriorityScheme {
        PriorityScheme::UnrestrictedDynamic
    }

    fn migration_degree(&self) -> MigrationDegree {
        MigrationDegree::Full
    }

    fn name(&self) -> &'static str {
        "PD2"
    }

    fn init(&mut self, task_set: &[Task], _cores: usize) {
        self.valid_task_set = uses_integer_time(task_set);
    }

    fn schedule(&mut self, model: &SimModel) -> ScheduleDecision {
        let mut sd = ScheduleDecision::idle(model.cores);
        if !self.valid_task_set {
            sd.next_event = next_sched_event(&model.task_set, &model.active_jobs);
            return sd;
        }
        let now = model.time.numer();
        let chosen = choose_by_priority(
            &model.active_jobs,
            model.cores,
            -1i64,
            |job| self.subtask_priority(job, now),
        );
        assign_to_cores(&model.active_jobs, &mut sd.core_state, chosen);
        sd.next_event = model.time + Time::integer(1);
        sd
    }
}

// =============================================================================

#[cfg(test)]
fn subtask_windows(period: i64, exec: i64, work_done: i64) -> (i64, i64) {
    let mut job = Job::new(
        0,
        0,
        Time::integer(period),
        Time::ZERO,
        Time::integer(exec),
        Time::integer(period),
    );
    job.runtime = Time::integer(work_done);
    let priority = PD2::new(true).subtask_priority(&job, 0);
    let deadline = (i32::MAX as i64) - (priority >> 32);
    let overlap = priority & (1 << 30) != 0;
    (deadline, overlap as i64)
}

#[test]
fn pseudo_deadlines_interleave_across_the_window() {
    // task (period 5, exec 2): subtask windows [0, 2] and [2, 4], touching
    // at 2, so the first subtask carries the overlap bit
    let (d1, overlap1) = subtask_windows(5, 2, 0);
    assert_eq!(d1, 2);
    assert_eq!(overlap1, 1);

    let (d2, _) = subtask_windows(5, 2, 1);
    assert_eq!(d2, 4);
}

#[test]
fn heavy_tasks_carry_the_tie_break_bit() {
    let light = Job::new(0, 0, Time::integer(9), Time::ZERO, Time::integer(2), Time::integer(9));
    let heavy = Job::new(1, 0, Time::integer(2), Time::ZERO, Time::integer(1), Time::integer(2));
    let pd2 = PD2::new(true);
    assert_ne!(pd2.subtask_priority(&heavy, 0) & (1 << 31), 0);
    assert_eq!(pd2.subtask_priority(&light, 0) & (1 << 31), 0);
}

#[cfg(test)]
mod scheduling_tests {
    use super::*;
    use proptest::prelude::*;

    fn simulate(task_set: TaskSet, cores: usize, end: Time) -> SimModel {
        let mut model = SimModel::new();
        model.reset(task_set, Box::new(PD2::new(true)), cores);
        model.simulate(end);
        model
    }

    #[test]
    fn tight_full_utilization_set_runs_clean() {
        // 8 x (3,1) and 3 x (9,4) load four cores to exactly U = 4
        let mut task_set: TaskSet = (0..8)
            .map(|_| Task::implicit(Time::integer(3), Time::integer(1)))
            .collect();
        task_set.extend((0..3).map(|_| Task::implicit(Time::integer(9), Time::integer(4))));

        let model = simulate(task_set, 4, Time::integer(36));
        assert_eq!(model.missed, None);
    }

    #[test]
    fn fractional_task_sets_are_refused() {
        let task_set = vec![
            Task::implicit(Time::ratio(5, 2), Time::integer(1)),
            Task::implicit(Time::integer(4), Time::integer(1)),
        ];
        let model = simulate(task_set, 2, Time::integer(20));
        // all-idle decisions let the first deadline pass unserved
        assert!(model.missed.is_some());
        assert!(model.finished_jobs.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // integer task sets within the core count are Pfair-schedulable
        #[test]
        fn feasible_integer_sets_never_miss(
            periods in proptest::collection::vec(2i64..=6, 2..=4),
            fractions in proptest::collection::vec(1u32..=100, 2..=4),
        ) {
            prop_assume!(periods.len() == fractions.len());
            let cores = 2usize;

            let mut task_set = TaskSet::new();
            let mut remaining = Time::integer(cores as i64);
            for (&period, &fraction) in periods.iter().zip(&fractions) {
                let cap = remaining.min(Time::integer(1));
                let max_exec = (cap * Time::integer(period)).floor();
                if max_exec < 1 {
                    break;
                }
                let exec = 1 + (fraction as i64 - 1) * (max_exec - 1) / 99;
                let task = Task::implicit(Time::integer(period), Time::integer(exec));
                remaining -= task.utilization();
                task_set.push(task);
            }
            prop_assume!(task_set.len() >= 2);

            let hyperperiod = TaskUtils::hyperperiod(&task_set);
            let model = simulate(task_set, cores, hyperperiod * 2);
            prop_assert_eq!(model.missed, None);
        }
    }
}

#[test]
fn unreleased_subtask_is_ineligible_without_early_release() {
    let mut job = Job::new(0, 0, Time::integer(10), Time::ZERO, Time::integer(2), Time::integer(10));
    job.runtime = Time::integer(1);
    // second subtask pseudo-releases at 5
    assert_eq!(PD2::new(false).subtask_priority(&job, 0), -1);
    assert_eq!(PD2::new(false).subtask_priority(&job, 4), -1);
    assert!(PD2::new(false).subtask_priority(&job, 5) > 0);
    assert!(PD2::new(true).subtask_priority(&job, 0) > 0);
}
