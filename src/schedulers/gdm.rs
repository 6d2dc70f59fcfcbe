use crate::prelude::*;
use crate::schedulers::{MigrationDegree, PriorityScheme, Scheduler, helpers::*};
use crate::simulation::{ScheduleDecision, SimModel};

/// Global Deadline Monotonic. Degenerates to Rate Monotonic on
/// implicit-deadline task sets.
///
/// Static priorities: every job of a task ranks by the smaller of the task's
/// period and relative deadline.
pub struct GDM;

impl Scheduler for GDM {
    fn priority_scheme(&self) -> PriorityScheme {
        PriorityScheme::Static
    }

    fn migration_degree(&self) -> MigrationDegree {
        MigrationDegree::Full
    }

    fn name(&self) -> &'static str {
        "GDM"
    }

    fn schedule(&mut self, model: &SimModel) -> ScheduleDecision {
        let mut sd = ScheduleDecision::idle(model.cores);
        let task_set = &model.task_set;
        let chosen = choose_by_priority(
            &model.active_jobs,
            model.cores,
            Time::LOWEST,
            |job| {
                let task = &task_set[job.task_id as usize];
                -task.period.min(task.relative_deadline)
            },
        );
        assign_to_cores(&model.active_jobs, &mut sd.core_state, chosen);
        sd.next_event = next_sched_event(&model.task_set, &model.active_jobs)
            .min(next_job_completion(&model.active_jobs, &sd.core_state, model.time));
        sd
    }
}

// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_period_tasks_preempt_long_ones() {
        let task_set = vec![
            Task::implicit(Time::integer(10), Time::integer(4)),
            Task::implicit(Time::integer(3), Time::integer(1)),
        ];
        let mut model = SimModel::new();
        model.reset(task_set, Box::new(GDM), 1);
        model.simulate(Time::integer(30));
        assert_eq!(model.missed, None);

        // the rate-monotonic winner runs at every one of its releases
        let mut blocks = Vec::new();
        while let Some(block) = model.ebs.next_block() {
            blocks.push(block);
        }
        for release in 0..10 {
            let start = Time::integer(release * 3);
            assert!(
                blocks.iter().any(|b| b.task_id == 1 && b.start == start),
                "task 1 not dispatched at its release {start}"
            );
        }
        // and the long task shows a preemption in its trace
        assert!(blocks.iter().any(|b| {
            b.task_id == 0 && b.end_state == ExecBlockEnd::Preempted
        }));
        assert!(model.finished_jobs.iter().any(|job| job.task_id == 0 && job.preempt_count > 0));
    }
}
