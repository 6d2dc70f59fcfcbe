use crate::prelude::*;
use crate::schedulers::{MigrationDegree, PriorityScheme, Scheduler, helpers::*};
use crate::simulation::{ScheduleDecision, SimModel};

/// Global Earliest Deadline First.
///
/// Job-level dynamic priorities: the `cores` active jobs with the earliest
/// absolute deadlines run. Work-conserving, full migration.
pub struct GEDF;

impl Scheduler for GEDF {
    fn priority_scheme(&self) -> PriorityScheme {
        PriorityScheme::JobLevelDynamic
    }

    fn migration_degree(&self) -> MigrationDegree {
        MigrationDegree::Full
    }

    fn name(&self) -> &'static str {
        "GEDF"
    }

    fn schedule(&mut self, model: &SimModel) -> ScheduleDecision {
        let mut sd = ScheduleDecision::idle(model.cores);
        let chosen = choose_by_priority(
            &model.active_jobs,
            model.cores,
            Time::LOWEST,
            |job| -job.deadline,
        );
        assign_to_cores(&model.active_jobs, &mut sd.core_state, chosen);
        sd.next_event = next_sched_event(&model.task_set, &model.active_jobs)
            .min(next_job_completion(&model.active_jobs, &sd.core_state, model.time));
        sd
    }
}
