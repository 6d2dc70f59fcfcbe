use crate::schedulers::{MigrationDegree, PriorityScheme, Scheduler, helpers::*};
use crate::simulation::{ScheduleDecision, SimModel};

/// Global First In First Out.
///
/// Every job gets the same priority, so selection falls back to the
/// tie-break: lower active-job index, which approximates release order since
/// fresh jobs are appended last.
pub struct GFIFO;

impl Scheduler for GFIFO {
    fn priority_scheme(&self) -> PriorityScheme {
        PriorityScheme::Static
    }

    fn migration_degree(&self) -> MigrationDegree {
        MigrationDegree::Restricted
    }

    fn name(&self) -> &'static str {
        "GFIFO"
    }

    fn schedule(&mut self, model: &SimModel) -> ScheduleDecision {
        let mut sd = ScheduleDecision::idle(model.cores);
        let chosen = choose_by_priority(&model.active_jobs, model.cores, i64::MIN, |_| 0i64);
        assign_to_cores(&model.active_jobs, &mut sd.core_state, chosen);
        sd.next_event = next_sched_event(&model.task_set, &model.active_jobs)
            .min(next_job_completion(&model.active_jobs, &sd.core_state, model.time));
        sd
    }
}

// =============================================================================
