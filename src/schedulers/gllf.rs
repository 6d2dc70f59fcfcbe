use crate::prelude::*;
use crate::schedulers::{MigrationDegree, PriorityScheme, Scheduler, helpers::*};
use crate::simulation::{ScheduleDecision, SimModel};

/// Global Least Laxity First on discrete time.
///
/// Quantum-driven: laxity ordering can invert inside an interval, so the
/// policy re-decides every unit tick instead of predicting crossing points.
/// Task sets off the integer grid are refused with an all-idle decision.
pub struct GLLF {
    valid_task_set: bool,
}

impl GLLF {
    pub fn new() -> Self {
        Self { valid_task_set: false }
    }
}

impl Scheduler for GLLF {
    fn priority_scheme(&self) -> PriorityScheme {
        PriorityScheme::JobLevelDynamic
    }

    fn migration_degree(&self) -> MigrationDegree {
        MigrationDegree::Full
    }

    fn name(&self) -> &'static str {
        "GLLF"
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
        let chosen = choose_by_priority(
            &model.active_jobs,
            model.cores,
            Time::LOWEST,
            |job| -(job.deadline - job.remaining()),
        );
        assign_to_cores(&model.active_jobs, &mut sd.core_state, chosen);
        sd.next_event = model.time + Time::integer(1);
        sd
    }
}

impl Default for GLLF {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decides_every_quantum_on_integer_sets() {
        let task_set = vec![
            Task::implicit(Time::integer(4), Time::integer(2)),
            Task::implicit(Time::integer(8), Time::integer(2)),
        ];
        let mut model = SimModel::new();
        model.reset(task_set, Box::new(GLLF::new()), 1);
        model.simulate(Time::integer(16));
        assert_eq!(model.missed, None);
        // uniprocessor LLF at U = 0.75 completes every job
        assert_eq!(model.finished_jobs.len(), 6);
    }

    #[test]
    fn fractional_task_sets_are_refused() {
        let task_set = vec![Task::implicit(Time::ratio(3, 2), Time::integer(1))];
        let mut model = SimModel::new();
        model.reset(task_set, Box::new(GLLF::new()), 1);
        model.simulate(Time::integer(10));
        assert!(model.missed.is_some());
        assert!(model.finished_jobs.is_empty());
    }
}
