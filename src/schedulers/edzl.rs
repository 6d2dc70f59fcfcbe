use crate::prelude::*;
use crate::schedulers::{MigrationDegree, PriorityScheme, Scheduler, helpers::*};
use crate::simulation::{ScheduleDecision, SimModel};

/// Earliest Deadline first until Zero Laxity.
///
/// Behaves as EDF except that a job whose laxity has dropped to zero jumps
/// to the top priority: it must run continuously from now on or miss. The
/// decision horizon additionally covers the instant any unselected job would
/// cross zero laxity.
pub struct EDZL;

impl Scheduler for EDZL {
    fn priority_scheme(&self) -> PriorityScheme {
        PriorityScheme::JobLevelDynamic
    }

    fn migration_degree(&self) -> MigrationDegree {
        MigrationDegree::Full
    }

    fn name(&self) -> &'static str {
        "EDZL"
    }

    fn schedule(&mut self, model: &SimModel) -> ScheduleDecision {
        let mut sd = ScheduleDecision::idle(model.cores);
        let now = model.time;
        let chosen = choose_by_priority(
            &model.active_jobs,
            model.cores,
            Time::LOWEST,
            |job| {
                if job.laxity(now) == Time::ZERO {
                    Time::NEVER
                } else {
                    -job.deadline
                }
            },
        );
        assign_to_cores(&model.active_jobs, &mut sd.core_state, chosen);
        sd.next_event = next_sched_event(&model.task_set, &model.active_jobs)
            .min(next_job_completion(&model.active_jobs, &sd.core_state, model.time));

        let mut scheduled = vec![false; model.active_jobs.len()];
        for index in sd.core_state.iter().flatten() {
            scheduled[*index] = true;
        }
        for (index, job) in model.active_jobs.iter().enumerate() {
            if scheduled[index] {
                continue;
            }
            // the instant this job's laxity reaches zero
            let event = job.deadline - job.remaining();
            if event > now {
                sd.next_event = sd.next_event.min(event);
            }
        }
        sd
    }
}

// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_laxity_job_preempts_earlier_deadline_ties() {
        // two half-load tasks and one at 0.9: EDF alone would starve the
        // heavy job behind the index tie-break, EDZL promotes it the moment
        // its laxity hits zero and keeps it running to its deadline
        let task_set = vec![
            Task::implicit(Time::integer(10), Time::integer(5)),
            Task::implicit(Time::integer(10), Time::integer(5)),
            Task::implicit(Time::integer(10), Time::integer(9)),
        ];
        let mut model = SimModel::new();
        model.reset(task_set, Box::new(EDZL), 2);
        model.simulate(Time::integer(20));
        assert_eq!(model.missed, None);

        // the 9-unit jobs must occupy the last nine units of each period
        let mut spans: std::collections::HashMap<u32, (Time, Time, Time)> =
            std::collections::HashMap::new();
        while let Some(block) = model.ebs.next_block() {
            if block.task_id != 2 {
                continue;
            }
            let span = spans
                .entry(block.job_id)
                .or_insert((Time::NEVER, Time::ZERO, Time::ZERO));
            span.0 = span.0.min(block.start);
            span.1 = span.1.max(block.end);
            span.2 += block.end - block.start;
        }
        assert_eq!(spans.len(), 2);
        for (job_id, (start, end, total)) in spans {
            let release = Time::integer(10) * job_id as i64;
            assert_eq!(start, release + Time::integer(1));
            assert_eq!(end, release + Time::integer(10));
            assert_eq!(total, Time::integer(9));
        }
    }

    #[test]
    fn laxity_events_subdivide_the_decision_horizon() {
        let task_set = vec![
            Task::implicit(Time::integer(10), Time::integer(5)),
            Task::implicit(Time::integer(10), Time::integer(5)),
            Task::implicit(Time::integer(10), Time::integer(9)),
        ];
        let mut model = SimModel::new();
        model.reset(task_set, Box::new(EDZL), 2);
        // the first decision must stop at t=1, where the heavy task's
        // laxity crosses zero, not at the first completion at t=5
        model.simulate(Time::ratio(1, 2));
        assert_eq!(model.time, Time::integer(1));
    }
}
