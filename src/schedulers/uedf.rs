use crate::prelude::*;
use crate::schedulers::{MigrationDegree, PriorityScheme, Scheduler, helpers::*};
use crate::simulation::{ScheduleDecision, SimModel};

/// Universal EDF: optimal scheduling through fair per-core budget allocation.
///
/// Whenever a new job arrives the window up to the next release is replanned:
/// each task receives a budget of `window × utilization`, packed greedily
/// across cores in EDF order of the tasks' active deadlines, splitting a
/// task's budget over a core boundary when it does not fit. Between replans,
/// every core runs the first of its budget entries whose task has an active,
/// unassigned job with budget left, and the decision horizon shrinks to the
/// soonest budget exhaustion.
pub struct UEDF {
    /// Per core: (task id, remaining budget) in allocation order.
    core_budgets: Vec<Vec<(usize, Time)>>,
    /// Job-id watermarks; a replan triggers when any task has released since
    /// the last decision. Aligned releases replan spuriously, which is
    /// harmless.
    task_next_job: Vec<Option<u32>>,
}

impl UEDF {
    pub fn new() -> Self {
        Self {
            core_budgets: Vec::new(),
            task_next_job: Vec::new(),
        }
    }

    fn replan(&mut self, model: &SimModel) {
        self.core_budgets = vec![Vec::new(); model.cores];

        let task_count = model.task_set.len();
        let window_end = next_job_release(&model.task_set);
        let window = window_end - model.time;

        let mut task_deadline = vec![Time::NEVER; task_count];
        for job in &model.active_jobs {
            task_deadline[job.task_id as usize] = job.deadline;
        }
        let mut ordered_tasks: Vec<usize> = (0..task_count).collect();
        ordered_tasks.sort_by_key(|&tid| task_deadline[tid]);

        let mut core_capacity = vec![window; model.cores];
        let mut core = 0;
        for tid in ordered_tasks {
            let task = &model.task_set[tid];
            let mut task_budget = window * task.utilization();
            while task_budget > Time::ZERO && core < model.cores {
                if core_capacity[core] == Time::ZERO {
                    core += 1;
                    continue;
                }
                let alloc = task_budget.min(core_capacity[core]);
                self.core_budgets[core].push((tid, alloc));
                task_budget -= alloc;
                core_capacity[core] -= alloc;
            }
        }
    }
}

impl Scheduler for UEDF {
    fn priority_scheme(&self) -> PriorityScheme {
        PriorityScheme::UnrestrictedDynamic
    }

    fn migration_degree(&self) -> MigrationDegree {
        MigrationDegree::Full
    }

    fn name(&self) -> &'static str {
        "UEDF"
    }

    fn init(&mut self, task_set: &[Task], cores: usize) {
        self.core_budgets = vec![Vec::new(); cores];
        self.task_next_job = vec![None; task_set.len()];
    }

    fn schedule(&mut self, model: &SimModel) -> ScheduleDecision {
        let mut sd = ScheduleDecision::idle(model.cores);

        let mut new_job = false;
        for (tid, task) in model.task_set.iter().enumerate() {
            if self.task_next_job[tid] != Some(task.next_job_id) {
                self.task_next_job[tid] = Some(task.next_job_id);
                new_job = true;
            }
        }
        if new_job {
            self.replan(model);
        }

        // each core runs its first budget entry with an active, unassigned
        // task and budget left
        let task_count = model.task_set.len();
        let mut task_active = vec![false; task_count];
        for job in &model.active_jobs {
            task_active[job.task_id as usize] = true;
        }
        let mut task_assigned = vec![false; task_count];
        let mut running_entry: Vec<Option<usize>> = vec![None; model.cores];
        for core in 0..model.cores {
            for (entry, &(tid, budget)) in self.core_budgets[core].iter().enumerate() {
                if !task_active[tid] || task_assigned[tid] || budget == Time::ZERO {
                    continue;
                }
                task_assigned[tid] = true;
                running_entry[core] = Some(entry);
                break;
            }
        }

        let chosen: Vec<usize> = model.active_jobs.iter()
            .enumerate()
            .filter(|(_, job)| task_assigned[job.task_id as usize])
            .map(|(index, _)| index)
            .collect();
        assign_to_cores(&model.active_jobs, &mut sd.core_state, chosen);

        sd.next_event = next_sched_event(&model.task_set, &model.active_jobs);
        for core in 0..model.cores {
            if let Some(entry) = running_entry[core] {
                sd.next_event = sd.next_event.min(model.time + self.core_budgets[core][entry].1);
            }
        }

        let delta = sd.next_event - model.time;
        for core in 0..model.cores {
            if let Some(entry) = running_entry[core] {
                self.core_budgets[core][entry].1 -= delta;
            }
        }
        sd
    }
}

impl Default for UEDF {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================

#[test]
fn budgets_split_across_core_boundaries() {
    let mut model = SimModel::new();
    // two tasks at utilization 3/4 on one core leave 1/2 of the second
    // core's window unallocated
    let task_set = vec![
        Task::implicit(Time::integer(4), Time::integer(3)),
        Task::implicit(Time::integer(4), Time::integer(3)),
    ];
    model.reset(task_set, Box::new(UEDF::new()), 2);
    model.simulate(Time::integer(4));

    assert_eq!(model.missed, None);
    // both jobs completed their 3 units inside the period
    assert_eq!(model.finished_jobs.len(), 2);
    for job in &model.finished_jobs {
        assert_eq!(job.runtime, Time::integer(3));
    }
}

#[test]
fn replans_on_every_release() {
    let mut model = SimModel::new();
    let task_set = vec![
        Task::implicit(Time::integer(3), Time::integer(2)),
        Task::implicit(Time::integer(5), Time::integer(3)),
    ];
    model.reset(task_set, Box::new(UEDF::new()), 2);
    model.simulate(Time::integer(15));

    // feasible on two cores; the budget plan must keep both tasks fed
    assert_eq!(model.missed, None);
}
