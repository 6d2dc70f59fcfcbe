use crate::prelude::*;
use crate::schedulers::Scheduler;

pub mod prelude {
    pub use super::{
        CoreState,
        ScheduleDecision,
        SimModel,
    };
}

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Per-core assignment: `core_state[c] = Some(i)` runs `active_jobs[i]` on
/// core `c`, `None` leaves the core idle. Indices refer into the job list as
/// it was ordered when the decision was taken.
pub type CoreState = Vec<Option<usize>>;

/// A scheduler's answer: who runs where, and when to consult it again.
pub struct ScheduleDecision {
    pub core_state: CoreState,
    pub next_event: Time,
}

impl ScheduleDecision {
    /// All cores idle, no event horizon. Schedulers start from this and fill
    /// in their selection.
    pub fn idle(cores: usize) -> Self {
        Self {
            core_state: vec![None; cores],
            next_event: Time::NEVER,
        }
    }
}

/// Event-driven simulation of a task set under one global scheduling policy
/// on a pool of identical cores.
///
/// The engine owns the world: tasks, jobs, trace and clock. The scheduler is
/// consulted synchronously at each event and only reads the model.
pub struct SimModel {
    pub task_set: TaskSet,
    scheduler: Option<Box<dyn Scheduler>>,
    pub ebs: ExecBlockStorage,
    /// Trace recording toggle; sweeps disable it to keep memory flat.
    pub ebs_active: bool,
    pub time: Time,
    /// Task id of the first job to miss its deadline. Once set, the
    /// simulation halts and further `simulate` calls are no-ops.
    pub missed: Option<u32>,
    pub cores: usize,
    pub active_jobs: JobSet,
    pub finished_jobs: JobSet,
    pub cswitch_count: u64,
    release_queue: BinaryHeap<Reverse<(Time, usize)>>,
}

impl SimModel {
    pub fn new() -> Self {
        Self {
            task_set: TaskSet::new(),
            scheduler: None,
            ebs: ExecBlockStorage::new(),
            ebs_active: true,
            time: Time::ZERO,
            missed: None,
            cores: 1,
            active_jobs: JobSet::new(),
            finished_jobs: JobSet::new(),
            cswitch_count: 0,
            release_queue: BinaryHeap::new(),
        }
    }

    /// Install a task set and scheduler and rewind the world to time zero.
    pub fn reset(&mut self, mut task_set: TaskSet, mut scheduler: Box<dyn Scheduler>, cores: usize) {
        for task in &mut task_set {
            task.next_job_id = 0;
            task.next_release = task.phase;
        }
        scheduler.init(&task_set, cores);
        self.release_queue = task_set.iter()
            .enumerate()
            .map(|(tid, task)| Reverse((task.next_release, tid)))
            .collect();
        self.task_set = task_set;
        self.scheduler = Some(scheduler);
        self.cores = cores;
        self.time = Time::ZERO;
        self.missed = None;
        self.cswitch_count = 0;
        self.active_jobs.clear();
        self.finished_jobs.clear();
        self.ebs.clear();
    }

    /// Advance the simulation until `end_time` or the first deadline miss.
    pub fn simulate(&mut self, end_time: Time) {
        while self.missed.is_none() && self.time < end_time {
            self.release_pending_jobs();
            self.order_active_jobs();

            let prev_occupant = self.core_occupants();
            let was_running: Vec<bool> =
                self.active_jobs.iter().map(|job| job.running).collect();

            let mut scheduler = self.scheduler.take()
                .expect("simulate called before reset");
            let sd = scheduler.schedule(self);
            self.scheduler = Some(scheduler);

            assert_eq!(sd.core_state.len(), self.cores,
                "scheduler decision has wrong core count");

            self.dispatch(&sd, &prev_occupant);

            let delta = sd.next_event - self.time;
            assert!(delta > Time::ZERO, "scheduler decision must advance time");

            self.advance(sd.next_event, delta, &was_running);
        }
    }

    /// Pop every release due at or before the current time, creating jobs.
    fn release_pending_jobs(&mut self) {
        while let Some(&Reverse((release, tid))) = self.release_queue.peek() {
            if release > self.time {
                break;
            }
            self.release_queue.pop();
            let job = self.task_set[tid].next_job(tid as u32);
            self.active_jobs.push(job);
            self.release_queue.push(Reverse((self.task_set[tid].next_release, tid)));
        }
    }

    /// Stable-partition the job list into running, preempted, fresh.
    ///
    /// Schedulers break priority ties by lower index, so this ordering biases
    /// selection toward jobs already placed on cores, keeping context-switch
    /// and migration counts down.
    fn order_active_jobs(&mut self) {
        let jobs = std::mem::take(&mut self.active_jobs);
        let mut ordered = JobSet::with_capacity(jobs.len());
        let mut preempted = JobSet::new();
        let mut fresh = JobSet::new();
        for job in jobs {
            if job.running {
                ordered.push(job);
            } else if job.core.is_some() {
                preempted.push(job);
            } else {
                fresh.push(job);
            }
        }
        ordered.append(&mut preempted);
        ordered.append(&mut fresh);
        self.active_jobs = ordered;
    }

    fn core_occupants(&self) -> Vec<Option<u64>> {
        let mut occupants = vec![None; self.cores];
        for job in &self.active_jobs {
            if job.running {
                occupants[job.core.expect("running job without a core")] = Some(job.uid());
            }
        }
        occupants
    }

    /// Apply the decision: flip `running` flags, count context switches on
    /// every core whose occupant changed, count a migration for each job
    /// dispatched to a core other than the one it last ran on.
    fn dispatch(&mut self, sd: &ScheduleDecision, prev_occupant: &[Option<u64>]) {
        for job in &mut self.active_jobs {
            job.running = false;
        }
        for (core, entry) in sd.core_state.iter().enumerate() {
            let Some(index) = *entry else {
                if prev_occupant[core].is_some() {
                    self.cswitch_count += 1;
                }
                continue;
            };
            let job = &mut self.active_jobs[index];
            if prev_occupant[core] != Some(job.uid()) {
                self.cswitch_count += 1;
            }
            if job.core.is_some_and(|prev| prev != core) {
                job.migration_count += 1;
            }
            job.core = Some(core);
            job.running = true;
        }
    }

    /// Run every dispatched job for up to `delta`, record blocks, retire
    /// completed jobs, count preemptions and detect misses.
    ///
    /// `was_running` holds the pre-dispatch `running` flags, index-aligned
    /// with the current job list; a job descheduled this round counts one
    /// preemption.
    fn advance(&mut self, next_event: Time, delta: Time, was_running: &[bool]) {
        let now = self.time;
        let jobs = std::mem::take(&mut self.active_jobs);
        let mut kept = JobSet::with_capacity(jobs.len());
        for (i, mut job) in jobs.into_iter().enumerate() {
            if job.running {
                let block = job.remaining().min(delta);
                job.runtime += block;
                if self.ebs_active {
                    self.ebs.add_block(&job, now, now + block);
                }
                if job.is_complete() {
                    self.finished_jobs.push(job);
                    continue;
                }
            } else if was_running[i] {
                job.preempt_count += 1;
            }
            if job.deadline <= next_event && self.missed.is_none() {
                self.missed = Some(job.task_id);
            }
            kept.push(job);
        }
        self.active_jobs = kept;
        self.time = next_event;
    }
}

impl Default for SimModel {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedulers::Scheduler;

    fn run(task_set: TaskSet, scheduler: Box<dyn Scheduler>, cores: usize, end: i64) -> SimModel {
        let mut model = SimModel::new();
        model.reset(task_set, scheduler, cores);
        model.simulate(Time::integer(end));
        model
    }

    fn drain_blocks(model: &mut SimModel) -> Vec<ExecBlock> {
        let mut blocks = Vec::new();
        while let Some(block) = model.ebs.next_block() {
            blocks.push(block);
        }
        blocks
    }

    fn feasible_set() -> TaskSet {
        vec![
            Task::implicit(Time::integer(10), Time::integer(5)),
            Task::implicit(Time::integer(3), Time::integer(2)),
            Task::implicit(Time::integer(14), Time::integer(2)),
        ]
    }

    #[test]
    fn feasible_set_runs_clean_under_gedf() {
        let model = run(feasible_set(), Box::new(GEDF), 2, 100);
        assert_eq!(model.missed, None);
        assert_eq!(model.time, Time::integer(100));
        assert!(!model.finished_jobs.is_empty());
    }

    #[test]
    fn overload_is_detected_by_every_work_conserving_policy() {
        // U = 2/3 + 3/5 = 1.27 on one core; a miss must appear within two
        // hyperperiods
        let overload = || {
            vec![
                Task::implicit(Time::integer(3), Time::integer(2)),
                Task::implicit(Time::integer(5), Time::integer(3)),
            ]
        };
        let policies: Vec<Box<dyn Scheduler>> = vec![
            Box::new(GEDF),
            Box::new(GDM),
            Box::new(GFIFO),
            Box::new(EDZL),
        ];
        for policy in policies {
            let name = policy.name();
            let model = run(overload(), policy, 1, 30);
            assert!(model.missed.is_some(), "{name} failed to detect the overload");
        }
    }

    #[test]
    fn simulation_halts_at_the_first_miss() {
        let task_set = vec![Task::implicit(Time::integer(2), Time::integer(2)); 2];
        let mut model = SimModel::new();
        model.reset(task_set, Box::new(GEDF), 1);
        model.simulate(Time::integer(100));

        assert!(model.missed.is_some());
        let halted_at = model.time;
        assert!(halted_at < Time::integer(100));

        // further calls are no-ops
        model.simulate(Time::integer(200));
        assert_eq!(model.time, halted_at);
    }

    #[test]
    fn blocks_conserve_work() {
        let mut model = run(feasible_set(), Box::new(GEDF), 2, 50);
        let blocks = drain_blocks(&mut model);

        let mut worked: std::collections::HashMap<u64, Time> = std::collections::HashMap::new();
        for block in &blocks {
            let uid = ((block.task_id as u64) << 32) | block.job_id as u64;
            let sum = worked.entry(uid).or_insert(Time::ZERO);
            *sum += block.end - block.start;
        }

        for job in model.finished_jobs.iter().chain(model.active_jobs.iter()) {
            let total = worked.get(&job.uid()).copied().unwrap_or(Time::ZERO);
            assert_eq!(total, job.runtime, "trace disagrees with job {} runtime", job.uid());
            assert!(job.runtime <= job.exec_time);
        }
    }

    #[test]
    fn no_core_or_job_is_ever_shared() {
        let mut model = run(feasible_set(), Box::new(EDZL), 2, 50);
        let blocks = drain_blocks(&mut model);

        let overlap = |a: &ExecBlock, b: &ExecBlock| a.start < b.end && b.start < a.end;
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                if a.core == b.core {
                    assert!(!overlap(a, b), "two jobs share core {} at {}", a.core, a.start);
                }
                if a.task_id == b.task_id && a.job_id == b.job_id {
                    assert!(!overlap(a, b), "job runs on two cores at {}", a.start);
                }
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_traces() {
        let run_once = || {
            let mut model = run(feasible_set(), Box::new(LLREF::new()), 2, 60);
            (drain_blocks(&mut model), model.cswitch_count, model.missed)
        };
        let first = run_once();
        let second = run_once();
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
        assert_eq!(first.2, second.2);
    }

    #[test]
    fn reset_clears_the_previous_run() {
        let mut model = SimModel::new();
        model.reset(feasible_set(), Box::new(GEDF), 2);
        model.simulate(Time::integer(40));
        assert!(model.ebs.has_next());

        model.reset(feasible_set(), Box::new(GEDF), 2);
        assert_eq!(model.time, Time::ZERO);
        assert_eq!(model.missed, None);
        assert_eq!(model.cswitch_count, 0);
        assert!(model.active_jobs.is_empty());
        assert!(model.finished_jobs.is_empty());
        assert!(!model.ebs.has_next());
    }

    #[test]
    fn rational_task_sets_simulate_exactly() {
        // two half-utilization tasks with fractional periods fit one core
        let task_set = vec![
            Task::implicit(Time::ratio(3, 2), Time::ratio(3, 4)),
            Task::implicit(Time::ratio(5, 2), Time::ratio(5, 4)),
        ];
        let model = run(task_set, Box::new(GEDF), 1, 30);
        assert_eq!(model.missed, None);
    }

    // Predictability: shrinking any execution time never turns a schedulable
    // run unschedulable under job-level fixed-priority policies.
    fn assert_predictable(build: fn() -> Box<dyn Scheduler>, task_set: TaskSet, cores: usize, end: i64) {
        let name = build().name();
        let model = run(task_set.clone(), build(), cores, end);
        assert_eq!(model.missed, None, "{name} baseline must be schedulable");

        for shrink in 0..task_set.len() {
            if task_set[shrink].exec_time <= Time::integer(1) {
                continue;
            }
            let mut reduced = task_set.clone();
            reduced[shrink].exec_time -= Time::integer(1);
            let model = run(reduced, build(), cores, end);
            assert_eq!(model.missed, None, "{name} became unschedulable after shrinking task {shrink}");
        }
    }

    #[test]
    fn shrinking_execution_never_hurts_gedf() {
        assert_predictable(|| Box::new(GEDF), feasible_set(), 2, 420);
    }

    #[test]
    fn shrinking_execution_never_hurts_gdm() {
        let task_set = vec![
            Task::implicit(Time::integer(8), Time::integer(2)),
            Task::implicit(Time::integer(10), Time::integer(2)),
            Task::implicit(Time::integer(20), Time::integer(2)),
        ];
        assert_predictable(|| Box::new(GDM), task_set, 2, 400);
    }

    #[test]
    fn shrinking_execution_never_hurts_gfifo() {
        let task_set = vec![
            Task::implicit(Time::integer(8), Time::integer(2)),
            Task::implicit(Time::integer(10), Time::integer(2)),
            Task::implicit(Time::integer(20), Time::integer(2)),
        ];
        assert_predictable(|| Box::new(GFIFO), task_set, 2, 400);
    }

    #[test]
    fn phased_releases_wait_for_their_phase() {
        let task_set = vec![
            Task::new(Time::integer(5), Time::integer(10), Time::integer(2), Time::integer(10)),
        ];
        let mut model = run(task_set, Box::new(GEDF), 1, 20);
        let blocks = drain_blocks(&mut model);
        assert!(!blocks.is_empty());
        assert_eq!(blocks[0].start, Time::integer(5));
    }
}
