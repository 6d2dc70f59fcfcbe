//! Selection and placement helpers shared by every policy.

use crate::prelude::*;
use crate::simulation::CoreState;

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Indices of up to `cores` active jobs with the highest priorities, ties
/// broken by lower index. Only jobs with priority strictly greater than
/// `threshold` are eligible.
///
/// Runs a bounded heap of size `cores + 1` with the worst candidate on top,
/// so selection is O(n log cores).
pub fn choose_by_priority<T, F>(
    active_jobs: &[Job],
    cores: usize,
    threshold: T,
    priority_func: F,
) -> Vec<usize>
where
    T: Ord + Copy,
    F: Fn(&Job) -> T,
{
    let mut chosen: BinaryHeap<Reverse<(T, Reverse<usize>)>> = BinaryHeap::with_capacity(cores + 1);
    for (index, job) in active_jobs.iter().enumerate() {
        let priority = priority_func(job);
        if priority <= threshold {
            continue;
        }
        chosen.push(Reverse((priority, Reverse(index))));
        if chosen.len() > cores {
            chosen.pop();
        }
    }
    chosen.into_iter()
        .map(|Reverse((_, Reverse(index)))| index)
        .collect()
}

/// Place the chosen jobs onto cores.
///
/// Two phases: jobs already executing keep their core, then the rest prefer
/// the core they last ran on (a fresh or migrating occupant is swapped out),
/// falling back to the lowest-indexed empty core. This mitigates context
/// switches first and job-level migrations second.
pub fn assign_to_cores(active_jobs: &[Job], core_state: &mut CoreState, mut chosen_jobs: Vec<usize>) {
    assert!(chosen_jobs.len() <= core_state.len());
    chosen_jobs.sort_unstable();

    for &index in &chosen_jobs {
        if active_jobs[index].running {
            core_state[active_jobs[index].core.expect("running job without a core")] = Some(index);
        }
    }

    let mut next_empty = 0;
    for &index in &chosen_jobs {
        if active_jobs[index].running {
            continue;
        }

        let mut index = index;
        if let Some(prev_core) = active_jobs[index].core {
            match core_state[prev_core] {
                None => {
                    core_state[prev_core] = Some(index);
                    continue;
                }
                Some(occupant) if active_jobs[occupant].core != Some(prev_core) => {
                    // occupant is fresh or migrating; it moves on instead
                    core_state[prev_core] = Some(index);
                    index = occupant;
                }
                _ => {}
            }
        }

        while core_state[next_empty].is_some() {
            next_empty += 1;
        }
        core_state[next_empty] = Some(index);
    }
}

/// Earliest upcoming release over the task set.
pub fn next_job_release(task_set: &[Task]) -> Time {
    task_set.iter()
        .map(|task| task.next_release)
        .fold(Time::NEVER, Time::min)
}

/// Earliest deadline over the active jobs.
pub fn next_job_deadline(active_jobs: &[Job]) -> Time {
    active_jobs.iter()
        .map(|job| job.deadline)
        .fold(Time::NEVER, Time::min)
}

/// Earliest release or deadline; the baseline event horizon every
/// event-driven policy shares.
pub fn next_sched_event(task_set: &[Task], active_jobs: &[Job]) -> Time {
    next_job_release(task_set).min(next_job_deadline(active_jobs))
}

/// Earliest completion among the jobs the decision dispatches.
pub fn next_job_completion(active_jobs: &[Job], core_state: &CoreState, time: Time) -> Time {
    core_state.iter()
        .flatten()
        .map(|&index| time + active_jobs[index].remaining())
        .fold(Time::NEVER, Time::min)
}

/// True when every task parameter sits on the integer grid. Quantum-driven
/// policies require this.
pub fn uses_integer_time(task_set: &[Task]) -> bool {
    task_set.iter().all(|task| {
        task.phase.is_integer()
            && task.period.is_integer()
            && task.exec_time.is_integer()
            && task.relative_deadline.is_integer()
    })
}

// =============================================================================

#[cfg(test)]
fn job_at(index: u32, core: Option<usize>, running: bool) -> Job {
    let mut job = Job::new(
        index,
        0,
        Time::integer(10),
        Time::ZERO,
        Time::integer(5),
        Time::integer(10),
    );
    job.core = core;
    job.running = running;
    job
}

#[test]
fn choose_by_priority_takes_highest_with_low_index_ties() {
    let jobs: Vec<Job> = (0..5).map(|i| job_at(i, None, false)).collect();
    let priorities = [3, 7, 7, 1, 7];

    let mut chosen = choose_by_priority(&jobs, 2, 0, |job| priorities[job.task_id as usize]);
    chosen.sort_unstable();
    assert_eq!(chosen, vec![1, 2]);
}

#[test]
fn choose_by_priority_respects_threshold() {
    let jobs: Vec<Job> = (0..3).map(|i| job_at(i, None, false)).collect();
    let priorities = [-1i64, 0, 5];

    let chosen = choose_by_priority(&jobs, 3, 0i64, |job| priorities[job.task_id as usize]);
    assert_eq!(chosen, vec![2]);
}

#[test]
fn assign_keeps_running_jobs_in_place() {
    let jobs = vec![
        job_at(0, Some(1), true),
        job_at(1, None, false),
    ];
    let mut core_state: CoreState = vec![None, None];
    assign_to_cores(&jobs, &mut core_state, vec![0, 1]);

    assert_eq!(core_state, vec![Some(1), Some(0)]);
}

#[test]
fn assign_prefers_previous_core() {
    let jobs = vec![
        job_at(0, Some(1), false),
        job_at(1, None, false),
    ];
    let mut core_state: CoreState = vec![None, None];
    assign_to_cores(&jobs, &mut core_state, vec![0, 1]);

    assert_eq!(core_state, vec![Some(1), Some(0)]);
}

#[test]
fn assign_swaps_out_fresh_occupant() {
    // job 0 is fresh and lands on core 0 first; job 1 previously ran there
    // and reclaims it, pushing job 0 to the next empty core.
    let jobs = vec![
        job_at(0, None, false),
        job_at(1, Some(0), false),
    ];
    let mut core_state: CoreState = vec![None, None];
    assign_to_cores(&jobs, &mut core_state, vec![0, 1]);

    assert_eq!(core_state, vec![Some(1), Some(0)]);
}

#[test]
fn event_helpers_scan_releases_and_deadlines() {
    let mut task_set = vec![
        Task::implicit(Time::integer(10), Time::integer(2)),
        Task::implicit(Time::integer(7), Time::integer(3)),
    ];
    task_set[0].next_release = Time::integer(10);
    task_set[1].next_release = Time::integer(7);

    let mut job = job_at(0, Some(0), true);
    job.deadline = Time::integer(5);
    job.runtime = Time::integer(2);
    let jobs = vec![job];

    assert_eq!(next_job_release(&task_set), Time::integer(7));
    assert_eq!(next_job_deadline(&jobs), Time::integer(5));
    assert_eq!(next_sched_event(&task_set, &jobs), Time::integer(5));

    let core_state: CoreState = vec![Some(0)];
    assert_eq!(next_job_completion(&jobs, &core_state, Time::integer(1)), Time::integer(4));
}

#[test]
fn integer_time_detection() {
    let integral = vec![Task::implicit(Time::integer(4), Time::integer(2))];
    let fractional = vec![Task::implicit(Time::ratio(9, 2), Time::integer(2))];
    assert!(uses_integer_time(&integral));
    assert!(!uses_integer_time(&fractional));
}
