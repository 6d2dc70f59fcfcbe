use crate::prelude::*;

pub mod prelude {
    pub use super::TaskSetGenerator;
}

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;

/// Random generation of synchronous implicit-deadline task sets with a
/// prescribed total utilization, on a discrete utilization grid of step
/// `1/precision`.
///
/// The RNG is caller-owned so studies stay reproducible: reseed, regenerate,
/// get the same sets.
pub struct TaskSetGenerator;

impl TaskSetGenerator {
    /// Utilization partition by the modified Kraemer algorithm: distinct
    /// uniform cut points on the scaled utilization line, differences become
    /// task utilizations. Draws are retried until no task exceeds
    /// utilization one.
    ///
    /// Periods are drawn uniformly from the integers in
    /// `[min_period, max_period]`; integer periods keep hyperperiods finite
    /// for the schedulability studies downstream. Invalid inputs yield an
    /// empty set.
    pub fn modified_kraemer(
        rng: &mut StdRng,
        precision: i64,
        util: Time,
        task_count: usize,
        min_period: Time,
        max_period: Time,
    ) -> TaskSet {
        let Some(scaled_util) = Self::validate(precision, util, task_count, min_period, max_period)
        else {
            return TaskSet::new();
        };

        let mut scaled_utils = vec![0i64; task_count];
        loop {
            let mut partitions = BTreeSet::new();
            partitions.insert(0);
            partitions.insert(scaled_util);
            while partitions.len() < task_count + 1 {
                partitions.insert(rng.gen_range(1..scaled_util));
            }
            let mut valid = true;
            for (slot, (prev, curr)) in scaled_utils.iter_mut()
                .zip(partitions.iter().zip(partitions.iter().skip(1)))
            {
                *slot = curr - prev;
                valid &= *slot <= precision;
            }
            if valid {
                break;
            }
        }

        Self::build_task_set(rng, precision, &scaled_utils, min_period, max_period)
    }

    /// Utilization partition by UUniFast-Discard: exact simplex sampling in
    /// floating point, floored onto the grid with a one-step bump per task
    /// (guaranteeing the `1/precision` minimum), leading tasks bumped until
    /// the sum is exact, the whole draw discarded when a task exceeds
    /// utilization one. The final set is shuffled because the leading-task
    /// bumps would otherwise bias order.
    pub fn uunifast_discard(
        rng: &mut StdRng,
        precision: i64,
        util: Time,
        task_count: usize,
        min_period: Time,
        max_period: Time,
    ) -> TaskSet {
        let Some(scaled_util) = Self::validate(precision, util, task_count, min_period, max_period)
        else {
            return TaskSet::new();
        };

        let target_util = (util - Time::ratio(task_count as i64, precision)).as_f64();
        let mut scaled_utils = vec![0i64; task_count];
        loop {
            let utils = Self::uunifast(rng, target_util, task_count);

            let mut sum = 0;
            for (slot, sample) in scaled_utils.iter_mut().zip(&utils) {
                *slot = (sample * precision as f64).floor() as i64 + 1;
                sum += *slot;
            }

            let mut valid = true;
            for slot in scaled_utils.iter_mut() {
                if sum < scaled_util {
                    *slot += 1;
                    sum += 1;
                }
                valid = *slot <= precision;
                if !valid {
                    break;
                }
            }
            if valid && sum == scaled_util {
                break;
            }
        }

        let mut task_set =
            Self::build_task_set(rng, precision, &scaled_utils, min_period, max_period);
        task_set.shuffle(rng);
        task_set
    }

    /// Common validation; returns the utilization scaled to the grid.
    fn validate(
        precision: i64,
        util: Time,
        task_count: usize,
        min_period: Time,
        max_period: Time,
    ) -> Option<i64> {
        let on_grid = |value: Time| (value * precision).is_integer();
        if precision < 1
            || task_count < 1
            || util <= Time::ZERO
            || !on_grid(util)
            || !on_grid(min_period)
            || !on_grid(max_period)
            || min_period.ceil() > max_period.floor()
        {
            return None;
        }
        let scaled_util = (util * precision).numer();
        if scaled_util < task_count as i64 {
            return None;
        }
        Some(scaled_util)
    }

    /// Classic UUniFast recurrence over the unit simplex.
    fn uunifast(rng: &mut StdRng, total: f64, task_count: usize) -> Vec<f64> {
        let mut samples = vec![0f64; task_count];
        samples[task_count - 1] = total;
        for i in (1..task_count).rev() {
            let uniform: f64 = rng.gen_range(0f64..1f64);
            samples[i - 1] = samples[i] * uniform.powf(1.0 / i as f64);
            samples[i] -= samples[i - 1];
        }
        samples
    }

    fn build_task_set(
        rng: &mut StdRng,
        precision: i64,
        scaled_utils: &[i64],
        min_period: Time,
        max_period: Time,
    ) -> TaskSet {
        let period_lo = min_period.ceil();
        let period_hi = max_period.floor();
        scaled_utils.iter()
            .map(|&scaled| {
                let task_util = Time::ratio(scaled, precision);
                let period = Time::integer(rng.gen_range(period_lo..=period_hi));
                Task::implicit(period, task_util * period)
            })
            .collect()
    }
}

// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn check_partition(task_set: &TaskSet, precision: i64, util: Time, task_count: usize) {
        assert_eq!(task_set.len(), task_count);
        assert_eq!(TaskUtils::total_utilization(task_set), util);
        assert!(TaskUtils::implicit_deadlines(task_set));
        for task in task_set {
            let task_util = task.utilization();
            assert!(task_util >= Time::ratio(1, precision));
            assert!(task_util <= Time::integer(1));
            assert!((task_util * precision).is_integer());
        }
    }

    #[test]
    fn kraemer_partitions_the_requested_utilization() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..1000 {
            let task_set = TaskSetGenerator::modified_kraemer(
                &mut rng,
                1000,
                Time::ratio(3, 2),
                3,
                Time::integer(1),
                Time::integer(1),
            );
            check_partition(&task_set, 1000, Time::ratio(3, 2), 3);
        }
    }

    #[test]
    fn uunifast_partitions_the_requested_utilization() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            let task_set = TaskSetGenerator::uunifast_discard(
                &mut rng,
                100,
                Time::integer(2),
                5,
                Time::integer(2),
                Time::integer(8),
            );
            check_partition(&task_set, 100, Time::integer(2), 5);
        }
    }

    #[test]
    fn periods_stay_inside_the_requested_interval() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let task_set = TaskSetGenerator::modified_kraemer(
                &mut rng,
                100,
                Time::integer(1),
                4,
                Time::integer(4),
                Time::integer(12),
            );
            for task in &task_set {
                assert!(task.period.is_integer());
                assert!(task.period >= Time::integer(4));
                assert!(task.period <= Time::integer(12));
            }
        }
    }

    #[test]
    fn invalid_inputs_yield_an_empty_set() {
        let mut rng = StdRng::seed_from_u64(0);
        let one = Time::integer(1);

        // zero tasks
        assert!(TaskSetGenerator::modified_kraemer(&mut rng, 10, one, 0, one, one).is_empty());
        // utilization off the grid
        assert!(TaskSetGenerator::modified_kraemer(&mut rng, 10, Time::ratio(1, 3), 1, one, one)
            .is_empty());
        // more tasks than grid points
        assert!(TaskSetGenerator::modified_kraemer(&mut rng, 2, one, 3, one, one).is_empty());
        // non-positive utilization
        assert!(TaskSetGenerator::uunifast_discard(&mut rng, 10, Time::ZERO, 1, one, one)
            .is_empty());
        // period bound off the grid
        assert!(TaskSetGenerator::uunifast_discard(&mut rng, 10, one, 2, Time::ratio(1, 3), one)
            .is_empty());
    }

    #[test]
    fn generation_is_reproducible_from_the_seed() {
        let draw = || {
            let mut rng = StdRng::seed_from_u64(99);
            TaskSetGenerator::uunifast_discard(
                &mut rng,
                1000,
                Time::ratio(5, 2),
                6,
                Time::integer(4),
                Time::integer(12),
            )
        };
        let first = draw();
        let second = draw();
        let utils = |set: &TaskSet| -> Vec<Time> { set.iter().map(Task::utilization).collect() };
        assert_eq!(utils(&first), utils(&second));
        let periods = |set: &TaskSet| -> Vec<Time> { set.iter().map(|t| t.period).collect() };
        assert_eq!(periods(&first), periods(&second));
    }
}
