use crate::prelude::*;
use crate::schedulers::Scheduler;
use crate::simulation::SimModel;

pub mod prelude {
    pub use super::{
        ExperimentConfig,
        SchedStudyData,
        SchedulerSeries,
        run_kraemer_study,
        run_sched_study,
        write_kraemer_study,
        write_sched_study,
    };
}

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::io::Write;
use tracing::{debug, info};

/// Parameters of the schedulability / overhead sweep. The defaults match the
/// published study setup; everything is serde-deserializable so a JSON file
/// can override any of it.
#[derive(Clone)]
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Number of utilization increments between 0 and the core count.
    pub util_steps: i64,
    pub trials_per_util: usize,
    pub task_count: usize,
    pub min_period: i64,
    pub max_period: i64,
    /// Horizon for the overhead snapshot (context switches, migrations).
    pub sim_time: i64,
    /// Integer factor PD² task sets are stretched by; the ceiling of the
    /// stretched execution times puts them back on the integer grid.
    pub pd2_scale: i64,
    pub seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            util_steps: 200,
            trials_per_util: 50,
            task_count: 12,
            min_period: 4,
            max_period: 12,
            sim_time: 1000,
            pd2_scale: 10,
            seed: 0,
        }
    }
}

impl ExperimentConfig {
    /// Utilization grid: a thousand points per sweep increment.
    pub fn precision(&self) -> i64 {
        self.util_steps * 1000
    }
}

/// One policy under study: how to build it, and the utilization bound below
/// which it is analytically schedulable (used only to skip the costly
/// hyperperiod check where the outcome is known).
struct Subject {
    name: &'static str,
    check_factor: Time,
    time_scale: i64,
    build: fn() -> Box<dyn Scheduler>,
}

impl Subject {
    fn check_util(&self, cores: usize) -> Time {
        self.check_factor * cores as i64
    }
}

fn subjects(config: &ExperimentConfig) -> Vec<Subject> {
    vec![
        Subject {
            name: "GEDF",
            check_factor: Time::ZERO,
            time_scale: 1,
            build: || Box::new(GEDF),
        },
        Subject {
            name: "EDZL",
            check_factor: Time::ratio(3, 4),
            time_scale: 1,
            build: || Box::new(EDZL),
        },
        Subject {
            name: "PD2",
            check_factor: Time::ratio(1, 2),
            time_scale: config.pd2_scale,
            build: || Box::new(PD2::new(true)),
        },
        Subject {
            name: "LLREF",
            check_factor: Time::integer(1),
            time_scale: 1,
            build: || Box::new(LLREF::new()),
        },
    ]
}

/// Aggregated sweep results for one policy.
#[derive(Clone)]
#[derive(Debug)]
pub struct SchedulerSeries {
    pub name: &'static str,
    pub utils: Vec<f64>,
    pub schedulability: Vec<f64>,
    pub cswitch: Vec<f64>,
    pub migrations: Vec<f64>,
}

pub struct SchedStudyData {
    pub series: Vec<SchedulerSeries>,
    /// Raw per-trial task utilization vectors, in trial order.
    pub sample_points: Vec<Vec<f64>>,
}

/// Outcome of one task set under one policy: `None` when a deadline was
/// missed, otherwise the overhead snapshot (context switches, migrations)
/// taken at the short horizon.
type SubjectOutcome = Option<(u64, u64)>;

struct TrialOutcome {
    sample: Vec<f64>,
    results: Vec<SubjectOutcome>,
}

/// Sweep utilization from `cores / util_steps` up to `cores`, running
/// `trials_per_util` random task sets per point under every subject policy.
///
/// Trials are independent and sharded over the rayon pool; each derives its
/// own RNG from the master seed, so results do not depend on thread
/// interleaving.
pub fn run_sched_study(cores: usize, config: &ExperimentConfig) -> SchedStudyData {
    let subjects = subjects(config);
    let step = Time::ratio(cores as i64, config.util_steps);

    let mut series: Vec<SchedulerSeries> = subjects.iter()
        .map(|subject| SchedulerSeries {
            name: subject.name,
            utils: Vec::new(),
            schedulability: Vec::new(),
            cswitch: Vec::new(),
            migrations: Vec::new(),
        })
        .collect();
    let mut sample_points = Vec::new();

    for step_index in 1..=config.util_steps {
        let util = step * step_index;
        info!(util = util.as_f64(), "sweeping utilization point");

        let outcomes: Vec<TrialOutcome> = (0..config.trials_per_util)
            .into_par_iter()
            .map(|trial| {
                let seed = trial_seed(config.seed, step_index, trial);
                run_trial(cores, config, &subjects, util, seed)
            })
            .collect();

        for (subject_index, subject) in subjects.iter().enumerate() {
            let schedulable: Vec<(u64, u64)> = outcomes.iter()
                .filter_map(|outcome| outcome.results[subject_index])
                .collect();
            let series = &mut series[subject_index];
            series.utils.push(util.as_f64());
            series.schedulability
                .push(schedulable.len() as f64 / config.trials_per_util as f64);
            if schedulable.is_empty() {
                series.cswitch.push(0.0);
                series.migrations.push(0.0);
            } else {
                let count = schedulable.len() as f64;
                series.cswitch
                    .push(schedulable.iter().map(|(c, _)| *c as f64).sum::<f64>() / count);
                series.migrations
                    .push(schedulable.iter().map(|(_, m)| *m as f64).sum::<f64>() / count);
            }
            debug!(
                subject = subject.name,
                schedulable = schedulable.len(),
                "utilization point done"
            );
        }
        sample_points.extend(outcomes.into_iter().map(|outcome| outcome.sample));
    }

    SchedStudyData { series, sample_points }
}

fn trial_seed(master: u64, step_index: i64, trial: usize) -> u64 {
    master
        .wrapping_add((step_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((trial as u64).wrapping_mul(0xD1B5_4A32_D192_ED03))
}

fn run_trial(
    cores: usize,
    config: &ExperimentConfig,
    subjects: &[Subject],
    util: Time,
    seed: u64,
) -> TrialOutcome {
    let mut rng = StdRng::seed_from_u64(seed);
    let task_set = TaskSetGenerator::modified_kraemer(
        &mut rng,
        config.precision(),
        util,
        config.task_count,
        Time::integer(config.min_period),
        Time::integer(config.max_period),
    );
    debug!(
        largest_util = TaskUtils::largest_utilization(&task_set),
        "task set drawn"
    );

    let sample = task_set.iter()
        .map(|task| task.utilization().as_f64())
        .collect();
    let hyperperiod = TaskUtils::hyperperiod(&task_set);

    let results = subjects.iter()
        .map(|subject| run_subject(cores, config, subject, &task_set, util, hyperperiod))
        .collect();

    TrialOutcome { sample, results }
}

fn run_subject(
    cores: usize,
    config: &ExperimentConfig,
    subject: &Subject,
    task_set: &TaskSet,
    util: Time,
    hyperperiod: Time,
) -> SubjectOutcome {
    let scale = subject.time_scale;
    let task_set = if scale == 1 {
        task_set.clone()
    } else {
        task_set.iter()
            .map(|task| {
                let period = task.period * scale;
                Task::new(
                    task.phase * scale,
                    period,
                    Time::integer((task.exec_time * scale).ceil()),
                    period,
                )
            })
            .collect()
    };

    let mut model = SimModel::new();
    model.ebs_active = false;
    model.reset(task_set, (subject.build)(), cores);

    // overhead snapshot at the short horizon
    model.simulate(Time::integer(config.sim_time * scale));
    if model.missed.is_some() {
        return None;
    }
    let cswitches = model.cswitch_count;
    let migrations = model.finished_jobs.iter()
        .chain(model.active_jobs.iter())
        .map(|job| job.migration_count as u64)
        .sum();

    // above the policy's analytic bound, settle schedulability over two
    // hyperperiods
    if util > subject.check_util(cores) {
        if hyperperiod >= Time::NEVER {
            debug!(subject = subject.name, "hyperperiod overflow, keeping short-horizon verdict");
        } else {
            model.simulate(hyperperiod * (2 * scale));
            if model.missed.is_some() {
                return None;
            }
        }
    }

    Some((cswitches, migrations))
}

/// Draw repeated Kraemer partitions at a fixed utilization and keep the raw
/// utilization vectors, for inspecting the sampling distribution.
pub fn run_kraemer_study(trials: usize, seed: u64) -> Vec<Vec<f64>> {
    const PRECISION: i64 = 1000;
    const TASK_COUNT: usize = 3;

    let mut rng = StdRng::seed_from_u64(seed);
    (0..trials)
        .map(|_| {
            let task_set = TaskSetGenerator::modified_kraemer(
                &mut rng,
                PRECISION,
                Time::ratio(3, 2),
                TASK_COUNT,
                Time::integer(1),
                Time::integer(1),
            );
            task_set.iter().map(|task| task.utilization().as_f64()).collect()
        })
        .collect()
}

pub fn write_kraemer_study(mut writer: impl Write, samples: &[Vec<f64>]) -> std::io::Result<()> {
    for sample in samples {
        write_tuple(&mut writer, sample)?;
    }
    Ok(())
}

pub fn write_sched_study(mut writer: impl Write, data: &SchedStudyData) -> std::io::Result<()> {
    for series in &data.series {
        writeln!(writer, "{}", series.name)?;

        write!(writer, "sched: ")?;
        for (util, value) in series.utils.iter().zip(&series.schedulability) {
            write!(writer, "({util},{value})")?;
        }
        writeln!(writer)?;

        write!(writer, "cswitch: ")?;
        for (util, value) in series.utils.iter().zip(&series.cswitch) {
            write!(writer, "({util},{value})")?;
        }
        writeln!(writer)?;

        write!(writer, "migrations: ")?;
        for (util, value) in series.utils.iter().zip(&series.migrations) {
            write!(writer, "({util},{value})")?;
        }
        writeln!(writer)?;
    }

    write!(writer, "sample points: ")?;
    for sample in &data.sample_points {
        write_tuple(&mut writer, sample)?;
        writeln!(writer)?;
    }
    Ok(())
}

fn write_tuple(writer: &mut impl Write, values: &[f64]) -> std::io::Result<()> {
    write!(writer, "(")?;
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            write!(writer, ",")?;
        }
        write!(writer, "{value}")?;
    }
    write!(writer, ")")
}

// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> ExperimentConfig {
        ExperimentConfig {
            util_steps: 4,
            trials_per_util: 3,
            task_count: 3,
            min_period: 4,
            max_period: 6,
            sim_time: 40,
            pd2_scale: 10,
            seed: 7,
        }
    }

    #[test]
    fn sweep_covers_every_utilization_point() {
        let config = tiny_config();
        let data = run_sched_study(2, &config);

        assert_eq!(data.series.len(), 4);
        for series in &data.series {
            assert_eq!(series.utils.len(), config.util_steps as usize);
            assert_eq!(series.schedulability.len(), series.utils.len());
            assert_eq!(series.cswitch.len(), series.utils.len());
            assert_eq!(series.migrations.len(), series.utils.len());
            for fraction in &series.schedulability {
                assert!((0.0..=1.0).contains(fraction));
            }
        }
        assert_eq!(
            data.sample_points.len(),
            (config.util_steps as usize) * config.trials_per_util
        );
        assert_eq!(data.series[0].utils.last().copied(), Some(2.0));
    }

    #[test]
    fn low_utilization_is_schedulable_everywhere() {
        let config = tiny_config();
        let data = run_sched_study(2, &config);
        for series in &data.series {
            assert_eq!(series.schedulability[0], 1.0, "{} misses at U=m/steps", series.name);
        }
    }

    #[test]
    fn sweep_is_reproducible() {
        let config = tiny_config();
        let first = run_sched_study(2, &config);
        let second = run_sched_study(2, &config);
        for (a, b) in first.series.iter().zip(&second.series) {
            assert_eq!(a.schedulability, b.schedulability);
            assert_eq!(a.cswitch, b.cswitch);
            assert_eq!(a.migrations, b.migrations);
        }
        assert_eq!(first.sample_points, second.sample_points);
    }

    #[test]
    fn kraemer_study_output_format() {
        let samples = run_kraemer_study(5, 11);
        assert_eq!(samples.len(), 5);
        for sample in &samples {
            assert_eq!(sample.len(), 3);
            let total: f64 = sample.iter().sum();
            assert!((total - 1.5).abs() < 1e-9);
        }

        let mut out = Vec::new();
        write_kraemer_study(&mut out, &samples).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('(').count(), 5);
        assert!(!text.contains('\n'));
    }

    #[test]
    fn sched_study_file_format() {
        let data = SchedStudyData {
            series: vec![SchedulerSeries {
                name: "GEDF",
                utils: vec![0.5, 1.0],
                schedulability: vec![1.0, 0.5],
                cswitch: vec![10.0, 12.5],
                migrations: vec![0.0, 3.0],
            }],
            sample_points: vec![vec![0.25, 0.25], vec![0.5, 0.5]],
        };

        let mut out = Vec::new();
        write_sched_study(&mut out, &data).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("GEDF"));
        assert_eq!(lines.next(), Some("sched: (0.5,1)(1,0.5)"));
        assert_eq!(lines.next(), Some("cswitch: (0.5,10)(1,12.5)"));
        assert_eq!(lines.next(), Some("migrations: (0.5,0)(1,3)"));
        assert_eq!(lines.next(), Some("sample points: (0.25,0.25)"));
        assert_eq!(lines.next(), Some("(0.5,0.5)"));
    }
}
