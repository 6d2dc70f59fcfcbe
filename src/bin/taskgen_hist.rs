use rand::SeedableRng;
use rand::rngs::StdRng;
use schedsim::prelude::*;

/// Draw task sets repeatedly and print ASCII histograms of the per-task
/// utilization distribution, plus the spread (mean absolute deviation) of
/// each draw. Used to eyeball generator bias.
#[derive(clap::Parser)]
pub struct Args {
    /// Generator under inspection
    #[arg(short='g', value_name="GENERATOR", default_value="uunifast")]
    pub generator: Generator,

    /// Number of task sets to draw
    #[arg(short='t', value_name="TRIALS", default_value="100000")]
    pub trials: usize,

    /// Tasks per set
    #[arg(short='k', value_name="TASKS", default_value="5")]
    pub task_count: usize,

    /// Utilization grid resolution
    #[arg(short='p', value_name="PRECISION", default_value="100")]
    pub precision: i64,

    /// Total utilization, an integer or a fraction num/den
    #[arg(short='u', value_name="UTIL", default_value="1")]
    pub util: Time,

    #[arg(long="seed", default_value="0")]
    pub seed: u64,
}

#[derive(Debug, Clone)]
#[derive(PartialEq, Eq)]
#[derive(clap::ValueEnum)]
pub enum Generator {
    #[value(name = "kraemer")]
    ModifiedKraemer,
    #[value(name = "uunifast")]
    UUniFastDiscard,
}

const BAR_WIDTH: usize = 100;

fn main() -> anyhow::Result<()> {
    let args = <Args as clap::Parser>::parse();

    anyhow::ensure!(args.task_count >= 1, "need at least one task per set");

    let mut rng = StdRng::seed_from_u64(args.seed);
    let buckets = args.precision as usize + 1;
    let mut util_buckets = vec![vec![0u64; buckets]; args.task_count];
    let mut spread_buckets = vec![0u64; buckets];

    for _ in 0..args.trials {
        let task_set = match args.generator {
            Generator::ModifiedKraemer => TaskSetGenerator::modified_kraemer(
                &mut rng,
                args.precision,
                args.util,
                args.task_count,
                Time::integer(1),
                Time::integer(1),
            ),
            Generator::UUniFastDiscard => TaskSetGenerator::uunifast_discard(
                &mut rng,
                args.precision,
                args.util,
                args.task_count,
                Time::integer(1),
                Time::integer(1),
            ),
        };
        anyhow::ensure!(!task_set.is_empty(), "generator rejected the parameters");

        let utils: Vec<Time> = task_set.iter().map(Task::utilization).collect();
        let mean = utils.iter().map(Time::as_f64).sum::<f64>() / args.task_count as f64;
        let mut spread = 0f64;
        for (task, util) in utils.iter().enumerate() {
            let bucket = (util.numer() * args.precision / util.denom()) as usize;
            util_buckets[task][bucket.min(buckets - 1)] += 1;
            spread += (util.as_f64() - mean).abs();
        }
        let spread_bucket = (spread * 25.0) as usize;
        if spread_bucket < buckets {
            spread_buckets[spread_bucket] += 1;
        }
    }

    let max_count = util_buckets.iter()
        .flat_map(|buckets| buckets.iter())
        .copied()
        .max()
        .unwrap_or(0);
    for (task, buckets) in util_buckets.iter().enumerate() {
        println!("TASK {task} UTIL DISTRIBUTION");
        print_histogram(buckets, max_count);
        println!();
    }

    println!("SPREAD DISTRIBUTION");
    let max_count = spread_buckets.iter().copied().max().unwrap_or(0);
    print_histogram(&spread_buckets, max_count);

    Ok(())
}

fn print_histogram(buckets: &[u64], max_count: u64) {
    for &count in buckets {
        let bar = if max_count == 0 {
            0
        } else {
            (BAR_WIDTH as f64 * count as f64 / max_count as f64).round() as usize
        };
        println!("{}{}{count}", "X".repeat(bar), " ".repeat(BAR_WIDTH - bar));
    }
}
