use anyhow::Context as _;
use schedsim::prelude::*;

/// Run the schedulability / overhead sweep and write the result files.
#[derive(clap::Parser)]
pub struct Args {
    /// Number of cores to sweep
    #[arg(short='n', value_name="# CORES")]
    pub cores: usize,

    /// Output directory for the experiment data files
    #[arg(short='o', value_name="DIR", default_value=".")]
    pub out_dir: std::path::PathBuf,

    /// Experiment configuration, a JSON file overriding any default
    #[arg(short='c', value_name="CONFIG FILE")]
    pub config_file: Option<std::path::PathBuf>,

    /// Master seed for the task-set draws
    #[arg(long="seed")]
    pub seed: Option<u64>,

    /// Also run the Kraemer sampling study (this many trials)
    #[arg(long="kraemer", value_name="TRIALS")]
    pub kraemer_trials: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let args = <Args as clap::Parser>::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    anyhow::ensure!(args.cores > 0, "must sweep a positive number of cores");

    let mut config = match &args.config_file {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<ExperimentConfig>(&data)
                .with_context(|| format!("parsing config {}", path.display()))?
        },
        None => ExperimentConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    if let Some(trials) = args.kraemer_trials {
        let samples = run_kraemer_study(trials, config.seed);
        let path = args.out_dir.join("experiment_data_kraemer.txt");
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        write_kraemer_study(std::io::BufWriter::new(file), &samples)?;
        println!("wrote {}", path.display());
    }

    let data = run_sched_study(args.cores, &config);
    let path = args.out_dir.join(format!("experiment_data_{}cores.txt", args.cores));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_sched_study(std::io::BufWriter::new(file), &data)?;
    println!("wrote {}", path.display());

    Ok(())
}
