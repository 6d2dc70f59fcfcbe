use crate::prelude::*;
use schedsim::prelude::*;

pub mod prelude {
    pub use super::args::prelude::*;
}

pub mod args;

fn main() {
    let args = match <Args as clap::Parser>::try_parse() {
        Ok(args) => args,
        Err(err) => {
            use clap::error::ErrorKind::*;

            let exit_code = match err.kind() {
                DisplayHelp |
                DisplayHelpOnMissingArgumentOrSubcommand |
                DisplayVersion => 0,
                _ => 2,
            };

            err.print().unwrap();
            std::process::exit(exit_code);
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let quiet = args.quiet;
    match run_simulation(args) {
        Ok(no_miss) => {
            if quiet {
                if no_miss {
                    std::process::exit(0);
                } else {
                    std::process::exit(1);
                }
            }
        },
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        },
    };
}

fn run_simulation(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    if args.policy.cores == 0 {
        return Err(format!("Must specify a positive number of cores").into());
    }

    let task_set = parse_taskset(
        &args.taskset.taskset_file,
        args.taskset.taskset_file_ty,
    )?;

    let mut model = SimModel::new();
    model.reset(
        task_set,
        args.policy.policy.build(!args.policy.no_early_release),
        args.policy.cores,
    );
    model.simulate(args.policy.sim_time);

    if !args.quiet {
        print_trace(&mut model);
        print_summary(&model);
    }

    Ok(model.missed.is_none())
}

fn print_trace(model: &mut SimModel) {
    while let Some(block) = model.ebs.next_block() {
        println!(
            "[{}, {}) core {} task {} job {} {:?}",
            block.start, block.end, block.core, block.task_id, block.job_id, block.end_state,
        );
    }
}

fn print_summary(model: &SimModel) {
    let preemptions: u32 = model.finished_jobs.iter()
        .chain(model.active_jobs.iter())
        .map(|job| job.preempt_count)
        .sum();
    let migrations: u32 = model.finished_jobs.iter()
        .chain(model.active_jobs.iter())
        .map(|job| job.migration_count)
        .sum();

    println!("simulated to t={}", model.time);
    println!("jobs finished: {}", model.finished_jobs.len());
    println!("context switches: {}", model.cswitch_count);
    println!("preemptions: {preemptions}");
    println!("migrations: {migrations}");
    match model.missed {
        None => println!("no deadline missed"),
        Some(task_id) => println!("DEADLINE MISS on task {task_id}"),
    }
}
