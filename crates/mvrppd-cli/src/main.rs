//! Command-line driver for the MVRPPD solver.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::info;

use mvrppd_core::Instance;
use mvrppd_milp::{MilpSolver, SolverConfig};

mod gen;

use gen::GeneratorConfig;

#[derive(Parser)]
#[command(name = "mvrppd", about = "Bi-objective MVRPPD solver", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance file and report the Pareto archive.
    Solve(SolveArgs),
    /// Generate a random instance.
    Gen(GenArgs),
}

#[derive(Args)]
struct SolveArgs {
    /// Instance file in the k/r block format.
    instance: PathBuf,

    /// Wall-clock budget in seconds.
    #[arg(long, default_value_t = 3600)]
    time_limit: u64,

    /// Seed for the optimizer; derived from the clock when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Ladder length and archive capacity; defaults to twice the vertex
    /// count.
    #[arg(long)]
    max_num_solutions: Option<usize>,

    /// Directory to write one solution file per first-front solution into.
    #[arg(long)]
    solutions: Option<PathBuf>,
}

#[derive(Args)]
struct GenArgs {
    /// Output file; stdout when omitted.
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 2)]
    vehicles: usize,

    #[arg(long, default_value_t = 5)]
    requests: usize,

    /// Side length of the square the vertices are drawn from.
    #[arg(long, default_value_t = 100.0)]
    size: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    match Cli::parse().command {
        Commands::Solve(args) => solve(args),
        Commands::Gen(args) => generate(args),
    }
}

fn solve(args: SolveArgs) -> anyhow::Result<()> {
    let instance = Instance::from_file(&args.instance)
        .with_context(|| format!("failed to read instance {}", args.instance.display()))?;

    if let Err(err) = instance.validate() {
        bail!("invalid instance (code {}): {err}", err.code());
    }

    info!(
        "solving instance with {} vehicles and {} requests",
        instance.num_vehicles(),
        instance.num_requests()
    );

    let instance = Arc::new(instance);
    let defaults = SolverConfig::default_for(&instance);

    let config = SolverConfig {
        time_limit: Duration::from_secs(args.time_limit),
        seed: args.seed.unwrap_or(defaults.seed),
        max_num_solutions: args.max_num_solutions.unwrap_or(defaults.max_num_solutions),
    };

    let mut solver = MilpSolver::new(Arc::clone(&instance), config);
    solver.solve();

    if let Some(duration) = solver.solving_time() {
        info!("sweep finished in {:.1}s", duration.as_secs_f64());
    }

    if solver.archive().is_empty() {
        bail!("no solution found within the time limit");
    }

    let stdout = io::stdout();
    solver.write_statistics(stdout.lock())?;

    if let Some(directory) = &args.solutions {
        fs::create_dir_all(directory)
            .with_context(|| format!("failed to create {}", directory.display()))?;

        let front = solver.archive_mut().front(0).to_vec();

        for (index, solution) in front.iter().enumerate() {
            let path = directory.join(format!("solution_{index}.sol"));
            solution
                .write_file(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        info!("wrote {} solution file(s)", front.len());
    }

    Ok(())
}

fn generate(args: GenArgs) -> anyhow::Result<()> {
    let instance = gen::generate(&GeneratorConfig {
        vehicles: args.vehicles,
        requests: args.requests,
        size: args.size,
        seed: args.seed,
    });

    match &args.output {
        Some(path) => instance
            .write_file(path)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            instance.write(&mut handle)?;
            handle.flush()?;
        }
    }

    Ok(())
}
