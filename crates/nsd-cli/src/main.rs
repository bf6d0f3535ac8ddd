mod cli;
mod input;
mod report;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use nsd_algo::{Controller, RunConfig};
use nsd_core::Tree;
use nsd_solver::LpNodeSolver;

use crate::cli::{Cli, Commands, ConfigError, RunArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting tracing subscriber")?;

    if args.solver != "clarabel" {
        return Err(ConfigError::UnknownSolver(args.solver).into());
    }

    let nodes = input::load_tree(&args.tree)?;
    let general = input::load_data(&args.data)?;
    let mut tree = Tree::new(nodes, general).context("validating scenario tree")?;

    let mut config = RunConfig {
        problem_class: args.problem_type.into(),
        ..RunConfig::default()
    };
    if let Some(seconds) = args.time {
        config.max_time = Duration::from_secs_f64(seconds);
    }
    if let Some(iterations) = args.iterations {
        config.max_iterations = iterations;
    }
    if let Some(evaluations) = args.evaluations {
        config.max_evaluations = evaluations;
    }

    let controller = Controller::new(LpNodeSolver::with_builtin_templates(), config);
    let stats = controller.run(&mut tree).context("running decomposition")?;

    println!("stop reason:  {}", stats.stop);
    println!("iterations:   {}", stats.iterations);
    println!("evaluations:  {}", stats.evaluations);
    println!("elapsed:      {:.3}s", stats.elapsed.as_secs_f64());
    println!("lower bound:  {:.6}", stats.lower_bound);
    println!("upper bound:  {:.6}", stats.upper_bound);
    if let Some(objective) = tree.expected_value() {
        println!("objective:    {objective:.6}");
    }

    if let Some(path) = &args.output {
        report::write_report(path, &tree, &stats)?;
        println!("report:       {}", path.display());
    }
    Ok(())
}
