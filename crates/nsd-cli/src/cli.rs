use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown solver `{0}`; available: clarabel")]
    UnknownSolver(String),
}

#[derive(Parser)]
#[command(
    name = "nsd",
    version,
    about = "Nested stochastic decomposition over scenario trees"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the decomposition on a scenario tree
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Scenario tree file (YAML)
    pub tree: PathBuf,

    /// General data file (YAML), overlaid by node-local entries
    pub data: PathBuf,

    /// LP backend to use
    #[arg(short, long, default_value = "clarabel")]
    pub solver: String,

    /// Enable per-node debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Wall-clock limit in seconds
    #[arg(short, long)]
    pub time: Option<f64>,

    /// Maximum number of decomposition passes
    #[arg(short, long)]
    pub iterations: Option<u64>,

    /// Maximum number of node subproblem solves
    #[arg(short, long)]
    pub evaluations: Option<u64>,

    /// Write the per-node solution report to this file (YAML)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Problem class of the tree
    #[arg(long = "problem-type", value_enum, default_value_t = ProblemTypeArg::Continuous)]
    pub problem_type: ProblemTypeArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProblemTypeArg {
    Continuous,
    Binary,
}

impl From<ProblemTypeArg> for nsd_algo::ProblemClass {
    fn from(value: ProblemTypeArg) -> Self {
        match value {
            ProblemTypeArg::Continuous => nsd_algo::ProblemClass::Continuous,
            ProblemTypeArg::Binary => nsd_algo::ProblemClass::Binary,
        }
    }
}
