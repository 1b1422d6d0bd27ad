//! cfgraph: inspect lazily configured model graphs from the command line.

mod cmd;
mod model_file;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cfgraph_lib::NodeState;

use crate::output::OutputFormat;

/// cfgraph - rule-driven configuration graphs
#[derive(Parser)]
#[command(name = "cfgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Realize a model file and print every element
  Report {
    /// Path to the model file
    file: PathBuf,

    /// State to realize top-level elements to
    #[arg(short, long, default_value = "graph-closed", value_parser = parse_state)]
    state: NodeState,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Check that every rule binds and no rules depend on each other in a cycle
  Check {
    /// Path to the model file
    file: PathBuf,
  },
}

fn parse_state(value: &str) -> Result<NodeState, String> {
  value.parse()
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Report { file, state, format } => cmd::cmd_report(&file, state, format),
    Commands::Check { file } => cmd::cmd_check(&file),
  }
}
