//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output: colored status
//! messages, node states and JSON.

use anyhow::Context;
use clap::ValueEnum;
use cfgraph_lib::NodeState;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Colors a state by how far along the lifecycle it is.
pub fn styled_state(state: NodeState) -> String {
  let label = state.as_str();
  match state {
    NodeState::GraphClosed => label.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    NodeState::Known => label.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
    _ => label.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
