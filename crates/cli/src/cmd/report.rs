//! Implementation of the `cfgraph report` command.
//!
//! Loads a model file, realizes every top-level element to the requested
//! state and prints what the graph looks like afterwards.

use std::path::Path;

use anyhow::{Context, Result};

use cfgraph_lib::{ModelReport, NodeState};

use crate::model_file::ModelFile;
use crate::output::{OutputFormat, print_info, print_json, print_stat, styled_state};

pub fn cmd_report(file: &Path, state: NodeState, format: OutputFormat) -> Result<()> {
  let model = ModelFile::read(file)?.load(&file.display().to_string())?;

  for element in model.registry.root().links() {
    model
      .registry
      .at_state_or_later(element.path(), state)
      .with_context(|| format!("Failed to realize '{}' to {}", element.path(), state))?;
  }

  let report = ModelReport::capture(&model.registry);

  if format.is_json() {
    return print_json(&report);
  }

  if report.is_empty() {
    print_info("Model has no elements.");
    return Ok(());
  }

  print_info(&format!("Model of {}", file.display()));
  for node in &report.nodes {
    let indent = "  ".repeat(node.path.depth().saturating_sub(1));
    println!("{indent}+ {}", node.path.name());
    print_stat(&format!("{indent}    State"), &styled_state(node.state));
    if !node.types.is_empty() {
      print_stat(&format!("{indent}    Type"), &node.types.join(", "));
    }
    if let Some(value) = &node.value {
      print_stat(&format!("{indent}    Value"), value);
    }
    print_stat(&format!("{indent}    Creator"), &node.descriptor);
  }

  Ok(())
}
