//! Implementation of the `cfgraph check` command.
//!
//! Verifies, without running any rule, that every rule in a model file
//! refers to elements that exist and that rule inputs do not form a cycle.

use std::path::Path;

use anyhow::{Context, Result};

use crate::model_file::ModelFile;
use crate::output::{print_error, print_stat, print_success};

pub fn cmd_check(file: &Path) -> Result<()> {
  let model = ModelFile::read(file)?.load(&file.display().to_string())?;

  if let Err(e) = model.registry.bind_all_references() {
    print_error("Model has rules that cannot be bound");
    return Err(e).context(format!("Failed to check {}", file.display()));
  }

  if let Err(e) = model.registry.check_cycles() {
    print_error("Model rules depend on each other in a cycle");
    return Err(e).context(format!("Failed to check {}", file.display()));
  }

  print_success(&format!("{} is consistent", file.display()));
  print_stat("Elements", &model.registry.nodes().len().to_string());
  print_stat("Rules", &model.rules.to_string());
  Ok(())
}
