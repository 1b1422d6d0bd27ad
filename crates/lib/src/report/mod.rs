//! Snapshot of the model graph for display.
//!
//! [`ModelReport::capture`] records every visible node without realizing
//! anything, so the report shows how far each node has been taken.

use std::fmt::Write;

use serde::Serialize;

use crate::node::{ModelNode, NodeState};
use crate::path::ModelPath;
use crate::registry::ModelRegistry;

/// One node in a [`ModelReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
  pub path: ModelPath,
  pub state: NodeState,
  pub descriptor: String,
  pub types: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,
}

impl NodeReport {
  pub fn from_node(node: &ModelNode) -> Self {
    Self {
      path: node.path().clone(),
      state: node.state(),
      descriptor: node.descriptor().to_string(),
      types: node.type_descriptions(false),
      value: node.value_description(),
    }
  }
}

/// Every node that is neither hidden nor ephemeral, in path order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelReport {
  pub nodes: Vec<NodeReport>,
}

impl ModelReport {
  pub fn capture(registry: &ModelRegistry) -> Self {
    let nodes = registry
      .nodes()
      .iter()
      .filter(|node| !node.is_hidden())
      .map(NodeReport::from_node)
      .collect();
    Self { nodes }
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Indented tree, one block per node.
  pub fn render_text(&self) -> String {
    let mut out = String::new();
    for node in &self.nodes {
      let indent = "  ".repeat(node.path.depth().saturating_sub(1));
      let _ = writeln!(out, "{indent}+ {}", node.path.name());
      let _ = writeln!(out, "{indent}    | State: {}", node.state);
      if !node.types.is_empty() {
        let _ = writeln!(out, "{indent}    | Type: {}", node.types.join(", "));
      }
      if let Some(value) = &node.value {
        let _ = writeln!(out, "{indent}    | Value: {value}");
      }
      let _ = writeln!(out, "{indent}    | Creator: {}", node.descriptor);
    }
    out
  }
}
