use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a model node.
///
/// States are totally ordered and a node only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeState {
  Known,
  Created,
  DefaultsApplied,
  Initialized,
  Mutated,
  Finalized,
  SelfClosed,
  GraphClosed,
}

impl NodeState {
  pub const ALL: [NodeState; 8] = [
    NodeState::Known,
    NodeState::Created,
    NodeState::DefaultsApplied,
    NodeState::Initialized,
    NodeState::Mutated,
    NodeState::Finalized,
    NodeState::SelfClosed,
    NodeState::GraphClosed,
  ];

  /// Nodes accept links, private data and writable views until they are finalized.
  pub fn is_mutable(self) -> bool {
    self < NodeState::Finalized
  }

  pub fn as_str(self) -> &'static str {
    match self {
      NodeState::Known => "known",
      NodeState::Created => "created",
      NodeState::DefaultsApplied => "defaults-applied",
      NodeState::Initialized => "initialized",
      NodeState::Mutated => "mutated",
      NodeState::Finalized => "finalized",
      NodeState::SelfClosed => "self-closed",
      NodeState::GraphClosed => "graph-closed",
    }
  }
}

impl fmt::Display for NodeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for NodeState {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    NodeState::ALL
      .into_iter()
      .find(|state| state.as_str() == s)
      .ok_or_else(|| {
        let known: Vec<&str> = NodeState::ALL.iter().map(|state| state.as_str()).collect();
        format!("unknown node state '{s}', expected one of: {}", known.join(", "))
      })
  }
}

/// Phase a rule runs in.
///
/// Each role drives its subject towards [`target_state`](Self::target_state);
/// roles run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelActionRole {
  /// Declares projections. Runs before the node can be matched by type.
  Discover,
  /// Installs backing data.
  Create,
  Defaults,
  Initialize,
  Mutate,
  Finalize,
  /// Read-only checks before the node closes.
  Validate,
}

impl ModelActionRole {
  pub const ALL: [ModelActionRole; 7] = [
    ModelActionRole::Discover,
    ModelActionRole::Create,
    ModelActionRole::Defaults,
    ModelActionRole::Initialize,
    ModelActionRole::Mutate,
    ModelActionRole::Finalize,
    ModelActionRole::Validate,
  ];

  /// State the subject reaches once all rules of this role have run.
  pub fn target_state(self) -> NodeState {
    match self {
      ModelActionRole::Discover => NodeState::Known,
      ModelActionRole::Create => NodeState::Created,
      ModelActionRole::Defaults => NodeState::DefaultsApplied,
      ModelActionRole::Initialize => NodeState::Initialized,
      ModelActionRole::Mutate => NodeState::Mutated,
      ModelActionRole::Finalize => NodeState::Finalized,
      ModelActionRole::Validate => NodeState::SelfClosed,
    }
  }

  /// Whether rules of this role receive a view of their subject.
  pub fn subject_view_available(self) -> bool {
    !matches!(self, ModelActionRole::Discover | ModelActionRole::Create)
  }

  /// Whether the subject view handed to rules of this role is writable.
  pub fn subject_writable(self) -> bool {
    self.subject_view_available() && self != ModelActionRole::Validate
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ModelActionRole::Discover => "discover",
      ModelActionRole::Create => "create",
      ModelActionRole::Defaults => "defaults",
      ModelActionRole::Initialize => "initialize",
      ModelActionRole::Mutate => "mutate",
      ModelActionRole::Finalize => "finalize",
      ModelActionRole::Validate => "validate",
    }
  }
}

impl fmt::Display for ModelActionRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
