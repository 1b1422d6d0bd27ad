use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::action::ModelAction;
use crate::node::{ModelActionRole, NodeState};
use crate::path::ModelPath;

/// Configuration for a [`ModelRegistry`](super::ModelRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
  /// Fail with [`ModelError::CycleDetected`](crate::ModelError::CycleDetected)
  /// when realization re-enters a node that is still being realized.
  pub detect_cycles: bool,
  /// State rule inputs are realized to unless their reference asks for another.
  pub default_input_state: NodeState,
}

impl Default for RegistryConfig {
  fn default() -> Self {
    Self {
      detect_cycles: true,
      default_input_state: NodeState::GraphClosed,
    }
  }
}

pub(crate) type RoleQueues = BTreeMap<ModelActionRole, VecDeque<ModelAction>>;

/// Rules waiting to run, per subject path and role, in registration order.
#[derive(Default)]
pub(crate) struct RuleStore {
  rules: HashMap<ModelPath, RoleQueues>,
}

impl RuleStore {
  pub fn push(&mut self, path: ModelPath, role: ModelActionRole, action: ModelAction) {
    self
      .rules
      .entry(path)
      .or_default()
      .entry(role)
      .or_default()
      .push_back(action);
  }

  /// Queues `actions` ahead of anything already bound to `path`, keeping their order.
  pub fn prepend(&mut self, path: &ModelPath, actions: Vec<(ModelActionRole, ModelAction)>) {
    let roles = self.rules.entry(path.clone()).or_default();
    for (role, action) in actions.into_iter().rev() {
      roles.entry(role).or_default().push_front(action);
    }
  }

  pub fn pop(&mut self, path: &ModelPath, role: ModelActionRole) -> Option<ModelAction> {
    let roles = self.rules.get_mut(path)?;
    let queue = roles.get_mut(&role)?;
    let action = queue.pop_front();
    if queue.is_empty() {
      roles.remove(&role);
    }
    if roles.is_empty() {
      self.rules.remove(path);
    }
    action
  }

  /// Rules currently queued for exactly `path`.
  pub fn snapshot(&self, path: &ModelPath) -> Option<RoleQueues> {
    self.rules.get(path).cloned()
  }

  /// Puts back what [`snapshot`](Self::snapshot) returned for `path`.
  pub fn restore(&mut self, path: &ModelPath, saved: Option<RoleQueues>) {
    match saved {
      Some(roles) => {
        self.rules.insert(path.clone(), roles);
      }
      None => {
        self.rules.remove(path);
      }
    }
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  /// Drops rules for `path` and everything below it.
  pub fn remove_subtree(&mut self, path: &ModelPath) {
    self
      .rules
      .retain(|subject, _| subject != path && !subject.is_descendant_of(path));
  }

  /// Every pending rule with its subject path and role, in path order.
  pub fn pending(&self) -> Vec<(ModelPath, ModelActionRole, ModelAction)> {
    let mut pending: Vec<(ModelPath, ModelActionRole, ModelAction)> = self
      .rules
      .iter()
      .flat_map(|(path, roles)| {
        roles
          .iter()
          .flat_map(move |(role, actions)| actions.iter().map(move |action| (path.clone(), *role, action.clone())))
      })
      .collect();
    pending.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
    pending
  }
}
