//! Adding nodes and binding rules to their subjects and inputs.

use tracing::{debug, trace, warn};

use super::{ModelRegistration, RegistryInner};
use crate::action::{ActionBody, ModelAction};
use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::graph::{ListenerOutcome, ModelListener, NodePredicate};
use crate::node::{ModelActionRole, ModelNode, NodeFlags};
use crate::path::ModelPath;
use crate::reference::ModelReference;

/// Discover and Create rules only get the node; the subject has no value to view yet.
fn check_subject_available(role: ModelActionRole, action: &ModelAction) -> Result<()> {
  if !role.subject_view_available() && matches!(action.body(), ActionBody::Subject(_)) {
    return Err(ModelError::SubjectUnavailable {
      role,
      descriptor: action.descriptor().to_string(),
    });
  }
  Ok(())
}

impl RegistryInner {
  /// Creates the node described by `registration` as a child of `parent`.
  pub(crate) fn add_node(&self, parent: &ModelNode, registration: ModelRegistration) -> Result<ModelNode> {
    let path = registration.path().clone();
    if path.parent_or_root().as_ref() != Some(parent.path()) {
      return Err(ModelError::InvalidPath {
        path: path.to_string(),
        reason: format!("not a direct child of '{}'", parent.path()),
      });
    }
    if !parent.is_mutable() {
      return Err(ModelError::NotMutable {
        path: parent.path().to_string(),
        state: parent.state(),
        operation: format!("add link '{}'", path.name()),
      });
    }
    if let Some(existing) = self.graph.find(&path) {
      return Err(ModelError::DuplicateNode {
        path: path.to_string(),
        descriptor: registration.descriptor().to_string(),
        existing: existing.descriptor().to_string(),
      });
    }

    let flags = NodeFlags {
      ephemeral: registration.is_ephemeral(),
      hidden: registration.is_hidden(),
    };
    let node = ModelNode::new(
      path.clone(),
      registration.descriptor().clone(),
      Some(parent),
      flags,
      self.self_ref.clone(),
    );
    let bound_ahead = self.rules.borrow().snapshot(&path);
    // The registration's own rules run before rules bound to the path ahead of time.
    self.rules.borrow_mut().prepend(&path, registration.into_actions());
    parent.insert_link(node.clone());
    debug!(path = %path, descriptor = %node.descriptor(), "model element registered");
    if let Err(err) = self.graph.add(node.clone()) {
      // A listener rejected the node: leave the registry as it was so the path can be registered again.
      warn!(path = %path, error = %err, "model element registration rolled back");
      self.graph.remove(&path);
      parent.remove_link(path.name());
      self.rules.borrow_mut().restore(&path, bound_ahead);
      return Err(err);
    }
    Ok(node)
  }

  /// Applies `scope` to `action` and binds it by path or by type.
  pub(crate) fn bind(&self, role: ModelActionRole, action: ModelAction, scope: &ModelPath) -> Result<()> {
    let action = action.in_scope(scope);
    match action.subject().resolved_path() {
      Some(path) => {
        let action = action.bound_to(path.clone());
        self.bind_to_path(&path, role, action)
      }
      None => {
        let ty = action.subject().model_type();
        let predicate = NodePredicate::descendants_of(scope.clone()).with_type(ty, role.subject_writable());
        self.bind_matching(predicate, role, action)
      }
    }
  }

  /// Queues `action` for the node at `path`, which need not exist yet.
  pub(crate) fn bind_to_path(&self, path: &ModelPath, role: ModelActionRole, action: ModelAction) -> Result<()> {
    check_subject_available(role, &action)?;
    if let Some(node) = self.graph.find(path) {
      let too_late = if role == ModelActionRole::Discover {
        node.is_discovered()
      } else {
        node.state() >= role.target_state()
      };
      if too_late {
        return Err(ModelError::NotMutable {
          path: path.to_string(),
          state: node.state(),
          operation: format!("apply {role} rule {}", action.descriptor()),
        });
      }
    }
    trace!(path = %path, role = %role, rule = %action.descriptor(), "bound model rule");
    self.rules.borrow_mut().push(path.clone(), role, action);
    Ok(())
  }

  /// Binds a copy of `action` to every current and future node matching `predicate`.
  pub(crate) fn bind_matching(&self, predicate: NodePredicate, role: ModelActionRole, action: ModelAction) -> Result<()> {
    check_subject_available(role, &action)?;
    trace!(role = %role, rule = %action.descriptor(), "binding model rule by type");
    let registry = self.self_ref.clone();
    self.graph.add_listener(ModelListener::new(predicate, move |node| {
      let Some(registry) = registry.upgrade() else {
        return Ok(ListenerOutcome::Stop);
      };
      registry.bind_to_path(node.path(), role, action.clone().bound_to(node.path().clone()))?;
      Ok(ListenerOutcome::Continue)
    }))
  }

  /// Finds the node a reference points at.
  ///
  /// Path references must name an existing node. Type-only references
  /// must match exactly one node within their scope.
  pub(crate) fn resolve(&self, reference: &ModelReference, descriptor: &RuleDescriptor) -> Result<ModelNode> {
    if let Some(path) = reference.resolved_path() {
      return self.graph.find(&path).ok_or_else(|| ModelError::UnboundReference {
        reference: reference.to_string(),
        descriptor: descriptor.to_string(),
      });
    }
    let scope = reference.scope().cloned().unwrap_or_else(ModelPath::root);
    let predicate = NodePredicate::descendants_of(scope).with_type(reference.model_type(), false);
    let mut candidates = Vec::new();
    for node in self.graph.nodes_at(&predicate) {
      if predicate.matches(&node)? {
        candidates.push(node);
      }
    }
    match candidates.len() {
      0 => Err(ModelError::UnboundReference {
        reference: reference.to_string(),
        descriptor: descriptor.to_string(),
      }),
      1 => Ok(candidates.remove(0)),
      _ => Err(ModelError::AmbiguousReference {
        reference: reference.to_string(),
        descriptor: descriptor.to_string(),
        candidates: candidates.iter().map(|node| node.path().to_string()).collect(),
      }),
    }
  }

  /// Describes every pending rule whose subject or inputs do not resolve.
  pub(crate) fn unbound_rules(&self) -> Vec<String> {
    let pending = self.rules.borrow().pending();
    let mut unbound = Vec::new();
    for (path, role, action) in pending {
      if !self.graph.contains(&path) {
        unbound.push(format!(
          "  {} ({role}): subject '{path}' does not exist",
          action.descriptor()
        ));
        continue;
      }
      for input in action.inputs() {
        if let Err(err) = self.resolve(input, action.descriptor()) {
          let problem = match err {
            ModelError::AmbiguousReference { candidates, .. } => {
              format!("input {input} is ambiguous between {}", candidates.join(", "))
            }
            ModelError::UnboundReference { .. } => format!("input {input} does not exist"),
            other => format!("input {input} could not be resolved: {other}"),
          };
          unbound.push(format!("  {} ({role}): {problem}", action.descriptor()));
        }
      }
    }
    unbound
  }
}
