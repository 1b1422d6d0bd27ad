use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::descriptor::RuleDescriptor;
use crate::error::Result;
use crate::node::{ModelNode, NodeState};
use crate::path::ModelPath;
use crate::projection::ErasedView;
use crate::types::ModelType;

type ViewOpener = Rc<dyn Fn(&ModelNode, &RuleDescriptor, bool) -> Result<ErasedView>>;

/// Names the subject or an input of a rule.
///
/// A reference has a path, a type, or both. References without a path are
/// resolved by type: a subject binds to every matching node, an input must
/// match exactly one node. Two references are equal when path and type match.
#[derive(Clone)]
pub struct ModelReference {
  path: Option<ModelPath>,
  model_type: ModelType,
  scope: Option<ModelPath>,
  description: Option<String>,
  state: Option<NodeState>,
  opener: ViewOpener,
}

impl ModelReference {
  /// Reference to the node at `path`, viewed as `T`.
  pub fn of<T: ?Sized + 'static>(path: ModelPath) -> Self {
    Self::typed::<T>(Some(path))
  }

  /// Reference to whichever node can be viewed as `T`.
  pub fn of_type<T: ?Sized + 'static>() -> Self {
    Self::typed::<T>(None)
  }

  pub(crate) fn typed<T: ?Sized + 'static>(path: Option<ModelPath>) -> Self {
    Self {
      path,
      model_type: ModelType::of::<T>(),
      scope: None,
      description: None,
      state: None,
      opener: Rc::new(|node: &ModelNode, descriptor: &RuleDescriptor, writable: bool| {
        let view = node.open_view::<T>(descriptor, writable)?;
        Ok(ErasedView::typed(view))
      }),
    }
  }

  /// Reference to the node at `path` without a view type. Rules receive the node itself.
  pub fn untyped(path: ModelPath) -> Self {
    Self::untyped_at(Some(path))
  }

  pub(crate) fn untyped_at(path: Option<ModelPath>) -> Self {
    Self {
      path,
      model_type: ModelType::untyped(),
      scope: None,
      description: None,
      state: None,
      opener: Rc::new(|node: &ModelNode, _: &RuleDescriptor, _: bool| {
        Ok(ErasedView::untyped(node.clone()))
      }),
    }
  }

  pub fn described(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// Resolves the path, or the type search, relative to `scope`.
  pub fn in_scope(mut self, scope: ModelPath) -> Self {
    self.scope = Some(scope);
    self
  }

  /// Requires the referenced node to reach `state` before the rule runs.
  pub fn at_state(mut self, state: NodeState) -> Self {
    self.state = Some(state);
    self
  }

  pub fn with_path(mut self, path: ModelPath) -> Self {
    self.path = Some(path);
    self
  }

  /// Points the reference at the absolute `path`, dropping any scope.
  pub(crate) fn rebased(mut self, path: ModelPath) -> Self {
    self.path = Some(path);
    self.scope = None;
    self
  }

  pub fn path(&self) -> Option<&ModelPath> {
    self.path.as_ref()
  }

  pub fn model_type(&self) -> ModelType {
    self.model_type
  }

  pub fn scope(&self) -> Option<&ModelPath> {
    self.scope.as_ref()
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn state(&self) -> Option<NodeState> {
    self.state
  }

  pub fn is_untyped(&self) -> bool {
    self.model_type.is_untyped()
  }

  /// The path this reference points at once its scope is applied.
  pub fn resolved_path(&self) -> Option<ModelPath> {
    let path = self.path.as_ref()?;
    Some(match &self.scope {
      Some(scope) => scope.descendant(path),
      None => path.clone(),
    })
  }

  pub(crate) fn open(&self, node: &ModelNode, descriptor: &RuleDescriptor, writable: bool) -> Result<ErasedView> {
    (self.opener)(node, descriptor, writable)
  }
}

impl PartialEq for ModelReference {
  fn eq(&self, other: &Self) -> bool {
    self.path == other.path && self.model_type == other.model_type
  }
}

impl Eq for ModelReference {}

impl Hash for ModelReference {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.path.hash(state);
    self.model_type.hash(state);
  }
}

impl fmt::Debug for ModelReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ModelReference")
      .field("path", &self.path)
      .field("type", &self.model_type)
      .field("scope", &self.scope)
      .field("state", &self.state)
      .finish()
  }
}

impl fmt::Display for ModelReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.resolved_path(), self.is_untyped()) {
      (Some(path), true) => write!(f, "'{path}'")?,
      (Some(path), false) => write!(f, "'{path}' <{}>", self.model_type)?,
      (None, _) => write!(f, "<{}>", self.model_type)?,
    }
    if let Some(description) = &self.description {
      write!(f, " ({description})")?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn equality_ignores_description_and_state() {
    let path = ModelPath::path("a").unwrap();
    let left = ModelReference::of::<String>(path.clone()).described("first");
    let right = ModelReference::of::<String>(path.clone()).at_state(NodeState::Mutated);
    assert_eq!(left, right);
    assert_ne!(left, ModelReference::of::<i64>(path.clone()));
    assert_ne!(left, ModelReference::untyped(path));
  }

  #[test]
  fn display_includes_scope_and_type() {
    let reference = ModelReference::of::<String>(ModelPath::path("b").unwrap())
      .in_scope(ModelPath::path("a").unwrap())
      .described("name");
    assert_eq!(reference.to_string(), "'a.b' <String> (name)");
    assert_eq!(ModelReference::of_type::<i64>().to_string(), "<i64>");
  }
}
