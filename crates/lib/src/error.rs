//! Errors raised by the model registry and its collaborators.
//!
//! Every fallible operation in the crate returns [`ModelError`]. Errors
//! raised by user rule bodies are carried through unchanged via
//! [`ModelError::Rule`].

use thiserror::Error;

use crate::node::{ModelActionRole, NodeState};

/// Boxed error type accepted from rule bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building or realizing a model graph.
#[derive(Debug, Error)]
pub enum ModelError {
  /// A model element name does not follow the naming rules.
  #[error("invalid model element name '{name}': {reason}")]
  InvalidName { name: String, reason: String },

  /// A model path string could not be parsed.
  #[error("invalid model path '{path}': {reason}")]
  InvalidPath { path: String, reason: String },

  /// An element was registered at a path that is already taken.
  #[error("cannot register model element '{path}' with rule {descriptor} as it is already registered by rule {existing}")]
  DuplicateNode {
    path: String,
    descriptor: String,
    existing: String,
  },

  /// A type was registered twice with an instance factory.
  #[error(
    "cannot register implementation for type '{type_name}' with rule {descriptor} because an implementation for this type was already registered by rule {existing}"
  )]
  DuplicateRegistration {
    type_name: String,
    descriptor: String,
    existing: String,
  },

  /// No factory or initializer knows how to create the requested type.
  #[error("cannot create a '{type_name}' because this type is not known to {registry}. Known types are: {}", known_types(.supported))]
  UnknownType {
    type_name: String,
    registry: String,
    supported: Vec<String>,
  },

  /// A view was requested for an element that has not been created yet.
  #[error("model element '{path}' is at state {state} but must be at least {required} to be viewed")]
  NotRealized {
    path: String,
    state: NodeState,
    required: NodeState,
  },

  /// An operation was attempted on an element whose lifecycle has moved past the point where it is allowed.
  #[error("cannot {operation} for model element '{path}' as it is at state {state}")]
  NotMutable {
    path: String,
    state: NodeState,
    operation: String,
  },

  /// A state transition was requested for a state the element has already left.
  #[error("cannot transition model element '{path}' to state {requested} as it is already at state {state}")]
  AlreadyPast {
    path: String,
    state: NodeState,
    requested: NodeState,
  },

  /// No projection of the element supports the requested view type.
  #[error("model element '{path}' cannot be viewed as {mode} '{requested}'; it can be viewed as: {}", known_types(.available))]
  TypeMismatch {
    path: String,
    requested: String,
    mode: &'static str,
    available: Vec<String>,
  },

  /// A node has no private data, or data of another type.
  #[error("model element '{path}' does not hold private data of type '{requested}'")]
  MissingPrivateData { path: String, requested: String },

  /// A reference could not be resolved to any element.
  #[error("model reference {reference} for rule {descriptor} is unbound")]
  UnboundReference { reference: String, descriptor: String },

  /// A type-only reference matched more than one element.
  #[error("model reference {reference} for rule {descriptor} is ambiguous; candidates: {}", .candidates.join(", "))]
  AmbiguousReference {
    reference: String,
    descriptor: String,
    candidates: Vec<String>,
  },

  /// Rules still reference elements that do not exist.
  #[error("the following model rules could not be bound:\n{}", .rules.join("\n"))]
  UnboundRules { rules: Vec<String> },

  /// A view was mutated after the rule it was given to completed.
  #[error("attempt to modify a closed view of model element '{path}' of type '{type_name}' given to rule {descriptor}")]
  ViewClosed {
    path: String,
    type_name: String,
    descriptor: String,
  },

  /// A read-only view was mutated.
  #[error("attempt to modify a read only view of model element '{path}' of type '{type_name}' given to rule {descriptor}")]
  ReadOnly {
    path: String,
    type_name: String,
    descriptor: String,
  },

  /// The backing value of a view is already borrowed.
  #[error("model element '{path}' is already in use by another view")]
  ViewInUse { path: String },

  /// A managed struct was asked for a property it does not declare.
  #[error("model element '{path}' has no property '{property}'")]
  UnknownProperty { path: String, property: String },

  /// A rule input at the given index is missing or of another type.
  #[error("rule input {index} is not available as '{requested}'")]
  InvalidInput { index: usize, requested: String },

  /// Realization re-entered an element that is still being realized.
  #[error("cycle detected while realizing model elements: {chain}")]
  CycleDetected { chain: String },

  /// A rule that views its subject was bound to a role that runs before the subject exists.
  #[error("rule {descriptor} cannot be applied as a {role} rule because its subject cannot be viewed before it is created")]
  SubjectUnavailable { role: ModelActionRole, descriptor: String },

  /// An earlier rule failure keeps the element from advancing.
  #[error(
    "model element '{path}' cannot advance past state {state} because rule {descriptor} failed during {role}: {message}"
  )]
  RuleFailed {
    path: String,
    state: NodeState,
    role: ModelActionRole,
    descriptor: String,
    message: String,
  },

  /// A node outlived the registry it belonged to.
  #[error("model element '{path}' is no longer attached to a registry")]
  Detached { path: String },

  /// An error raised by a rule body.
  #[error(transparent)]
  Rule(BoxError),
}

impl ModelError {
  /// Wraps an arbitrary error or message raised by a rule body.
  ///
  /// # Example
  ///
  /// ```
  /// use cfgraph_lib::ModelError;
  ///
  /// let err = ModelError::custom("port must be positive");
  /// assert_eq!(err.to_string(), "port must be positive");
  /// ```
  pub fn custom(err: impl Into<BoxError>) -> Self {
    ModelError::Rule(err.into())
  }
}

fn known_types(names: &[String]) -> String {
  if names.is_empty() {
    "(None)".to_string()
  } else {
    names.join(", ")
  }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ModelError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_type_lists_known_types() {
    let err = ModelError::UnknownType {
      type_name: "Bar".to_string(),
      registry: "test factory".to_string(),
      supported: vec!["Baz".to_string(), "Foo".to_string()],
    };
    assert_eq!(
      err.to_string(),
      "cannot create a 'Bar' because this type is not known to test factory. Known types are: Baz, Foo"
    );
  }

  #[test]
  fn unknown_type_without_known_types() {
    let err = ModelError::UnknownType {
      type_name: "Bar".to_string(),
      registry: "test factory".to_string(),
      supported: vec![],
    };
    assert!(err.to_string().ends_with("Known types are: (None)"));
  }

  #[test]
  fn custom_error_is_transparent() {
    let err = ModelError::custom(std::io::Error::other("disk full"));
    assert_eq!(err.to_string(), "disk full");
  }
}
