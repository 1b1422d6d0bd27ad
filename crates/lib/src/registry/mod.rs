//! The model registry: registration, rule binding and lazy realization.
//!
//! A [`ModelRegistry`] owns a [`ModelGraph`] rooted at the empty path. Nodes
//! are registered with a [`ModelRegistration`]; rules are attached with
//! [`ModelRegistry::configure`] and run only when something asks for their
//! subject at a state that requires them:
//! - [`realize`](ModelRegistry::realize) brings a node to `GraphClosed` and returns a read-only view
//! - [`at_state`](ModelRegistry::at_state) brings a node to an exact intermediate state
//! - [`bind_all_references`](ModelRegistry::bind_all_references) reports rules that can never run
//!
//! # Example
//!
//! ```
//! use cfgraph_lib::{ModelAction, ModelActionRole, ModelPath, ModelRegistration, ModelRegistry};
//!
//! let registry = ModelRegistry::new();
//! let path = ModelPath::path("greeting").unwrap();
//! registry
//!   .register(ModelRegistration::unmanaged(path.clone(), "greeting", || String::from("hello")))
//!   .unwrap();
//! registry
//!   .configure(
//!     ModelActionRole::Mutate,
//!     ModelAction::of::<String>("add name").path(path.clone()).action(|greeting| {
//!       greeting.push_str(", world");
//!       Ok(())
//!     }),
//!   )
//!   .unwrap();
//!
//! let greeting = registry.realize::<String>(&path).unwrap();
//! assert_eq!(*greeting.get().unwrap(), "hello, world");
//! ```

mod binding;
mod dag;
mod realize;
mod registration;
mod types;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

pub use dag::RuleDependencyGraph;
pub use registration::{ModelRegistration, RegistrationBuilder};
pub use types::RegistryConfig;

use crate::action::ModelAction;
use crate::consts::ROOT_DESCRIPTOR;
use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::graph::{ListenerOutcome, ModelGraph, ModelListener, NodePredicate};
use crate::init::NodeInitializerRegistry;
use crate::node::{ModelActionRole, ModelNode, NodeFlags, NodeState};
use crate::path::ModelPath;
use crate::projection::ModelView;
use crate::types::ModelType;
use types::RuleStore;

/// Shared state behind a [`ModelRegistry`] handle. Nodes keep a weak reference to it.
pub(crate) struct RegistryInner {
  config: RegistryConfig,
  graph: ModelGraph,
  root: ModelNode,
  rules: RefCell<RuleStore>,
  realizing: RefCell<Vec<ModelPath>>,
  initializers: NodeInitializerRegistry,
  self_ref: Weak<RegistryInner>,
}

impl RegistryInner {
  pub(crate) fn initializers(&self) -> &NodeInitializerRegistry {
    &self.initializers
  }
}

/// Handle to a model registry. Clones share the same graph.
#[derive(Clone)]
pub struct ModelRegistry {
  inner: Rc<RegistryInner>,
}

impl Default for ModelRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl ModelRegistry {
  pub fn new() -> Self {
    Self::with_config(RegistryConfig::default())
  }

  pub fn with_config(config: RegistryConfig) -> Self {
    let inner = Rc::new_cyclic(|self_ref: &Weak<RegistryInner>| {
      let root = ModelNode::new(
        ModelPath::root(),
        RuleDescriptor::new(ROOT_DESCRIPTOR),
        None,
        NodeFlags {
          ephemeral: false,
          hidden: true,
        },
        self_ref.clone(),
      );
      root.mark_discovered();
      root.advance_to(NodeState::Created);
      RegistryInner {
        config,
        graph: ModelGraph::with_root(root.clone()),
        root,
        rules: RefCell::new(RuleStore::default()),
        realizing: RefCell::new(Vec::new()),
        initializers: NodeInitializerRegistry::new(),
        self_ref: self_ref.clone(),
      }
    });
    debug!(config = ?inner.config, "created model registry");
    Self { inner }
  }

  pub fn config(&self) -> &RegistryConfig {
    &self.inner.config
  }

  pub fn root(&self) -> ModelNode {
    self.inner.root.clone()
  }

  /// Strategies used by [`create`](Self::create) and by collections to build nodes by type.
  pub fn initializers(&self) -> &NodeInitializerRegistry {
    &self.inner.initializers
  }

  // Registration

  /// Adds a node below its parent, which must already exist.
  ///
  /// # Errors
  ///
  /// [`ModelError::UnboundReference`] if the parent does not exist,
  /// [`ModelError::DuplicateNode`] if the path is taken,
  /// [`ModelError::NotMutable`] if the parent is finalized.
  pub fn register(&self, registration: ModelRegistration) -> Result<ModelNode> {
    let parent_path = registration.path().parent_or_root().ok_or_else(|| ModelError::InvalidPath {
      path: registration.path().to_string(),
      reason: "the root cannot be registered".to_string(),
    })?;
    let parent = self.inner.graph.find(&parent_path).ok_or_else(|| ModelError::UnboundReference {
      reference: format!("'{parent_path}' (parent of '{}')", registration.path()),
      descriptor: registration.descriptor().to_string(),
    })?;
    parent.add_link(registration)
  }

  /// Registers a node of type `T` using the registered initializer strategies.
  ///
  /// # Errors
  ///
  /// [`ModelError::UnknownType`] if no strategy supports `T`, plus the
  /// errors of [`register`](Self::register).
  pub fn create<T: ?Sized + 'static>(&self, path: ModelPath, descriptor: impl Into<RuleDescriptor>) -> Result<ModelNode> {
    let initializer = self.inner.initializers.initializer(&ModelType::of::<T>())?;
    let registration = ModelRegistration::builder(path, descriptor)
      .initializer(&*initializer)
      .build();
    self.register(registration)
  }

  /// Attaches a rule. Paths are absolute from the root.
  ///
  /// A subject without a path binds to every node, existing or future,
  /// that can be viewed as the subject type.
  ///
  /// # Errors
  ///
  /// [`ModelError::NotMutable`] if the subject is already past the role's state.
  pub fn configure(&self, role: ModelActionRole, action: ModelAction) -> Result<()> {
    self.inner.bind(role, action, &ModelPath::root())
  }

  /// Attaches a rule whose subject and input paths are relative to `scope`.
  pub fn configure_in(&self, scope: &ModelPath, role: ModelActionRole, action: ModelAction) -> Result<()> {
    self.inner.bind(role, action, scope)
  }

  /// Calls `callback` for every current and future node matching `predicate`.
  pub fn add_listener<F>(&self, predicate: NodePredicate, callback: F) -> Result<()>
  where
    F: FnMut(&ModelNode) -> Result<ListenerOutcome> + 'static,
  {
    self.inner.graph.add_listener(ModelListener::new(predicate, callback))
  }

  // Queries

  pub fn node(&self, path: &ModelPath) -> Option<ModelNode> {
    self.inner.graph.find(path)
  }

  /// Current state of the node at `path`, without realizing anything.
  pub fn state(&self, path: &ModelPath) -> Option<NodeState> {
    self.inner.graph.find(path).map(|node| node.state())
  }

  /// Non-ephemeral nodes in path order, excluding the root.
  pub fn nodes(&self) -> Vec<ModelNode> {
    self
      .inner
      .graph
      .nodes()
      .into_iter()
      .filter(|node| !node.is_root() && !node.is_ephemeral())
      .collect()
  }

  /// Brings the node at `path` to `GraphClosed` and returns it.
  ///
  /// # Errors
  ///
  /// [`ModelError::UnboundReference`] if there is no such node, or any
  /// error raised while running rules.
  pub fn realize_node(&self, path: &ModelPath) -> Result<ModelNode> {
    let node = self.require(path, "realize")?;
    self.inner.transition(&node, NodeState::GraphClosed)?;
    Ok(node)
  }

  /// Brings the node at `path` to `GraphClosed` and returns a read-only view as `T`.
  pub fn realize<T: ?Sized + 'static>(&self, path: &ModelPath) -> Result<ModelView<T>> {
    let node = self.realize_node(path)?;
    node.as_read_only::<T>(&RuleDescriptor::new(format!("realize({path})")))
  }

  /// Like [`realize`](Self::realize), but returns `None` if there is no node at `path`.
  pub fn find<T: ?Sized + 'static>(&self, path: &ModelPath) -> Result<Option<ModelView<T>>> {
    if !self.inner.graph.contains(path) {
      return Ok(None);
    }
    self.realize::<T>(path).map(Some)
  }

  /// Brings the node at `path` exactly to `state`.
  ///
  /// # Errors
  ///
  /// [`ModelError::AlreadyPast`] if the node is already beyond `state`.
  pub fn at_state(&self, path: &ModelPath, state: NodeState) -> Result<ModelNode> {
    let node = self.require(path, "at_state")?;
    if node.state() > state {
      return Err(ModelError::AlreadyPast {
        path: path.to_string(),
        state: node.state(),
        requested: state,
      });
    }
    self.inner.transition(&node, state)?;
    Ok(node)
  }

  /// Brings the node at `path` to `state`, accepting a node that is already beyond it.
  pub fn at_state_or_later(&self, path: &ModelPath, state: NodeState) -> Result<ModelNode> {
    let node = self.require(path, "at_state_or_later")?;
    self.inner.transition(&node, state)?;
    Ok(node)
  }

  /// Removes the node at `path` with its descendants and pending rules.
  pub fn remove(&self, path: &ModelPath) -> Option<ModelNode> {
    if path.is_root() {
      return None;
    }
    let removed = self.inner.graph.remove(path);
    let node = removed.first()?.clone();
    if let Some(parent) = node.parent() {
      parent.remove_link(node.name());
    }
    self.inner.rules.borrow_mut().remove_subtree(path);
    debug!(path = %path, removed = removed.len(), "removed model element");
    Some(node)
  }

  /// Verifies that every pending rule's subject and inputs resolve.
  ///
  /// # Errors
  ///
  /// [`ModelError::UnboundRules`] listing each offending rule.
  pub fn bind_all_references(&self) -> Result<()> {
    let unbound = self.inner.unbound_rules();
    if unbound.is_empty() {
      Ok(())
    } else {
      Err(ModelError::UnboundRules { rules: unbound })
    }
  }

  /// Dependencies between nodes implied by the inputs of pending rules.
  pub fn dependency_graph(&self) -> RuleDependencyGraph {
    RuleDependencyGraph::from_registry(&self.inner)
  }

  /// Checks pending rules for dependency cycles without running them.
  ///
  /// # Errors
  ///
  /// [`ModelError::CycleDetected`] naming the nodes on the cycle.
  pub fn check_cycles(&self) -> Result<()> {
    self.dependency_graph().verify_acyclic()
  }

  fn require(&self, path: &ModelPath, operation: &str) -> Result<ModelNode> {
    self.inner.graph.find(path).ok_or_else(|| ModelError::UnboundReference {
      reference: format!("'{path}'"),
      descriptor: format!("{operation}({path})"),
    })
  }
}

impl std::fmt::Debug for ModelRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModelRegistry")
      .field("config", &self.inner.config)
      .field("nodes", &self.inner.graph.len())
      .finish()
  }
}
