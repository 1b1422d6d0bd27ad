//! The path-indexed node map and its listeners.
//!
//! [`ModelGraph`] owns every node of a registry by path and tells
//! listeners about nodes as they are added. Listeners are how rules
//! with type-only subjects find their subjects, including nodes that
//! do not exist yet when the rule is registered.
//!
//! Adding a node or a listener while a notification pass is already
//! running does not notify recursively: the operation is queued and the
//! outermost pass drains the queue in FIFO order. Nodes are visible to
//! [`ModelGraph::find`] as soon as they are added.

mod predicate;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet, VecDeque};

use tracing::trace;

pub use predicate::NodePredicate;

use crate::error::{ModelError, Result};
use crate::node::ModelNode;
use crate::path::ModelPath;

/// What a listener wants after handling a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerOutcome {
  /// Keep receiving nodes.
  Continue,
  /// Remove the listener.
  Stop,
}

type ListenerFn = Box<dyn FnMut(&ModelNode) -> Result<ListenerOutcome>>;

/// A callback invoked for every node matching a predicate.
pub struct ModelListener {
  predicate: NodePredicate,
  callback: ListenerFn,
}

impl ModelListener {
  pub fn new<F>(predicate: NodePredicate, callback: F) -> Self
  where
    F: FnMut(&ModelNode) -> Result<ListenerOutcome> + 'static,
  {
    Self {
      predicate,
      callback: Box::new(callback),
    }
  }

  pub fn predicate(&self) -> &NodePredicate {
    &self.predicate
  }

  fn fire(&mut self, node: &ModelNode) -> Result<ListenerOutcome> {
    if self.predicate.matches(node)? {
      (self.callback)(node)
    } else {
      Ok(ListenerOutcome::Continue)
    }
  }
}

enum PendingOp {
  Announce(ModelNode),
  Listen(ModelListener),
}

/// Path-indexed storage of model nodes.
#[derive(Default)]
pub struct ModelGraph {
  nodes: RefCell<BTreeMap<ModelPath, ModelNode>>,
  listeners: RefCell<Vec<ModelListener>>,
  pending: RefCell<VecDeque<PendingOp>>,
  unannounced: RefCell<HashSet<ModelPath>>,
  notifying: Cell<bool>,
}

impl ModelGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// A graph holding only `root`. The root is never announced to listeners.
  pub fn with_root(root: ModelNode) -> Self {
    let graph = Self::default();
    graph.nodes.borrow_mut().insert(root.path().clone(), root);
    graph
  }

  /// Adds `node` and notifies matching listeners.
  ///
  /// # Errors
  ///
  /// [`ModelError::DuplicateNode`] if the path is taken, or the first error
  /// raised by a listener.
  pub fn add(&self, node: ModelNode) -> Result<()> {
    {
      let mut nodes = self.nodes.borrow_mut();
      if let Some(existing) = nodes.get(node.path()) {
        return Err(ModelError::DuplicateNode {
          path: node.path().to_string(),
          descriptor: node.descriptor().to_string(),
          existing: existing.descriptor().to_string(),
        });
      }
      nodes.insert(node.path().clone(), node.clone());
    }
    self.unannounced.borrow_mut().insert(node.path().clone());
    self.pending.borrow_mut().push_back(PendingOp::Announce(node));
    self.flush()
  }

  /// Registers `listener`, replaying it against every node already present.
  ///
  /// # Errors
  ///
  /// The first error raised by the listener.
  pub fn add_listener(&self, listener: ModelListener) -> Result<()> {
    self.pending.borrow_mut().push_back(PendingOp::Listen(listener));
    self.flush()
  }

  pub fn find(&self, path: &ModelPath) -> Option<ModelNode> {
    self.nodes.borrow().get(path).cloned()
  }

  pub fn contains(&self, path: &ModelPath) -> bool {
    self.nodes.borrow().contains_key(path)
  }

  /// All nodes in path order.
  pub fn nodes(&self) -> Vec<ModelNode> {
    self.nodes.borrow().values().cloned().collect()
  }

  /// Nodes whose location matches `predicate`. Types are not checked.
  pub fn nodes_at(&self, predicate: &NodePredicate) -> Vec<ModelNode> {
    self
      .nodes
      .borrow()
      .values()
      .filter(|node| predicate.matches_location(node.path()))
      .cloned()
      .collect()
  }

  pub fn len(&self) -> usize {
    self.nodes.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.borrow().is_empty()
  }

  /// Removes the node at `path` and all of its descendants.
  ///
  /// Returns the removed nodes, parent first, or an empty list if nothing was there.
  pub fn remove(&self, path: &ModelPath) -> Vec<ModelNode> {
    let mut nodes = self.nodes.borrow_mut();
    let doomed: Vec<ModelPath> = nodes
      .keys()
      .filter(|candidate| *candidate == path || candidate.is_descendant_of(path))
      .cloned()
      .collect();
    let mut unannounced = self.unannounced.borrow_mut();
    doomed
      .iter()
      .filter_map(|doomed| {
        unannounced.remove(doomed);
        nodes.remove(doomed)
      })
      .collect()
  }

  fn flush(&self) -> Result<()> {
    if self.notifying.get() {
      trace!(queued = self.pending.borrow().len(), "deferring notification until current pass completes");
      return Ok(());
    }
    self.notifying.set(true);
    let result = self.drain();
    self.notifying.set(false);
    result
  }

  fn drain(&self) -> Result<()> {
    loop {
      let op = self.pending.borrow_mut().pop_front();
      match op {
        None => return Ok(()),
        Some(PendingOp::Announce(node)) => self.announce(&node)?,
        Some(PendingOp::Listen(listener)) => self.replay(listener)?,
      }
    }
  }

  fn announce(&self, node: &ModelNode) -> Result<()> {
    if !self.unannounced.borrow_mut().remove(node.path()) {
      // Removed before its notification came up.
      return Ok(());
    }
    trace!(path = %node.path(), "notifying listeners of model element");
    let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
    let mut kept = Vec::with_capacity(listeners.len());
    let mut remaining = listeners.into_iter();
    let mut result = Ok(());
    for mut listener in remaining.by_ref() {
      match listener.fire(node) {
        Ok(ListenerOutcome::Continue) => kept.push(listener),
        Ok(ListenerOutcome::Stop) => trace!(path = %node.path(), "listener stopped"),
        Err(err) => {
          kept.push(listener);
          result = Err(err);
          break;
        }
      }
    }
    kept.extend(remaining);
    self.restore(kept);
    result
  }

  fn replay(&self, mut listener: ModelListener) -> Result<()> {
    let existing: Vec<ModelNode> = {
      let unannounced = self.unannounced.borrow();
      self
        .nodes_at(listener.predicate())
        .into_iter()
        .filter(|node| !unannounced.contains(node.path()))
        .collect()
    };
    trace!(candidates = existing.len(), "replaying listener against existing model elements");
    for node in existing {
      match listener.fire(&node) {
        Ok(ListenerOutcome::Continue) => {}
        Ok(ListenerOutcome::Stop) => return Ok(()),
        Err(err) => {
          self.listeners.borrow_mut().push(listener);
          return Err(err);
        }
      }
    }
    self.listeners.borrow_mut().push(listener);
    Ok(())
  }

  /// Puts listeners taken out for an announcement back, ahead of any stored meanwhile.
  fn restore(&self, mut kept: Vec<ModelListener>) {
    let mut listeners = self.listeners.borrow_mut();
    kept.append(&mut listeners);
    *listeners = kept;
  }
}
