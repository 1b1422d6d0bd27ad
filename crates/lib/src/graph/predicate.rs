use crate::error::Result;
use crate::node::{ModelNode, NodeState};
use crate::path::ModelPath;
use crate::types::ModelType;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
  Any,
  Path(ModelPath),
  ChildrenOf(ModelPath),
  DescendantsOf(ModelPath),
}

/// Selects nodes by location and, optionally, by view type.
///
/// Type checks need the node's projections, so matching a typed predicate
/// runs the node's Discover rules first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePredicate {
  location: Location,
  view: Option<(ModelType, bool)>,
}

impl NodePredicate {
  /// Matches every node except the root.
  pub fn all() -> Self {
    Self {
      location: Location::Any,
      view: None,
    }
  }

  pub fn path(path: ModelPath) -> Self {
    Self {
      location: Location::Path(path),
      view: None,
    }
  }

  pub fn children_of(parent: ModelPath) -> Self {
    Self {
      location: Location::ChildrenOf(parent),
      view: None,
    }
  }

  pub fn descendants_of(ancestor: ModelPath) -> Self {
    Self {
      location: Location::DescendantsOf(ancestor),
      view: None,
    }
  }

  /// Restricts matches to nodes viewable as `ty`, writable if `writable` is set.
  ///
  /// The untyped [`ModelType`] places no restriction.
  pub fn with_type(mut self, ty: ModelType, writable: bool) -> Self {
    self.view = if ty.is_untyped() { None } else { Some((ty, writable)) };
    self
  }

  pub fn matches_location(&self, path: &ModelPath) -> bool {
    match &self.location {
      Location::Any => !path.is_root(),
      Location::Path(expected) => path == expected,
      Location::ChildrenOf(parent) => path.is_direct_child_of(parent),
      Location::DescendantsOf(ancestor) => path.is_descendant_of(ancestor),
    }
  }

  /// Checks `node` against this predicate, discovering it if a type check is needed.
  ///
  /// # Errors
  ///
  /// Any error raised by the node's Discover rules.
  pub fn matches(&self, node: &ModelNode) -> Result<bool> {
    if !self.matches_location(node.path()) {
      return Ok(false);
    }
    let Some((ty, writable)) = &self.view else {
      return Ok(true);
    };
    node.ensure_usable(NodeState::Known)?;
    Ok(if *writable {
      node.can_be_viewed_as_writable(ty)
    } else {
      node.can_be_viewed_as_read_only(ty)
    })
  }
}
