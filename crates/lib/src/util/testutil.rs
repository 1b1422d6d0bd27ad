//! Test helpers for cfgraph-lib.

use std::rc::{Rc, Weak};

use crate::node::{ModelNode, NodeFlags};
use crate::path::ModelPath;
use crate::projection::UnmanagedProjection;
use crate::registry::ModelRegistration;

/// Parses a relative path, panicking on invalid input.
pub fn p(path: &str) -> ModelPath {
  ModelPath::path(path).unwrap_or_else(|e| panic!("invalid test path {path}: {e}"))
}

/// A node that belongs to no registry. Operations needing the registry fail with `Detached`.
pub fn detached_node(path: &str, descriptor: &str) -> ModelNode {
  ModelNode::new(p(path), descriptor.into(), None, NodeFlags::default(), Weak::new())
}

/// Registration of a top-level `String` node holding `value`.
pub fn string_node(name: &str, value: &str) -> ModelRegistration {
  let value = value.to_string();
  ModelRegistration::builder(p(name), format!("test {name}"))
    .projection(Rc::new(
      UnmanagedProjection::<String>::new().describing(|value| format!("{value:?}")),
    ))
    .create(move |node| node.set_private_data(value.clone()))
    .build()
}
