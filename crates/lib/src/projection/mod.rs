//! Projections describe which views a node can be seen through.
//!
//! A node carries an ordered list of projections. When a rule asks for a
//! view of type `T`, the first projection that can produce a `T` in the
//! requested mode wins:
//! - [`UnmanagedProjection`] exposes private data of exactly one type
//! - [`AdapterProjection`] exposes private data through another type, e.g. a trait object
//! - [`ChainingProjection`] combines several projections
//!
//! Collection and managed-struct views bring their own projections in
//! [`crate::collection`] and [`crate::managed`].

mod view;

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

pub use view::{ErasedView, ModelView, ViewAccessor, ViewContext};

use crate::node::ModelNode;
use crate::types::ModelType;

/// A way of viewing a node as one or more types.
pub trait ModelProjection {
  fn can_be_viewed_as_read_only(&self, ty: &ModelType) -> bool;

  fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool;

  /// Returns a boxed [`ViewAccessor<T>`] for the requested type, where `T`
  /// is the type `ty` identifies.
  fn accessor(&self, ty: &ModelType, writable: bool) -> Option<Box<dyn Any>>;

  /// Types this projection can be viewed as, for diagnostics.
  fn type_descriptions(&self, writable: bool) -> Vec<String>;

  /// Short rendering of the node's value for reports.
  fn value_description(&self, _node: &ModelNode) -> Option<String> {
    None
  }
}

/// Exposes a node's private data of type `T` as-is.
pub struct UnmanagedProjection<T: 'static> {
  readable: bool,
  writable: bool,
  describe: Option<fn(&T) -> String>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> UnmanagedProjection<T> {
  pub fn new() -> Self {
    Self::with_modes(true, true)
  }

  pub fn read_only() -> Self {
    Self::with_modes(true, false)
  }

  pub fn with_modes(readable: bool, writable: bool) -> Self {
    Self {
      readable,
      writable,
      describe: None,
      _marker: PhantomData,
    }
  }

  /// Sets how the value is rendered in reports.
  pub fn describing(mut self, describe: fn(&T) -> String) -> Self {
    self.describe = Some(describe);
    self
  }

  fn matches(ty: &ModelType) -> bool {
    *ty == ModelType::of::<T>()
  }
}

impl<T: 'static> Default for UnmanagedProjection<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: 'static> ModelProjection for UnmanagedProjection<T> {
  fn can_be_viewed_as_read_only(&self, ty: &ModelType) -> bool {
    self.readable && Self::matches(ty)
  }

  fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
    self.writable && Self::matches(ty)
  }

  fn accessor(&self, ty: &ModelType, writable: bool) -> Option<Box<dyn Any>> {
    let allowed = if writable { self.writable } else { self.readable };
    if !allowed || !Self::matches(ty) {
      return None;
    }
    Some(Box::new(ViewAccessor::<T>::private_data()))
  }

  fn type_descriptions(&self, writable: bool) -> Vec<String> {
    let allowed = if writable { self.writable } else { self.readable };
    if allowed {
      vec![ModelType::of::<T>().to_string()]
    } else {
      Vec::new()
    }
  }

  fn value_description(&self, node: &ModelNode) -> Option<String> {
    let describe = self.describe?;
    let data = node.private_data::<T>().ok()?;
    Some(describe(&data))
  }
}

/// Exposes private data of type `T` as view type `V`.
///
/// `V` may be unsized, which is how a node is viewed through a trait it implements:
///
/// ```
/// use cfgraph_lib::projection::AdapterProjection;
///
/// trait Named {
///   fn name(&self) -> &str;
/// }
///
/// struct Task(String);
///
/// impl Named for Task {
///   fn name(&self) -> &str {
///     &self.0
///   }
/// }
///
/// let projection = AdapterProjection::<Task, dyn Named>::new(|t| t, |t| t);
/// # let _ = projection;
/// ```
pub struct AdapterProjection<T: 'static, V: ?Sized + 'static> {
  read: fn(&T) -> &V,
  write: Option<fn(&mut T) -> &mut V>,
}

impl<T: 'static, V: ?Sized + 'static> AdapterProjection<T, V> {
  pub fn new(read: fn(&T) -> &V, write: fn(&mut T) -> &mut V) -> Self {
    Self {
      read,
      write: Some(write),
    }
  }

  pub fn read_only(read: fn(&T) -> &V) -> Self {
    Self { read, write: None }
  }

  fn matches(ty: &ModelType) -> bool {
    *ty == ModelType::of::<V>()
  }
}

impl<T: 'static, V: ?Sized + 'static> ModelProjection for AdapterProjection<T, V> {
  fn can_be_viewed_as_read_only(&self, ty: &ModelType) -> bool {
    Self::matches(ty)
  }

  fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
    self.write.is_some() && Self::matches(ty)
  }

  fn accessor(&self, ty: &ModelType, writable: bool) -> Option<Box<dyn Any>> {
    if !Self::matches(ty) || (writable && self.write.is_none()) {
      return None;
    }
    let read = self.read;
    let write = self.write;
    Some(Box::new(ViewAccessor::<V>::data(
      move |value| value.downcast_ref::<T>().map(read),
      move |value| match write {
        Some(write) => value.downcast_mut::<T>().map(write),
        None => None,
      },
    )))
  }

  fn type_descriptions(&self, writable: bool) -> Vec<String> {
    if writable && self.write.is_none() {
      return Vec::new();
    }
    vec![ModelType::of::<V>().to_string()]
  }
}

/// Tries a list of projections in order.
#[derive(Clone, Default)]
pub struct ChainingProjection {
  projections: Vec<Rc<dyn ModelProjection>>,
}

impl ChainingProjection {
  pub fn new(projections: Vec<Rc<dyn ModelProjection>>) -> Self {
    Self { projections }
  }

  pub fn push(&mut self, projection: Rc<dyn ModelProjection>) {
    self.projections.push(projection);
  }

  pub fn projections(&self) -> &[Rc<dyn ModelProjection>] {
    &self.projections
  }

  pub fn is_empty(&self) -> bool {
    self.projections.is_empty()
  }
}

impl ModelProjection for ChainingProjection {
  fn can_be_viewed_as_read_only(&self, ty: &ModelType) -> bool {
    self.projections.iter().any(|p| p.can_be_viewed_as_read_only(ty))
  }

  fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
    self.projections.iter().any(|p| p.can_be_viewed_as_writable(ty))
  }

  fn accessor(&self, ty: &ModelType, writable: bool) -> Option<Box<dyn Any>> {
    self.projections.iter().find_map(|p| {
      let compatible = if writable {
        p.can_be_viewed_as_writable(ty)
      } else {
        p.can_be_viewed_as_read_only(ty)
      };
      if compatible { p.accessor(ty, writable) } else { None }
    })
  }

  fn type_descriptions(&self, writable: bool) -> Vec<String> {
    let mut types: Vec<String> = self.projections.iter().flat_map(|p| p.type_descriptions(writable)).collect();
    types.dedup();
    types
  }

  fn value_description(&self, node: &ModelNode) -> Option<String> {
    self.projections.iter().find_map(|p| p.value_description(node))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  trait Shape {
    fn sides(&self) -> u32;
  }

  struct Square;

  impl Shape for Square {
    fn sides(&self) -> u32 {
      4
    }
  }

  #[test]
  fn unmanaged_projection_matches_exact_type() {
    let projection = UnmanagedProjection::<String>::read_only();
    assert!(projection.can_be_viewed_as_read_only(&ModelType::of::<String>()));
    assert!(!projection.can_be_viewed_as_writable(&ModelType::of::<String>()));
    assert!(!projection.can_be_viewed_as_read_only(&ModelType::of::<i64>()));
    assert!(projection.accessor(&ModelType::of::<String>(), true).is_none());
    assert!(projection.accessor(&ModelType::of::<String>(), false).is_some());
  }

  #[test]
  fn adapter_projection_views_through_trait() {
    let projection = AdapterProjection::<Square, dyn Shape>::read_only(|s| s);
    let ty = ModelType::of::<dyn Shape>();
    assert!(projection.can_be_viewed_as_read_only(&ty));
    assert!(!projection.can_be_viewed_as_writable(&ty));
    let accessor = projection.accessor(&ty, false).unwrap();
    assert!(accessor.downcast::<ViewAccessor<dyn Shape>>().is_ok());
    assert_eq!(Square.sides(), 4);
  }

  #[test]
  fn chaining_projection_is_compatible_if_any_child_is() {
    let chain = ChainingProjection::new(vec![
      Rc::new(UnmanagedProjection::<String>::read_only()),
      Rc::new(UnmanagedProjection::<i64>::new()),
    ]);
    assert!(chain.can_be_viewed_as_read_only(&ModelType::of::<String>()));
    assert!(chain.can_be_viewed_as_writable(&ModelType::of::<i64>()));
    assert!(!chain.can_be_viewed_as_writable(&ModelType::of::<String>()));
    assert_eq!(chain.type_descriptions(false), ["String", "i64"]);
    assert_eq!(chain.type_descriptions(true), ["i64"]);
  }
}
