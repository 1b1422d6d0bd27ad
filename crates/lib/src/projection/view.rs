//! Typed access to model nodes.
//!
//! A [`ModelView`] is what rule bodies see of a node. Views are bound to
//! the rule that received them: once that rule returns, the view's
//! [`ViewContext`] is closed and further mutation fails with
//! [`ModelError::ViewClosed`]. Reading through a closed view is still
//! allowed.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::node::ModelNode;
use crate::path::ModelPath;
use crate::types::ModelType;

type ReadFn<T> = Rc<dyn for<'a> Fn(&'a (dyn Any + 'static)) -> Option<&'a T>>;
type WriteFn<T> = Rc<dyn for<'a> Fn(&'a mut (dyn Any + 'static)) -> Option<&'a mut T>>;
type SynthesizeFn<T> = Rc<dyn Fn(&ModelNode, &ViewContext) -> Result<Rc<RefCell<T>>>>;

/// Shared state of a view and all of its clones.
#[derive(Clone)]
pub struct ViewContext {
  inner: Rc<ContextInner>,
}

struct ContextInner {
  path: ModelPath,
  model_type: ModelType,
  descriptor: RuleDescriptor,
  writable: bool,
  closed: Cell<bool>,
  nested: RefCell<Vec<ViewContext>>,
}

impl ViewContext {
  pub(crate) fn new(path: ModelPath, model_type: ModelType, descriptor: RuleDescriptor, writable: bool) -> Self {
    Self {
      inner: Rc::new(ContextInner {
        path,
        model_type,
        descriptor,
        writable,
        closed: Cell::new(false),
        nested: RefCell::new(Vec::new()),
      }),
    }
  }

  /// Creates a context for a view handed out through this one.
  ///
  /// The nested context closes together with its parent and is never more
  /// writable than the parent.
  pub(crate) fn nested(&self, path: ModelPath, model_type: ModelType, writable: bool) -> Self {
    let nested = Self::new(
      path,
      model_type,
      self.inner.descriptor.clone(),
      writable && self.inner.writable,
    );
    if self.is_closed() {
      nested.close();
    }
    self.inner.nested.borrow_mut().push(nested.clone());
    nested
  }

  pub fn path(&self) -> &ModelPath {
    &self.inner.path
  }

  pub fn model_type(&self) -> ModelType {
    self.inner.model_type
  }

  pub fn descriptor(&self) -> &RuleDescriptor {
    &self.inner.descriptor
  }

  pub fn is_writable(&self) -> bool {
    self.inner.writable
  }

  pub fn is_closed(&self) -> bool {
    self.inner.closed.get()
  }

  pub fn close(&self) {
    self.inner.closed.set(true);
    let nested = std::mem::take(&mut *self.inner.nested.borrow_mut());
    for context in nested {
      context.close();
    }
  }

  /// Fails unless mutation through this view is currently permitted.
  ///
  /// # Errors
  ///
  /// [`ModelError::ReadOnly`] for read-only views, [`ModelError::ViewClosed`]
  /// once the owning rule has completed.
  pub fn assert_can_mutate(&self) -> Result<()> {
    if !self.inner.writable {
      return Err(ModelError::ReadOnly {
        path: self.inner.path.to_string(),
        type_name: self.inner.model_type.to_string(),
        descriptor: self.inner.descriptor.to_string(),
      });
    }
    if self.is_closed() {
      return Err(ModelError::ViewClosed {
        path: self.inner.path.to_string(),
        type_name: self.inner.model_type.to_string(),
        descriptor: self.inner.descriptor.to_string(),
      });
    }
    Ok(())
  }
}

/// How a projection exposes a node as `T`.
pub struct ViewAccessor<T: ?Sized + 'static> {
  kind: AccessorKind<T>,
}

enum AccessorKind<T: ?Sized + 'static> {
  /// Borrows from the node's private data.
  Data { read: ReadFn<T>, write: WriteFn<T> },
  /// Builds a fresh value per view, e.g. an adapter over the node's children.
  Synthesized(SynthesizeFn<T>),
}

impl<T: ?Sized + 'static> ViewAccessor<T> {
  /// Accessor that projects the node's private data to `T`.
  pub fn data<R, W>(read: R, write: W) -> Self
  where
    R: for<'a> Fn(&'a (dyn Any + 'static)) -> Option<&'a T> + 'static,
    W: for<'a> Fn(&'a mut (dyn Any + 'static)) -> Option<&'a mut T> + 'static,
  {
    Self {
      kind: AccessorKind::Data {
        read: Rc::new(read),
        write: Rc::new(write),
      },
    }
  }
}

impl<T: 'static> ViewAccessor<T> {
  /// Accessor over private data that is exactly `T`.
  pub fn private_data() -> Self {
    Self::data(
      |value| value.downcast_ref::<T>(),
      |value| value.downcast_mut::<T>(),
    )
  }

  /// Accessor that builds a `T` for every view opened.
  pub fn synthesized<F>(build: F) -> Self
  where
    F: Fn(&ModelNode, &ViewContext) -> Result<T> + 'static,
  {
    Self {
      kind: AccessorKind::Synthesized(Rc::new(move |node: &ModelNode, context: &ViewContext| {
        Ok(Rc::new(RefCell::new(build(node, context)?)))
      })),
    }
  }
}

/// A typed, rule-scoped view of a model node.
pub struct ModelView<T: ?Sized + 'static> {
  node: ModelNode,
  context: ViewContext,
  target: ViewTarget<T>,
}

enum ViewTarget<T: ?Sized + 'static> {
  Data { read: ReadFn<T>, write: WriteFn<T> },
  Owned(Rc<RefCell<T>>),
}

impl<T: ?Sized + 'static> Clone for ViewTarget<T> {
  fn clone(&self) -> Self {
    match self {
      ViewTarget::Data { read, write } => ViewTarget::Data {
        read: Rc::clone(read),
        write: Rc::clone(write),
      },
      ViewTarget::Owned(value) => ViewTarget::Owned(Rc::clone(value)),
    }
  }
}

impl<T: ?Sized + 'static> Clone for ModelView<T> {
  fn clone(&self) -> Self {
    Self {
      node: self.node.clone(),
      context: self.context.clone(),
      target: self.target.clone(),
    }
  }
}

impl<T: ?Sized + 'static> ModelView<T> {
  pub(crate) fn open(node: ModelNode, context: ViewContext, accessor: ViewAccessor<T>) -> Result<Self> {
    let target = match accessor.kind {
      AccessorKind::Data { read, write } => ViewTarget::Data { read, write },
      AccessorKind::Synthesized(build) => ViewTarget::Owned(build(&node, &context)?),
    };
    Ok(Self { node, context, target })
  }

  pub fn path(&self) -> &ModelPath {
    self.node.path()
  }

  pub fn node(&self) -> &ModelNode {
    &self.node
  }

  pub fn context(&self) -> &ViewContext {
    &self.context
  }

  pub fn is_writable(&self) -> bool {
    self.context.is_writable()
  }

  pub fn is_closed(&self) -> bool {
    self.context.is_closed()
  }

  pub fn close(&self) {
    self.context.close();
  }

  /// Borrows the viewed value. Always allowed, even after the view closed.
  ///
  /// # Errors
  ///
  /// [`ModelError::ViewInUse`] if the value is mutably borrowed elsewhere,
  /// [`ModelError::MissingPrivateData`] if the node holds no matching data.
  pub fn get(&self) -> Result<Ref<'_, T>> {
    match &self.target {
      ViewTarget::Data { read, .. } => {
        let slot = self.node.data_slot().try_borrow().map_err(|_| self.in_use())?;
        Ref::filter_map(slot, |slot| slot.as_deref().and_then(|value| read(value))).map_err(|_| self.missing_data())
      }
      ViewTarget::Owned(value) => value.try_borrow().map_err(|_| self.in_use()),
    }
  }

  /// Mutably borrows the viewed value.
  ///
  /// # Errors
  ///
  /// [`ModelError::ReadOnly`] or [`ModelError::ViewClosed`] when mutation is
  /// not permitted, plus the errors of [`get`](Self::get).
  pub fn get_mut(&self) -> Result<RefMut<'_, T>> {
    self.context.assert_can_mutate()?;
    match &self.target {
      ViewTarget::Data { write, .. } => {
        let slot = self.node.data_slot().try_borrow_mut().map_err(|_| self.in_use())?;
        RefMut::filter_map(slot, |slot| slot.as_deref_mut().and_then(|value| write(value)))
          .map_err(|_| self.missing_data())
      }
      ViewTarget::Owned(value) => value.try_borrow_mut().map_err(|_| self.in_use()),
    }
  }

  pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
    Ok(f(&*self.get()?))
  }

  pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
    Ok(f(&mut *self.get_mut()?))
  }

  fn in_use(&self) -> ModelError {
    ModelError::ViewInUse {
      path: self.node.path().to_string(),
    }
  }

  fn missing_data(&self) -> ModelError {
    ModelError::MissingPrivateData {
      path: self.node.path().to_string(),
      requested: self.context.model_type().to_string(),
    }
  }
}

impl<T: ?Sized + 'static> std::fmt::Debug for ModelView<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModelView")
      .field("path", self.node.path())
      .field("type", &self.context.model_type())
      .field("writable", &self.context.is_writable())
      .field("closed", &self.context.is_closed())
      .finish()
  }
}

/// A view whose type is only known to the reference that opened it.
pub struct ErasedView {
  node: ModelNode,
  context: Option<ViewContext>,
  value: Box<dyn Any>,
}

impl ErasedView {
  pub(crate) fn typed<T: ?Sized + 'static>(view: ModelView<T>) -> Self {
    Self {
      node: view.node.clone(),
      context: Some(view.context.clone()),
      value: Box::new(view),
    }
  }

  /// View of an untyped reference, exposing only the node.
  pub(crate) fn untyped(node: ModelNode) -> Self {
    Self {
      node,
      context: None,
      value: Box::new(()),
    }
  }

  pub fn node(&self) -> &ModelNode {
    &self.node
  }

  pub fn downcast<T: ?Sized + 'static>(&self) -> Option<&ModelView<T>> {
    self.value.downcast_ref::<ModelView<T>>()
  }

  pub fn close(&self) {
    if let Some(context) = &self.context {
      context.close();
    }
  }
}
