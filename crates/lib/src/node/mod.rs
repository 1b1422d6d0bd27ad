//! Model nodes: the vertices of the model graph.
//!
//! A [`ModelNode`] is a cheap, clonable handle. It owns the node's state,
//! projections, links to child nodes and optional private data. Operations
//! that need the rest of the graph (adding links, realizing, attaching
//! rules) are forwarded to the registry the node belongs to.

mod state;

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

pub use state::{ModelActionRole, NodeState};

use crate::action::ModelAction;
use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::graph::NodePredicate;
use crate::path::ModelPath;
use crate::projection::{ChainingProjection, ModelProjection, ModelView, ViewAccessor, ViewContext};
use crate::registry::{ModelRegistration, RegistryInner};
use crate::types::ModelType;

/// Handle to a node in the model graph.
#[derive(Clone)]
pub struct ModelNode {
  inner: Rc<NodeInner>,
}

struct NodeInner {
  path: ModelPath,
  descriptor: RuleDescriptor,
  ephemeral: bool,
  hidden: bool,
  state: Cell<NodeState>,
  discovered: Cell<bool>,
  parent: Option<Weak<NodeInner>>,
  projections: RefCell<ChainingProjection>,
  links: RefCell<BTreeMap<String, ModelNode>>,
  data: RefCell<Option<Box<dyn Any>>>,
  data_type: Cell<Option<ModelType>>,
  failure: RefCell<Option<RuleFailure>>,
  registry: Weak<RegistryInner>,
}

/// The rule that stopped a node from advancing.
#[derive(Debug, Clone)]
pub struct RuleFailure {
  pub role: ModelActionRole,
  pub descriptor: RuleDescriptor,
  pub message: String,
}

/// Flags a node is created with.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NodeFlags {
  pub ephemeral: bool,
  pub hidden: bool,
}

impl ModelNode {
  pub(crate) fn new(
    path: ModelPath,
    descriptor: RuleDescriptor,
    parent: Option<&ModelNode>,
    flags: NodeFlags,
    registry: Weak<RegistryInner>,
  ) -> Self {
    Self {
      inner: Rc::new(NodeInner {
        path,
        descriptor,
        ephemeral: flags.ephemeral,
        hidden: flags.hidden,
        state: Cell::new(NodeState::Known),
        discovered: Cell::new(false),
        parent: parent.map(|p| Rc::downgrade(&p.inner)),
        projections: RefCell::new(ChainingProjection::default()),
        links: RefCell::new(BTreeMap::new()),
        data: RefCell::new(None),
        data_type: Cell::new(None),
        failure: RefCell::new(None),
        registry,
      }),
    }
  }

  pub fn path(&self) -> &ModelPath {
    &self.inner.path
  }

  pub fn name(&self) -> &str {
    self.inner.path.name()
  }

  pub fn descriptor(&self) -> &RuleDescriptor {
    &self.inner.descriptor
  }

  pub fn state(&self) -> NodeState {
    self.inner.state.get()
  }

  pub fn is_mutable(&self) -> bool {
    self.state().is_mutable()
  }

  /// Ephemeral nodes are left out of enumeration.
  pub fn is_ephemeral(&self) -> bool {
    self.inner.ephemeral
  }

  /// Hidden nodes are left out of reports.
  pub fn is_hidden(&self) -> bool {
    self.inner.hidden
  }

  pub fn is_root(&self) -> bool {
    self.inner.path.is_root()
  }

  pub fn parent(&self) -> Option<ModelNode> {
    let parent = self.inner.parent.as_ref()?.upgrade()?;
    Some(ModelNode { inner: parent })
  }

  /// Whether the node's Discover rules have run.
  pub(crate) fn is_discovered(&self) -> bool {
    self.inner.discovered.get()
  }

  pub(crate) fn mark_discovered(&self) {
    self.inner.discovered.set(true);
  }

  /// The first rule that failed while realizing this node, if any.
  pub fn failure(&self) -> Option<RuleFailure> {
    self.inner.failure.borrow().clone()
  }

  pub(crate) fn record_failure(&self, failure: RuleFailure) {
    let mut slot = self.inner.failure.borrow_mut();
    if slot.is_none() {
      *slot = Some(failure);
    }
  }

  /// Moves the node forward to `state`. Never moves backwards.
  pub(crate) fn advance_to(&self, state: NodeState) {
    if state > self.state() {
      self.inner.state.set(state);
    }
  }

  pub(crate) fn registry(&self) -> Result<Rc<RegistryInner>> {
    self.inner.registry.upgrade().ok_or_else(|| ModelError::Detached {
      path: self.path().to_string(),
    })
  }

  fn not_mutable(&self, operation: impl Into<String>) -> ModelError {
    ModelError::NotMutable {
      path: self.path().to_string(),
      state: self.state(),
      operation: operation.into(),
    }
  }

  // Projections

  /// Adds a projection. Later projections lose to earlier ones for the same type.
  ///
  /// # Errors
  ///
  /// Returns [`ModelError::NotMutable`] once the node is finalized.
  pub fn add_projection(&self, projection: Rc<dyn ModelProjection>) -> Result<()> {
    if !self.is_mutable() {
      return Err(self.not_mutable("add a projection"));
    }
    self.inner.projections.borrow_mut().push(projection);
    Ok(())
  }

  pub fn projection(&self) -> ChainingProjection {
    self.inner.projections.borrow().clone()
  }

  pub fn can_be_viewed_as_read_only(&self, ty: &ModelType) -> bool {
    ty.is_untyped() || self.inner.projections.borrow().can_be_viewed_as_read_only(ty)
  }

  pub fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
    ty.is_untyped() || self.inner.projections.borrow().can_be_viewed_as_writable(ty)
  }

  /// Types this node can currently be viewed as.
  pub fn type_descriptions(&self, writable: bool) -> Vec<String> {
    self.inner.projections.borrow().type_descriptions(writable)
  }

  pub fn value_description(&self) -> Option<String> {
    let projection = self.projection();
    projection.value_description(self)
  }

  // Views

  /// Opens a read-only view of the node as `T`.
  ///
  /// # Errors
  ///
  /// [`ModelError::NotRealized`] before the node is created,
  /// [`ModelError::TypeMismatch`] if no projection supports `T`.
  pub fn as_read_only<T: ?Sized + 'static>(&self, descriptor: &RuleDescriptor) -> Result<ModelView<T>> {
    self.open_view(descriptor, false)
  }

  /// Opens a writable view of the node as `T`.
  ///
  /// # Errors
  ///
  /// As [`as_read_only`](Self::as_read_only), plus [`ModelError::NotMutable`]
  /// once the node is finalized.
  pub fn as_writable<T: ?Sized + 'static>(&self, descriptor: &RuleDescriptor) -> Result<ModelView<T>> {
    self.open_view(descriptor, true)
  }

  pub(crate) fn open_view<T: ?Sized + 'static>(&self, descriptor: &RuleDescriptor, writable: bool) -> Result<ModelView<T>> {
    let context = ViewContext::new(self.path().clone(), ModelType::of::<T>(), descriptor.clone(), writable);
    self.open_view_in(context)
  }

  /// Opens a view using an existing context, e.g. one nested in a parent view.
  pub(crate) fn open_view_in<T: ?Sized + 'static>(&self, context: ViewContext) -> Result<ModelView<T>> {
    let ty = ModelType::of::<T>();
    let writable = context.is_writable();
    if self.state() < NodeState::Created {
      return Err(ModelError::NotRealized {
        path: self.path().to_string(),
        state: self.state(),
        required: NodeState::Created,
      });
    }
    if writable && !self.is_mutable() {
      return Err(self.not_mutable(format!("open a writable view as '{ty}'")));
    }
    let accessor = self
      .projection()
      .accessor(&ty, writable)
      .and_then(|accessor| accessor.downcast::<ViewAccessor<T>>().ok());
    match accessor {
      Some(accessor) => ModelView::open(self.clone(), context, *accessor),
      None => Err(ModelError::TypeMismatch {
        path: self.path().to_string(),
        requested: ty.to_string(),
        mode: if writable { "writable" } else { "read-only" },
        available: self.type_descriptions(writable),
      }),
    }
  }

  // Links

  /// Registers a child node below this one.
  ///
  /// # Errors
  ///
  /// [`ModelError::NotMutable`] once this node is finalized,
  /// [`ModelError::DuplicateNode`] if the path is taken.
  pub fn add_link(&self, registration: ModelRegistration) -> Result<ModelNode> {
    self.registry()?.add_node(self, registration)
  }

  pub fn get_link(&self, name: &str) -> Option<ModelNode> {
    self.inner.links.borrow().get(name).cloned()
  }

  pub fn has_link(&self, name: &str) -> bool {
    self.inner.links.borrow().contains_key(name)
  }

  /// Names of non-ephemeral children, sorted.
  pub fn link_names(&self) -> Vec<String> {
    self.links().iter().map(|link| link.name().to_string()).collect()
  }

  /// Non-ephemeral children, sorted by name.
  pub fn links(&self) -> Vec<ModelNode> {
    self
      .inner
      .links
      .borrow()
      .values()
      .filter(|link| !link.is_ephemeral())
      .cloned()
      .collect()
  }

  /// Every child including ephemeral ones.
  pub(crate) fn all_links(&self) -> Vec<ModelNode> {
    self.inner.links.borrow().values().cloned().collect()
  }

  pub fn link_count(&self) -> usize {
    self.inner.links.borrow().len()
  }

  pub(crate) fn insert_link(&self, child: ModelNode) {
    self.inner.links.borrow_mut().insert(child.name().to_string(), child);
  }

  pub(crate) fn remove_link(&self, name: &str) -> Option<ModelNode> {
    self.inner.links.borrow_mut().remove(name)
  }

  // Private data

  /// Replaces the node's backing value.
  ///
  /// # Errors
  ///
  /// [`ModelError::NotMutable`] once the node is finalized,
  /// [`ModelError::ViewInUse`] while a view borrows the current value.
  pub fn set_private_data<T: 'static>(&self, value: T) -> Result<()> {
    if !self.is_mutable() {
      return Err(self.not_mutable(format!("set private data of type '{}'", ModelType::of::<T>())));
    }
    let mut slot = self.inner.data.try_borrow_mut().map_err(|_| ModelError::ViewInUse {
      path: self.path().to_string(),
    })?;
    *slot = Some(Box::new(value));
    self.inner.data_type.set(Some(ModelType::of::<T>()));
    Ok(())
  }

  pub fn has_private_data(&self) -> bool {
    self.inner.data_type.get().is_some()
  }

  pub fn private_data_type(&self) -> Option<ModelType> {
    self.inner.data_type.get()
  }

  /// Borrows the backing value as `T`.
  ///
  /// # Errors
  ///
  /// [`ModelError::MissingPrivateData`] if there is no value of type `T`.
  pub fn private_data<T: 'static>(&self) -> Result<Ref<'_, T>> {
    let slot = self.inner.data.try_borrow().map_err(|_| ModelError::ViewInUse {
      path: self.path().to_string(),
    })?;
    Ref::filter_map(slot, |slot| slot.as_deref().and_then(|value| value.downcast_ref::<T>()))
      .map_err(|_| self.missing_data::<T>())
  }

  /// Mutably borrows the backing value as `T`.
  ///
  /// # Errors
  ///
  /// As [`private_data`](Self::private_data), plus [`ModelError::NotMutable`]
  /// once the node is finalized.
  pub fn private_data_mut<T: 'static>(&self) -> Result<RefMut<'_, T>> {
    if !self.is_mutable() {
      return Err(self.not_mutable(format!("modify private data of type '{}'", ModelType::of::<T>())));
    }
    let slot = self.inner.data.try_borrow_mut().map_err(|_| ModelError::ViewInUse {
      path: self.path().to_string(),
    })?;
    RefMut::filter_map(slot, |slot| slot.as_deref_mut().and_then(|value| value.downcast_mut::<T>()))
      .map_err(|_| self.missing_data::<T>())
  }

  pub(crate) fn data_slot(&self) -> &RefCell<Option<Box<dyn Any>>> {
    &self.inner.data
  }

  fn missing_data<T: 'static>(&self) -> ModelError {
    ModelError::MissingPrivateData {
      path: self.path().to_string(),
      requested: ModelType::of::<T>().to_string(),
    }
  }

  // Rules and realization

  /// Attaches a rule whose subject is this node.
  ///
  /// # Errors
  ///
  /// [`ModelError::NotMutable`] if the node has already passed the role's state.
  pub fn apply_to_self(&self, role: ModelActionRole, action: ModelAction) -> Result<()> {
    let action = action.bound_to(self.path().clone());
    self.registry()?.bind_to_path(self.path(), role, action)
  }

  /// Attaches a rule to the child called `name`, which may not exist yet.
  pub fn apply_to_link(&self, name: &str, role: ModelActionRole, action: ModelAction) -> Result<()> {
    let path = self.path().child(name)?;
    let action = action.bound_to(path.clone());
    self.registry()?.bind_to_path(&path, role, action)
  }

  /// Attaches a rule to every current and future child viewable as the action's subject type.
  pub fn apply_to_all_links(&self, role: ModelActionRole, action: ModelAction) -> Result<()> {
    let ty = action.subject().model_type();
    let predicate = NodePredicate::children_of(self.path().clone()).with_type(ty, role.subject_writable());
    self.registry()?.bind_matching(predicate, role, action)
  }

  /// Attaches a rule to every current and future descendant viewable as the action's subject type.
  pub fn apply_to_all_descendants(&self, role: ModelActionRole, action: ModelAction) -> Result<()> {
    let ty = action.subject().model_type();
    let predicate = NodePredicate::descendants_of(self.path().clone()).with_type(ty, role.subject_writable());
    self.registry()?.bind_matching(predicate, role, action)
  }

  /// Realizes the node to at least `state`, running every rule required to get there.
  ///
  /// # Errors
  ///
  /// Any error raised while resolving inputs or running rules.
  pub fn ensure_usable(&self, state: NodeState) -> Result<()> {
    self.registry()?.transition(self, state)
  }
}

impl PartialEq for ModelNode {
  fn eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.inner, &other.inner)
  }
}

impl Eq for ModelNode {}

impl fmt::Debug for ModelNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ModelNode")
      .field("path", self.path())
      .field("state", &self.state())
      .field("descriptor", self.descriptor())
      .finish()
  }
}

impl fmt::Display for ModelNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.path())
  }
}
