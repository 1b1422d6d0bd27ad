//! Node-backed collections.
//!
//! A [`ModelMap<E>`] is a view of a node whose children are the map's
//! elements. Elements are nodes in their own right: they are created by
//! rules, configured by rules, and realized lazily like any other node.
//! Rules given to the map are attached to the elements with a fixed role:
//!
//! | operation                          | role         |
//! |------------------------------------|--------------|
//! | [`before_each`](ModelMap::before_each) | `Defaults`   |
//! | [`create_with`](ModelMap::create_with) | `Initialize` |
//! | [`named`](ModelMap::named), [`all`](ModelMap::all), [`with_type`](ModelMap::with_type) | `Mutate` |
//! | [`after_each`](ModelMap::after_each)   | `Finalize`   |

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::action::{ModelAction, RuleResult};
use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::init::{InstanceFactory, NodeInitializer, NodeInitializerExtractionStrategy};
use crate::node::{ModelActionRole, ModelNode, NodeState};
use crate::path::ModelPath;
use crate::projection::{ModelProjection, ModelView, ViewAccessor, ViewContext};
use crate::registry::ModelRegistration;
use crate::types::ModelType;

/// Where a map finds initializers for its elements.
#[derive(Clone, Default)]
pub enum ChildInitializerStrategy {
  /// The registry's [`NodeInitializerRegistry`](crate::init::NodeInitializerRegistry).
  #[default]
  Registry,
  /// A dedicated factory. Elements are built from their name.
  Factory(Rc<InstanceFactory<String>>),
}

impl ChildInitializerStrategy {
  fn initializer(&self, parent: &ModelNode, ty: &ModelType) -> Result<Rc<dyn NodeInitializer>> {
    match self {
      ChildInitializerStrategy::Registry => parent.registry()?.initializers().initializer(ty),
      ChildInitializerStrategy::Factory(factory) => factory.initializer(ty).ok_or_else(|| ModelError::UnknownType {
        type_name: ty.to_string(),
        registry: factory.display_name().to_string(),
        supported: factory.supported_type_names(),
      }),
    }
  }
}

/// Map of named elements of type `E`, backed by the children of a node.
pub struct ModelMap<E: ?Sized + 'static> {
  node: ModelNode,
  context: ViewContext,
  children: ChildInitializerStrategy,
  _marker: PhantomData<fn(&E)>,
}

impl<E: ?Sized + 'static> ModelMap<E> {
  fn new(node: ModelNode, context: ViewContext, children: ChildInitializerStrategy) -> Self {
    Self {
      node,
      context,
      children,
      _marker: PhantomData,
    }
  }

  /// Registration for a node viewable as `ModelMap<E>`, with elements built by the registry's initializers.
  ///
  /// # Example
  ///
  /// ```
  /// use cfgraph_lib::collection::ModelMap;
  /// use cfgraph_lib::{ModelPath, ModelRegistry};
  ///
  /// let registry = ModelRegistry::new();
  /// let path = ModelPath::path("flags").unwrap();
  /// registry.register(ModelMap::<Vec<String>>::registration(path.clone(), "flags plugin")).unwrap();
  /// let flags = registry.realize::<ModelMap<Vec<String>>>(&path).unwrap();
  /// assert!(flags.get().unwrap().is_empty());
  /// ```
  pub fn registration(path: ModelPath, descriptor: impl Into<RuleDescriptor>) -> ModelRegistration {
    Self::registration_with(path, descriptor, ChildInitializerStrategy::Registry)
  }

  pub fn registration_with(
    path: ModelPath,
    descriptor: impl Into<RuleDescriptor>,
    children: ChildInitializerStrategy,
  ) -> ModelRegistration {
    ModelRegistration::builder(path, descriptor)
      .projection(Rc::new(ModelMapProjection::<E>::new(children)))
      .build()
  }

  pub fn node(&self) -> &ModelNode {
    &self.node
  }

  pub fn path(&self) -> &ModelPath {
    self.node.path()
  }

  fn descriptor(&self, operation: String) -> RuleDescriptor {
    self.context.descriptor().append(format!("{}.{operation}", self.node.path()))
  }

  fn element_path(&self, name: &str) -> Result<ModelPath> {
    self.node.path().child(name)
  }

  /// Adds an element called `name`.
  ///
  /// # Errors
  ///
  /// [`ModelError::ReadOnly`] or [`ModelError::ViewClosed`] when the map
  /// cannot be mutated, [`ModelError::DuplicateNode`] if `name` is taken,
  /// [`ModelError::UnknownType`] if no initializer can build `E`.
  pub fn create(&self, name: &str) -> Result<ModelNode> {
    self.create_typed(name, ModelType::of::<E>())
  }

  /// Adds an element of type `S`, which must be viewable as `E` through one of its projections.
  pub fn create_as<S: ?Sized + 'static>(&self, name: &str) -> Result<ModelNode> {
    self.create_typed(name, ModelType::of::<S>())
  }

  fn create_typed(&self, name: &str, ty: ModelType) -> Result<ModelNode> {
    self.context.assert_can_mutate()?;
    let path = self.element_path(name)?;
    let initializer = self.children.initializer(&self.node, &ty)?;
    let registration = ModelRegistration::builder(path, self.descriptor(format!("create({name})")))
      .initializer(&*initializer)
      .build();
    self.node.add_link(registration)
  }

  /// Adds an element and initializes it with `configure`.
  pub fn create_with<F>(&self, name: &str, configure: F) -> Result<ModelNode>
  where
    F: Fn(&mut E) -> RuleResult + 'static,
  {
    let element = self.create(name)?;
    let action = ModelAction::of::<E>(self.descriptor(format!("create({name})"))).action(configure);
    self.node.apply_to_link(name, ModelActionRole::Initialize, action)?;
    Ok(element)
  }

  /// Configures the element called `name`, which may be created later.
  pub fn named<F>(&self, name: &str, configure: F) -> Result<()>
  where
    F: Fn(&mut E) -> RuleResult + 'static,
  {
    self.context.assert_can_mutate()?;
    let action = ModelAction::of::<E>(self.descriptor(format!("named({name})"))).action(configure);
    self.node.apply_to_link(name, ModelActionRole::Mutate, action)
  }

  /// Configures every element, existing or future.
  pub fn all<F>(&self, configure: F) -> Result<()>
  where
    F: Fn(&mut E) -> RuleResult + 'static,
  {
    self.each(ModelActionRole::Mutate, "all()", configure)
  }

  /// Configures every element before any other rule of the element runs.
  pub fn before_each<F>(&self, configure: F) -> Result<()>
  where
    F: Fn(&mut E) -> RuleResult + 'static,
  {
    self.each(ModelActionRole::Defaults, "beforeEach()", configure)
  }

  /// Configures every element after its Mutate rules have run.
  pub fn after_each<F>(&self, configure: F) -> Result<()>
  where
    F: Fn(&mut E) -> RuleResult + 'static,
  {
    self.each(ModelActionRole::Finalize, "afterEach()", configure)
  }

  /// Configures every element that can be viewed as `S`.
  pub fn with_type<S, F>(&self, configure: F) -> Result<()>
  where
    S: ?Sized + 'static,
    F: Fn(&mut S) -> RuleResult + 'static,
  {
    self.context.assert_can_mutate()?;
    let operation = format!("withType({})", ModelType::of::<S>());
    let action = ModelAction::of::<S>(self.descriptor(operation)).action(configure);
    self.node.apply_to_all_links(ModelActionRole::Mutate, action)
  }

  fn each<F>(&self, role: ModelActionRole, operation: &str, configure: F) -> Result<()>
  where
    F: Fn(&mut E) -> RuleResult + 'static,
  {
    self.context.assert_can_mutate()?;
    let action = ModelAction::of::<E>(self.descriptor(operation.to_string())).action(configure);
    self.node.apply_to_all_links(role, action)
  }

  /// View of the element called `name`.
  ///
  /// Through a writable map the element is realized to `Initialized` and
  /// returned writable; through a read-only map it is fully realized. The
  /// element view closes together with the map view.
  pub fn get(&self, name: &str) -> Result<Option<ModelView<E>>> {
    let Some(element) = self.node.get_link(name) else {
      return Ok(None);
    };
    self.open(&element).map(Some)
  }

  fn open(&self, element: &ModelNode) -> Result<ModelView<E>> {
    let writable = self.context.is_writable() && !self.context.is_closed();
    let required = if writable {
      NodeState::Initialized
    } else {
      NodeState::GraphClosed
    };
    element.ensure_usable(required)?;
    let context = self
      .context
      .nested(element.path().clone(), ModelType::of::<E>(), writable);
    element.open_view_in(context)
  }

  /// Views of every element, in name order.
  pub fn values(&self) -> Result<Vec<ModelView<E>>> {
    self.node.links().iter().map(|element| self.open(element)).collect()
  }

  /// Element names, sorted.
  pub fn keys(&self) -> Vec<String> {
    self.node.link_names()
  }

  pub fn len(&self) -> usize {
    self.node.links().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn contains_key(&self, name: &str) -> bool {
    self.node.get_link(name).is_some_and(|element| !element.is_ephemeral())
  }
}

impl<E: ?Sized + 'static> std::fmt::Debug for ModelMap<E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModelMap")
      .field("path", self.node.path())
      .field("element_type", &ModelType::of::<E>())
      .field("keys", &self.keys())
      .finish()
  }
}

/// Projection viewing a node's children as a [`ModelMap<E>`].
pub struct ModelMapProjection<E: ?Sized + 'static> {
  children: ChildInitializerStrategy,
  _marker: PhantomData<fn(&E)>,
}

impl<E: ?Sized + 'static> ModelMapProjection<E> {
  pub fn new(children: ChildInitializerStrategy) -> Self {
    Self {
      children,
      _marker: PhantomData,
    }
  }

  fn matches(ty: &ModelType) -> bool {
    *ty == ModelType::of::<ModelMap<E>>()
  }
}

impl<E: ?Sized + 'static> ModelProjection for ModelMapProjection<E> {
  fn can_be_viewed_as_read_only(&self, ty: &ModelType) -> bool {
    Self::matches(ty)
  }

  fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
    Self::matches(ty)
  }

  fn accessor(&self, ty: &ModelType, _writable: bool) -> Option<Box<dyn std::any::Any>> {
    if !Self::matches(ty) {
      return None;
    }
    let children = self.children.clone();
    Some(Box::new(ViewAccessor::<ModelMap<E>>::synthesized(
      move |node: &ModelNode, context: &ViewContext| Ok(ModelMap::new(node.clone(), context.clone(), children.clone())),
    )))
  }

  fn type_descriptions(&self, _writable: bool) -> Vec<String> {
    vec![ModelType::of::<ModelMap<E>>().to_string()]
  }

  fn value_description(&self, node: &ModelNode) -> Option<String> {
    Some(format!("[{}]", node.link_names().join(", ")))
  }
}

/// Initializers for `ModelMap<E>` of every registered element type.
#[derive(Default)]
pub struct ModelMapStrategy {
  initializers: RefCell<BTreeMap<ModelType, Rc<dyn NodeInitializer>>>,
}

impl ModelMapStrategy {
  pub fn new() -> Self {
    Self::default()
  }

  /// Supports `ModelMap<E>` with elements built by the registry's initializers.
  pub fn register<E: ?Sized + 'static>(&self) {
    self.register_with::<E>(ChildInitializerStrategy::Registry);
  }

  /// Supports `ModelMap<E>` with elements built by `children`.
  pub fn register_with<E: ?Sized + 'static>(&self, children: ChildInitializerStrategy) {
    let initializer = move |_: &ModelPath, descriptor: &RuleDescriptor| {
      let children = children.clone();
      let discover = ModelAction::on_node(descriptor.clone())
        .action(move |node| node.add_projection(Rc::new(ModelMapProjection::<E>::new(children.clone()))));
      vec![(ModelActionRole::Discover, discover)]
    };
    self
      .initializers
      .borrow_mut()
      .insert(ModelType::of::<ModelMap<E>>(), Rc::new(initializer));
  }
}

impl NodeInitializerExtractionStrategy for ModelMapStrategy {
  fn extract(&self, ty: &ModelType) -> Option<Rc<dyn NodeInitializer>> {
    self.initializers.borrow().get(ty).cloned()
  }

  fn supported_types(&self) -> Vec<ModelType> {
    self.initializers.borrow().keys().copied().collect()
  }
}
