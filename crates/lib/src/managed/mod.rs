//! Managed structs: typed records whose properties are child nodes.
//!
//! A type implementing [`ManagedStruct`] lists its properties and is built
//! from a [`ManagedState`], which reads and writes those properties. Every
//! property is a node of its own, so rules can target `person.name` as
//! well as `person`.
//!
//! # Example
//!
//! ```
//! use cfgraph_lib::managed::{ManagedProjection, ManagedProperty, ManagedState, ManagedStruct};
//! use cfgraph_lib::{ModelAction, ModelActionRole, ModelPath, ModelRegistry, Result};
//!
//! struct Server {
//!   state: ManagedState,
//! }
//!
//! impl ManagedStruct for Server {
//!   fn properties() -> Vec<ManagedProperty> {
//!     vec![ManagedProperty::value("port", 80i64)]
//!   }
//!
//!   fn from_state(state: ManagedState) -> Self {
//!     Server { state }
//!   }
//! }
//!
//! impl Server {
//!   fn port(&self) -> Result<i64> {
//!     self.state.get("port")
//!   }
//!
//!   fn set_port(&self, port: i64) -> Result<()> {
//!     self.state.set("port", port)
//!   }
//! }
//!
//! let registry = ModelRegistry::new();
//! let path = ModelPath::path("server").unwrap();
//! registry.register(ManagedProjection::<Server>::registration(path.clone(), "server plugin")).unwrap();
//! registry
//!   .configure(
//!     ModelActionRole::Mutate,
//!     ModelAction::of::<Server>("use tls port").path(path.clone()).action(|server| server.set_port(443)),
//!   )
//!   .unwrap();
//! let server = registry.realize::<Server>(&path).unwrap();
//! assert_eq!(server.get().unwrap().port().unwrap(), 443);
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::action::ModelAction;
use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::init::{NodeInitializer, NodeInitializerExtractionStrategy};
use crate::node::{ModelActionRole, ModelNode, NodeState};
use crate::path::ModelPath;
use crate::projection::{ModelProjection, UnmanagedProjection, ViewAccessor, ViewContext};
use crate::registry::ModelRegistration;
use crate::types::ModelType;

/// A record type backed by one child node per property.
pub trait ManagedStruct: Sized + 'static {
  /// Properties in declaration order.
  fn properties() -> Vec<ManagedProperty>;

  /// Wraps the state handle a view of the struct reads and writes through.
  fn from_state(state: ManagedState) -> Self;
}

type PropertyRegistration = Rc<dyn Fn(ModelPath, RuleDescriptor) -> ModelRegistration>;

/// A property of a managed struct.
#[derive(Clone)]
pub struct ManagedProperty {
  name: String,
  model_type: ModelType,
  registration: PropertyRegistration,
}

impl ManagedProperty {
  /// A scalar property holding a `V`, starting at `default`.
  pub fn value<V>(name: impl Into<String>, default: V) -> Self
  where
    V: Clone + Debug + 'static,
  {
    Self {
      name: name.into(),
      model_type: ModelType::of::<V>(),
      registration: Rc::new(move |path: ModelPath, descriptor: RuleDescriptor| {
        let default = default.clone();
        ModelRegistration::builder(path, descriptor)
          .projection(Rc::new(UnmanagedProjection::<V>::new().describing(|value: &V| format!("{value:?}"))))
          .create(move |node| node.set_private_data(default.clone()))
          .build()
      }),
    }
  }

  /// A property that is itself a managed struct.
  pub fn structured<S: ManagedStruct>(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      model_type: ModelType::of::<S>(),
      registration: Rc::new(|path: ModelPath, descriptor: RuleDescriptor| {
        ManagedProjection::<S>::registration(path, descriptor)
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn model_type(&self) -> ModelType {
    self.model_type
  }
}

impl std::fmt::Debug for ManagedProperty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ManagedProperty")
      .field("name", &self.name)
      .field("type", &self.model_type)
      .finish()
  }
}

/// Access to the properties of a managed struct node, scoped to one view.
///
/// Reads are always allowed. Writes fail with [`ModelError::ReadOnly`]
/// through a read-only view and with [`ModelError::ViewClosed`] once the
/// rule that received the view has completed.
#[derive(Clone)]
pub struct ManagedState {
  node: ModelNode,
  context: ViewContext,
}

impl ManagedState {
  fn new(node: ModelNode, context: ViewContext) -> Self {
    Self { node, context }
  }

  pub fn node(&self) -> &ModelNode {
    &self.node
  }

  pub fn context(&self) -> &ViewContext {
    &self.context
  }

  fn property(&self, name: &str) -> Result<ModelNode> {
    let property = self.node.get_link(name).ok_or_else(|| ModelError::UnknownProperty {
      path: self.node.path().to_string(),
      property: name.to_string(),
    })?;
    let required = if self.context.is_writable() && !self.context.is_closed() {
      NodeState::Initialized
    } else {
      NodeState::GraphClosed
    };
    property.ensure_usable(required)?;
    Ok(property)
  }

  /// Current value of the property `name`.
  ///
  /// # Errors
  ///
  /// [`ModelError::UnknownProperty`] if there is no such property,
  /// [`ModelError::MissingPrivateData`] if it does not hold a `V`.
  pub fn get<V: Clone + 'static>(&self, name: &str) -> Result<V> {
    let property = self.property(name)?;
    let value = property.private_data::<V>()?;
    Ok(V::clone(&value))
  }

  /// Replaces the value of the property `name`.
  pub fn set<V: 'static>(&self, name: &str, value: V) -> Result<()> {
    self.context.assert_can_mutate()?;
    let property = self.property(name)?;
    if property.private_data_type() != Some(ModelType::of::<V>()) {
      return Err(ModelError::TypeMismatch {
        path: property.path().to_string(),
        requested: ModelType::of::<V>().to_string(),
        mode: "property",
        available: property.private_data_type().into_iter().map(|ty| ty.to_string()).collect(),
      });
    }
    property.set_private_data(value)
  }

  /// View of the nested managed struct stored in the property `name`.
  pub fn nested<S: ManagedStruct>(&self, name: &str) -> Result<S> {
    let property = self.property(name)?;
    let context = self
      .context
      .nested(property.path().clone(), ModelType::of::<S>(), self.context.is_writable());
    Ok(S::from_state(ManagedState::new(property, context)))
  }
}

impl std::fmt::Debug for ManagedState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ManagedState")
      .field("path", self.node.path())
      .field("writable", &self.context.is_writable())
      .field("closed", &self.context.is_closed())
      .finish()
  }
}

/// Views a node as the managed struct `S`.
pub struct ManagedProjection<S: ManagedStruct> {
  _marker: PhantomData<fn() -> S>,
}

impl<S: ManagedStruct> ManagedProjection<S> {
  pub fn new() -> Self {
    Self { _marker: PhantomData }
  }

  /// Registration for a node viewable as `S` with a child node per property.
  pub fn registration(path: ModelPath, descriptor: impl Into<RuleDescriptor>) -> ModelRegistration {
    let descriptor = descriptor.into();
    let mut builder = ModelRegistration::builder(path, descriptor.clone());
    for (role, action) in managed_actions::<S>(&descriptor) {
      builder = builder.action(role, action);
    }
    builder.build()
  }

  fn matches(ty: &ModelType) -> bool {
    *ty == ModelType::of::<S>()
  }
}

impl<S: ManagedStruct> Default for ManagedProjection<S> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: ManagedStruct> ModelProjection for ManagedProjection<S> {
  fn can_be_viewed_as_read_only(&self, ty: &ModelType) -> bool {
    Self::matches(ty)
  }

  fn can_be_viewed_as_writable(&self, ty: &ModelType) -> bool {
    Self::matches(ty)
  }

  fn accessor(&self, ty: &ModelType, _writable: bool) -> Option<Box<dyn Any>> {
    if !Self::matches(ty) {
      return None;
    }
    Some(Box::new(ViewAccessor::<S>::synthesized(|node: &ModelNode, context: &ViewContext| {
      Ok(S::from_state(ManagedState::new(node.clone(), context.clone())))
    })))
  }

  fn type_descriptions(&self, _writable: bool) -> Vec<String> {
    vec![ModelType::of::<S>().to_string()]
  }

  fn value_description(&self, node: &ModelNode) -> Option<String> {
    let properties: Vec<String> = S::properties()
      .iter()
      .filter_map(|property| {
        let value = node.get_link(property.name())?.value_description()?;
        Some(format!("{}: {value}", property.name()))
      })
      .collect();
    Some(format!("{{{}}}", properties.join(", ")))
  }
}

/// Discover installs the projection, Create adds one child per property.
fn managed_actions<S: ManagedStruct>(descriptor: &RuleDescriptor) -> Vec<(ModelActionRole, ModelAction)> {
  let property_descriptor = descriptor.clone();
  vec![
    (
      ModelActionRole::Discover,
      ModelAction::on_node(descriptor.clone())
        .action(|node| node.add_projection(Rc::new(ManagedProjection::<S>::new()))),
    ),
    (
      ModelActionRole::Create,
      ModelAction::on_node(descriptor.clone()).action(move |node| {
        for property in S::properties() {
          let path = node.path().child(property.name())?;
          node.add_link((property.registration)(path, property_descriptor.clone()))?;
        }
        Ok(())
      }),
    ),
  ]
}

/// Initializers for every registered managed struct type.
#[derive(Default)]
pub struct ManagedStructStrategy {
  initializers: RefCell<BTreeMap<ModelType, Rc<dyn NodeInitializer>>>,
}

impl ManagedStructStrategy {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<S: ManagedStruct>(&self) {
    let initializer = |_: &ModelPath, descriptor: &RuleDescriptor| managed_actions::<S>(descriptor);
    self
      .initializers
      .borrow_mut()
      .insert(ModelType::of::<S>(), Rc::new(initializer));
  }
}

impl NodeInitializerExtractionStrategy for ManagedStructStrategy {
  fn extract(&self, ty: &ModelType) -> Option<Rc<dyn NodeInitializer>> {
    self.initializers.borrow().get(ty).cloned()
  }

  fn supported_types(&self) -> Vec<ModelType> {
    self.initializers.borrow().keys().copied().collect()
  }
}
