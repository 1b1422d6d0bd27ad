//! Per-type construction of backing instances.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use super::{NodeInitializer, NodeInitializerExtractionStrategy};
use crate::action::ModelAction;
use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::node::{ModelActionRole, ModelNode};
use crate::path::ModelPath;
use crate::projection::{ModelProjection, UnmanagedProjection};
use crate::types::ModelType;

type CreateFn<P> = Rc<dyn Fn(&ModelNode, &P) -> Result<()>>;

struct Implementation<P> {
  descriptor: RuleDescriptor,
  projection: Rc<dyn ModelProjection>,
  create: CreateFn<P>,
}

impl<P> Clone for Implementation<P> {
  fn clone(&self) -> Self {
    Self {
      descriptor: self.descriptor.clone(),
      projection: Rc::clone(&self.projection),
      create: Rc::clone(&self.create),
    }
  }
}

/// Builds instances of registered types from a payload of type `P`.
///
/// Each type can be registered once. Collections use a factory keyed by the
/// child's name to build elements that no other strategy knows about.
pub struct InstanceFactory<P: 'static = String> {
  display_name: String,
  implementations: RefCell<BTreeMap<ModelType, Implementation<P>>>,
}

impl<P: 'static> InstanceFactory<P> {
  pub fn new(display_name: impl Into<String>) -> Self {
    Self {
      display_name: display_name.into(),
      implementations: RefCell::new(BTreeMap::new()),
    }
  }

  pub fn display_name(&self) -> &str {
    &self.display_name
  }

  /// Registers `factory` as the way to build `T`, viewed through an unmanaged projection.
  ///
  /// # Errors
  ///
  /// [`ModelError::DuplicateRegistration`] naming the first registrant if `T`
  /// is already registered.
  pub fn register<T, F>(&self, descriptor: impl Into<RuleDescriptor>, factory: F) -> Result<()>
  where
    T: 'static,
    F: Fn(&ModelNode, &P) -> Result<T> + 'static,
  {
    self.register_with_projection(descriptor, Rc::new(UnmanagedProjection::<T>::new()), factory)
  }

  /// Like [`register`](Self::register), with the projection nodes of this type get.
  pub fn register_with_projection<T, F>(
    &self,
    descriptor: impl Into<RuleDescriptor>,
    projection: Rc<dyn ModelProjection>,
    factory: F,
  ) -> Result<()>
  where
    T: 'static,
    F: Fn(&ModelNode, &P) -> Result<T> + 'static,
  {
    let ty = ModelType::of::<T>();
    let descriptor = descriptor.into();
    let mut implementations = self.implementations.borrow_mut();
    if let Some(existing) = implementations.get(&ty) {
      return Err(ModelError::DuplicateRegistration {
        type_name: ty.to_string(),
        descriptor: descriptor.to_string(),
        existing: existing.descriptor.to_string(),
      });
    }
    debug!(factory = %self.display_name, model_type = %ty, rule = %descriptor, "registered implementation");
    implementations.insert(
      ty,
      Implementation {
        descriptor,
        projection,
        create: Rc::new(move |node: &ModelNode, payload: &P| node.set_private_data(factory(node, payload)?)),
      },
    );
    Ok(())
  }

  /// Builds an instance of `ty` from `payload` and stores it as the node's private data.
  ///
  /// # Errors
  ///
  /// [`ModelError::UnknownType`] listing the supported types if `ty` was
  /// never registered, or any error raised by the factory.
  pub fn create(&self, ty: &ModelType, node: &ModelNode, payload: &P) -> Result<()> {
    let create = self.implementation(ty)?.create;
    create(node, payload)
  }

  /// The projection registered for `ty`.
  pub fn projection(&self, ty: &ModelType) -> Option<Rc<dyn ModelProjection>> {
    self
      .implementations
      .borrow()
      .get(ty)
      .map(|implementation| Rc::clone(&implementation.projection))
  }

  pub fn contains(&self, ty: &ModelType) -> bool {
    self.implementations.borrow().contains_key(ty)
  }

  pub fn supported_types(&self) -> Vec<ModelType> {
    self.implementations.borrow().keys().copied().collect()
  }

  /// Display names of the registered types, sorted.
  pub fn supported_type_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.supported_types().iter().map(ToString::to_string).collect();
    names.sort();
    names
  }

  fn implementation(&self, ty: &ModelType) -> Result<Implementation<P>> {
    self
      .implementations
      .borrow()
      .get(ty)
      .cloned()
      .ok_or_else(|| ModelError::UnknownType {
        type_name: ty.to_string(),
        registry: self.display_name.clone(),
        supported: self.supported_type_names(),
      })
  }
}

impl InstanceFactory<String> {
  /// Initializer that installs the registered projection and builds the
  /// instance from the node's name.
  pub fn initializer(&self, ty: &ModelType) -> Option<Rc<dyn NodeInitializer>> {
    let implementation = self.implementations.borrow().get(ty).cloned()?;
    Some(Rc::new(move |_: &ModelPath, descriptor: &RuleDescriptor| {
      let projection = Rc::clone(&implementation.projection);
      let create = Rc::clone(&implementation.create);
      vec![
        (
          ModelActionRole::Discover,
          ModelAction::on_node(descriptor.clone()).action(move |node| node.add_projection(Rc::clone(&projection))),
        ),
        (
          ModelActionRole::Create,
          ModelAction::on_node(descriptor.clone()).action(move |node| create(node, &node.name().to_string())),
        ),
      ]
    }))
  }
}

impl NodeInitializerExtractionStrategy for InstanceFactory<String> {
  fn extract(&self, ty: &ModelType) -> Option<Rc<dyn NodeInitializer>> {
    self.initializer(ty)
  }

  fn supported_types(&self) -> Vec<ModelType> {
    InstanceFactory::supported_types(self)
  }
}

impl<P: 'static> std::fmt::Debug for InstanceFactory<P> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("InstanceFactory")
      .field("display_name", &self.display_name)
      .field("types", &self.supported_type_names())
      .finish()
  }
}
