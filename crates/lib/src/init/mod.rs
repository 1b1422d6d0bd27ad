//! Creating nodes by type.
//!
//! A [`NodeInitializer`] produces the Discover and Create actions that give
//! a new node its projections and backing data. The
//! [`NodeInitializerRegistry`] picks an initializer for a requested type by
//! asking its extraction strategies in order:
//! - strategies registered at runtime, most recent first
//! - scalar collections (`Vec<E>` of registered element types)
//! - node-backed maps ([`ModelMap`](crate::collection::ModelMap))
//! - managed structs ([`ManagedStruct`](crate::managed::ManagedStruct))
//! - the [`InstanceFactory`] owned by the registry

mod factory;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::trace;

pub use factory::InstanceFactory;

use crate::action::ModelAction;
use crate::collection::ModelMapStrategy;
use crate::consts::{INITIALIZER_REGISTRY_NAME, INSTANCE_FACTORY_NAME};
use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::managed::ManagedStructStrategy;
use crate::node::ModelActionRole;
use crate::path::ModelPath;
use crate::projection::UnmanagedProjection;
use crate::types::ModelType;

/// Actions that bring a new node of some type to life.
pub trait NodeInitializer {
  fn actions(&self, path: &ModelPath, descriptor: &RuleDescriptor) -> Vec<(ModelActionRole, ModelAction)>;
}

impl<F> NodeInitializer for F
where
  F: Fn(&ModelPath, &RuleDescriptor) -> Vec<(ModelActionRole, ModelAction)>,
{
  fn actions(&self, path: &ModelPath, descriptor: &RuleDescriptor) -> Vec<(ModelActionRole, ModelAction)> {
    self(path, descriptor)
  }
}

/// Finds an initializer for a type, if it knows how to build it.
pub trait NodeInitializerExtractionStrategy {
  fn extract(&self, ty: &ModelType) -> Option<Rc<dyn NodeInitializer>>;

  fn supported_types(&self) -> Vec<ModelType>;
}

/// Initializer for a node backed by an unmanaged value built by `factory`.
pub struct UnmanagedInitializer<T: 'static> {
  factory: Rc<dyn Fn() -> T>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> UnmanagedInitializer<T> {
  pub fn new(factory: impl Fn() -> T + 'static) -> Self {
    Self {
      factory: Rc::new(factory),
      _marker: PhantomData,
    }
  }
}

impl<T: 'static> NodeInitializer for UnmanagedInitializer<T> {
  fn actions(&self, _path: &ModelPath, descriptor: &RuleDescriptor) -> Vec<(ModelActionRole, ModelAction)> {
    let factory = Rc::clone(&self.factory);
    vec![
      (
        ModelActionRole::Discover,
        ModelAction::on_node(descriptor.clone())
          .action(|node| node.add_projection(Rc::new(UnmanagedProjection::<T>::new()))),
      ),
      (
        ModelActionRole::Create,
        ModelAction::on_node(descriptor.clone()).action(move |node| node.set_private_data(factory())),
      ),
    ]
  }
}

/// Lists of scalar values: `Vec<E>` for every registered element type.
pub struct ScalarCollectionStrategy {
  initializers: RefCell<BTreeMap<ModelType, Rc<dyn NodeInitializer>>>,
}

impl ScalarCollectionStrategy {
  /// A strategy supporting `Vec` of `String`, `i64`, `f64` and `bool`.
  pub fn new() -> Self {
    let strategy = Self {
      initializers: RefCell::new(BTreeMap::new()),
    };
    strategy.register::<String>();
    strategy.register::<i64>();
    strategy.register::<f64>();
    strategy.register::<bool>();
    strategy
  }

  /// Adds `Vec<E>` to the supported types.
  pub fn register<E: 'static>(&self) {
    self.initializers.borrow_mut().insert(
      ModelType::of::<Vec<E>>(),
      Rc::new(UnmanagedInitializer::new(Vec::<E>::new)),
    );
  }
}

impl Default for ScalarCollectionStrategy {
  fn default() -> Self {
    Self::new()
  }
}

impl NodeInitializerExtractionStrategy for ScalarCollectionStrategy {
  fn extract(&self, ty: &ModelType) -> Option<Rc<dyn NodeInitializer>> {
    self.initializers.borrow().get(ty).cloned()
  }

  fn supported_types(&self) -> Vec<ModelType> {
    self.initializers.borrow().keys().copied().collect()
  }
}

/// Chooses initializers for [`ModelRegistry::create`](crate::ModelRegistry::create) and for collections.
pub struct NodeInitializerRegistry {
  custom: RefCell<Vec<Rc<dyn NodeInitializerExtractionStrategy>>>,
  scalars: Rc<ScalarCollectionStrategy>,
  maps: Rc<ModelMapStrategy>,
  managed: Rc<ManagedStructStrategy>,
  instances: Rc<InstanceFactory<String>>,
}

impl NodeInitializerRegistry {
  pub fn new() -> Self {
    Self {
      custom: RefCell::new(Vec::new()),
      scalars: Rc::new(ScalarCollectionStrategy::new()),
      maps: Rc::new(ModelMapStrategy::new()),
      managed: Rc::new(ManagedStructStrategy::new()),
      instances: Rc::new(InstanceFactory::new(INSTANCE_FACTORY_NAME)),
    }
  }

  /// Adds a strategy that is consulted before every existing one.
  pub fn register_strategy(&self, strategy: Rc<dyn NodeInitializerExtractionStrategy>) {
    self.custom.borrow_mut().insert(0, strategy);
  }

  pub fn scalar_collections(&self) -> &ScalarCollectionStrategy {
    &self.scalars
  }

  pub fn model_maps(&self) -> &ModelMapStrategy {
    &self.maps
  }

  pub fn managed_structs(&self) -> &ManagedStructStrategy {
    &self.managed
  }

  /// Factory for unmanaged types created by name, e.g. collection elements.
  pub fn instances(&self) -> &Rc<InstanceFactory<String>> {
    &self.instances
  }

  fn strategies(&self) -> Vec<Rc<dyn NodeInitializerExtractionStrategy>> {
    let mut strategies = self.custom.borrow().clone();
    strategies.push(Rc::clone(&self.scalars) as Rc<dyn NodeInitializerExtractionStrategy>);
    strategies.push(Rc::clone(&self.maps) as Rc<dyn NodeInitializerExtractionStrategy>);
    strategies.push(Rc::clone(&self.managed) as Rc<dyn NodeInitializerExtractionStrategy>);
    strategies.push(Rc::clone(&self.instances) as Rc<dyn NodeInitializerExtractionStrategy>);
    strategies
  }

  /// Returns the initializer of the first strategy that supports `ty`.
  ///
  /// # Errors
  ///
  /// [`ModelError::UnknownType`] listing every supported type, sorted.
  pub fn initializer(&self, ty: &ModelType) -> Result<Rc<dyn NodeInitializer>> {
    for strategy in self.strategies() {
      if let Some(initializer) = strategy.extract(ty) {
        trace!(model_type = %ty, "found node initializer");
        return Ok(initializer);
      }
    }
    Err(ModelError::UnknownType {
      type_name: ty.to_string(),
      registry: INITIALIZER_REGISTRY_NAME.to_string(),
      supported: self.supported_type_names(),
    })
  }

  /// Display names of every type some strategy supports, sorted and deduplicated.
  pub fn supported_type_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .strategies()
      .iter()
      .flat_map(|strategy| strategy.supported_types())
      .map(|ty| ty.to_string())
      .collect();
    names.sort();
    names.dedup();
    names
  }
}

impl Default for NodeInitializerRegistry {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::p;
  use crate::{ModelRegistry, NodeState};

  struct Widget;

  struct WidgetStrategy;

  impl NodeInitializerExtractionStrategy for WidgetStrategy {
    fn extract(&self, ty: &ModelType) -> Option<Rc<dyn NodeInitializer>> {
      (*ty == ModelType::of::<Widget>()).then(|| Rc::new(UnmanagedInitializer::new(|| Widget)) as Rc<dyn NodeInitializer>)
    }

    fn supported_types(&self) -> Vec<ModelType> {
      vec![ModelType::of::<Widget>()]
    }
  }

  #[test]
  fn scalar_collections_are_supported_by_default() {
    let registry = NodeInitializerRegistry::new();
    assert!(registry.initializer(&ModelType::of::<Vec<String>>()).is_ok());
    assert!(registry.initializer(&ModelType::of::<Vec<u8>>()).is_err());
    registry.scalar_collections().register::<u8>();
    assert!(registry.initializer(&ModelType::of::<Vec<u8>>()).is_ok());
  }

  #[test]
  fn unknown_type_lists_supported_types_sorted() {
    let registry = NodeInitializerRegistry::new();
    let err = registry.initializer(&ModelType::of::<Widget>()).err().unwrap();
    let message = err.to_string();
    assert!(message.starts_with("cannot create a 'Widget' because this type is not known to the node initializer registry"));
    assert!(message.contains("Vec<String>, Vec<bool>, Vec<f64>, Vec<i64>"));
  }

  #[test]
  fn registered_strategy_is_consulted() {
    let registry = NodeInitializerRegistry::new();
    registry.register_strategy(Rc::new(WidgetStrategy));
    assert!(registry.initializer(&ModelType::of::<Widget>()).is_ok());
    assert!(registry.supported_type_names().contains(&"Widget".to_string()));
  }

  #[test]
  fn registry_creates_scalar_collection_nodes() {
    let registry = ModelRegistry::new();
    registry.create::<Vec<String>>(p("flags"), "test").unwrap();
    let flags = registry.realize::<Vec<String>>(&p("flags")).unwrap();
    assert!(flags.get().unwrap().is_empty());
    assert_eq!(registry.state(&p("flags")), Some(NodeState::GraphClosed));
  }
}
