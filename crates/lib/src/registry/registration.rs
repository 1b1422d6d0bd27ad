use std::rc::Rc;

use crate::action::{ModelAction, RuleResult};
use crate::descriptor::RuleDescriptor;
use crate::init::NodeInitializer;
use crate::node::{ModelActionRole, ModelNode};
use crate::path::ModelPath;
use crate::projection::{ModelProjection, UnmanagedProjection};

/// Everything needed to add a node: its path, the rule that registered
/// it, the actions that bring it to life and its flags.
#[derive(Debug, Clone)]
pub struct ModelRegistration {
  path: ModelPath,
  descriptor: RuleDescriptor,
  actions: Vec<(ModelActionRole, ModelAction)>,
  ephemeral: bool,
  hidden: bool,
}

impl ModelRegistration {
  pub fn builder(path: ModelPath, descriptor: impl Into<RuleDescriptor>) -> RegistrationBuilder {
    RegistrationBuilder {
      registration: ModelRegistration {
        path,
        descriptor: descriptor.into(),
        actions: Vec::new(),
        ephemeral: false,
        hidden: false,
      },
    }
  }

  /// A node backed by a value built by `factory` when the node is created.
  ///
  /// # Example
  ///
  /// ```
  /// use cfgraph_lib::{ModelPath, ModelRegistration, ModelRegistry};
  ///
  /// let registry = ModelRegistry::new();
  /// registry
  ///   .register(ModelRegistration::unmanaged(ModelPath::path("port").unwrap(), "defaults", || 8080u16))
  ///   .unwrap();
  /// let port = registry.realize::<u16>(&ModelPath::path("port").unwrap()).unwrap();
  /// assert_eq!(*port.get().unwrap(), 8080);
  /// ```
  pub fn unmanaged<T, F>(path: ModelPath, descriptor: impl Into<RuleDescriptor>, factory: F) -> Self
  where
    T: 'static,
    F: Fn() -> T + 'static,
  {
    Self::builder(path, descriptor)
      .projection(Rc::new(UnmanagedProjection::<T>::new()))
      .create(move |node| node.set_private_data(factory()))
      .build()
  }

  pub fn path(&self) -> &ModelPath {
    &self.path
  }

  pub fn descriptor(&self) -> &RuleDescriptor {
    &self.descriptor
  }

  pub fn actions(&self) -> &[(ModelActionRole, ModelAction)] {
    &self.actions
  }

  pub fn is_ephemeral(&self) -> bool {
    self.ephemeral
  }

  pub fn is_hidden(&self) -> bool {
    self.hidden
  }

  pub(crate) fn into_actions(self) -> Vec<(ModelActionRole, ModelAction)> {
    let path = self.path;
    self
      .actions
      .into_iter()
      .map(|(role, action)| (role, action.bound_to(path.clone())))
      .collect()
  }
}

/// Builder for [`ModelRegistration`].
pub struct RegistrationBuilder {
  registration: ModelRegistration,
}

impl RegistrationBuilder {
  /// Adds an action bound to the registered node.
  pub fn action(mut self, role: ModelActionRole, action: ModelAction) -> Self {
    self.registration.actions.push((role, action));
    self
  }

  /// Adds a Discover action that installs `projection`.
  pub fn projection(self, projection: Rc<dyn ModelProjection>) -> Self {
    let descriptor = self.registration.descriptor.clone();
    let action = ModelAction::on_node(descriptor).action(move |node| node.add_projection(Rc::clone(&projection)));
    self.action(ModelActionRole::Discover, action)
  }

  /// Adds a Create action running `create` on the node.
  pub fn create<F>(self, create: F) -> Self
  where
    F: Fn(&ModelNode) -> RuleResult + 'static,
  {
    let descriptor = self.registration.descriptor.clone();
    self.action(ModelActionRole::Create, ModelAction::on_node(descriptor).action(create))
  }

  /// Adds every action `initializer` produces for this node.
  pub fn initializer(mut self, initializer: &dyn NodeInitializer) -> Self {
    let actions = initializer.actions(&self.registration.path, &self.registration.descriptor);
    self.registration.actions.extend(actions);
    self
  }

  pub fn ephemeral(mut self, ephemeral: bool) -> Self {
    self.registration.ephemeral = ephemeral;
    self
  }

  pub fn hidden(mut self, hidden: bool) -> Self {
    self.registration.hidden = hidden;
    self
  }

  pub fn build(self) -> ModelRegistration {
    self.registration
  }
}
