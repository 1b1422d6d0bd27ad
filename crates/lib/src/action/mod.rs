//! Rules: units of configuration applied to a subject node.
//!
//! A [`ModelAction`] names its subject and inputs with [`ModelReference`]s
//! and carries a body. Bodies come in three shapes:
//! - node bodies receive the subject [`ModelNode`] itself (Discover and Create rules)
//! - subject bodies receive a typed view of the subject, writable or read-only depending on the role
//! - either shape may additionally receive the resolved [`Inputs`]
//!
//! Actions are assembled with [`ModelAction::of`] for typed subjects and
//! [`ModelAction::on_node`] for node bodies.
//!
//! # Example
//!
//! ```
//! use cfgraph_lib::{ModelAction, ModelPath};
//!
//! let action = ModelAction::of::<Vec<String>>("add default flags")
//!   .path(ModelPath::path("compiler.flags").unwrap())
//!   .action(|flags| {
//!     flags.push("-O2".to_string());
//!     Ok(())
//!   });
//! assert_eq!(action.descriptor().to_string(), "add default flags");
//! ```

mod types;

use std::marker::PhantomData;
use std::rc::Rc;

pub use types::{ActionBody, Inputs, RuleResult};

use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::node::ModelNode;
use crate::path::ModelPath;
use crate::projection::{ErasedView, ModelView};
use crate::reference::ModelReference;
use crate::types::ModelType;

/// A rule: subject, inputs, descriptor and body.
#[derive(Clone)]
pub struct ModelAction {
  subject: ModelReference,
  inputs: Vec<ModelReference>,
  descriptor: RuleDescriptor,
  body: ActionBody,
}

impl ModelAction {
  pub fn new(
    subject: ModelReference,
    inputs: Vec<ModelReference>,
    descriptor: impl Into<RuleDescriptor>,
    body: ActionBody,
  ) -> Self {
    Self {
      subject,
      inputs,
      descriptor: descriptor.into(),
      body,
    }
  }

  /// Starts a rule whose subject is viewed as `T`.
  pub fn of<T: ?Sized + 'static>(descriptor: impl Into<RuleDescriptor>) -> ActionBuilder<T> {
    ActionBuilder {
      subject: ModelReference::typed::<T>(None),
      inputs: Vec::new(),
      descriptor: descriptor.into(),
      _marker: PhantomData,
    }
  }

  /// Starts a rule whose body works on the subject node itself.
  pub fn on_node(descriptor: impl Into<RuleDescriptor>) -> NodeActionBuilder {
    NodeActionBuilder {
      subject: ModelReference::untyped_at(None),
      inputs: Vec::new(),
      descriptor: descriptor.into(),
    }
  }

  pub fn subject(&self) -> &ModelReference {
    &self.subject
  }

  pub fn inputs(&self) -> &[ModelReference] {
    &self.inputs
  }

  pub fn descriptor(&self) -> &RuleDescriptor {
    &self.descriptor
  }

  pub fn body(&self) -> &ActionBody {
    &self.body
  }

  /// Returns a copy of this rule with its subject fixed to `path`.
  pub(crate) fn bound_to(mut self, path: ModelPath) -> Self {
    self.subject = self.subject.rebased(path);
    self
  }

  /// Applies `scope` to the subject and to inputs that do not carry a scope of their own.
  pub(crate) fn in_scope(mut self, scope: &ModelPath) -> Self {
    if scope.is_root() {
      return self;
    }
    if self.subject.scope().is_none() {
      self.subject = self.subject.in_scope(scope.clone());
    }
    self.inputs = self
      .inputs
      .into_iter()
      .map(|input| match input.scope() {
        Some(_) => input,
        None => input.in_scope(scope.clone()),
      })
      .collect();
    self
  }
}

impl std::fmt::Debug for ModelAction {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModelAction")
      .field("descriptor", &self.descriptor)
      .field("subject", &self.subject)
      .field("inputs", &self.inputs)
      .finish()
  }
}

fn subject_view<T: ?Sized + 'static>(view: &ErasedView) -> Result<&ModelView<T>> {
  view.downcast::<T>().ok_or_else(|| ModelError::TypeMismatch {
    path: view.node().path().to_string(),
    requested: ModelType::of::<T>().to_string(),
    mode: "subject",
    available: view.node().type_descriptions(false),
  })
}

/// Builder for rules with a typed subject.
pub struct ActionBuilder<T: ?Sized + 'static> {
  subject: ModelReference,
  inputs: Vec<ModelReference>,
  descriptor: RuleDescriptor,
  _marker: PhantomData<fn(&T)>,
}

impl<T: ?Sized + 'static> ActionBuilder<T> {
  /// Binds the subject to `path`. Without a path the rule applies to every node viewable as `T`.
  pub fn path(mut self, path: ModelPath) -> Self {
    self.subject = self.subject.with_path(path);
    self
  }

  /// Describes the subject for diagnostics.
  pub fn described(mut self, description: impl Into<String>) -> Self {
    self.subject = self.subject.described(description);
    self
  }

  /// Declares an input. Inputs are passed to the body in declaration order.
  pub fn input(mut self, input: ModelReference) -> Self {
    self.inputs.push(input);
    self
  }

  fn build(self, body: ActionBody) -> ModelAction {
    ModelAction {
      subject: self.subject,
      inputs: self.inputs,
      descriptor: self.descriptor,
      body,
    }
  }

  /// Mutates the subject. No inputs are passed.
  pub fn action<F>(self, f: F) -> ModelAction
  where
    F: Fn(&mut T) -> RuleResult + 'static,
  {
    self.build(ActionBody::Subject(Rc::new(
      move |_: &ModelNode, view: &ErasedView, _: &Inputs| -> RuleResult {
        subject_view::<T>(view)?.with_mut(|value| f(value))?
      },
    )))
  }

  /// Mutates the subject using a single input viewed as `I`.
  pub fn action_with_input<I, F>(mut self, input: ModelReference, f: F) -> ModelAction
  where
    I: ?Sized + 'static,
    F: Fn(&mut T, &I) -> RuleResult + 'static,
  {
    self.inputs = vec![input];
    self.build(ActionBody::Subject(Rc::new(
      move |_: &ModelNode, view: &ErasedView, inputs: &Inputs| -> RuleResult {
        let input = inputs.get::<I>(0)?.get()?;
        subject_view::<T>(view)?.with_mut(|value| f(value, &*input))?
      },
    )))
  }

  /// Mutates the subject using every declared input.
  pub fn action_with_inputs<F>(self, f: F) -> ModelAction
  where
    F: Fn(&mut T, &Inputs) -> RuleResult + 'static,
  {
    self.build(ActionBody::Subject(Rc::new(
      move |_: &ModelNode, view: &ErasedView, inputs: &Inputs| -> RuleResult {
        subject_view::<T>(view)?.with_mut(|value| f(value, inputs))?
      },
    )))
  }

  /// Reads the subject. Suitable for Validate rules, which only get read-only views.
  pub fn read<F>(self, f: F) -> ModelAction
  where
    F: Fn(&T) -> RuleResult + 'static,
  {
    self.build(ActionBody::Subject(Rc::new(
      move |_: &ModelNode, view: &ErasedView, _: &Inputs| -> RuleResult {
        subject_view::<T>(view)?.with(|value| f(value))?
      },
    )))
  }

  /// Receives the subject view itself, e.g. to keep it past the rule or to borrow it selectively.
  pub fn view<F>(self, f: F) -> ModelAction
  where
    F: Fn(&ModelNode, &ModelView<T>, &Inputs) -> RuleResult + 'static,
  {
    self.build(ActionBody::Subject(Rc::new(
      move |node: &ModelNode, view: &ErasedView, inputs: &Inputs| -> RuleResult {
        f(node, subject_view::<T>(view)?, inputs)
      },
    )))
  }
}

/// Builder for rules whose body works on the subject node.
pub struct NodeActionBuilder {
  subject: ModelReference,
  inputs: Vec<ModelReference>,
  descriptor: RuleDescriptor,
}

impl NodeActionBuilder {
  pub fn path(mut self, path: ModelPath) -> Self {
    self.subject = self.subject.with_path(path);
    self
  }

  /// Restricts type-matched binding to nodes viewable as `T`.
  pub fn subject_type<T: ?Sized + 'static>(mut self) -> Self {
    let path = self.subject.path().cloned();
    self.subject = ModelReference::typed::<T>(path);
    self
  }

  pub fn input(mut self, input: ModelReference) -> Self {
    self.inputs.push(input);
    self
  }

  fn build(self, body: ActionBody) -> ModelAction {
    ModelAction {
      subject: self.subject,
      inputs: self.inputs,
      descriptor: self.descriptor,
      body,
    }
  }

  pub fn action<F>(self, f: F) -> ModelAction
  where
    F: Fn(&ModelNode) -> RuleResult + 'static,
  {
    self.build(ActionBody::Node(Rc::new(f)))
  }

  pub fn action_with_inputs<F>(self, f: F) -> ModelAction
  where
    F: Fn(&ModelNode, &Inputs) -> RuleResult + 'static,
  {
    self.build(ActionBody::NodeInputs(Rc::new(f)))
  }
}
