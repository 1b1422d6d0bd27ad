use std::rc::Rc;

use crate::error::{ModelError, Result};
use crate::node::ModelNode;
use crate::projection::{ErasedView, ModelView};
use crate::types::ModelType;

/// Outcome of a rule body.
pub type RuleResult = Result<()>;

pub type NodeFn = Rc<dyn Fn(&ModelNode) -> RuleResult>;
pub type NodeInputsFn = Rc<dyn Fn(&ModelNode, &Inputs) -> RuleResult>;
pub type SubjectFn = Rc<dyn Fn(&ModelNode, &ErasedView, &Inputs) -> RuleResult>;

/// What a rule does when it runs.
#[derive(Clone)]
pub enum ActionBody {
  /// Works on the subject node directly. Used by Discover and Create rules.
  Node(NodeFn),
  /// Works on the subject node with resolved inputs.
  NodeInputs(NodeInputsFn),
  /// Receives a view of the subject in the mode the role allows.
  Subject(SubjectFn),
}

/// Read-only views of a rule's inputs, in declaration order.
#[derive(Default)]
pub struct Inputs {
  views: Vec<ErasedView>,
}

impl Inputs {
  pub(crate) fn push(&mut self, view: ErasedView) {
    self.views.push(view);
  }

  pub fn len(&self) -> usize {
    self.views.len()
  }

  pub fn is_empty(&self) -> bool {
    self.views.is_empty()
  }

  /// Typed view of input `index`.
  ///
  /// # Errors
  ///
  /// [`ModelError::InvalidInput`] if there is no such input or it was
  /// declared with another type.
  pub fn get<T: ?Sized + 'static>(&self, index: usize) -> Result<&ModelView<T>> {
    self
      .views
      .get(index)
      .and_then(|view| view.downcast::<T>())
      .ok_or_else(|| ModelError::InvalidInput {
        index,
        requested: ModelType::of::<T>().to_string(),
      })
  }

  /// The node behind input `index`. Works for typed and untyped inputs.
  pub fn node(&self, index: usize) -> Option<&ModelNode> {
    self.views.get(index).map(ErasedView::node)
  }

  pub(crate) fn close(&self) {
    for view in &self.views {
      view.close();
    }
  }
}
