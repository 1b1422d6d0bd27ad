//! Lazy realization: driving nodes through their states.
//!
//! A node reaches a state by running, role by role, every rule bound to
//! it for the roles up to that state. Rules run in the order they were
//! bound; rules bound to the role currently running are picked up in the
//! same pass. Inputs are realized before a rule runs and every view handed
//! to the rule is closed once it returns, whether it succeeded or not.
//!
//! `GraphClosed` additionally closes every child. Requests that re-enter a
//! node still being realized, for a state it has not reached, are reported
//! as cycles.
//!
//! A failing rule is consumed and never retried. The node keeps the
//! failure and every later request to move it forward fails with it.

use tracing::{debug, trace, warn};

use super::RegistryInner;
use crate::action::{ActionBody, Inputs, ModelAction};
use crate::error::{ModelError, Result};
use crate::node::{ModelActionRole, ModelNode, NodeState, RuleFailure};
use crate::projection::ErasedView;
use crate::reference::ModelReference;

impl RegistryInner {
  /// Brings `node` to at least `target`.
  pub(crate) fn transition(&self, node: &ModelNode, target: NodeState) -> Result<()> {
    if node.is_discovered() && node.state() >= target {
      return Ok(());
    }
    if let Some(failure) = node.failure() {
      return Err(ModelError::RuleFailed {
        path: node.path().to_string(),
        state: node.state(),
        role: failure.role,
        descriptor: failure.descriptor.to_string(),
        message: failure.message,
      });
    }
    let path = node.path().clone();
    if self.config.detect_cycles {
      let realizing = self.realizing.borrow();
      if let Some(start) = realizing.iter().position(|candidate| *candidate == path) {
        let mut chain: Vec<String> = realizing[start..].iter().map(ToString::to_string).collect();
        chain.push(path.to_string());
        return Err(ModelError::CycleDetected {
          chain: chain.join(" -> "),
        });
      }
    }
    trace!(path = %path, from = %node.state(), to = %target, "realizing model element");
    self.realizing.borrow_mut().push(path);
    let result = self.advance(node, target);
    self.realizing.borrow_mut().pop();
    result
  }

  fn advance(&self, node: &ModelNode, target: NodeState) -> Result<()> {
    for role in ModelActionRole::ALL {
      let reached = role.target_state();
      if reached > target {
        break;
      }
      if role == ModelActionRole::Discover {
        if !node.is_discovered() {
          self.run_role(node, role)?;
          node.mark_discovered();
          trace!(path = %node.path(), "model element discovered");
        }
        continue;
      }
      if node.state() >= reached {
        continue;
      }
      self.run_role(node, role)?;
      node.advance_to(reached);
      debug!(path = %node.path(), state = %reached, "model element state advanced");
    }

    if target == NodeState::GraphClosed && node.state() < NodeState::GraphClosed {
      for child in node.all_links() {
        self.transition(&child, NodeState::GraphClosed)?;
      }
      node.advance_to(NodeState::GraphClosed);
      debug!(path = %node.path(), state = %NodeState::GraphClosed, "model element state advanced");
    }
    Ok(())
  }

  fn run_role(&self, node: &ModelNode, role: ModelActionRole) -> Result<()> {
    let mut executed = 0usize;
    loop {
      let next = self.rules.borrow_mut().pop(node.path(), role);
      let Some(action) = next else {
        break;
      };
      self.execute(node, role, &action)?;
      executed += 1;
    }
    if executed > 0 {
      debug!(path = %node.path(), role = %role, rules = executed, "model rules complete");
    }
    Ok(())
  }

  fn execute(&self, node: &ModelNode, role: ModelActionRole, action: &ModelAction) -> Result<()> {
    trace!(path = %node.path(), role = %role, rule = %action.descriptor(), "running model rule");
    let result = self.invoke(node, role, action);
    if let Err(err) = &result {
      warn!(
        path = %node.path(),
        role = %role,
        rule = %action.descriptor(),
        error = %err,
        "model rule failed"
      );
      node.record_failure(RuleFailure {
        role,
        descriptor: action.descriptor().clone(),
        message: err.to_string(),
      });
    }
    result
  }

  fn invoke(&self, node: &ModelNode, role: ModelActionRole, action: &ModelAction) -> Result<()> {
    let inputs = self.resolve_inputs(action)?;
    let result = match action.body() {
      ActionBody::Node(body) => body(node),
      ActionBody::NodeInputs(body) => body(node, &inputs),
      ActionBody::Subject(body) => action
        .subject()
        .open(node, action.descriptor(), role.subject_writable())
        .and_then(|subject| {
          let result = body(node, &subject, &inputs);
          subject.close();
          result
        }),
    };
    inputs.close();
    result
  }

  fn resolve_inputs(&self, action: &ModelAction) -> Result<Inputs> {
    let mut inputs = Inputs::default();
    for reference in action.inputs() {
      match self.open_input(reference, action) {
        Ok(view) => inputs.push(view),
        Err(err) => {
          trace!(rule = %action.descriptor(), opened = inputs.len(), "closing inputs opened before failure");
          inputs.close();
          return Err(err);
        }
      }
    }
    Ok(inputs)
  }

  fn open_input(&self, reference: &ModelReference, action: &ModelAction) -> Result<ErasedView> {
    let input = self.resolve(reference, action.descriptor())?;
    let state = reference.state().unwrap_or(self.config.default_input_state);
    self.transition(&input, state)?;
    reference.open(&input, action.descriptor(), false)
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use tracing_test::traced_test;

  use crate::util::testutil::{p, string_node};
  use crate::{ModelAction, ModelActionRole, ModelError, ModelReference, ModelRegistration, ModelRegistry, NodeState};

  fn record(log: &Rc<RefCell<Vec<String>>>, role: ModelActionRole) -> ModelAction {
    let log = log.clone();
    ModelAction::on_node(format!("record {role}"))
      .path(p("subject"))
      .action(move |_| {
        log.borrow_mut().push(role.to_string());
        Ok(())
      })
  }

  #[test]
  fn roles_run_in_lifecycle_order() {
    let registry = ModelRegistry::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for role in [
      ModelActionRole::Validate,
      ModelActionRole::Finalize,
      ModelActionRole::Mutate,
      ModelActionRole::Initialize,
      ModelActionRole::Defaults,
    ] {
      registry.configure(role, record(&log, role)).unwrap();
    }
    registry.register(string_node("subject", "value")).unwrap();

    registry.realize_node(&p("subject")).unwrap();
    assert_eq!(
      *log.borrow(),
      ["defaults", "initialize", "mutate", "finalize", "validate"]
    );
  }

  #[test]
  fn rules_within_a_role_run_in_registration_order() {
    let registry = ModelRegistry::new();
    registry.register(string_node("subject", "")).unwrap();
    for name in ["A", "B"] {
      registry
        .configure(
          ModelActionRole::Mutate,
          ModelAction::of::<String>(format!("append {name}"))
            .path(p("subject"))
            .action(move |value| {
              value.push_str(name);
              Ok(())
            }),
        )
        .unwrap();
    }

    let value = registry.realize::<String>(&p("subject")).unwrap();
    assert_eq!(*value.get().unwrap(), "AB");
  }

  #[test]
  fn rules_bound_while_a_role_runs_join_that_role() {
    let registry = ModelRegistry::new();
    registry.register(string_node("subject", "a")).unwrap();
    let inner = registry.clone();
    registry
      .configure(
        ModelActionRole::Mutate,
        ModelAction::of::<String>("append b").path(p("subject")).action(move |value| {
          value.push('b');
          inner.configure(
            ModelActionRole::Mutate,
            ModelAction::of::<String>("append c").path(p("subject")).action(|value| {
              value.push('c');
              Ok(())
            }),
          )
        }),
      )
      .unwrap();

    let value = registry.realize::<String>(&p("subject")).unwrap();
    assert_eq!(*value.get().unwrap(), "abc");
  }

  #[test]
  fn re_entering_a_node_is_a_cycle() {
    let registry = ModelRegistry::new();
    registry.register(string_node("a", "a")).unwrap();
    registry.register(string_node("b", "b")).unwrap();
    for (subject, input) in [("a", "b"), ("b", "a")] {
      registry
        .configure(
          ModelActionRole::Mutate,
          ModelAction::of::<String>(format!("copy {input}"))
            .path(p(subject))
            .action_with_input::<String, _>(ModelReference::of::<String>(p(input)), |target, source| {
              target.push_str(source);
              Ok(())
            }),
        )
        .unwrap();
    }

    let err = registry.realize_node(&p("a")).unwrap_err();
    let ModelError::CycleDetected { chain } = err else {
      panic!("expected a cycle, got {err}");
    };
    assert_eq!(chain, "a -> b -> a");
  }

  #[test]
  fn graph_closed_closes_children_first() {
    let registry = ModelRegistry::new();
    registry
      .register(ModelRegistration::builder(p("parent"), "test parent").build())
      .unwrap();
    registry.register(string_node("parent.child", "value")).unwrap();

    registry.at_state(&p("parent"), NodeState::SelfClosed).unwrap();
    assert_eq!(registry.state(&p("parent.child")), Some(NodeState::Known));

    registry.realize_node(&p("parent")).unwrap();
    assert_eq!(registry.state(&p("parent.child")), Some(NodeState::GraphClosed));
  }

  #[test]
  #[traced_test]
  fn state_changes_are_logged() {
    let registry = ModelRegistry::new();
    registry.register(string_node("subject", "value")).unwrap();
    registry.realize_node(&p("subject")).unwrap();

    assert!(logs_contain("model element state advanced"));
    assert!(logs_contain("graph-closed"));
  }

  #[test]
  #[traced_test]
  fn failing_rules_are_logged() {
    let registry = ModelRegistry::new();
    registry.register(string_node("subject", "value")).unwrap();
    registry
      .configure(
        ModelActionRole::Mutate,
        ModelAction::of::<String>("reject").path(p("subject")).action(|_| Err(ModelError::custom("rejected"))),
      )
      .unwrap();

    let err = registry.realize_node(&p("subject")).unwrap_err();
    assert_eq!(err.to_string(), "rejected");
    assert_eq!(registry.state(&p("subject")), Some(NodeState::Initialized));
    assert!(logs_contain("model rule failed"));
  }

  #[test]
  fn failed_nodes_stay_put_on_later_requests() {
    let registry = ModelRegistry::new();
    registry.register(string_node("subject", "value")).unwrap();
    registry
      .configure(
        ModelActionRole::Mutate,
        ModelAction::of::<String>("reject").path(p("subject")).action(|_| Err(ModelError::custom("rejected"))),
      )
      .unwrap();

    assert!(registry.realize_node(&p("subject")).is_err());
    let err = registry.realize_node(&p("subject")).unwrap_err();
    let ModelError::RuleFailed {
      state, role, descriptor, ..
    } = &err
    else {
      panic!("expected the earlier failure, got {err}");
    };
    assert_eq!(*state, NodeState::Initialized);
    assert_eq!(*role, ModelActionRole::Mutate);
    assert_eq!(descriptor, "reject");
    assert!(err.to_string().contains("rejected"));
    assert_eq!(registry.state(&p("subject")), Some(NodeState::Initialized));

    let failure = registry.node(&p("subject")).unwrap().failure().unwrap();
    assert_eq!(failure.role, ModelActionRole::Mutate);
    registry.at_state(&p("subject"), NodeState::Initialized).unwrap();
  }

  #[test]
  #[traced_test]
  fn inputs_opened_before_a_failing_input_are_closed() {
    let registry = ModelRegistry::new();
    for name in ["subject", "first", "second"] {
      registry.register(string_node(name, name)).unwrap();
    }
    registry
      .configure(
        ModelActionRole::Finalize,
        ModelAction::of::<String>("break second").path(p("second")).action(|_| Err(ModelError::custom("broken"))),
      )
      .unwrap();
    registry
      .configure(
        ModelActionRole::Mutate,
        ModelAction::of::<String>("join")
          .path(p("subject"))
          .input(ModelReference::of::<String>(p("first")))
          .input(ModelReference::of::<String>(p("second")))
          .action_with_inputs(|_, _| Ok(())),
      )
      .unwrap();

    let err = registry.realize_node(&p("subject")).unwrap_err();
    assert_eq!(err.to_string(), "broken");
    assert!(logs_contain("closing inputs opened before failure"));
    assert!(logs_contain("opened=1"));
  }
}
