use std::cell::RefCell;
use std::rc::Rc;

use cfgraph_lib::projection::ViewContext;
use cfgraph_lib::{ModelAction, ModelActionRole, ModelError, ModelReference, ModelRegistry, NodeState};

use super::common::{counting_rule, path, string_element};

#[test]
fn rules_run_only_when_the_element_is_needed() {
  let registry = ModelRegistry::new();
  string_element(&registry, "name", "demo");
  let count = counting_rule(&registry, "name");

  assert_eq!(registry.state(&path("name")), Some(NodeState::Known));
  assert_eq!(count.get(), 0);

  registry.at_state(&path("name"), NodeState::Created).unwrap();
  assert_eq!(count.get(), 0);

  registry.realize_node(&path("name")).unwrap();
  registry.realize_node(&path("name")).unwrap();
  assert_eq!(count.get(), 1);
  assert_eq!(registry.state(&path("name")), Some(NodeState::GraphClosed));
}

#[test]
fn at_state_stops_at_the_requested_state() {
  let registry = ModelRegistry::new();
  string_element(&registry, "name", "demo");
  let count = counting_rule(&registry, "name");

  let node = registry.at_state(&path("name"), NodeState::Initialized).unwrap();
  assert_eq!(node.state(), NodeState::Initialized);
  assert_eq!(count.get(), 0);

  let err = registry.at_state(&path("name"), NodeState::Created).unwrap_err();
  assert!(matches!(
    err,
    ModelError::AlreadyPast {
      state: NodeState::Initialized,
      requested: NodeState::Created,
      ..
    }
  ));

  registry.at_state_or_later(&path("name"), NodeState::Created).unwrap();
  assert_eq!(registry.state(&path("name")), Some(NodeState::Initialized));
}

#[test]
fn rules_may_be_bound_before_the_element_exists() {
  let registry = ModelRegistry::new();
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<String>("shout").path(path("name")).action(|name| {
        *name = name.to_uppercase();
        Ok(())
      }),
    )
    .unwrap();
  string_element(&registry, "name", "demo");

  let name = registry.realize::<String>(&path("name")).unwrap();
  assert_eq!(*name.get().unwrap(), "DEMO");
}

#[test]
fn rules_for_passed_roles_are_rejected() {
  let registry = ModelRegistry::new();
  string_element(&registry, "name", "demo");
  registry.at_state(&path("name"), NodeState::Mutated).unwrap();

  let err = registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<String>("too late").path(path("name")).action(|_| Ok(())),
    )
    .unwrap_err();
  assert!(matches!(err, ModelError::NotMutable { .. }));
  assert!(err.to_string().contains("too late"));

  registry
    .configure(
      ModelActionRole::Finalize,
      ModelAction::of::<String>("still in time").path(path("name")).action(|_| Ok(())),
    )
    .unwrap();
}

#[test]
fn inputs_are_fully_realized_before_the_rule_runs() {
  let registry = ModelRegistry::new();
  string_element(&registry, "greeting", "hello");
  string_element(&registry, "name", "world");
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<String>("greet")
        .path(path("greeting"))
        .action_with_input::<String, _>(ModelReference::of::<String>(path("name")), |greeting, name| {
          greeting.push_str(", ");
          greeting.push_str(name);
          Ok(())
        }),
    )
    .unwrap();
  registry
    .configure(
      ModelActionRole::Finalize,
      ModelAction::of::<String>("capitalize").path(path("name")).action(|name| {
        *name = name.to_uppercase();
        Ok(())
      }),
    )
    .unwrap();

  let greeting = registry.realize::<String>(&path("greeting")).unwrap();
  assert_eq!(*greeting.get().unwrap(), "hello, WORLD");
  assert_eq!(registry.state(&path("name")), Some(NodeState::GraphClosed));
}

#[test]
fn views_close_when_the_rule_completes() {
  let registry = ModelRegistry::new();
  string_element(&registry, "name", "demo");
  let stash: Rc<RefCell<Option<ViewContext>>> = Rc::new(RefCell::new(None));
  let kept = stash.clone();
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<String>("keep view")
        .path(path("name"))
        .view(move |_, view, _| {
          assert!(!view.is_closed());
          *kept.borrow_mut() = Some(view.context().clone());
          Ok(())
        }),
    )
    .unwrap();

  registry.realize_node(&path("name")).unwrap();

  let context = stash.borrow_mut().take().unwrap();
  assert!(context.is_closed());
  let err = context.assert_can_mutate().unwrap_err();
  assert!(matches!(err, ModelError::ViewClosed { .. }));
  assert!(err.to_string().contains("keep view"));
}

#[test]
fn realized_views_are_read_only() {
  let registry = ModelRegistry::new();
  string_element(&registry, "name", "demo");

  let name = registry.realize::<String>(&path("name")).unwrap();
  assert!(!name.is_writable());
  assert!(matches!(name.get_mut().unwrap_err(), ModelError::ReadOnly { .. }));
}

#[test]
fn viewing_as_an_unsupported_type_lists_the_alternatives() {
  let registry = ModelRegistry::new();
  string_element(&registry, "name", "demo");

  let err = registry.realize::<i64>(&path("name")).unwrap_err();
  assert!(matches!(err, ModelError::TypeMismatch { .. }));
  assert!(err.to_string().contains("String"));
}

#[test]
fn unknown_paths() {
  let registry = ModelRegistry::new();

  assert!(registry.find::<String>(&path("missing")).unwrap().is_none());
  assert!(matches!(
    registry.realize_node(&path("missing")).unwrap_err(),
    ModelError::UnboundReference { .. }
  ));
  assert!(matches!(
    registry.at_state(&path("missing"), NodeState::Created).unwrap_err(),
    ModelError::UnboundReference { .. }
  ));
}

#[test]
fn removed_elements_take_their_rules_with_them() {
  let registry = ModelRegistry::new();
  string_element(&registry, "name", "demo");
  counting_rule(&registry, "name");

  assert!(registry.remove(&path("name")).is_some());
  assert!(registry.node(&path("name")).is_none());
  registry.bind_all_references().unwrap();
  assert!(registry.remove(&path("name")).is_none());
}

#[test]
fn cycles_are_reported_with_the_chain() {
  let registry = ModelRegistry::new();
  string_element(&registry, "a", "a");
  string_element(&registry, "b", "b");
  string_element(&registry, "c", "c");
  for (subject, input) in [("a", "b"), ("b", "c"), ("c", "a")] {
    registry
      .configure(
        ModelActionRole::Mutate,
        ModelAction::of::<String>(format!("copy {input} into {subject}"))
          .path(path(subject))
          .action_with_input::<String, _>(ModelReference::of::<String>(path(input)), |target, source| {
            target.push_str(source);
            Ok(())
          }),
      )
      .unwrap();
  }

  let err = registry.check_cycles().unwrap_err();
  assert_eq!(err.to_string(), "cycle detected while realizing model elements: a -> b -> c -> a");

  let err = registry.realize_node(&path("b")).unwrap_err();
  let ModelError::CycleDetected { chain } = err else {
    panic!("expected a cycle, got {err}");
  };
  assert_eq!(chain, "b -> c -> a -> b");
}
