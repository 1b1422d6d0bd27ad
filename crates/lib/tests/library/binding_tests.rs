use std::cell::RefCell;
use std::rc::Rc;

use cfgraph_lib::{
  ListenerOutcome, ModelAction, ModelActionRole, ModelError, ModelReference, ModelRegistration, ModelRegistry,
  NodePredicate,
};

use super::common::{path, string_element};

fn port_element(registry: &ModelRegistry, name: &str, port: u16) {
  registry
    .register(ModelRegistration::unmanaged(path(name), format!("test {name}"), move || port))
    .unwrap();
}

#[test]
fn type_only_subjects_bind_to_existing_and_future_elements() {
  let registry = ModelRegistry::new();
  port_element(&registry, "http", 80);
  string_element(&registry, "name", "demo");
  registry
    .configure(
      ModelActionRole::Defaults,
      ModelAction::of::<u16>("offset ports").action(|port| {
        *port += 8000;
        Ok(())
      }),
    )
    .unwrap();
  port_element(&registry, "https", 443);

  assert_eq!(*registry.realize::<u16>(&path("http")).unwrap().get().unwrap(), 8080);
  assert_eq!(*registry.realize::<u16>(&path("https")).unwrap().get().unwrap(), 8443);
  assert_eq!(*registry.realize::<String>(&path("name")).unwrap().get().unwrap(), "demo");
}

#[test]
fn type_only_inputs_must_match_exactly_one_element() {
  let registry = ModelRegistry::new();
  port_element(&registry, "http", 80);
  string_element(&registry, "url", "http://localhost");
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<String>("append port")
        .path(path("url"))
        .action_with_input::<u16, _>(ModelReference::of_type::<u16>(), |url, port| {
          url.push_str(&format!(":{port}"));
          Ok(())
        }),
    )
    .unwrap();

  assert_eq!(
    *registry.realize::<String>(&path("url")).unwrap().get().unwrap(),
    "http://localhost:80"
  );

  let registry = ModelRegistry::new();
  port_element(&registry, "http", 80);
  port_element(&registry, "https", 443);
  string_element(&registry, "url", "http://localhost");
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<String>("append port")
        .path(path("url"))
        .action_with_input::<u16, _>(ModelReference::of_type::<u16>(), |_, _| Ok(())),
    )
    .unwrap();

  let err = registry.realize_node(&path("url")).unwrap_err();
  let ModelError::AmbiguousReference { candidates, .. } = err else {
    panic!("expected an ambiguous reference, got {err}");
  };
  assert_eq!(candidates, ["http", "https"]);
}

#[test]
fn scoped_rules_resolve_paths_relative_to_the_scope() {
  let registry = ModelRegistry::new();
  registry
    .register(ModelRegistration::builder(path("server"), "test server").build())
    .unwrap();
  port_element(&registry, "server.port", 80);
  port_element(&registry, "server.admin_port", 0);
  registry
    .configure_in(
      &path("server"),
      ModelActionRole::Mutate,
      ModelAction::of::<u16>("admin port follows port")
        .path(path("admin_port"))
        .action_with_input::<u16, _>(ModelReference::of::<u16>(path("port")), |admin, port| {
          *admin = *port + 1;
          Ok(())
        }),
    )
    .unwrap();

  assert_eq!(
    *registry.realize::<u16>(&path("server.admin_port")).unwrap().get().unwrap(),
    81
  );
}

#[test]
fn listeners_see_current_and_future_children() {
  let registry = ModelRegistry::new();
  registry
    .register(ModelRegistration::builder(path("services"), "test services").build())
    .unwrap();
  port_element(&registry, "services.web", 80);

  let seen = Rc::new(RefCell::new(Vec::new()));
  let log = seen.clone();
  registry
    .add_listener(NodePredicate::children_of(path("services")), move |node| {
      log.borrow_mut().push(node.name().to_string());
      Ok(ListenerOutcome::Continue)
    })
    .unwrap();
  port_element(&registry, "services.db", 5432);
  port_element(&registry, "other", 1);

  assert_eq!(*seen.borrow(), ["web", "db"]);
}

#[test]
fn stopped_listeners_are_not_called_again() {
  let registry = ModelRegistry::new();
  let seen = Rc::new(RefCell::new(Vec::new()));
  let log = seen.clone();
  registry
    .add_listener(NodePredicate::all(), move |node| {
      log.borrow_mut().push(node.name().to_string());
      Ok(ListenerOutcome::Stop)
    })
    .unwrap();
  port_element(&registry, "first", 1);
  port_element(&registry, "second", 2);

  assert_eq!(*seen.borrow(), ["first"]);
}

#[test]
fn unbound_rules_are_listed() {
  let registry = ModelRegistry::new();
  string_element(&registry, "name", "demo");
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<String>("copy version")
        .path(path("name"))
        .action_with_input::<String, _>(ModelReference::of::<String>(path("version")), |_, _| Ok(())),
    )
    .unwrap();

  let err = registry.bind_all_references().unwrap_err();
  let message = err.to_string();
  assert!(message.starts_with("the following model rules could not be bound:"));
  assert!(message.contains("copy version"));
  assert!(message.contains("'version'"));

  string_element(&registry, "version", "1.0");
  registry.bind_all_references().unwrap();
}

#[test]
fn type_only_rules_for_future_elements_run_in_registration_order() {
  let registry = ModelRegistry::new();
  for name in ["A", "B"] {
    registry
      .configure(
        ModelActionRole::Mutate,
        ModelAction::of::<String>(format!("append {name}")).action(move |value| {
          value.push_str(name);
          Ok(())
        }),
      )
      .unwrap();
  }
  string_element(&registry, "x", "");

  assert_eq!(*registry.realize::<String>(&path("x")).unwrap().get().unwrap(), "AB");
}

#[test]
fn listeners_may_add_children_to_the_element_they_see() {
  let registry = ModelRegistry::new();
  let fired = Rc::new(RefCell::new(Vec::new()));
  let log = fired.clone();
  registry
    .add_listener(NodePredicate::path(path("a")), move |node| {
      log.borrow_mut().push(node.path().to_string());
      node.add_link(ModelRegistration::unmanaged(path("a.b"), "nested plugin", || 7u16))?;
      Ok(ListenerOutcome::Continue)
    })
    .unwrap();
  let seen = Rc::new(RefCell::new(Vec::new()));
  let children = seen.clone();
  registry
    .add_listener(NodePredicate::children_of(path("a")), move |node| {
      children.borrow_mut().push(node.path().to_string());
      Ok(ListenerOutcome::Continue)
    })
    .unwrap();

  registry
    .register(ModelRegistration::builder(path("a"), "outer plugin").build())
    .unwrap();

  assert_eq!(*fired.borrow(), ["a"]);
  assert_eq!(*seen.borrow(), ["a.b"]);
  assert!(registry.root().get_link("a").unwrap().has_link("b"));
  assert_eq!(*registry.realize::<u16>(&path("a.b")).unwrap().get().unwrap(), 7);
}
