use cfgraph_lib::managed::{ManagedProjection, ManagedProperty, ManagedState, ManagedStruct};
use cfgraph_lib::{ModelAction, ModelActionRole, ModelError, ModelReport, ModelRegistry, NodeState, Result};

use super::common::path;

struct Database {
  state: ManagedState,
}

impl ManagedStruct for Database {
  fn properties() -> Vec<ManagedProperty> {
    vec![
      ManagedProperty::value("host", String::from("localhost")),
      ManagedProperty::value("port", 5432i64),
    ]
  }

  fn from_state(state: ManagedState) -> Self {
    Database { state }
  }
}

impl Database {
  fn host(&self) -> Result<String> {
    self.state.get("host")
  }

  fn port(&self) -> Result<i64> {
    self.state.get("port")
  }

  fn set_host(&self, host: &str) -> Result<()> {
    self.state.set("host", host.to_string())
  }
}

struct Service {
  state: ManagedState,
}

impl ManagedStruct for Service {
  fn properties() -> Vec<ManagedProperty> {
    vec![
      ManagedProperty::value("replicas", 1i64),
      ManagedProperty::structured::<Database>("database"),
    ]
  }

  fn from_state(state: ManagedState) -> Self {
    Service { state }
  }
}

impl Service {
  fn replicas(&self) -> Result<i64> {
    self.state.get("replicas")
  }

  fn database(&self) -> Result<Database> {
    self.state.nested("database")
  }
}

fn registry_with_service() -> ModelRegistry {
  let registry = ModelRegistry::new();
  registry
    .register(ManagedProjection::<Service>::registration(path("service"), "service plugin"))
    .unwrap();
  registry
}

#[test]
fn properties_are_elements_of_their_own() {
  let registry = registry_with_service();
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<i64>("scale out")
        .path(path("service.replicas"))
        .action(|replicas| {
          *replicas = 3;
          Ok(())
        }),
    )
    .unwrap();
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<Service>("use primary").path(path("service")).action(|service| {
        service.database()?.set_host("db.internal")
      }),
    )
    .unwrap();

  let service = registry.realize::<Service>(&path("service")).unwrap();
  let service = service.get().unwrap();
  assert_eq!(service.replicas().unwrap(), 3);
  let database = service.database().unwrap();
  assert_eq!(database.host().unwrap(), "db.internal");
  assert_eq!(database.port().unwrap(), 5432);
  assert_eq!(
    registry.state(&path("service.database.port")),
    Some(NodeState::GraphClosed)
  );
}

#[test]
fn realized_structs_reject_writes() {
  let registry = registry_with_service();

  let service = registry.realize::<Service>(&path("service")).unwrap();
  let database = service.get().unwrap().database().unwrap();
  let err = database.set_host("elsewhere").unwrap_err();
  assert!(matches!(err, ModelError::ReadOnly { .. }));
  assert_eq!(database.host().unwrap(), "localhost");
}

#[test]
fn writes_must_match_the_property_type() {
  let registry = registry_with_service();
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<Service>("bad port").path(path("service")).action(|service| {
        service.database()?.state.set("port", String::from("5432"))
      }),
    )
    .unwrap();

  let err = registry.realize_node(&path("service")).unwrap_err();
  assert!(matches!(err, ModelError::TypeMismatch { mode: "property", .. }));
}

#[test]
fn report_lists_every_property() {
  let registry = registry_with_service();
  registry.realize_node(&path("service")).unwrap();

  let report = ModelReport::capture(&registry);
  let paths: Vec<String> = report.nodes.iter().map(|node| node.path.to_string()).collect();
  assert_eq!(
    paths,
    [
      "service",
      "service.database",
      "service.database.host",
      "service.database.port",
      "service.replicas",
    ]
  );
  let port = report.nodes.iter().find(|node| node.path == path("service.database.port")).unwrap();
  assert_eq!(port.value.as_deref(), Some("5432"));
}
