use std::cell::Cell;
use std::rc::Rc;

use cfgraph_lib::{ModelAction, ModelActionRole, ModelPath, ModelRegistration, ModelRegistry};

pub fn path(value: &str) -> ModelPath {
  ModelPath::path(value).unwrap_or_else(|e| panic!("invalid test path {value}: {e}"))
}

/// Registers a `String` element called `name` holding `value`.
pub fn string_element(registry: &ModelRegistry, name: &str, value: &str) {
  let value = value.to_string();
  registry
    .register(ModelRegistration::unmanaged(path(name), format!("test {name}"), move || value.clone()))
    .unwrap();
}

/// Adds a Mutate rule on `subject` that counts how often it runs.
pub fn counting_rule(registry: &ModelRegistry, subject: &str) -> Rc<Cell<usize>> {
  let count = Rc::new(Cell::new(0));
  let counter = count.clone();
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::on_node(format!("count {subject}"))
        .path(path(subject))
        .action(move |_| {
          counter.set(counter.get() + 1);
          Ok(())
        }),
    )
    .unwrap();
  count
}
