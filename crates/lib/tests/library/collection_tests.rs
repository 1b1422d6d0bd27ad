use cfgraph_lib::{ModelAction, ModelActionRole, ModelError, ModelMap, ModelReference, ModelRegistry, NodeState};

use super::common::{path, string_element};

#[derive(Debug)]
struct Task {
  name: String,
  steps: Vec<String>,
}

fn registry_with_tasks() -> ModelRegistry {
  let registry = ModelRegistry::new();
  registry
    .initializers()
    .instances()
    .register::<Task, _>("tasks plugin", |_, name| {
      Ok(Task {
        name: name.clone(),
        steps: Vec::new(),
      })
    })
    .unwrap();
  registry
    .register(ModelMap::<Task>::registration(path("tasks"), "tasks plugin"))
    .unwrap();
  registry
}

fn declare<F>(registry: &ModelRegistry, configure: F)
where
  F: Fn(&ModelMap<Task>) -> cfgraph_lib::Result<()> + 'static,
{
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<ModelMap<Task>>("declare tasks")
        .path(path("tasks"))
        .action(move |tasks| configure(tasks)),
    )
    .unwrap();
}

fn steps(registry: &ModelRegistry, name: &str) -> Vec<String> {
  let tasks = registry.realize::<ModelMap<Task>>(&path("tasks")).unwrap();
  let tasks = tasks.get().unwrap();
  let task = tasks.get(name).unwrap().unwrap();
  let task = task.get().unwrap();
  task.steps.clone()
}

#[test]
fn element_rules_can_use_other_elements_as_inputs() {
  let registry = registry_with_tasks();
  string_element(&registry, "version", "1.2.0");
  registry
    .configure(
      ModelActionRole::Mutate,
      ModelAction::of::<Task>("stamp version")
        .path(path("tasks.package"))
        .action_with_input::<String, _>(ModelReference::of::<String>(path("version")), |task, version| {
          task.steps.push(format!("{} {version}", task.name));
          Ok(())
        }),
    )
    .unwrap();
  declare(&registry, |tasks| {
    tasks.create("package")?;
    Ok(())
  });

  assert_eq!(steps(&registry, "package"), ["package 1.2.0"]);
  assert_eq!(registry.state(&path("version")), Some(NodeState::GraphClosed));
}

#[test]
fn type_only_rules_reach_elements_created_later() {
  let registry = registry_with_tasks();
  registry
    .configure(
      ModelActionRole::Finalize,
      ModelAction::of::<Task>("audit").action(|task| {
        task.steps.push("audited".to_string());
        Ok(())
      }),
    )
    .unwrap();
  declare(&registry, |tasks| {
    tasks.create("build")?;
    tasks.create_with("test", |task| {
      task.steps.push("run".to_string());
      Ok(())
    })?;
    Ok(())
  });

  assert_eq!(steps(&registry, "build"), ["audited"]);
  assert_eq!(steps(&registry, "test"), ["run", "audited"]);
}

#[test]
fn elements_are_writable_through_the_declaring_rule() {
  let registry = registry_with_tasks();
  declare(&registry, |tasks| {
    tasks.named("build", |task| {
      task.steps.push("named".to_string());
      Ok(())
    })?;
    tasks.create("build")?;
    let build = tasks.get("build")?.ok_or_else(|| ModelError::custom("build was not created"))?;
    assert!(build.is_writable());
    assert_eq!(build.node().state(), NodeState::Initialized);
    build.get_mut()?.steps.push("direct".to_string());
    Ok(())
  });

  assert_eq!(steps(&registry, "build"), ["direct", "named"]);
}

#[test]
fn unknown_element_types_fail_the_declaring_rule() {
  let registry = ModelRegistry::new();
  registry
    .register(ModelMap::<Task>::registration(path("tasks"), "tasks plugin"))
    .unwrap();
  declare(&registry, |tasks| {
    tasks.create("build")?;
    Ok(())
  });

  let err = registry.realize_node(&path("tasks")).unwrap_err();
  assert!(matches!(err, ModelError::UnknownType { .. }));
  assert!(err.to_string().contains("Task"));
}
