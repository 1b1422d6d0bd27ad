//! Model description files.
//!
//! A model file is a JSON document with two lists:
//!
//! ```json
//! {
//!   "elements": [
//!     { "path": "project", "kind": "value", "value": "demo" },
//!     { "path": "flags", "kind": "list", "value": ["-g"] },
//!     { "path": "deps", "kind": "map" }
//!   ],
//!   "rules": [
//!     { "role": "mutate", "subject": "flags", "op": "append", "value": "-O2" },
//!     { "role": "mutate", "subject": "deps", "op": "insert", "name": "serde", "value": "1.0" },
//!     { "role": "validate", "subject": "project", "op": "expect", "value": "demo" }
//!   ]
//! }
//! ```
//!
//! Every element holds JSON: `value` elements a single value, `list`
//! elements an array, `map` elements a [`ModelMap`] of values. Elements are
//! registered in file order, so parents must come before their children.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use cfgraph_lib::collection::{ChildInitializerStrategy, ModelMap, ModelMapProjection};
use cfgraph_lib::projection::UnmanagedProjection;
use cfgraph_lib::{
  ModelAction, ModelActionRole, ModelError, ModelPath, ModelReference, ModelRegistration, ModelRegistry,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
  #[serde(default)]
  pub elements: Vec<ElementSpec>,
  #[serde(default)]
  pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
  Value,
  List,
  Map,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementSpec {
  pub path: ModelPath,
  pub kind: ElementKind,
  #[serde(default)]
  pub value: Option<Value>,
  #[serde(default)]
  pub hidden: bool,
  #[serde(default)]
  pub ephemeral: bool,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
  /// Replace a value.
  Set,
  /// Push onto a list.
  Append,
  /// Replace a value with the value of `input`.
  Copy,
  /// Add the entry `name` to a map.
  Insert,
  /// Fail unless a value equals the given one.
  Expect,
}

impl Operation {
  fn as_str(self) -> &'static str {
    match self {
      Operation::Set => "set",
      Operation::Append => "append",
      Operation::Copy => "copy",
      Operation::Insert => "insert",
      Operation::Expect => "expect",
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
  pub role: ModelActionRole,
  pub subject: ModelPath,
  pub op: Operation,
  #[serde(default)]
  pub value: Option<Value>,
  #[serde(default)]
  pub input: Option<ModelPath>,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
}

/// A registry populated from a model file.
pub struct LoadedModel {
  pub registry: ModelRegistry,
  pub rules: usize,
}

impl ModelFile {
  pub fn read(path: &Path) -> Result<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("Failed to read model file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse model file: {}", path.display()))
  }

  /// Registers every element and rule. `source` prefixes generated rule descriptors.
  pub fn load(self, source: &str) -> Result<LoadedModel> {
    let registry = ModelRegistry::new();
    registry
      .initializers()
      .instances()
      .register_with_projection::<Value, _>(source, Rc::new(value_projection()), |_, _| Ok(Value::Null))?;

    for (index, element) in self.elements.into_iter().enumerate() {
      let descriptor = element
        .description
        .clone()
        .unwrap_or_else(|| format!("{source} elements[{index}]"));
      let path = element.path.clone();
      let registration = element.registration(descriptor)?;
      registry
        .register(registration)
        .with_context(|| format!("Failed to register element '{path}'"))?;
    }

    let rules = self.rules.len();
    for (index, rule) in self.rules.into_iter().enumerate() {
      let descriptor = rule
        .description
        .clone()
        .unwrap_or_else(|| format!("{source} rules[{index}]"));
      let role = rule.role;
      let action = rule.action(descriptor.clone())?;
      registry
        .configure(role, action)
        .with_context(|| format!("Failed to add rule {descriptor}"))?;
    }

    debug!(source, elements = registry.nodes().len(), rules, "loaded model file");
    Ok(LoadedModel { registry, rules })
  }
}

fn describe_value(value: &Value) -> String {
  value.to_string()
}

#[allow(clippy::ptr_arg)]
fn describe_list(items: &Vec<Value>) -> String {
  let items: Vec<String> = items.iter().map(Value::to_string).collect();
  format!("[{}]", items.join(", "))
}

fn value_projection() -> UnmanagedProjection<Value> {
  UnmanagedProjection::<Value>::new().describing(describe_value)
}

fn value_registration(path: ModelPath, descriptor: String, initial: Value) -> ModelRegistration {
  ModelRegistration::builder(path, descriptor)
    .projection(Rc::new(value_projection()))
    .create(move |node| node.set_private_data(initial.clone()))
    .build()
}

impl ElementSpec {
  fn registration(self, descriptor: String) -> Result<ModelRegistration> {
    let builder = match self.kind {
      ElementKind::Value => {
        let initial = self.value.unwrap_or(Value::Null);
        ModelRegistration::builder(self.path, descriptor)
          .projection(Rc::new(value_projection()))
          .create(move |node| node.set_private_data(initial.clone()))
      }
      ElementKind::List => {
        let initial = match self.value {
          None => Vec::new(),
          Some(Value::Array(items)) => items,
          Some(other) => bail!("element '{}' is a list but its value is {other}", self.path),
        };
        ModelRegistration::builder(self.path, descriptor)
          .projection(Rc::new(UnmanagedProjection::<Vec<Value>>::new().describing(describe_list)))
          .create(move |node| node.set_private_data(initial.clone()))
      }
      ElementKind::Map => {
        let entries = match self.value {
          None => serde_json::Map::new(),
          Some(Value::Object(entries)) => entries,
          Some(other) => bail!("element '{}' is a map but its value is {other}", self.path),
        };
        let entry_descriptor = descriptor.clone();
        ModelRegistration::builder(self.path, descriptor)
          .projection(Rc::new(ModelMapProjection::<Value>::new(ChildInitializerStrategy::Registry)))
          .create(move |node| {
            for (name, value) in &entries {
              let path = node.path().child(name)?;
              node.add_link(value_registration(path, entry_descriptor.clone(), value.clone()))?;
            }
            Ok(())
          })
      }
    };
    Ok(builder.hidden(self.hidden).ephemeral(self.ephemeral).build())
  }
}

impl RuleSpec {
  fn action(self, descriptor: String) -> Result<ModelAction> {
    let op = self.op;
    match self.role {
      ModelActionRole::Discover | ModelActionRole::Create => {
        bail!("rule {descriptor}: the {} role is reserved for element registration", self.role)
      }
      ModelActionRole::Validate if op != Operation::Expect => {
        bail!("rule {descriptor}: validate rules cannot {}", op.as_str())
      }
      _ => {}
    }

    let action = match op {
      Operation::Set => {
        let value = self
          .value
          .with_context(|| format!("rule {descriptor}: 'set' requires a 'value'"))?;
        ModelAction::of::<Value>(descriptor)
          .path(self.subject)
          .action(move |target| {
            *target = value.clone();
            Ok(())
          })
      }
      Operation::Append => {
        let value = self
          .value
          .with_context(|| format!("rule {descriptor}: 'append' requires a 'value'"))?;
        ModelAction::of::<Vec<Value>>(descriptor)
          .path(self.subject)
          .action(move |items| {
            items.push(value.clone());
            Ok(())
          })
      }
      Operation::Copy => {
        let input = self
          .input
          .with_context(|| format!("rule {descriptor}: 'copy' requires an 'input' path"))?;
        ModelAction::of::<Value>(descriptor)
          .path(self.subject)
          .action_with_input::<Value, _>(ModelReference::of::<Value>(input), |target, source| {
            *target = source.clone();
            Ok(())
          })
      }
      Operation::Insert => {
        let name = self
          .name
          .with_context(|| format!("rule {descriptor}: 'insert' requires a 'name'"))?;
        let value = self.value.unwrap_or(Value::Null);
        ModelAction::of::<ModelMap<Value>>(descriptor)
          .path(self.subject)
          .action(move |map| {
            let value = value.clone();
            map.create_with(&name, move |entry| {
              *entry = value.clone();
              Ok(())
            })?;
            Ok(())
          })
      }
      Operation::Expect => {
        let expected = self
          .value
          .with_context(|| format!("rule {descriptor}: 'expect' requires a 'value'"))?;
        ModelAction::of::<Value>(descriptor)
          .path(self.subject)
          .read(move |actual| {
            if *actual == expected {
              Ok(())
            } else {
              Err(ModelError::custom(format!("expected {expected} but found {actual}")))
            }
          })
      }
    };
    Ok(action)
  }
}
