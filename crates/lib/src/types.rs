//! Runtime type identity for model views and backing data.

use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker for references that accept any element.
enum Untyped {}

/// Identifies the type of a view or of a node's private data.
///
/// Equality and hashing use the [`TypeId`]; ordering uses the type name so
/// collections of types iterate in a stable, readable order.
#[derive(Clone, Copy)]
pub struct ModelType {
  id: TypeId,
  name: &'static str,
}

impl ModelType {
  pub fn of<T: ?Sized + 'static>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }

  /// The type carried by references that match any element.
  pub fn untyped() -> Self {
    Self::of::<Untyped>()
  }

  pub fn is_untyped(&self) -> bool {
    self.id == TypeId::of::<Untyped>()
  }

  pub fn type_id(&self) -> TypeId {
    self.id
  }

  /// Fully qualified type name.
  pub fn full_name(&self) -> &'static str {
    self.name
  }

  /// Type name with module paths stripped, e.g. `Vec<String>`.
  pub fn display_name(&self) -> String {
    if self.is_untyped() {
      return "Object".to_string();
    }
    short_name(self.name)
  }

  /// Returns true if a reference of this type can be satisfied by a value of `other`.
  pub fn is_assignable_from(&self, other: &ModelType) -> bool {
    self.is_untyped() || self.id == other.id
  }
}

fn short_name(full: &str) -> String {
  let mut out = String::with_capacity(full.len());
  let mut ident = String::new();
  for ch in full.chars() {
    if ch.is_alphanumeric() || ch == '_' || ch == ':' {
      ident.push(ch);
    } else {
      push_last_segment(&mut out, &ident);
      ident.clear();
      out.push(ch);
    }
  }
  push_last_segment(&mut out, &ident);
  out
}

fn push_last_segment(out: &mut String, ident: &str) {
  out.push_str(ident.rsplit("::").next().unwrap_or(ident));
}

impl PartialEq for ModelType {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for ModelType {}

impl Hash for ModelType {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl PartialOrd for ModelType {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for ModelType {
  fn cmp(&self, other: &Self) -> Ordering {
    self.name.cmp(other.name).then_with(|| self.id.cmp(&other.id))
  }
}

impl fmt::Debug for ModelType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ModelType({})", self.name)
  }
}

impl fmt::Display for ModelType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display_name())
  }
}
