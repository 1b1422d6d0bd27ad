use std::fmt;
use std::rc::Rc;

/// Human-readable identifier of the rule that registered or configured something.
///
/// Descriptors show up in every error about a rule, so nested rules append
/// to their parent's descriptor (`outer > inner`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleDescriptor(Rc<str>);

impl RuleDescriptor {
  pub fn new(value: impl AsRef<str>) -> Self {
    Self(Rc::from(value.as_ref()))
  }

  /// Returns a descriptor for a rule nested inside this one.
  pub fn append(&self, child: impl fmt::Display) -> Self {
    Self::new(format!("{} > {child}", self.0))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RuleDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for RuleDescriptor {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl From<String> for RuleDescriptor {
  fn from(value: String) -> Self {
    Self::new(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn append_nests_descriptors() {
    let outer = RuleDescriptor::new("things");
    assert_eq!(outer.append("create(a)").to_string(), "things > create(a)");
  }
}
