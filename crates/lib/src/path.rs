//! Addressing of model elements.
//!
//! A [`ModelPath`] is a sequence of validated name segments. Relative paths
//! render dot-separated (`tasks.build`), absolute paths render with a leading
//! colon and colon separators (`:tasks:build`). The empty path addresses the
//! root of the graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::consts::{ABSOLUTE_SEPARATOR, RELATIVE_SEPARATOR};
use crate::error::{ModelError, Result};

/// Hierarchical address of a node in the model graph.
///
/// Paths order by their absolute flag first and then segment by segment, so
/// parents always sort before their descendants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModelPath {
  absolute: bool,
  segments: Vec<String>,
}

impl ModelPath {
  /// The root path. It has no segments and no parent.
  pub fn root() -> Self {
    Self::default()
  }

  /// Parses and validates a path string.
  ///
  /// A leading `:` makes the path absolute with `:`-separated segments,
  /// otherwise segments are separated by `.`.
  ///
  /// # Errors
  ///
  /// Returns [`ModelError::InvalidPath`] if the string is empty or any
  /// segment is not a valid name.
  ///
  /// # Example
  ///
  /// ```
  /// use cfgraph_lib::ModelPath;
  ///
  /// let path = ModelPath::path("tasks.build").unwrap();
  /// assert_eq!(path.name(), "build");
  /// assert_eq!(path.to_string(), "tasks.build");
  /// ```
  pub fn path(value: &str) -> Result<Self> {
    let (absolute, body) = match value.strip_prefix(ABSOLUTE_SEPARATOR) {
      Some(rest) => (true, rest),
      None => (false, value),
    };
    if body.is_empty() {
      return Err(ModelError::InvalidPath {
        path: value.to_string(),
        reason: "path must contain at least one name".to_string(),
      });
    }
    let separator = if absolute {
      ABSOLUTE_SEPARATOR
    } else {
      RELATIVE_SEPARATOR
    };
    let mut segments = Vec::new();
    for segment in body.split(separator) {
      validate_name(segment).map_err(|err| ModelError::InvalidPath {
        path: value.to_string(),
        reason: err.to_string(),
      })?;
      segments.push(segment.to_string());
    }
    Ok(Self { absolute, segments })
  }

  /// Builds a relative path from already split segments.
  ///
  /// # Errors
  ///
  /// Returns [`ModelError::InvalidName`] for the first invalid segment.
  pub fn from_segments<I, S>(segments: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut path = Self::root();
    for segment in segments {
      let segment = segment.into();
      validate_name(&segment)?;
      path.segments.push(segment);
    }
    Ok(path)
  }

  /// Returns the path of the direct child called `name`.
  ///
  /// # Errors
  ///
  /// Returns [`ModelError::InvalidName`] if `name` is not a valid name.
  pub fn child(&self, name: &str) -> Result<Self> {
    validate_name(name)?;
    let mut child = self.clone();
    child.segments.push(name.to_string());
    Ok(child)
  }

  /// Appends `relative` to this path.
  pub fn descendant(&self, relative: &ModelPath) -> Self {
    if self.is_root() && !self.absolute {
      return relative.clone();
    }
    let mut path = self.clone();
    path.segments.extend(relative.segments.iter().cloned());
    path
  }

  /// Returns the enclosing path, or `None` for the root and for single-segment paths.
  pub fn parent(&self) -> Option<Self> {
    if self.segments.len() <= 1 {
      return None;
    }
    Some(self.truncated())
  }

  /// Returns the enclosing path, treating the root as the parent of top-level paths.
  pub fn parent_or_root(&self) -> Option<Self> {
    if self.segments.is_empty() {
      return None;
    }
    Some(self.truncated())
  }

  fn truncated(&self) -> Self {
    let mut parent = self.clone();
    parent.segments.pop();
    parent
  }

  /// The last segment, or an empty string for the root.
  pub fn name(&self) -> &str {
    self.segments.last().map(String::as_str).unwrap_or("")
  }

  pub fn segments(&self) -> &[String] {
    &self.segments
  }

  /// Number of segments.
  pub fn depth(&self) -> usize {
    self.segments.len()
  }

  pub fn is_root(&self) -> bool {
    self.segments.is_empty()
  }

  pub fn is_absolute(&self) -> bool {
    self.absolute
  }

  /// Returns true if `self` is exactly one segment below `other`.
  pub fn is_direct_child_of(&self, other: &ModelPath) -> bool {
    self.depth() == other.depth() + 1 && self.is_descendant_of(other)
  }

  /// Returns true if `self` lies strictly below `other`.
  pub fn is_descendant_of(&self, other: &ModelPath) -> bool {
    self.absolute == other.absolute
      && self.segments.len() > other.segments.len()
      && self.segments.starts_with(&other.segments)
  }
}

/// Checks that `name` is usable as a path segment.
///
/// Names start with an ASCII letter or `_` and continue with ASCII letters,
/// digits or `_`.
///
/// # Errors
///
/// Returns [`ModelError::InvalidName`] describing the first offending character.
pub fn validate_name(name: &str) -> Result<()> {
  let invalid = |reason: String| ModelError::InvalidName {
    name: name.to_string(),
    reason,
  };
  let mut chars = name.chars();
  let Some(first) = chars.next() else {
    return Err(invalid("name must not be empty".to_string()));
  };
  if !(first.is_ascii_alphabetic() || first == '_') {
    return Err(invalid(format!(
      "first character '{first}' must be an ASCII letter or underscore"
    )));
  }
  if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
    return Err(invalid(format!(
      "character '{bad}' is not allowed; names may only contain ASCII letters, digits and underscores"
    )));
  }
  Ok(())
}

impl fmt::Display for ModelPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.absolute {
      for segment in &self.segments {
        write!(f, "{ABSOLUTE_SEPARATOR}{segment}")?;
      }
      Ok(())
    } else {
      write!(f, "{}", self.segments.join(RELATIVE_SEPARATOR))
    }
  }
}

impl FromStr for ModelPath {
  type Err = ModelError;

  fn from_str(s: &str) -> Result<Self> {
    ModelPath::path(s)
  }
}

impl Serialize for ModelPath {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for ModelPath {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    ModelPath::path(&raw).map_err(serde::de::Error::custom)
  }
}
