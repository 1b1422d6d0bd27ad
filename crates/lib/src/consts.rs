//! Constants shared across the model graph.

/// Separator between segments of a relative model path.
pub const RELATIVE_SEPARATOR: &str = ".";

/// Prefix and separator of an absolute model path.
pub const ABSOLUTE_SEPARATOR: &str = ":";

/// Name the initializer registry uses for itself in error messages.
pub const INITIALIZER_REGISTRY_NAME: &str = "the node initializer registry";

/// Name of the instance factory owned by every initializer registry.
pub const INSTANCE_FACTORY_NAME: &str = "the instance factory";

/// Descriptor attached to the root node of every registry.
pub const ROOT_DESCRIPTOR: &str = "<root>";
