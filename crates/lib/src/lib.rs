//! cfgraph-lib: a lazy, rule-driven configuration graph
//!
//! The model is a tree of nodes addressed by [`ModelPath`]. Each node moves
//! through the [`NodeState`] lifecycle as the rules bound to it run, and it
//! only moves when something needs it:
//! - `ModelRegistry`: registration, rule binding and on-demand realization
//! - `ModelNode`: state, projections, child links and private data of one node
//! - `ModelAction`: a rule with a subject, inputs and a body, applied in a `ModelActionRole`
//! - `ModelView`: the typed, rule-scoped view a rule body works through
//! - `ModelMap` and managed structs: nodes whose children make up their value
//! - `ModelReport`: a snapshot of the graph for display

pub mod action;
pub mod collection;
pub mod consts;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod init;
pub mod managed;
pub mod node;
pub mod path;
pub mod projection;
pub mod reference;
pub mod registry;
pub mod report;
pub mod types;
pub mod util;

pub use action::{ActionBody, Inputs, ModelAction, RuleResult};
pub use collection::ModelMap;
pub use descriptor::RuleDescriptor;
pub use error::{ModelError, Result};
pub use graph::{ListenerOutcome, NodePredicate};
pub use node::{ModelActionRole, ModelNode, NodeState, RuleFailure};
pub use path::ModelPath;
pub use projection::{ModelProjection, ModelView};
pub use reference::ModelReference;
pub use registry::{ModelRegistration, ModelRegistry, RegistryConfig};
pub use report::ModelReport;
pub use types::ModelType;
