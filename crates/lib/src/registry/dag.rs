//! Static view of the dependencies between pending rules.
//!
//! Realization discovers cycles only when it walks into them. The
//! [`RuleDependencyGraph`] instead looks at every rule that has not run
//! yet and links each input node to the subject it configures, so cycles
//! can be reported up front.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use super::RegistryInner;
use crate::descriptor::RuleDescriptor;
use crate::error::{ModelError, Result};
use crate::path::ModelPath;

/// Directed graph of model paths. An edge runs from an input to the subject of a rule that reads it.
pub struct RuleDependencyGraph {
  graph: DiGraph<ModelPath, RuleDescriptor>,
  indices: HashMap<ModelPath, NodeIndex>,
}

impl RuleDependencyGraph {
  pub(crate) fn from_registry(registry: &RegistryInner) -> Self {
    let mut dag = Self {
      graph: DiGraph::new(),
      indices: HashMap::new(),
    };

    for node in registry.graph.nodes() {
      if !node.is_root() {
        dag.index(node.path());
      }
    }

    let pending = registry.rules.borrow().pending();
    for (subject, _, action) in pending {
      let dependent = dag.index(&subject);
      for input in action.inputs() {
        // Type-only inputs count once they resolve; unresolvable ones are reported by binding.
        let Some(path) = input
          .resolved_path()
          .or_else(|| registry.resolve(input, action.descriptor()).ok().map(|node| node.path().clone()))
        else {
          continue;
        };
        let dependency = dag.index(&path);
        dag.graph.add_edge(dependency, dependent, action.descriptor().clone());
      }
    }
    dag
  }

  fn index(&mut self, path: &ModelPath) -> NodeIndex {
    if let Some(&idx) = self.indices.get(path) {
      return idx;
    }
    let idx = self.graph.add_node(path.clone());
    self.indices.insert(path.clone(), idx);
    idx
  }

  /// Fails if any rule depends, directly or transitively, on its own subject.
  ///
  /// # Errors
  ///
  /// [`ModelError::CycleDetected`] naming the paths on the first cycle found.
  pub fn verify_acyclic(&self) -> Result<()> {
    if toposort(&self.graph, None).is_ok() {
      return Ok(());
    }
    let component = kosaraju_scc(&self.graph)
      .into_iter()
      .find(|component| component.len() > 1 || self.graph.contains_edge(component[0], component[0]))
      .unwrap_or_default();
    let Some(&start) = component.iter().min_by_key(|&&idx| &self.graph[idx]) else {
      return Err(ModelError::CycleDetected {
        chain: String::from("(unknown)"),
      });
    };
    let mut chain = vec![start];
    self.walk_cycle(start, &component, &mut chain);
    let paths: Vec<String> = chain.iter().map(|&idx| self.graph[idx].to_string()).collect();
    Err(ModelError::CycleDetected {
      chain: paths.join(" -> "),
    })
  }

  /// Extends `chain` from each subject to an input it reads, staying inside `component`,
  /// until it returns to its first node.
  fn walk_cycle(&self, current: NodeIndex, component: &[NodeIndex], chain: &mut Vec<NodeIndex>) -> bool {
    let mut next: Vec<NodeIndex> = self
      .graph
      .neighbors_directed(current, Direction::Incoming)
      .filter(|idx| component.contains(idx))
      .collect();
    next.sort_by_key(|&idx| &self.graph[idx]);
    next.dedup();
    for idx in next {
      if idx == chain[0] {
        chain.push(idx);
        return true;
      }
      if chain.contains(&idx) {
        continue;
      }
      chain.push(idx);
      if self.walk_cycle(idx, component, chain) {
        return true;
      }
      chain.pop();
    }
    false
  }

  /// Paths in an order where inputs come before the subjects that read them.
  ///
  /// # Errors
  ///
  /// [`ModelError::CycleDetected`] if there is no such order.
  pub fn topological_order(&self) -> Result<Vec<ModelPath>> {
    self.verify_acyclic()?;
    let sorted = toposort(&self.graph, None).map_err(|_| ModelError::CycleDetected {
      chain: String::from("(unknown)"),
    })?;
    Ok(sorted.into_iter().map(|idx| self.graph[idx].clone()).collect())
  }

  /// Paths read by rules configuring `path`.
  pub fn dependencies(&self, path: &ModelPath) -> Vec<ModelPath> {
    self.neighbors(path, Direction::Incoming)
  }

  /// Paths configured by rules that read `path`.
  pub fn dependents(&self, path: &ModelPath) -> Vec<ModelPath> {
    self.neighbors(path, Direction::Outgoing)
  }

  fn neighbors(&self, path: &ModelPath, direction: Direction) -> Vec<ModelPath> {
    let Some(&idx) = self.indices.get(path) else {
      return Vec::new();
    };
    let mut paths: Vec<ModelPath> = self
      .graph
      .neighbors_directed(idx, direction)
      .map(|neighbor| self.graph[neighbor].clone())
      .collect();
    paths.sort();
    paths.dedup();
    paths
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  pub fn edge_count(&self) -> usize {
    self.graph.edge_count()
  }
}
