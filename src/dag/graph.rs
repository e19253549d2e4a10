// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{CachedagError, Result};
use crate::types::TaskName;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies, in insertion order.
    deps: Vec<TaskName>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// In-memory DAG keyed by task name.
///
/// Edges read "dependent depends on dependency". Acyclicity is enforced at
/// insertion time by [`DagGraph::add_edge`], so every graph value is a DAG.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskName, DagNode>,
}

impl DagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add_node(&mut self, name: &str) {
        self.nodes.entry(name.to_string()).or_default();
    }

    /// Record that `dependent` depends on `dependency`.
    ///
    /// Missing nodes are created. Fails with [`CachedagError::Cycle`] if the
    /// edge would close a cycle, in which case the graph is unchanged.
    pub fn add_edge(&mut self, dependent: &str, dependency: &str) -> Result<()> {
        if dependent == dependency {
            return Err(CachedagError::Cycle(format!(
                "task '{dependent}' cannot depend on itself"
            )));
        }

        // A cycle appears iff `dependency` already (transitively) depends on
        // `dependent`.
        if self
            .transitive_dependencies_of(dependency)
            .contains(dependent)
        {
            return Err(CachedagError::Cycle(format!(
                "edge '{dependent}' -> '{dependency}' would close a cycle"
            )));
        }

        self.add_node(dependent);
        self.add_node(dependency);

        if let Some(node) = self.nodes.get_mut(dependent) {
            if !node.deps.iter().any(|d| d == dependency) {
                node.deps.push(dependency.to_string());
            }
        }
        if let Some(node) = self.nodes.get_mut(dependency) {
            if !node.dependents.iter().any(|d| d == dependent) {
                node.dependents.push(dependent.to_string());
            }
        }

        Ok(())
    }

    /// Remove a node and all its edges. Used to roll back a failed
    /// registration.
    pub(crate) fn remove_node(&mut self, name: &str) {
        if self.nodes.remove(name).is_none() {
            return;
        }
        for node in self.nodes.values_mut() {
            node.deps.retain(|d| d != name);
            node.dependents.retain(|d| d != name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Immediate dependencies of a task, in insertion order.
    pub fn direct_dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn direct_dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Every task that directly or indirectly depends on `name`.
    /// `name` itself is never included.
    pub fn transitive_dependents_of(&self, name: &str) -> BTreeSet<TaskName> {
        self.walk(name, |g, n| g.direct_dependents_of(n))
    }

    /// Every task that `name` directly or indirectly depends on.
    pub fn transitive_dependencies_of(&self, name: &str) -> BTreeSet<TaskName> {
        self.walk(name, |g, n| g.direct_dependencies_of(n))
    }

    fn walk<'a, F>(&'a self, root: &str, next: F) -> BTreeSet<TaskName>
    where
        F: Fn(&'a Self, &str) -> &'a [TaskName],
    {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = next(self, root).iter().map(|s| s.as_str()).collect();

        while let Some(name) = stack.pop() {
            if !seen.insert(name.to_string()) {
                continue;
            }
            stack.extend(next(self, name).iter().map(|s| s.as_str()));
        }

        seen
    }

    /// Dependencies-first ordering of all tasks.
    pub fn topological_order(&self) -> Vec<TaskName> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.nodes.keys() {
            graph.add_node(name.as_str());
        }
        for (name, node) in self.nodes.iter() {
            for dep in node.deps.iter() {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(str::to_string).collect(),
            // add_edge rejects cycles, so this cannot happen; fall back to
            // name order rather than panic.
            Err(_) => self.nodes.keys().cloned().collect(),
        }
    }
}
