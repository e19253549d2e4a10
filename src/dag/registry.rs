// src/dag/registry.rs

//! Explicit task registry: one value per orchestrator instance.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::dag::graph::DagGraph;
use crate::errors::{CachedagError, Result};
use crate::task::Task;
use crate::types::TaskName;

/// Registered tasks keyed by unique name, plus the dependency graph they
/// induce.
#[derive(Debug, Default)]
pub struct Registry {
    graph: DagGraph,
    tasks: BTreeMap<TaskName, Arc<Task>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task and return a handle to it.
    ///
    /// The handle can be passed to `Task::after` for later registrations.
    /// On error the registry is left exactly as before.
    pub fn register(&mut self, task: Task) -> Result<Arc<Task>> {
        let name = task.name().to_string();

        if self.tasks.contains_key(&name) {
            return Err(CachedagError::DuplicateName(name));
        }

        let mut seen = HashSet::new();
        for dep in task.dependencies() {
            if !seen.insert(dep.as_str()) {
                return Err(CachedagError::DuplicateDependency {
                    task: name,
                    dependency: dep.clone(),
                });
            }
        }

        for dep in task.dependencies() {
            if !self.tasks.contains_key(dep) && dep != &name {
                return Err(CachedagError::UnknownDependency {
                    task: name,
                    dependency: dep.clone(),
                });
            }
        }

        self.graph.add_node(&name);
        for dep in task.dependencies() {
            if let Err(e) = self.graph.add_edge(&name, dep) {
                self.graph.remove_node(&name);
                return Err(e);
            }
        }

        debug!(task = %name, deps = ?task.dependencies(), "registered task");

        let task = Arc::new(task);
        self.tasks.insert(name, Arc::clone(&task));
        Ok(task)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All registered tasks, sorted by name.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.tasks.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }
}
