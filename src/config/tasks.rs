// src/config/tasks.rs

//! Turn `[task.<name>]` sections into registered command tasks.

use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::model::{ConfigFile, TaskConfig};
use crate::dag::Registry;
use crate::errors::{CachedagError, Result};
use crate::exec::{CommandAction, CommandForceChange, CommandThrottle};
use crate::task::Task;

/// Build a [`Registry`] from a validated config.
///
/// Commands run in `workdir`. Tasks are registered dependencies-first, so
/// duplicate names, duplicate dependencies and cycles surface as registry
/// errors.
pub fn registry_from_config(cfg: &ConfigFile, workdir: &Path) -> Result<Registry> {
    let mut registry = Registry::new();

    for name in registration_order(cfg)? {
        let Some(tc) = cfg.task.get(name) else {
            continue;
        };
        registry.register(task_from_config(name, tc, workdir))?;
    }

    debug!(tasks = registry.len(), "registry built from config");
    Ok(registry)
}

fn task_from_config(name: &str, tc: &TaskConfig, workdir: &Path) -> Task {
    let mut task = Task::new(name, CommandAction::new(name, tc.cmd.clone(), workdir));

    for dep in &tc.after {
        task = task.after(dep);
    }
    if let Some(ref cmd) = tc.force_if {
        task = task.with_force_change(CommandForceChange::new(cmd.clone(), workdir));
    }
    if let Some(ref cmd) = tc.throttle_cmd {
        task = task.with_throttle(CommandThrottle::new(cmd.clone(), workdir));
    }

    task
}

fn registration_order(cfg: &ConfigFile) -> Result<Vec<&str>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    toposort(&graph, None).map_err(|cycle| {
        CachedagError::Cycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))
    })
}
