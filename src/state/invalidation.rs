// src/state/invalidation.rs

//! Decides which tasks' cached outputs are stale.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::dag::Registry;
use crate::state::store::StateStore;
use crate::task::Task;
use crate::types::{outputs_equal, TaskName};

/// Why a task was selected to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// No state entry at all.
    NoEntry,
    /// The task never completed successfully.
    NeverSucceeded,
    /// A dependency's output changed since the task last ran.
    DependencyChanged(TaskName),
    /// The declared dependency list no longer matches the recorded snapshot.
    DependenciesRedeclared,
    /// The force-change predicate asked for a re-run.
    Forced,
}

/// Compute the set of tasks that must run.
///
/// Per task the first matching rule wins: missing entry, null output,
/// changed dependency output, force-change predicate. The result is then
/// closed over transitive dependents.
pub async fn compute_run_set(registry: &Registry, store: &StateStore) -> BTreeSet<TaskName> {
    let mut run_set = BTreeSet::new();

    for task in registry.tasks() {
        if let Some(reason) = stale_reason(task, store).await {
            debug!(task = %task.name(), ?reason, "task must run");
            run_set.insert(task.name().to_string());
        }
    }

    expand_dependents(registry, run_set)
}

/// First matching staleness rule for one task, or `None` if up to date.
pub async fn stale_reason(task: &Task, store: &StateStore) -> Option<StaleReason> {
    let Some(entry) = store.entry(task.name()) else {
        return Some(StaleReason::NoEntry);
    };

    if entry.output.is_none() {
        return Some(StaleReason::NeverSucceeded);
    }

    for snap in &entry.dependencies {
        if !outputs_equal(store.output_of(&snap.name), snap.output.as_ref()) {
            return Some(StaleReason::DependencyChanged(snap.name.clone()));
        }
    }

    let recorded = entry.dependencies.iter().map(|s| s.name.as_str());
    if !recorded.eq(task.dependencies().iter().map(|s| s.as_str())) {
        return Some(StaleReason::DependenciesRedeclared);
    }

    match task.force_change().await {
        Ok(true) => Some(StaleReason::Forced),
        Ok(false) => None,
        Err(e) => {
            warn!(
                task = %task.name(),
                error = %e,
                "force-change predicate failed; treating as forced"
            );
            Some(StaleReason::Forced)
        }
    }
}

/// Close `run_set` over transitive dependents, repeating until no new task
/// is added.
pub fn expand_dependents(registry: &Registry, mut run_set: BTreeSet<TaskName>) -> BTreeSet<TaskName> {
    let graph = registry.graph();
    loop {
        let additions: Vec<TaskName> = run_set
            .iter()
            .flat_map(|name| graph.transitive_dependents_of(name))
            .filter(|dep| !run_set.contains(dep))
            .collect();

        if additions.is_empty() {
            return run_set;
        }

        for name in additions {
            debug!(task = %name, "dependent of a stale task must run");
            run_set.insert(name);
        }
    }
}
