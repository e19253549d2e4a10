// src/dag/scheduler.rs

use std::collections::{BTreeMap, BTreeSet};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::task_info::{RunState, TaskInfo, TaskRunState};
use crate::engine::report::RunReport;
use crate::types::TaskName;

/// Per-run state machine over the DAG.
///
/// It is responsible for:
/// - remembering which tasks are part of the run
/// - deciding which pending tasks have all dependencies resolved
/// - tracking throttled tasks and their wake times
/// - marking tasks completed / failed
/// - cancelling the transitive dependents of a failed task
///
/// It performs no IO; the async shell in `engine::runtime` drives it.
#[derive(Debug)]
pub struct Scheduler<'g> {
    graph: &'g DagGraph,
    tasks: BTreeMap<TaskName, TaskInfo>,
    failures: BTreeMap<TaskName, String>,
}

impl<'g> Scheduler<'g> {
    /// Start a run over `run_set`. Every graph task outside the run set is
    /// considered satisfied.
    pub fn new(graph: &'g DagGraph, run_set: &BTreeSet<TaskName>) -> Self {
        for name in run_set {
            if !graph.contains(name) {
                warn!(task = %name, "run set names an unknown task; ignoring");
            }
        }

        let tasks = graph
            .tasks()
            .map(|name| {
                let info = TaskInfo {
                    name: name.to_string(),
                    deps: graph.direct_dependencies_of(name).to_vec(),
                    run_state: run_set.contains(name).then_some(RunState::Pending),
                };
                (name.to_string(), info)
            })
            .collect();

        Self {
            graph,
            tasks,
            failures: BTreeMap::new(),
        }
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Whether every dependency of `task` in this run is resolved.
    ///
    /// Returns `None` if the task is unknown.
    pub fn deps_resolved(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        Some(self.deps_resolved_for_info(info))
    }

    // Dependencies are looked up transitively: a task outside the run set
    // does not hide an unresolved task further upstream.
    fn deps_resolved_for_info(&self, info: &TaskInfo) -> bool {
        self.graph
            .transitive_dependencies_of(&info.name)
            .iter()
            .all(|dep| match self.tasks.get(dep) {
                Some(d) => !d.run_state.is_some_and(|s| s.is_unresolved()),
                None => {
                    warn!(task = %info.name, dep = %dep, "dependency missing from tasks map");
                    false
                }
            })
    }

    /// Move throttled tasks whose wake time has passed back to `Pending`.
    ///
    /// Returns the tasks that woke up.
    pub fn wake_throttled(&mut self, now: Instant) -> Vec<TaskName> {
        let mut woken = Vec::new();
        for info in self.tasks.values_mut() {
            if let Some(RunState::Throttled { until }) = info.run_state {
                if until <= now {
                    info.run_state = Some(RunState::Pending);
                    debug!(task = %info.name, "throttle elapsed; back to Pending");
                    woken.push(info.name.clone());
                }
            }
        }
        woken
    }

    /// Pending tasks whose dependencies are all resolved, in name order.
    pub fn eligible_tasks(&self) -> Vec<TaskName> {
        self.tasks
            .values()
            .filter(|info| {
                matches!(info.run_state, Some(RunState::Pending))
                    && self.deps_resolved_for_info(info)
            })
            .map(|info| info.name.clone())
            .collect()
    }

    /// The throttle predicate of `task` is being consulted.
    pub fn mark_checking(&mut self, task: &str) {
        self.transition(task, RunState::Checking);
    }

    pub fn mark_throttled(&mut self, task: &str, until: Instant) {
        self.transition(task, RunState::Throttled { until });
    }

    pub fn mark_running(&mut self, task: &str) {
        self.transition(task, RunState::Running);
    }

    pub fn mark_completed(&mut self, task: &str) {
        self.transition(task, RunState::Completed);
    }

    /// Mark `task` failed and cancel every transitive dependent still
    /// waiting in this run.
    ///
    /// Returns the newly cancelled tasks.
    pub fn mark_failed(&mut self, task: &str, reason: impl Into<String>) -> Vec<TaskName> {
        if !self.transition(task, RunState::Failed) {
            return Vec::new();
        }
        self.failures.insert(task.to_string(), reason.into());

        let mut cancelled = Vec::new();
        for name in self.graph.transitive_dependents_of(task) {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };
            match info.run_state {
                Some(RunState::Pending)
                | Some(RunState::Checking)
                | Some(RunState::Throttled { .. }) => {
                    info.run_state = Some(RunState::Cancelled);
                    debug!(
                        task = %info.name,
                        upstream = %task,
                        "cancelling dependent due to upstream failure"
                    );
                    cancelled.push(name);
                }
                Some(RunState::Running) => {
                    warn!(task = %info.name, upstream = %task, "dependent already running");
                }
                // Already terminal, or outside this run.
                Some(RunState::Completed)
                | Some(RunState::Failed)
                | Some(RunState::Cancelled)
                | None => {}
            }
        }

        if !cancelled.is_empty() {
            info!(task = %task, ?cancelled, "cancelled dependents of failed task");
        }

        cancelled
    }

    /// Earliest wake time among throttled tasks, if any.
    pub fn next_wake(&self) -> Option<Instant> {
        self.tasks
            .values()
            .filter_map(|info| match info.run_state {
                Some(RunState::Throttled { until }) => Some(until),
                _ => None,
            })
            .min()
    }

    /// `true` once nothing is `Pending`, `Checking`, `Throttled` or `Running`.
    pub fn is_finished(&self) -> bool {
        !self
            .tasks
            .values()
            .any(|info| info.run_state.is_some_and(|s| s.is_unresolved()))
    }

    /// Summarise the run.
    pub fn report(&self) -> RunReport {
        let mut report = RunReport::default();
        for info in self.tasks.values() {
            let name = info.name.clone();
            match info.run_state {
                None => {
                    report.up_to_date.insert(name);
                }
                Some(RunState::Completed) => {
                    report.completed.insert(name);
                }
                Some(RunState::Failed) => {
                    let reason = self.failures.get(&name).cloned().unwrap_or_default();
                    report.failed.insert(name, reason);
                }
                Some(RunState::Cancelled) => {
                    report.cancelled.insert(name);
                }
                Some(RunState::Pending)
                | Some(RunState::Checking)
                | Some(RunState::Throttled { .. })
                | Some(RunState::Running) => {
                    report.unfinished.insert(name);
                }
            }
        }
        report
    }

    fn transition(&mut self, task: &str, next: RunState) -> bool {
        match self.tasks.get_mut(task) {
            Some(info) if info.run_state.is_some() => {
                debug!(task = %task, from = ?info.run_state, to = ?next, "task state transition");
                info.run_state = Some(next);
                true
            }
            Some(_) => {
                warn!(task = %task, "transition for task outside the run set; ignoring");
                false
            }
            None => {
                warn!(task = %task, "transition for unknown task; ignoring");
                false
            }
        }
    }
}
