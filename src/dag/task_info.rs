// src/dag/task_info.rs

//! Per-run task state.

use tokio::time::Instant;

use crate::types::TaskName;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// In the run set, waiting for dependencies or for a throttle check.
    Pending,
    /// Eligible; waiting for its throttle predicate to answer.
    Checking,
    /// Deferred by its throttle predicate until `until`.
    Throttled { until: Instant },
    /// Action launched and not yet resolved.
    Running,
    /// Action succeeded this run.
    Completed,
    /// Action failed or hit the deadline this run.
    Failed,
    /// Never attempted because an upstream task failed.
    Cancelled,
}

impl RunState {
    /// Whether a task in this state still holds up its dependents.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            RunState::Pending
                | RunState::Checking
                | RunState::Throttled { .. }
                | RunState::Running
        )
    }
}

/// Public, read-only view of a task's per-run state.
///
/// Exposed for tests and diagnostics without leaking wake times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not part of this run (treated as already satisfied).
    NotInRun,
    Pending,
    Checking,
    Throttled,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Checking) => TaskRunState::Checking,
            Some(RunState::Throttled { .. }) => TaskRunState::Throttled,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Completed) => TaskRunState::Completed,
            Some(RunState::Failed) => TaskRunState::Failed,
            Some(RunState::Cancelled) => TaskRunState::Cancelled,
        }
    }
}

/// Static task information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    /// Direct dependencies, in declared order.
    pub deps: Vec<TaskName>,
    /// `None` if the task is not in the run set.
    pub run_state: Option<RunState>,
}
