// src/engine/mod.rs

//! Orchestration engine for cachedag.
//!
//! This module ties together:
//! - the invalidation pass that computes the run set
//! - the confirmation gate that may edit it
//! - the tick-driven runtime loop that reacts to task outcomes
//!
//! The per-run state machine lives in `dag::scheduler`; the async shell is
//! implemented in [`runtime`], and [`orchestrator`] is the entry point.

use std::time::Duration;

use crate::types::{Output, TaskName};

/// Hard deadline for a single action.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(180);

/// Interval between runtime loop iterations.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Outcome of a launched action.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(Output),
    Failed(String),
    DeadlineExceeded(Duration),
}

/// Runtime options.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Loop tick interval.
    pub tick: Duration,
    /// How long to wait for an action before recording failure.
    pub deadline: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

/// Events flowing into the runtime from launched actions.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// An action resolved (or its deadline passed).
    TaskFinished { task: TaskName, outcome: TaskOutcome },
    /// A throttle predicate answered. `Duration::ZERO` means launch now.
    ThrottleDecided { task: TaskName, wait: Duration },
}

pub mod gate;
pub mod orchestrator;
pub mod report;
pub mod runtime;

pub use gate::{AutoConfirm, BlockingGate, ConfirmationGate, GateDecision, PromptGate};
pub use orchestrator::{execute, RunOutcome};
pub use report::RunReport;
pub use runtime::Runtime;
