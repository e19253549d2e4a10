// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the directed acyclic graph of task names.
//! - [`registry`] owns registered tasks and feeds the graph.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are eligible and cancels dependents on failure.
//! - [`task_info`] provides the per-run state types.

pub mod graph;
pub mod registry;
pub mod scheduler;
pub mod task_info;

pub use graph::DagGraph;
pub use registry::Registry;
pub use scheduler::Scheduler;
pub use task_info::TaskRunState;
