// src/state/mod.rs

//! Durable task state and cache invalidation.
//!
//! - [`store`] loads, reconciles and persists the state file.
//! - [`invalidation`] compares the store against the registry to compute
//!   the set of tasks that must run.

pub mod invalidation;
pub mod store;

pub use invalidation::{compute_run_set, expand_dependents, stale_reason, StaleReason};
pub use store::{DependencySnapshot, StateStore, TaskStateEntry, STATE_FILE_PATH};
