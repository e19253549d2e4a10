// src/exec/mod.rs

//! Action execution layer.
//!
//! - [`launcher`] spawns throttle checks and actions on their own Tokio
//!   tasks, races actions against the deadline and reports back to the
//!   runtime via `RuntimeEvent`s.
//! - [`command`] implements the task contract with shell commands, for
//!   tasks declared in the TOML config.

pub mod command;
pub mod launcher;

pub use command::{CommandAction, CommandForceChange, CommandThrottle};
pub use launcher::{check_throttle, launch};
