// src/config/mod.rs

//! Configuration loading and validation for cachedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants like DAG correctness (`validate.rs`).
//! - Register command tasks from the config (`tasks.rs`).

pub mod loader;
pub mod model;
pub mod tasks;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
pub use tasks::registry_from_config;
pub use validate::validate_config;
