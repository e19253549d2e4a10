// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum CachedagError {
    #[error("Task already registered: {0}")]
    DuplicateName(TaskName),

    #[error("Task '{task}' lists dependency '{dependency}' more than once")]
    DuplicateDependency { task: TaskName, dependency: TaskName },

    #[error("Task '{task}' depends on unregistered task '{dependency}'")]
    UnknownDependency { task: TaskName, dependency: TaskName },

    #[error("Cycle detected in DAG: {0}")]
    Cycle(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("State file {path} is corrupt: {reason}")]
    StateCorrupt { path: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CachedagError {
    /// Whether this error is raised while building the registry (fatal,
    /// never recovered).
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            CachedagError::DuplicateName(_)
                | CachedagError::DuplicateDependency { .. }
                | CachedagError::UnknownDependency { .. }
                | CachedagError::Cycle(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CachedagError>;
