// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{DEFAULT_DEADLINE, DEFAULT_TICK, RuntimeOptions};
use crate::state::STATE_FILE_PATH;
use crate::types::parse_duration;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// state_file = ".cachedag/state.json"
/// deadline = "3m"
///
/// [task.compile]
/// cmd = "./compile.sh"
///
/// [task.deploy]
/// cmd = "./deploy.sh"
/// after = ["compile"]
/// force_if = "test -f .redeploy"
/// ```
///
/// Use [`ConfigFile`] (validated) rather than this type outside of loading.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration: dependencies exist, the DAG is acyclic and
/// durations parse.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    /// Build without validation. Callers must have validated `raw` first.
    pub(crate) fn new_unchecked(config: ConfigSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { config, task }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// State file path, relative to the config file's directory.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// Per-action deadline, e.g. `"3m"`.
    #[serde(default = "default_deadline")]
    pub deadline: String,

    /// Runtime loop tick, e.g. `"50ms"`.
    #[serde(default = "default_tick")]
    pub tick: String,
}

fn default_state_file() -> String {
    STATE_FILE_PATH.to_string()
}

fn default_deadline() -> String {
    format!("{}s", DEFAULT_DEADLINE.as_secs())
}

fn default_tick() -> String {
    format!("{}ms", DEFAULT_TICK.as_millis())
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            deadline: default_deadline(),
            tick: default_tick(),
        }
    }
}

impl ConfigSection {
    pub fn deadline(&self) -> Duration {
        parse_duration(&self.deadline).unwrap_or(DEFAULT_DEADLINE)
    }

    pub fn tick(&self) -> Duration {
        parse_duration(&self.tick).unwrap_or(DEFAULT_TICK)
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            tick: self.tick(),
            deadline: self.deadline(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// The command to execute. Its last stdout line is the task output.
    pub cmd: String,

    /// Dependencies, in the order their outputs are passed to `cmd`.
    #[serde(default)]
    pub after: Vec<String>,

    /// Command whose success (exit 0) forces a re-run.
    #[serde(default)]
    pub force_if: Option<String>,

    /// Command printing how many milliseconds to defer the task.
    #[serde(default)]
    pub throttle_cmd: Option<String>,
}
