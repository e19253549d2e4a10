// src/state/store.rs

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dag::Registry;
use crate::errors::{CachedagError, Result};
use crate::types::{Output, TaskName};

/// Default location of the state file, relative to the project root.
pub const STATE_FILE_PATH: &str = ".cachedag/state.json";

/// What a dependency's output was when the owning task last ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencySnapshot {
    pub name: TaskName,
    pub output: Option<Output>,
}

/// Persisted record for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStateEntry {
    #[serde(default)]
    pub dependencies: Vec<DependencySnapshot>,
    /// Last successful output; `None` if the task never succeeded.
    #[serde(default)]
    pub output: Option<Output>,
}

impl TaskStateEntry {
    /// Fresh entry for a task that has never run.
    pub fn fresh(dependencies: &[TaskName]) -> Self {
        Self {
            dependencies: dependencies
                .iter()
                .map(|name| DependencySnapshot {
                    name: name.clone(),
                    output: None,
                })
                .collect(),
            output: None,
        }
    }
}

/// Durable mapping from task name to its [`TaskStateEntry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateStore {
    entries: BTreeMap<TaskName, TaskStateEntry>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted state, falling back to an empty store on any read or
    /// parse failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load_strict(path) {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "state file unreadable; starting from an empty store"
                );
                Self::default()
            }
        }
    }

    /// Load persisted state; a missing file yields an empty store, any
    /// other failure is an error.
    pub fn load_strict(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file; starting from an empty store");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let store: StateStore =
            serde_json::from_str(&contents).map_err(|e| CachedagError::StateCorrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), entries = store.entries.len(), "loaded state file");
        Ok(store)
    }

    /// Insert a fresh entry for every registered task missing from the
    /// store. Existing entries are left untouched.
    pub fn reconcile(&mut self, registry: &Registry) {
        for task in registry.tasks() {
            if !self.entries.contains_key(task.name()) {
                debug!(task = %task.name(), "no state entry; inserting fresh entry");
                self.entries.insert(
                    task.name().to_string(),
                    TaskStateEntry::fresh(task.dependencies()),
                );
            }
        }
    }

    /// Serialize the full store, replacing any previous file.
    ///
    /// Writes a sibling temporary file first and renames it into place.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = tmp_path(path);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        info!(path = %path.display(), entries = self.entries.len(), "state persisted");
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Option<&TaskStateEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &TaskStateEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Current stored output of a task.
    pub fn output_of(&self, name: &str) -> Option<&Output> {
        self.entries.get(name).and_then(|e| e.output.as_ref())
    }

    pub fn insert(&mut self, name: impl Into<TaskName>, entry: TaskStateEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Record a successful run: store `output` and refresh the dependency
    /// snapshot to the dependencies' current outputs.
    pub fn record_success(&mut self, name: &str, dependencies: &[TaskName], output: Output) {
        let snapshot = dependencies
            .iter()
            .map(|dep| DependencySnapshot {
                name: dep.clone(),
                output: self.output_of(dep).cloned(),
            })
            .collect();

        self.entries.insert(
            name.to_string(),
            TaskStateEntry {
                dependencies: snapshot,
                output: Some(output),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
