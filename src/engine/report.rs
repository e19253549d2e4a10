// src/engine/report.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::types::TaskName;

/// Outcome of a single run, split into disjoint task sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Actions that succeeded this run.
    pub completed: BTreeSet<TaskName>,
    /// Actions that failed or hit the deadline, with the failure message.
    pub failed: BTreeMap<TaskName, String>,
    /// Never attempted because an upstream task failed.
    pub cancelled: BTreeSet<TaskName>,
    /// Registered tasks outside the run set.
    pub up_to_date: BTreeSet<TaskName>,
    /// Tasks still unresolved when the loop stopped. Empty for a run that
    /// ran to completion.
    pub unfinished: BTreeSet<TaskName>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty() && self.unfinished.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "completed ({}):", self.completed.len())?;
        for name in &self.completed {
            writeln!(f, "  - {name}")?;
        }
        if !self.failed.is_empty() {
            writeln!(f, "failed ({}):", self.failed.len())?;
            for (name, reason) in &self.failed {
                writeln!(f, "  - {name}: {reason}")?;
            }
        }
        if !self.cancelled.is_empty() {
            writeln!(f, "cancelled ({}):", self.cancelled.len())?;
            for name in &self.cancelled {
                writeln!(f, "  - {name}")?;
            }
        }
        if !self.unfinished.is_empty() {
            writeln!(f, "unfinished ({}):", self.unfinished.len())?;
            for name in &self.unfinished {
                writeln!(f, "  - {name}")?;
            }
        }
        write!(f, "up to date ({})", self.up_to_date.len())
    }
}
