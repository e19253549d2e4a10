// src/engine/gate.rs

//! Confirmation gate: the last chance to edit the run set before anything
//! executes.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::block_in_place;
use tracing::{debug, info};

use crate::dag::DagGraph;
use crate::errors::Result;
use crate::types::TaskName;

/// Decision returned by a [`ConfirmationGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Run exactly this set.
    Proceed(BTreeSet<TaskName>),
    /// Stop before any task executes.
    Abort,
}

/// Given the computed run set, approve, edit or abort it.
pub trait ConfirmationGate {
    fn confirm(&mut self, run_set: &BTreeSet<TaskName>, graph: &DagGraph) -> Result<GateDecision>;
}

/// Approves the computed run set unchanged (`--yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl ConfirmationGate for AutoConfirm {
    fn confirm(&mut self, run_set: &BTreeSet<TaskName>, _graph: &DagGraph) -> Result<GateDecision> {
        Ok(GateDecision::Proceed(run_set.clone()))
    }
}

/// Add `name` and everything that transitively depends on it.
pub fn add_with_dependents(run_set: &mut BTreeSet<TaskName>, graph: &DagGraph, name: &str) {
    run_set.insert(name.to_string());
    run_set.extend(graph.transitive_dependents_of(name));
}

/// Remove `name` and everything that transitively depends on it.
pub fn remove_with_dependents(run_set: &mut BTreeSet<TaskName>, graph: &DagGraph, name: &str) {
    run_set.remove(name);
    for dep in graph.transitive_dependents_of(name) {
        run_set.remove(&dep);
    }
}

/// Line-oriented interactive gate.
///
/// Accepted answers:
/// - `y` / `yes`: proceed
/// - `n` / `no` / empty line / EOF: abort
/// - `+name`: add `name` and its transitive dependents
/// - `-name`: remove `name` and its transitive dependents
pub struct PromptGate<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn print_set(&mut self, run_set: &BTreeSet<TaskName>) -> Result<()> {
        writeln!(self.output, "tasks to run ({}):", run_set.len())?;
        for name in run_set {
            writeln!(self.output, "  - {name}")?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> ConfirmationGate for PromptGate<R, W> {
    fn confirm(&mut self, run_set: &BTreeSet<TaskName>, graph: &DagGraph) -> Result<GateDecision> {
        let mut selected = run_set.clone();

        loop {
            self.print_set(&selected)?;
            write!(self.output, "proceed? [y/N, +task, -task]: ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                info!("confirmation input closed; aborting");
                return Ok(GateDecision::Abort);
            }
            let answer = line.trim();
            debug!(answer, "confirmation answer");

            match answer {
                "y" | "yes" => return Ok(GateDecision::Proceed(selected)),
                "" | "n" | "no" => return Ok(GateDecision::Abort),
                _ => {
                    if let Some(name) = answer.strip_prefix('+') {
                        let name = name.trim();
                        if graph.contains(name) {
                            add_with_dependents(&mut selected, graph, name);
                        } else {
                            writeln!(self.output, "unknown task '{name}'")?;
                        }
                    } else if let Some(name) = answer.strip_prefix('-') {
                        remove_with_dependents(&mut selected, graph, name.trim());
                    } else {
                        writeln!(self.output, "unrecognised answer '{answer}'")?;
                    }
                }
            }
        }
    }
}

/// Wraps a gate that blocks on IO (such as [`PromptGate`] over stdin).
///
/// On a multi-threaded Tokio runtime the inner gate runs under
/// `block_in_place`, so the worker thread is handed off while it waits.
/// Elsewhere the inner gate is called directly.
pub struct BlockingGate<G> {
    inner: G,
}

impl<G: ConfirmationGate> BlockingGate<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

impl<G: ConfirmationGate> ConfirmationGate for BlockingGate<G> {
    fn confirm(&mut self, run_set: &BTreeSet<TaskName>, graph: &DagGraph) -> Result<GateDecision> {
        let multi_thread = Handle::try_current()
            .is_ok_and(|h| h.runtime_flavor() == RuntimeFlavor::MultiThread);

        if multi_thread {
            block_in_place(|| self.inner.confirm(run_set, graph))
        } else {
            self.inner.confirm(run_set, graph)
        }
    }
}
