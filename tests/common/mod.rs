#![allow(dead_code)]

use std::collections::BTreeSet;

use cachedag::dag::{DagGraph, Registry};
use cachedag::engine::{ConfirmationGate, GateDecision, RunOutcome, RunReport};
use cachedag::errors::Result;
use cachedag::state::StateStore;
use cachedag::TaskName;
use cachedag_test_utils::builders::{increment, ForceFlag};
use cachedag_test_utils::recorder::Recorder;

pub use cachedag_test_utils::init_tracing;

/// A (no deps) -> `{value: 1}`; B (after A) -> `{value: A.value + 1}`.
pub fn a_then_b(rec: &Recorder, force_a: &ForceFlag) -> Registry {
    let mut registry = Registry::new();
    let a = registry
        .register(force_a.attach(increment("A", rec)))
        .expect("register A");
    registry
        .register(increment("B", rec).after(&a))
        .expect("register B");
    registry
}

/// Unwrap a finished run, panicking with the actual outcome otherwise.
pub fn finished(outcome: RunOutcome) -> (RunReport, StateStore) {
    match outcome {
        RunOutcome::Finished { report, store } => (report, store),
        other => panic!("expected a finished run, got {other:?}"),
    }
}

pub fn names(names: &[&str]) -> BTreeSet<TaskName> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Gate that records what it was offered and answers with a fixed decision.
pub struct ScriptedGate {
    pub offered: Option<BTreeSet<TaskName>>,
    pub answer: Option<GateDecision>,
}

impl ScriptedGate {
    pub fn new(answer: GateDecision) -> Self {
        Self {
            offered: None,
            answer: Some(answer),
        }
    }
}

impl ConfirmationGate for ScriptedGate {
    fn confirm(&mut self, run_set: &BTreeSet<TaskName>, _graph: &DagGraph) -> Result<GateDecision> {
        self.offered = Some(run_set.clone());
        Ok(self.answer.take().unwrap_or(GateDecision::Abort))
    }
}
