// src/engine/orchestrator.rs

use std::collections::BTreeSet;

use tracing::info;

use crate::dag::Registry;
use crate::errors::Result;
use crate::state::{compute_run_set, StateStore};
use crate::types::TaskName;

use super::gate::{ConfirmationGate, GateDecision};
use super::report::RunReport;
use super::runtime::Runtime;
use super::RuntimeOptions;

/// Result of [`execute`].
#[derive(Debug)]
pub enum RunOutcome {
    /// Every task is up to date; nothing executed. State need not be written.
    NothingToRun,
    /// The gate declined the run; nothing executed. State must not be written.
    Aborted { run_set: BTreeSet<TaskName> },
    /// The run completed (possibly with failures). The returned store
    /// should be persisted.
    Finished { report: RunReport, store: StateStore },
}

/// One orchestrator run: reconcile the store, compute the run set, pass it
/// through the gate and execute it.
pub async fn execute(
    registry: &Registry,
    mut store: StateStore,
    gate: &mut dyn ConfirmationGate,
    options: RuntimeOptions,
) -> Result<RunOutcome> {
    store.reconcile(registry);

    let run_set = compute_run_set(registry, &store).await;
    if run_set.is_empty() {
        info!("all tasks up to date; nothing to run");
        return Ok(RunOutcome::NothingToRun);
    }
    info!(?run_set, "computed run set");

    let run_set = match gate.confirm(&run_set, registry.graph())? {
        GateDecision::Proceed(set) => set,
        GateDecision::Abort => {
            info!("run aborted at confirmation");
            return Ok(RunOutcome::Aborted { run_set });
        }
    };
    if run_set.is_empty() {
        info!("confirmation emptied the run set; nothing to run");
        return Ok(RunOutcome::NothingToRun);
    }

    let runtime = Runtime::new(registry, store, &run_set, options);
    let (report, store) = runtime.run().await?;
    Ok(RunOutcome::Finished { report, store })
}
