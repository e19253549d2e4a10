// src/exec/launcher.rs

//! Spawns the per-task work of a run: throttle checks and actions. Both
//! report back to the runtime over its event channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::task::{Task, TaskAction};
use crate::types::{Output, TaskName};

/// Spawn `action` on its own Tokio task and report the outcome to the
/// runtime as a `RuntimeEvent::TaskFinished`.
///
/// If the deadline elapses first, a `DeadlineExceeded` outcome is sent and
/// the action's task is detached, not aborted: it may keep running and its
/// eventual result is dropped.
pub fn launch(
    task: TaskName,
    action: Arc<dyn TaskAction>,
    inputs: Vec<Output>,
    deadline: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(task = %task, inputs = inputs.len(), "starting task action");

        let mut handle = tokio::spawn(action.run(inputs));

        let outcome = tokio::select! {
            joined = &mut handle => match joined {
                Ok(Ok(output)) => {
                    debug!(task = %task, ?output, "action returned output");
                    TaskOutcome::Success(output)
                }
                Ok(Err(e)) => {
                    let reason = format!("{e:#}");
                    warn!(task = %task, error = %reason, "action failed");
                    TaskOutcome::Failed(reason)
                }
                Err(e) => {
                    error!(task = %task, error = %e, "action panicked or was aborted");
                    TaskOutcome::Failed(format!("action did not complete: {e}"))
                }
            },
            _ = sleep(deadline) => {
                warn!(
                    task = %task,
                    deadline_ms = deadline.as_millis() as u64,
                    "deadline exceeded; no longer waiting for action"
                );
                TaskOutcome::DeadlineExceeded(deadline)
            }
        };

        // Dropping the JoinHandle detaches the action; it is not aborted.
        drop(handle);

        if runtime_tx
            .send(RuntimeEvent::TaskFinished {
                task: task.clone(),
                outcome,
            })
            .await
            .is_err()
        {
            debug!(task = %task, "runtime gone before task outcome could be reported");
        }
    })
}

/// Ask `task`'s throttle predicate how long to wait, on its own Tokio task.
///
/// A predicate that has not answered within `limit` is treated as "no
/// wait", the same as a failing throttle command.
pub fn check_throttle(
    task: Arc<Task>,
    limit: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let wait = match timeout(limit, task.timeout_for()).await {
            Ok(wait) => wait,
            Err(_) => {
                warn!(
                    task = %task.name(),
                    limit_ms = limit.as_millis() as u64,
                    "throttle predicate did not answer; not throttling"
                );
                Duration::ZERO
            }
        };
        debug!(task = %task.name(), wait_ms = wait.as_millis() as u64, "throttle decided");

        let event = RuntimeEvent::ThrottleDecided {
            task: task.name().to_string(),
            wait,
        };
        if runtime_tx.send(event).await.is_err() {
            debug!(task = %task.name(), "runtime gone before throttle decision could be reported");
        }
    })
}
