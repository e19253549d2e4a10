// src/engine/runtime.rs

use std::collections::BTreeSet;
use std::fmt;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::dag::task_info::TaskRunState;
use crate::dag::{Registry, Scheduler};
use crate::errors::Result;
use crate::exec::{check_throttle, launch};
use crate::state::StateStore;
use crate::types::{Output, TaskName};

use super::report::RunReport;
use super::{RuntimeEvent, RuntimeOptions, TaskOutcome};

/// Drives the scheduler: applies task outcomes and throttle decisions as
/// they arrive, wakes throttled tasks on a fixed tick and launches every
/// eligible action.
///
/// Throttle predicates and actions run on their own Tokio tasks, so a slow
/// task never holds up the loop.
///
/// The runtime is the only writer of the scheduler and of the in-memory
/// state store during a run.
pub struct Runtime<'r> {
    registry: &'r Registry,
    scheduler: Scheduler<'r>,
    store: StateStore,
    options: RuntimeOptions,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for Runtime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'r> Runtime<'r> {
    pub fn new(
        registry: &'r Registry,
        store: StateStore,
        run_set: &BTreeSet<TaskName>,
        options: RuntimeOptions,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            registry,
            scheduler: Scheduler::new(registry.graph(), run_set),
            store,
            options,
            event_tx,
            event_rx,
        }
    }

    /// Main loop. Returns the run report and the updated state store.
    pub async fn run(mut self) -> Result<(RunReport, StateStore)> {
        info!(
            tick_ms = self.options.tick.as_millis() as u64,
            deadline_ms = self.options.deadline.as_millis() as u64,
            "runtime started"
        );

        let mut ticker = interval(self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            while let Ok(event) = self.event_rx.try_recv() {
                self.handle_event(event);
            }

            self.scheduler.wake_throttled(Instant::now());

            for name in self.scheduler.eligible_tasks() {
                self.begin_throttle_check(&name);
            }

            if self.scheduler.is_finished() {
                break;
            }

            // The runtime holds a sender, so `recv` never yields `None`.
            let event = tokio::select! {
                event = self.event_rx.recv() => event,
                _ = ticker.tick() => None,
            };
            if let Some(event) = event {
                self.handle_event(event);
            }
        }

        let report = self.scheduler.report();
        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            up_to_date = report.up_to_date.len(),
            "run finished"
        );
        Ok((report, self.store))
    }

    fn handle_event(&mut self, event: RuntimeEvent) {
        debug!(?event, "runtime received event");
        match event {
            RuntimeEvent::TaskFinished { task, outcome } => {
                if self.scheduler.run_state_of(&task) != Some(TaskRunState::Running) {
                    warn!(task = %task, "outcome for a task that is not running; ignoring");
                    return;
                }
                match outcome {
                    TaskOutcome::Success(output) => {
                        let deps = self
                            .registry
                            .get(&task)
                            .map(|t| t.dependencies().to_vec())
                            .unwrap_or_default();
                        self.store.record_success(&task, &deps, output);
                        self.scheduler.mark_completed(&task);
                        info!(task = %task, "task completed");
                    }
                    TaskOutcome::Failed(reason) => {
                        self.scheduler.mark_failed(&task, reason);
                    }
                    TaskOutcome::DeadlineExceeded(d) => {
                        self.scheduler
                            .mark_failed(&task, format!("deadline of {}s exceeded", d.as_secs_f64()));
                    }
                }
            }
            RuntimeEvent::ThrottleDecided { task, wait } => {
                if self.scheduler.run_state_of(&task) != Some(TaskRunState::Checking) {
                    debug!(task = %task, "throttle decision for a task no longer waiting on it");
                    return;
                }
                if wait.is_zero() {
                    self.start(&task);
                } else {
                    info!(task = %task, wait_ms = wait.as_millis() as u64, "task throttled");
                    self.scheduler.mark_throttled(&task, Instant::now() + wait);
                }
            }
        }
    }

    /// Hand an eligible task's throttle predicate to its own Tokio task.
    fn begin_throttle_check(&mut self, name: &str) {
        if self.scheduler.run_state_of(name) != Some(TaskRunState::Pending) {
            return;
        }
        let Some(task) = self.registry.get(name).cloned() else {
            self.scheduler.mark_failed(name, "task is not registered");
            return;
        };

        self.scheduler.mark_checking(name);
        check_throttle(task, self.options.deadline, self.event_tx.clone());
    }

    /// Gather inputs and launch the action of a task cleared to run.
    fn start(&mut self, name: &str) {
        let Some(task) = self.registry.get(name).cloned() else {
            self.scheduler.mark_failed(name, "task is not registered");
            return;
        };

        let inputs = match self.gather_inputs(task.dependencies()) {
            Ok(inputs) => inputs,
            Err(missing) => {
                warn!(task = %name, dep = %missing, "dependency has no stored output");
                self.scheduler
                    .mark_failed(name, format!("dependency '{missing}' has no stored output"));
                return;
            }
        };

        self.scheduler.mark_running(name);
        launch(
            name.to_string(),
            task.action(),
            inputs,
            self.options.deadline,
            self.event_tx.clone(),
        );
    }

    /// Dependency outputs in declared order, or the first dependency
    /// without one.
    fn gather_inputs(&self, deps: &[TaskName]) -> std::result::Result<Vec<Output>, TaskName> {
        deps.iter()
            .map(|dep| self.store.output_of(dep).cloned().ok_or_else(|| dep.clone()))
            .collect()
    }
}
