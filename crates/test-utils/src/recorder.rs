use std::sync::{Arc, Mutex};

use cachedag::{Output, TaskName};
use tokio::time::Instant;

/// One recorded action invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task: TaskName,
    pub inputs: Vec<Output>,
    pub at: Instant,
}

/// Shared log of action invocations, cloned into every test task.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, task: &str, inputs: &[Output]) {
        self.calls.lock().unwrap().push(Invocation {
            task: task.to_string(),
            inputs: inputs.to_vec(),
            at: Instant::now(),
        });
    }

    /// Names of invoked tasks, in invocation order.
    pub fn invoked(&self) -> Vec<TaskName> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.task.clone())
            .collect()
    }

    pub fn invocations_of(&self, task: &str) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.task == task)
            .cloned()
            .collect()
    }

    pub fn count(&self, task: &str) -> usize {
        self.invocations_of(task).len()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}
