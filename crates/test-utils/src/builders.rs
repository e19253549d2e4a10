#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cachedag::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use cachedag::{output, Output, Task};

use crate::recorder::Recorder;

/// Task returning a fixed output.
pub fn constant(name: &str, out: Output, rec: &Recorder) -> Task {
    let task_name = name.to_string();
    let rec = rec.clone();
    Task::from_fn(name, move |inputs| {
        let rec = rec.clone();
        let task_name = task_name.clone();
        let out = out.clone();
        async move {
            rec.record(&task_name, &inputs);
            Ok::<_, anyhow::Error>(out)
        }
    })
}

/// Task returning `{value: first_input.value + 1}`, or `{value: 1}` with no
/// inputs.
pub fn increment(name: &str, rec: &Recorder) -> Task {
    let task_name = name.to_string();
    let rec = rec.clone();
    Task::from_fn(name, move |inputs| {
        let rec = rec.clone();
        let task_name = task_name.clone();
        async move {
            rec.record(&task_name, &inputs);
            let base = inputs
                .first()
                .and_then(|o| o.get("value"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            Ok::<_, anyhow::Error>(output([("value", (base + 1).into())]))
        }
    })
}

/// Task whose action always fails with `message`.
pub fn failing(name: &str, message: &str, rec: &Recorder) -> Task {
    let task_name = name.to_string();
    let message = message.to_string();
    let rec = rec.clone();
    Task::from_fn(name, move |inputs| {
        let rec = rec.clone();
        let task_name = task_name.clone();
        let message = message.clone();
        async move {
            rec.record(&task_name, &inputs);
            Err::<Output, _>(anyhow::anyhow!(message))
        }
    })
}

/// Task whose action panics.
pub fn panicking(name: &str, rec: &Recorder) -> Task {
    let task_name = name.to_string();
    let rec = rec.clone();
    Task::from_fn(name, move |inputs| {
        let rec = rec.clone();
        let task_name = task_name.clone();
        async move {
            rec.record(&task_name, &inputs);
            explode(&task_name)
        }
    })
}

fn explode(task: &str) -> anyhow::Result<Output> {
    panic!("{task} panicked")
}

/// Task that sleeps for `delay` before returning `out`.
pub fn sleeping(name: &str, delay: Duration, out: Output, rec: &Recorder) -> Task {
    let task_name = name.to_string();
    let rec = rec.clone();
    Task::from_fn(name, move |inputs| {
        let rec = rec.clone();
        let task_name = task_name.clone();
        let out = out.clone();
        async move {
            rec.record(&task_name, &inputs);
            tokio::time::sleep(delay).await;
            Ok::<_, anyhow::Error>(out)
        }
    })
}

/// Shared switch for force-change predicates.
#[derive(Debug, Clone, Default)]
pub struct ForceFlag(Arc<AtomicBool>);

impl ForceFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }

    /// Attach this flag as the task's force-change predicate.
    pub fn attach(&self, task: Task) -> Task {
        let flag = Arc::clone(&self.0);
        task.force_change_with(move || {
            let value = flag.load(Ordering::SeqCst);
            async move { Ok::<_, anyhow::Error>(value) }
        })
    }
}

/// Throttle that defers the first `times` checks by `wait`, then proceeds.
pub fn throttle_first(task: Task, times: usize, wait: Duration) -> Task {
    let calls = Arc::new(AtomicUsize::new(0));
    task.throttle_with(move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move { if n < times { wait } else { Duration::ZERO } }
    })
}

/// Throttle predicate that takes `delay` to answer, then says "go".
pub fn slow_throttle(task: Task, delay: Duration) -> Task {
    task.throttle_with(move || async move {
        tokio::time::sleep(delay).await;
        Duration::ZERO
    })
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_deadline(mut self, deadline: &str) -> Self {
        self.config.config.deadline = deadline.to_string();
        self
    }

    pub fn with_state_file(mut self, path: &str) -> Self {
        self.config.config.state_file = path.to_string();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                after: vec![],
                force_if: None,
                throttle_cmd: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn force_if(mut self, cmd: &str) -> Self {
        self.task.force_if = Some(cmd.to_string());
        self
    }

    pub fn throttle_cmd(mut self, cmd: &str) -> Self {
        self.task.throttle_cmd = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
