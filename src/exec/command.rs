// src/exec/command.rs

//! Shell-command implementations of the task contract, used for tasks
//! declared in the TOML config.
//!
//! - [`CommandAction`] runs `cmd`, passing dependency outputs through the
//!   environment, and parses the last non-empty stdout line as the output.
//! - [`CommandForceChange`] forces a re-run when its command exits 0.
//! - [`CommandThrottle`] reads a number of milliseconds from stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::task::{BoxFuture, ForceChange, TaskAction, Throttle};
use crate::types::{Output, TaskName};

/// Env var holding the current task name.
pub const ENV_TASK: &str = "CACHEDAG_TASK";
/// Env var holding a JSON array of dependency outputs, in declared order.
pub const ENV_INPUTS: &str = "CACHEDAG_INPUTS";

/// Build a shell command appropriate for the platform.
fn shell(cmd: &str, workdir: &Path) -> Command {
    let mut c = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };
    c.current_dir(workdir);
    c
}

/// Parse the last non-empty line of `stdout` as a flat JSON object.
pub fn parse_output(stdout: &str) -> Result<Output> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("command produced no output line"))?;

    serde_json::from_str::<Output>(line)
        .with_context(|| format!("last stdout line is not a flat JSON object: {line}"))
}

#[derive(Debug, Clone)]
pub struct CommandAction {
    task: TaskName,
    cmd: String,
    workdir: PathBuf,
}

impl CommandAction {
    pub fn new(task: impl Into<TaskName>, cmd: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            task: task.into(),
            cmd: cmd.into(),
            workdir: workdir.into(),
        }
    }

    async fn execute(self, inputs: Vec<Output>) -> Result<Output> {
        let inputs_json = serde_json::to_string(&inputs)?;

        info!(task = %self.task, cmd = %self.cmd, "starting task process");

        let child = shell(&self.cmd, &self.workdir)
            .env(ENV_TASK, &self.task)
            .env(ENV_INPUTS, inputs_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", self.task))?;

        let out = child
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for process of task '{}'", self.task))?;

        for line in String::from_utf8_lossy(&out.stderr).lines() {
            debug!(task = %self.task, "stderr: {}", line);
        }

        let code = out.status.code().unwrap_or(-1);
        info!(
            task = %self.task,
            exit_code = code,
            success = out.status.success(),
            "task process exited"
        );

        if !out.status.success() {
            bail!("command exited with status {code}");
        }

        parse_output(&String::from_utf8_lossy(&out.stdout))
    }
}

impl TaskAction for CommandAction {
    fn run(&self, inputs: Vec<Output>) -> BoxFuture<'static, Result<Output>> {
        Box::pin(self.clone().execute(inputs))
    }
}

#[derive(Debug, Clone)]
pub struct CommandForceChange {
    cmd: String,
    workdir: PathBuf,
}

impl CommandForceChange {
    pub fn new(cmd: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            workdir: workdir.into(),
        }
    }
}

impl ForceChange for CommandForceChange {
    fn force_change(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let status = shell(&self.cmd, &self.workdir)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .with_context(|| format!("running force_if command '{}'", self.cmd))?;
            Ok(status.success())
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandThrottle {
    cmd: String,
    workdir: PathBuf,
}

impl CommandThrottle {
    pub fn new(cmd: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            workdir: workdir.into(),
        }
    }

    async fn query(&self) -> Result<Duration> {
        let out = shell(&self.cmd, &self.workdir)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .with_context(|| format!("running throttle command '{}'", self.cmd))?;

        if !out.status.success() {
            bail!("throttle command exited with {}", out.status);
        }

        let text = String::from_utf8_lossy(&out.stdout);
        let ms: u64 = text
            .trim()
            .parse()
            .with_context(|| format!("throttle command printed '{}', expected milliseconds", text.trim()))?;
        Ok(Duration::from_millis(ms))
    }
}

impl Throttle for CommandThrottle {
    fn timeout_for(&self) -> BoxFuture<'_, Duration> {
        Box::pin(async move {
            match self.query().await {
                Ok(d) => d,
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(cmd = %self.cmd, error = %reason, "throttle command failed; not throttling");
                    Duration::ZERO
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_output_uses_last_non_empty_line() {
        let out = parse_output("deploying...\n{\"address\":\"0xabc\",\"gas\":21000}\n\n").unwrap();
        assert_eq!(out["address"].as_str(), Some("0xabc"));
        assert_eq!(out["gas"].as_i64(), Some(21000));
    }

    #[test]
    fn nested_values_are_rejected() {
        assert!(parse_output("{\"a\":{\"b\":1}}").is_err());
        assert!(parse_output("").is_err());
    }
}
