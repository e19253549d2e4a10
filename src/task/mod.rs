// src/task/mod.rs

//! The task contract consumed by the orchestrator.
//!
//! A [`Task`] is a named, cacheable unit of work. The orchestrator never
//! looks inside an action; it only needs:
//! - the ordered dependency names (positional inputs of the action),
//! - the action itself ([`TaskAction`]),
//! - a force-change predicate ([`ForceChange`]),
//! - a throttle predicate ([`Throttle`]).
//!
//! Closures can be used for all three through the builder methods on
//! [`Task`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{Output, TaskName};

/// Boxed, sendable future; the same shape the executor seams use.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The body of a task.
///
/// `inputs` holds the dependency outputs in declared order. The returned
/// future is spawned on the runtime, so it must own everything it uses.
pub trait TaskAction: Send + Sync {
    fn run(&self, inputs: Vec<Output>) -> BoxFuture<'static, anyhow::Result<Output>>;
}

/// Decides, independently of input changes, whether a task must re-run.
pub trait ForceChange: Send + Sync {
    fn force_change(&self) -> BoxFuture<'_, anyhow::Result<bool>>;
}

/// Decides whether an otherwise eligible task should be deferred.
///
/// `Duration::ZERO` means "proceed now".
pub trait Throttle: Send + Sync {
    fn timeout_for(&self) -> BoxFuture<'_, Duration>;
}

/// Never forces a re-run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverForce;

impl ForceChange for NeverForce {
    fn force_change(&self) -> BoxFuture<'_, anyhow::Result<bool>> {
        Box::pin(async { Ok(false) })
    }
}

/// Never throttles.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThrottle;

impl Throttle for NoThrottle {
    fn timeout_for(&self) -> BoxFuture<'_, Duration> {
        Box::pin(async { Duration::ZERO })
    }
}

/// Adapter turning an async closure into a [`TaskAction`].
pub struct FnAction<F>(pub F);

impl<F, Fut> TaskAction for FnAction<F>
where
    F: Fn(Vec<Output>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Output>> + Send + 'static,
{
    fn run(&self, inputs: Vec<Output>) -> BoxFuture<'static, anyhow::Result<Output>> {
        Box::pin((self.0)(inputs))
    }
}

/// Adapter turning an async closure into a [`ForceChange`] predicate.
pub struct FnForceChange<F>(pub F);

impl<F, Fut> ForceChange for FnForceChange<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    fn force_change(&self) -> BoxFuture<'_, anyhow::Result<bool>> {
        Box::pin((self.0)())
    }
}

/// Adapter turning an async closure into a [`Throttle`] predicate.
pub struct FnThrottle<F>(pub F);

impl<F, Fut> Throttle for FnThrottle<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Duration> + Send + 'static,
{
    fn timeout_for(&self) -> BoxFuture<'_, Duration> {
        Box::pin((self.0)())
    }
}

/// A registered (or about to be registered) unit of work.
#[derive(Clone)]
pub struct Task {
    name: TaskName,
    dependencies: Vec<TaskName>,
    action: Arc<dyn TaskAction>,
    force_change: Arc<dyn ForceChange>,
    throttle: Arc<dyn Throttle>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Create a task with the given action, no dependencies, no forced
    /// changes and no throttling.
    pub fn new(name: impl Into<TaskName>, action: impl TaskAction + 'static) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            action: Arc::new(action),
            force_change: Arc::new(NeverForce),
            throttle: Arc::new(NoThrottle),
        }
    }

    /// Create a task from an async closure over the dependency outputs.
    pub fn from_fn<F, Fut>(name: impl Into<TaskName>, f: F) -> Self
    where
        F: Fn(Vec<Output>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Output>> + Send + 'static,
    {
        Self::new(name, FnAction(f))
    }

    /// Append a dependency. Accepts a task handle (as returned by
    /// `Registry::register`) or anything that names one.
    pub fn after(mut self, dependency: impl AsTaskName) -> Self {
        self.dependencies.push(dependency.task_name());
        self
    }

    pub fn with_force_change(mut self, predicate: impl ForceChange + 'static) -> Self {
        self.force_change = Arc::new(predicate);
        self
    }

    pub fn force_change_with<F, Fut>(self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.with_force_change(FnForceChange(f))
    }

    pub fn with_throttle(mut self, predicate: impl Throttle + 'static) -> Self {
        self.throttle = Arc::new(predicate);
        self
    }

    pub fn throttle_with<F, Fut>(self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Duration> + Send + 'static,
    {
        self.with_throttle(FnThrottle(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct dependencies, in declared (positional) order.
    pub fn dependencies(&self) -> &[TaskName] {
        &self.dependencies
    }

    pub fn action(&self) -> Arc<dyn TaskAction> {
        Arc::clone(&self.action)
    }

    pub async fn force_change(&self) -> anyhow::Result<bool> {
        self.force_change.force_change().await
    }

    pub async fn timeout_for(&self) -> Duration {
        self.throttle.timeout_for().await
    }
}

/// Anything that identifies a task by name.
pub trait AsTaskName {
    fn task_name(&self) -> TaskName;
}

impl AsTaskName for &str {
    fn task_name(&self) -> TaskName {
        self.to_string()
    }
}

impl AsTaskName for String {
    fn task_name(&self) -> TaskName {
        self.clone()
    }
}

impl AsTaskName for &String {
    fn task_name(&self) -> TaskName {
        (*self).clone()
    }
}

impl AsTaskName for &Task {
    fn task_name(&self) -> TaskName {
        self.name.clone()
    }
}

impl AsTaskName for &Arc<Task> {
    fn task_name(&self) -> TaskName {
        self.name.clone()
    }
}
