//! Data types shared across the scheduler, task scheduler and runner.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{RunId, TaskId};

/// Unix seconds, UTC. Supplied externally by the ticker source; the
/// scheduler never reads the wall clock itself.
pub type Timestamp = i64;

/// Immutable descriptor for a claimed task.
///
/// The scheduler reads only `id`. Any script/content a host wants to
/// associate with the task lives in the host's own store, keyed by that
/// same `TaskId` — this crate has no opinion on what a task runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTask {
    pub id: TaskId,
}

impl StoreTask {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self { id: id.into() }
    }
}

/// Immutable-at-claim snapshot of a task's scheduling parameters.
///
/// `next_due_run` is a callback rather than a precomputed value because
/// computing "when should this task's first run occur" can itself fail
/// (e.g. a malformed schedule) — that computation belongs to the
/// desired-state store, not to this crate, so we only invoke it once, at
/// claim time.
#[derive(Clone)]
pub struct StoreTaskMeta {
    pub max_concurrency: NonZeroUsize,
    next_due_run: Arc<dyn Fn() -> anyhow::Result<Timestamp> + Send + Sync>,
}

impl StoreTaskMeta {
    pub fn new(
        max_concurrency: NonZeroUsize,
        next_due_run: impl Fn() -> anyhow::Result<Timestamp> + Send + Sync + 'static,
    ) -> Self {
        Self {
            max_concurrency,
            next_due_run: Arc::new(next_due_run),
        }
    }

    /// Convenience constructor for the common case of a fixed, already-known
    /// first due time.
    pub fn with_fixed_next_due(max_concurrency: NonZeroUsize, first_due: Timestamp) -> Self {
        Self::new(max_concurrency, move || Ok(first_due))
    }

    pub fn next_due_run(&self) -> anyhow::Result<Timestamp> {
        (self.next_due_run)()
    }
}

impl fmt::Debug for StoreTaskMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreTaskMeta")
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

/// A task run that has been assigned an id but whose execution has not
/// necessarily started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRun {
    pub task_id: TaskId,
    pub run_id: RunId,
    /// The logical timestamp to pass into the executor. Not necessarily
    /// equal to wall-clock time.
    pub now: Timestamp,
}

/// Returned by the desired state from "create next run".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCreation {
    pub created: QueuedRun,
    pub next_due: Timestamp,
}

/// Lifecycle status of a single run.
///
/// `Queued` is never emitted by this crate's own logic, but it is kept in
/// the enum for forward compatibility with stores that track a queued
/// state before a runner picks a run up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    Started,
    Success,
    Fail,
    Canceled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::Started => "started",
            RunStatus::Success => "success",
            RunStatus::Fail => "fail",
            RunStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// The success-path payload of [`crate::traits::RunPromise::wait`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Observed but not yet acted on: retry-on-retryable-failure is a
    /// planned but unimplemented behavior (see spec design notes).
    pub retryable: bool,
}

/// The failure-path of [`crate::traits::RunPromise::wait`].
///
/// `Canceled` is the sentinel the runner relies on to distinguish
/// "the task was released out from under this run" from "the execution
/// itself failed".
#[derive(Debug, thiserror::Error)]
pub enum RunWaitError {
    #[error("run canceled")]
    Canceled,
    #[error("run failed: {source}")]
    Failed {
        #[source]
        source: anyhow::Error,
        retryable: bool,
    },
}
