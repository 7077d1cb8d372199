//! External collaborator contracts.
//!
//! These four traits are the entire boundary between this crate and the
//! rest of a real system: a durable desired-state store, a script
//! execution engine, the in-flight run handle that engine hands back, and
//! a log sink. The scheduler treats every one of them as opaque — it
//! never inspects *why* a collaborator failed, only whether it did.

use std::time::SystemTime;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::ids::{RunId, TaskId};
use crate::model::{QueuedRun, RunCreation, RunOutcome, RunStatus, RunWaitError, StoreTask};
use crate::model::Timestamp;

/// Persists the desired state of task runs: which runs should exist, and
/// when the next one is due.
///
/// Implementations are expected to tolerate duplicate `finish_run` calls —
/// the scheduler never retries a call itself, but a future retry policy
/// layered on top of this crate might.
#[async_trait]
pub trait DesiredState: Send + Sync {
    /// Requests the next run for `task_id`, occurring no later than `now`.
    ///
    /// An error here is treated uniformly as "skip this slot for this
    /// tick" — it may mean "nothing to create right now" or a transient
    /// storage failure; the scheduler cannot and does not distinguish.
    ///
    /// `cancel` is the owning task's cancellation token: it is signalled
    /// when the task is released, and a well-behaved implementation
    /// should race its own I/O against it rather than leave the caller
    /// waiting on a call whose result is about to be discarded.
    async fn create_next_run(
        &self,
        cancel: &CancellationToken,
        task_id: &TaskId,
        now: Timestamp,
    ) -> anyhow::Result<RunCreation>;

    /// Indicates that the given run is no longer intended to be executed,
    /// whether it finished, failed, or was canceled.
    async fn finish_run(
        &self,
        cancel: &CancellationToken,
        task_id: &TaskId,
        run_id: &RunId,
    ) -> anyhow::Result<()>;
}

/// Begins execution of a run.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Attempts to begin execution of `run`. Must not block past the
    /// point of accepting the run — the actual work happens behind the
    /// returned [`RunPromise`]. `cancel` is the owning task's cancellation
    /// token, carried through for implementations that need it to abandon
    /// the accept step itself.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        run: QueuedRun,
    ) -> anyhow::Result<Box<dyn RunPromise>>;
}

/// A handle to an in-flight run.
#[async_trait]
pub trait RunPromise: Send + Sync {
    /// Blocks until the run completes. Must be safe to call concurrently
    /// from multiple callers, all of whom must observe the same result
    /// (the crate only ever calls this once per run, but implementations
    /// must not assume that).
    async fn wait(&self) -> Result<RunOutcome, RunWaitError>;

    /// Interrupts the run. Idempotent, safe to call concurrently, and a
    /// no-op once `wait` has already returned.
    fn cancel(&self);
}

/// Sink for per-run lifecycle transitions.
#[async_trait]
pub trait LogWriter: Send + Sync {
    /// Called on every Started/Success/Fail/Canceled transition. Errors
    /// are logged and swallowed by the caller — this must never be
    /// allowed to fail a run. `cancel` is the owning task's cancellation
    /// token, so a slow sink can be abandoned promptly on release instead
    /// of only on its own timeout.
    async fn update_run_state(
        &self,
        cancel: &CancellationToken,
        task: &StoreTask,
        run_id: &RunId,
        at: SystemTime,
        status: RunStatus,
    ) -> anyhow::Result<()>;
}
