//! Sentinel error types owned by this crate.
//!
//! Failures coming back from a collaborator (the desired-state store, the
//! executor, a run promise, the log writer) are opaque to the scheduler —
//! it never needs to match on their variants, only log and swallow them —
//! so those stay `anyhow::Error`. The two errors below are different:
//! callers of `claim_task`/`release_task` are expected to branch on them,
//! so they get a real enum.

use thiserror::Error;

/// Errors returned synchronously from [`crate::Scheduler::claim_task`] and
/// [`crate::Scheduler::release_task`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Returned by `claim_task` when the given `TaskId` is already present
    /// in the registry.
    #[error("task has already been claimed")]
    AlreadyClaimed,

    /// Returned by `release_task` when the given `TaskId` is not present in
    /// the registry.
    #[error("task not claimed")]
    TaskNotClaimed,

    /// The task's `StoreTaskMeta::next_due_run` callback failed while
    /// building the `TaskScheduler` for a claim.
    #[error("failed to compute initial due time for claimed task")]
    InvalidMeta(#[source] anyhow::Error),
}
