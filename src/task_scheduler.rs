//! Owns the fixed-size runner pool for one claimed task.

use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

use crate::collaborators::Collaborators;
use crate::error::SchedulerError;
use crate::ids::TaskId;
use crate::metrics::SchedulerMetrics;
use crate::model::{StoreTask, StoreTaskMeta, Timestamp};
use crate::runner::Runner;

/// `next_due`/`next_due_source`, guarded by a read-write lock: every tick
/// reads it, a mint writes it once. Nothing ever awaits while holding the
/// guard, so a plain `std::sync::RwLock` is enough — no need for
/// `tokio::sync::RwLock`'s async-aware variant.
pub(crate) struct NextDue {
    inner: RwLock<(Timestamp, Timestamp)>,
}

impl NextDue {
    fn new(first_due: Timestamp) -> Self {
        Self {
            inner: RwLock::new((first_due, Timestamp::MIN)),
        }
    }

    pub(crate) fn get(&self) -> Timestamp {
        self.inner.read().unwrap().0
    }

    /// The `now` of the run whose mint last advanced `next_due`. Retained
    /// for ordering diagnostics; not read by this crate's own logic.
    #[allow(dead_code)]
    pub(crate) fn source(&self) -> Timestamp {
        self.inner.read().unwrap().1
    }

    pub(crate) fn set(&self, next_due: Timestamp, source: Timestamp) {
        // No guard against out-of-order updates from runs completing out
        // of order: last write wins. A host wanting stricter ordering can
        // reject stale `source` values itself by reading `source()` first.
        *self.inner.write().unwrap() = (next_due, source);
    }
}

/// Coordinates a fixed number of [`Runner`]s for one claimed task.
pub struct TaskScheduler {
    task: StoreTask,
    runners: Vec<Arc<Runner>>,
    next_due: Arc<NextDue>,
    cancel: CancellationToken,
}

impl TaskScheduler {
    pub(crate) fn new(
        task: StoreTask,
        meta: &StoreTaskMeta,
        collaborators: Collaborators,
        metrics: Arc<SchedulerMetrics>,
    ) -> Result<Self, SchedulerError> {
        let first_due = meta.next_due_run().map_err(SchedulerError::InvalidMeta)?;
        let next_due = Arc::new(NextDue::new(first_due));
        let cancel = CancellationToken::new();

        let runners = (0..meta.max_concurrency.get())
            .map(|_| {
                Runner::new(
                    task.clone(),
                    cancel.clone(),
                    Arc::clone(&next_due),
                    collaborators.clone(),
                    Arc::clone(&metrics),
                )
            })
            .collect();

        Ok(Self {
            task,
            runners,
            next_due,
            cancel,
        })
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task.id
    }

    pub fn next_due(&self) -> Timestamp {
        self.next_due.get()
    }

    /// Starts as many idle runners as possible.
    ///
    /// Runners are `.await`ed one at a time, in order, rather than spawned
    /// concurrently: each runner's due-check and (if due) `CreateNextRun`
    /// mint must fully complete, including the `SetNextDue` that follows a
    /// successful mint, before the next runner's due-check runs. That
    /// ordering is what makes "stop at the first runner that ends up idle"
    /// a correct shortcut instead of a race.
    ///
    /// Bails out up front if the task has been released since this call
    /// was queued up (e.g. a tick took its snapshot of due tasks before a
    /// concurrent `release_task` ran): without this check a task released
    /// between the snapshot and the sweep would still get a work pass.
    pub(crate) async fn work(&self, now: Timestamp) {
        if self.cancel.is_cancelled() {
            return;
        }
        for runner in &self.runners {
            runner.start(now).await;
            if runner.is_idle() {
                // Ran out of jobs to start.
                break;
            }
        }
    }

    /// Triggers the shared cancellation token. Does not wait for in-flight
    /// runners to observe it.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}
