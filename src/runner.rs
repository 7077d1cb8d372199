//! A single concurrency slot for one task.
//!
//! `Runner` is always handled as `Arc<Runner>` so that the background task
//! it spawns for a run's execution can hold a clone of itself without
//! borrowing back into its owning `TaskScheduler`: it holds the shared
//! state it needs directly instead of a reference back to its parent.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::collaborators::Collaborators;
use crate::ids::TaskId;
use crate::metrics::SchedulerMetrics;
use crate::model::{QueuedRun, RunStatus, RunWaitError, StoreTask, Timestamp};
use crate::task_scheduler::NextDue;

const IDLE: u8 = 0;
const WORKING: u8 = 1;

/// How long a single `LogWriter::update_run_state` call is allowed to run
/// before we give up waiting on it. Deliberately short: a slow log sink
/// must never be allowed to hold a runner hostage.
const LOG_WRITE_TIMEOUT: Duration = Duration::from_millis(10);

pub(crate) struct Runner {
    state: AtomicU8,
    task: StoreTask,
    cancel: CancellationToken,
    next_due: Arc<NextDue>,
    collaborators: Collaborators,
    metrics: Arc<SchedulerMetrics>,
}

impl Runner {
    pub(crate) fn new(
        task: StoreTask,
        cancel: CancellationToken,
        next_due: Arc<NextDue>,
        collaborators: Collaborators,
        metrics: Arc<SchedulerMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(IDLE),
            task,
            cancel,
            next_due,
            collaborators,
            metrics,
        })
    }

    /// Advisory: may be stale the instant after the call returns.
    pub(crate) fn is_idle(&self) -> bool {
        self.state.load(Ordering::Acquire) == IDLE
    }

    fn task_id(&self) -> &TaskId {
        &self.task.id
    }

    /// Attempts the Idle→Working transition and, if it succeeds, carries
    /// out the synchronous portion of a run start (the due check and, if
    /// due, the `CreateNextRun` mint) before returning. The next runner in
    /// `TaskScheduler::work`'s sweep only sees this function return once
    /// that synchronous portion is done, which is what lets the sweep's
    /// early-break-on-idle shortcut work correctly.
    pub(crate) async fn start(self: &Arc<Self>, now: Timestamp) {
        if self
            .state
            .compare_exchange(IDLE, WORKING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Already working; nothing to do.
            return;
        }

        self.start_from_working(now).await;
    }

    /// Precondition: `self.state` is `WORKING`.
    async fn start_from_working(self: &Arc<Self>, now: Timestamp) {
        if now < self.next_due.get() {
            // Re-check after the CAS: Work may have called us optimistically.
            self.state.store(IDLE, Ordering::Release);
            return;
        }

        // The task may have been released since this runner was picked up
        // by a sweep (e.g. a tick snapshotted this task before the release,
        // or we just finished a prior run in this same chain). Once
        // cancellation has fired, minting a new run here would start
        // execution the release already promised wouldn't happen.
        if self.cancel.is_cancelled() {
            self.state.store(IDLE, Ordering::Release);
            return;
        }

        let creation = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.state.store(IDLE, Ordering::Release);
                return;
            }
            result = self.collaborators.desired_state.create_next_run(&self.cancel, self.task_id(), now) => result,
        };
        let creation = match creation {
            Ok(creation) => creation,
            Err(err) => {
                tracing::info!(task_id = %self.task_id(), error = %err, "failed to create next run");
                self.state.store(IDLE, Ordering::Release);
                return;
            }
        };

        self.next_due
            .set(creation.next_due, creation.created.now);

        tracing::info!(
            task_id = %self.task_id(),
            run_id = %creation.created.run_id,
            now = creation.created.now,
            "beginning execution"
        );
        self.update_run_state(&creation.created, RunStatus::Started)
            .await;

        let this = Arc::clone(self);
        let queued = creation.created;
        tokio::spawn(async move {
            this.execute_and_wait(now, queued).await;
        });
    }

    /// Runs on a spawned task. Executes the run, waits for its result, and
    /// reports the terminal state back to the desired state and the log
    /// writer.
    async fn execute_and_wait(self: Arc<Self>, now: Timestamp, qr: QueuedRun) {
        let promise = match self
            .collaborators
            .executor
            .execute(&self.cancel, qr.clone())
            .await
        {
            Ok(promise) => Arc::<dyn crate::traits::RunPromise>::from(promise),
            Err(err) => {
                tracing::error!(task_id = %self.task_id(), run_id = %qr.run_id, error = %err, "execution failed to start");
                self.update_run_state(&qr, RunStatus::Fail).await;
                self.state.store(IDLE, Ordering::Release);
                return;
            }
        };

        // Couples this runner's cancellation to the promise: if the task
        // is released while we're waiting, cancel the in-flight run.
        let watched_promise = Arc::clone(&promise);
        let cancel = self.cancel.clone();
        let watcher = tokio::spawn(async move {
            cancel.cancelled().await;
            watched_promise.cancel();
        });

        let wait_result = promise.wait().await;
        watcher.abort();

        match wait_result {
            Err(RunWaitError::Canceled) => {
                let _ = self
                    .collaborators
                    .desired_state
                    .finish_run(&self.cancel, &qr.task_id, &qr.run_id)
                    .await;
                self.update_run_state(&qr, RunStatus::Canceled).await;
                self.state.store(IDLE, Ordering::Release);
            }
            Err(RunWaitError::Failed { source, .. }) => {
                tracing::info!(task_id = %self.task_id(), run_id = %qr.run_id, error = %source, "run failed");
                self.update_run_state(&qr, RunStatus::Fail).await;
                self.state.store(IDLE, Ordering::Release);
            }
            Ok(_outcome) => {
                if let Err(err) = self
                    .collaborators
                    .desired_state
                    .finish_run(&self.cancel, &qr.task_id, &qr.run_id)
                    .await
                {
                    tracing::info!(task_id = %self.task_id(), run_id = %qr.run_id, error = %err, "failed to finish run");
                    self.update_run_state(&qr, RunStatus::Fail).await;
                    self.state.store(IDLE, Ordering::Release);
                    return;
                }
                self.update_run_state(&qr, RunStatus::Success).await;
                tracing::info!(task_id = %self.task_id(), run_id = %qr.run_id, "execution succeeded");

                // Chain straight into the next run if one is already due,
                // without returning to Idle. start_from_working always
                // terminates because a successful mint strictly advances
                // next_due, so eventually next_due > now.
                self.start_from_working(now).await;
            }
        }
    }

    async fn update_run_state(&self, qr: &QueuedRun, status: RunStatus) {
        match status {
            RunStatus::Started => self.metrics.start_run(self.task_id()),
            RunStatus::Success => self.metrics.finish_run(self.task_id(), true),
            RunStatus::Fail | RunStatus::Canceled => self.metrics.finish_run(self.task_id(), false),
            RunStatus::Queued => {
                tracing::warn!(task_id = %self.task_id(), "unexpected Queued run status recorded");
            }
        }

        // The log write itself is always attempted, even for a Canceled
        // terminal status recorded after release: a released task's last
        // state transition must still reach the sink. `cancel` is carried
        // into the call so an implementation can race its own I/O against
        // it; the bound this runner imposes is strictly the fixed timeout
        // below, so a released task's terminal write isn't starved by its
        // own cancellation having already fired.
        let write = self.collaborators.log_writer.update_run_state(
            &self.cancel,
            &self.task,
            &qr.run_id,
            SystemTime::now(),
            status,
        );

        match tokio::time::timeout(LOG_WRITE_TIMEOUT, write).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::info!(task_id = %self.task_id(), run_id = %qr.run_id, status = %status, error = %err, "log write failed");
            }
            Err(_elapsed) => {
                tracing::info!(task_id = %self.task_id(), run_id = %qr.run_id, status = %status, "log write timed out");
            }
        }
    }
}
