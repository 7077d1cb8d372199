//! Top-level registry mapping `TaskId` to `TaskScheduler`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::collaborators::Collaborators;
use crate::error::SchedulerError;
use crate::ids::TaskId;
use crate::metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
use crate::model::{StoreTask, StoreTaskMeta, Timestamp};
use crate::task_scheduler::TaskScheduler;
use crate::traits::{DesiredState, Executor, LogWriter};

/// Drives recurring task runs against a desired-state store and an
/// executor, with bounded per-task concurrency.
///
/// `Scheduler` is cheap to clone-by-`Arc` and is meant to be shared across
/// the ticker source and whatever async tasks call `claim_task`/
/// `release_task` — every public method takes `&self`.
pub struct Scheduler {
    collaborators: Collaborators,
    metrics: Arc<SchedulerMetrics>,
    now: AtomicI64,
    registry: Mutex<HashMap<TaskId, Arc<TaskScheduler>>>,
}

impl Scheduler {
    pub fn new(
        desired_state: Arc<dyn DesiredState>,
        executor: Arc<dyn Executor>,
        log_writer: Arc<dyn LogWriter>,
        now: Timestamp,
    ) -> Self {
        Self {
            collaborators: Collaborators {
                desired_state,
                executor,
                log_writer,
            },
            metrics: Arc::new(SchedulerMetrics::default()),
            now: AtomicI64::new(now),
            registry: Mutex::new(HashMap::new()),
        }
    }

    pub fn metrics(&self) -> SchedulerMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    /// Returns the `next_due` of a currently-claimed task, if any. Mostly
    /// useful for tests and diagnostics.
    pub fn next_due(&self, task_id: &TaskId) -> Option<Timestamp> {
        self.registry
            .lock()
            .unwrap()
            .get(task_id)
            .map(|ts| ts.next_due())
    }

    pub fn is_claimed(&self, task_id: &TaskId) -> bool {
        self.registry.lock().unwrap().contains_key(task_id)
    }

    /// Advances the scheduler's notion of "now" and drives a work sweep.
    ///
    /// Takes a snapshot of due task schedulers under the registry lock and
    /// releases the lock before `.await`ing any of them, since `CreateNextRun`
    /// is a genuine suspension point and a `std::sync::Mutex` guard can't be
    /// held across one. A task released after the snapshot is taken still
    /// has its cancellation observed: `TaskScheduler::work` checks its own
    /// cancellation state before touching any runner.
    pub async fn tick(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);

        let due: Vec<Arc<TaskScheduler>> = {
            let registry = self.registry.lock().unwrap();
            registry
                .values()
                .filter(|ts| now >= ts.next_due())
                .cloned()
                .collect()
        };

        for ts in due {
            ts.work(now).await;
        }
    }

    /// Begins control of task execution in this scheduler.
    ///
    /// Fails with [`SchedulerError::AlreadyClaimed`] if `task.id` is
    /// already present. On success, if the current `now` already meets the
    /// new task's initial due time, immediately runs one work sweep for
    /// just this task.
    pub async fn claim_task(
        &self,
        task: StoreTask,
        meta: StoreTaskMeta,
    ) -> Result<(), SchedulerError> {
        let task_id = task.id.clone();
        let ts = match TaskScheduler::new(task, &meta, self.collaborators.clone(), Arc::clone(&self.metrics)) {
            Ok(ts) => Arc::new(ts),
            Err(err) => {
                self.metrics.claim_task(&task_id, false);
                return Err(err);
            }
        };

        {
            let mut registry = self.registry.lock().unwrap();
            if registry.contains_key(&task_id) {
                drop(registry);
                self.metrics.claim_task(&task_id, false);
                return Err(SchedulerError::AlreadyClaimed);
            }
            registry.insert(task_id.clone(), Arc::clone(&ts));
        }

        self.metrics.claim_task(&task_id, true);

        // Safe to read next_due without the registry lock: no other call
        // can reach this TaskScheduler until the insertion above is
        // visible, and it already is.
        let now = self.now();
        if now >= ts.next_due() {
            ts.work(now).await;
        }

        Ok(())
    }

    /// Immediately cancels any in-progress runs for `task_id` and releases
    /// it from the registry. Does not wait for in-flight runs to finish —
    /// cancellation only needs to be signalled for this to return.
    pub fn release_task(&self, task_id: &TaskId) -> Result<(), SchedulerError> {
        let ts = {
            let mut registry = self.registry.lock().unwrap();
            registry.remove(task_id)
        };

        match ts {
            Some(ts) => {
                ts.cancel();
                self.metrics.release_task(task_id);
                Ok(())
            }
            None => Err(SchedulerError::TaskNotClaimed),
        }
    }
}
