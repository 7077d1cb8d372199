//! Lifecycle counters for the scheduler.
//!
//! Plain atomics rather than a metrics-crate dependency: this crate has no
//! opinion on how a host process exposes telemetry, so it only offers a
//! cheap, lock-free counter set and a point-in-time snapshot. A host that
//! wants Prometheus/StatsD/whatever can poll `snapshot()` and publish it
//! however it likes.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ids::TaskId;

/// Counters for claim/release/start/finish, incremented by the scheduler
/// and its task schedulers as runs progress.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    claims_succeeded: AtomicU64,
    claims_failed: AtomicU64,
    releases: AtomicU64,
    runs_started: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
}

/// A point-in-time read of [`SchedulerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerMetricsSnapshot {
    pub claims_succeeded: u64,
    pub claims_failed: u64,
    pub releases: u64,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
}

impl SchedulerMetrics {
    pub(crate) fn claim_task(&self, task_id: &TaskId, success: bool) {
        if success {
            self.claims_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.claims_failed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(task_id = %task_id, success, "claim_task recorded");
    }

    pub(crate) fn release_task(&self, task_id: &TaskId) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(task_id = %task_id, "release_task recorded");
    }

    pub(crate) fn start_run(&self, task_id: &TaskId) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(task_id = %task_id, "start_run recorded");
    }

    pub(crate) fn finish_run(&self, task_id: &TaskId, success: bool) {
        if success {
            self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.runs_failed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(task_id = %task_id, success, "finish_run recorded");
    }

    /// Reads all counters. Not atomic as a whole — individual counters may
    /// be updated between reads — which is fine for an exposition snapshot.
    pub fn snapshot(&self) -> SchedulerMetricsSnapshot {
        SchedulerMetricsSnapshot {
            claims_succeeded: self.claims_succeeded.load(Ordering::Relaxed),
            claims_failed: self.claims_failed.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
        }
    }
}
