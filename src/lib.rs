//! An in-process task run scheduler.
//!
//! This crate drives recurring task runs against a durable "desired
//! state" and an opaque execution engine. Given a wall-clock tick, it
//! determines which claimed tasks are due, creates the next run for each
//! due task, executes them with bounded per-task concurrency, reports
//! results back to the desired state, and emits lifecycle telemetry and
//! per-run log records.
//!
//! The crate owns none of persistence, execution, or logging — it asks
//! three collaborators, expressed as traits, to do that work:
//!
//! - [`DesiredState`] mints the next run for a task and is told when a run
//!   is finished.
//! - [`Executor`] begins executing a run and returns a [`RunPromise`].
//! - [`LogWriter`] records every Started/Success/Fail/Canceled transition.
//!
//! A fourth collaborator, the ticker source, is not a trait: it is
//! whatever external driver calls [`Scheduler::tick`] on a cadence of its
//! choosing. [`spawn_ticker`] is an optional convenience for the common
//! case of a fixed wall-clock period.
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use task_scheduler::{Scheduler, StoreTask, StoreTaskMeta, TaskId};
//!
//! # async fn build(
//! #     desired_state: Arc<dyn task_scheduler::DesiredState>,
//! #     executor: Arc<dyn task_scheduler::Executor>,
//! #     log_writer: Arc<dyn task_scheduler::LogWriter>,
//! # ) -> anyhow::Result<()> {
//! let scheduler = Scheduler::new(desired_state, executor, log_writer, 0);
//!
//! scheduler
//!     .claim_task(
//!         StoreTask::new(TaskId::new("nightly-backup")),
//!         StoreTaskMeta::with_fixed_next_due(NonZeroUsize::new(4).unwrap(), 100),
//!     )
//!     .await?;
//!
//! scheduler.tick(100).await;
//! # Ok(())
//! # }
//! ```

mod collaborators;
mod error;
mod ids;
mod metrics;
mod model;
mod runner;
mod scheduler;
mod task_scheduler;
mod ticker;
mod traits;

pub use error::SchedulerError;
pub use ids::{RunId, TaskId};
pub use metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
pub use model::{
    QueuedRun, RunCreation, RunOutcome, RunStatus, RunWaitError, StoreTask, StoreTaskMeta,
    Timestamp,
};
pub use scheduler::Scheduler;
pub use ticker::spawn_ticker;
pub use traits::{DesiredState, Executor, LogWriter, RunPromise};
