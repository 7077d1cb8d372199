//! Optional utility binding a periodic timer to [`Scheduler::tick`].
//!
//! Not part of the core contract: a host is free to drive `tick` from
//! whatever clock source it already has (a cron-style dispatcher, a test
//! harness stepping time manually, ...). This is just a convenience for
//! the common case of a fixed wall-clock period.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::scheduler::Scheduler;

/// Spawns a task that calls `scheduler.tick(now)` once per `period`, using
/// the wall clock for `now`. Each tick is itself spawned onto its own task
/// so that a slow sweep doesn't delay the next tick's firing.
///
/// Returns the `JoinHandle` for the ticker loop itself; dropping or
/// aborting it stops scheduling new ticks (ticks already spawned still
/// run to completion).
pub fn spawn_ticker(scheduler: Arc<Scheduler>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64;
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                scheduler.tick(now).await;
            });
        }
    })
}
