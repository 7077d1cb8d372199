//! Bundles the three external collaborators so `Scheduler`, `TaskScheduler`
//! and `Runner` can thread them through construction as one unit instead of
//! three separate `Arc` parameters.

use std::sync::Arc;

use crate::traits::{DesiredState, Executor, LogWriter};

#[derive(Clone)]
pub(crate) struct Collaborators {
    pub desired_state: Arc<dyn DesiredState>,
    pub executor: Arc<dyn Executor>,
    pub log_writer: Arc<dyn LogWriter>,
}
