//! In-memory test doubles shared across the integration tests in `tests/`.
//!
//! One struct per collaborator trait, controllable from the test body,
//! with a small amount of bookkeeping a test can assert against.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use task_scheduler::{
    DesiredState, Executor, LogWriter, QueuedRun, RunCreation, RunId, RunOutcome, RunPromise,
    RunStatus, RunWaitError, StoreTask, TaskId,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// What a run's execution should do once `RunPromise::wait` is polled.
#[derive(Clone, Copy)]
pub enum Script {
    /// Resolves successfully the instant `wait` is called.
    Succeed,
    /// Fails the instant `wait` is called.
    Fail(&'static str),
    /// Blocks until the test resolves it through the `ManualRunHandle`
    /// returned by `FakeExecutor::handle_for`, or until canceled.
    Manual,
}

/// An in-memory desired-state store. Mints sequential `RunId`s; each
/// task's own due timestamp advances by a fixed `period` on every
/// successful mint.
///
/// Crucially, the minted `QueuedRun::now` is the task's *due* timestamp,
/// not the `now` argument the runner happened to call with — a desired
/// state fulfills whatever is due, it doesn't echo back the caller's
/// clock. A task must be registered with [`FakeDesiredState::seed`]
/// (matching its `StoreTaskMeta`'s initial due) before it is claimed.
pub struct FakeDesiredState {
    inner: Mutex<DesiredStateInner>,
}

struct DesiredStateInner {
    run_counter: u64,
    period: i64,
    fail_create: bool,
    due: HashMap<TaskId, i64>,
    creates: Vec<(TaskId, i64)>,
    finishes: Vec<(TaskId, RunId)>,
}

impl FakeDesiredState {
    pub fn new(period: i64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(DesiredStateInner {
                run_counter: 0,
                period,
                fail_create: false,
                due: HashMap::new(),
                creates: Vec::new(),
                finishes: Vec::new(),
            }),
        })
    }

    /// Registers `task_id`'s first due timestamp. Must match the
    /// `StoreTaskMeta` the task is claimed with.
    pub fn seed(&self, task_id: TaskId, first_due: i64) {
        self.inner.lock().unwrap().due.insert(task_id, first_due);
    }

    pub fn fail_next_creates(&self, fail: bool) {
        self.inner.lock().unwrap().fail_create = fail;
    }

    pub fn create_count(&self) -> usize {
        self.inner.lock().unwrap().creates.len()
    }

    pub fn finish_count(&self) -> usize {
        self.inner.lock().unwrap().finishes.len()
    }

    pub fn finishes(&self) -> Vec<(TaskId, RunId)> {
        self.inner.lock().unwrap().finishes.clone()
    }
}

#[async_trait]
impl DesiredState for FakeDesiredState {
    async fn create_next_run(
        &self,
        _cancel: &CancellationToken,
        task_id: &TaskId,
        now: i64,
    ) -> anyhow::Result<RunCreation> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_create {
            anyhow::bail!("store unavailable");
        }
        let due = *inner
            .due
            .get(task_id)
            .ok_or_else(|| anyhow::anyhow!("task {task_id} was never seeded with a due time"))?;
        inner.run_counter += 1;
        let run_id = RunId::new(format!("run-{}", inner.run_counter));
        let next_due = due + inner.period;
        inner.due.insert(task_id.clone(), next_due);
        inner.creates.push((task_id.clone(), now));
        Ok(RunCreation {
            created: QueuedRun {
                task_id: task_id.clone(),
                run_id,
                now: due,
            },
            next_due,
        })
    }

    async fn finish_run(
        &self,
        _cancel: &CancellationToken,
        task_id: &TaskId,
        run_id: &RunId,
    ) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .finishes
            .push((task_id.clone(), run_id.clone()));
        Ok(())
    }
}

enum ManualOutcome {
    Success,
    Fail(String),
}

/// Held by a test to resolve a `Script::Manual` run it triggered.
#[derive(Clone)]
pub struct ManualRunHandle {
    outcome: Arc<Mutex<Option<ManualOutcome>>>,
    ready: Arc<Notify>,
}

impl ManualRunHandle {
    pub fn succeed(&self) {
        *self.outcome.lock().unwrap() = Some(ManualOutcome::Success);
        self.ready.notify_one();
    }

    #[allow(dead_code)]
    pub fn fail(&self, msg: &str) {
        *self.outcome.lock().unwrap() = Some(ManualOutcome::Fail(msg.to_string()));
        self.ready.notify_one();
    }
}

struct ScriptedPromise {
    script: Script,
    manual_outcome: Arc<Mutex<Option<ManualOutcome>>>,
    manual_ready: Arc<Notify>,
    cancel_notify: Arc<Notify>,
}

#[async_trait]
impl RunPromise for ScriptedPromise {
    async fn wait(&self) -> Result<RunOutcome, RunWaitError> {
        match self.script {
            Script::Succeed => Ok(RunOutcome::default()),
            Script::Fail(msg) => Err(RunWaitError::Failed {
                source: anyhow::anyhow!(msg),
                retryable: false,
            }),
            Script::Manual => loop {
                tokio::select! {
                    _ = self.manual_ready.notified() => {
                        match self.manual_outcome.lock().unwrap().take() {
                            Some(ManualOutcome::Success) => return Ok(RunOutcome::default()),
                            Some(ManualOutcome::Fail(msg)) => {
                                return Err(RunWaitError::Failed {
                                    source: anyhow::anyhow!(msg),
                                    retryable: false,
                                })
                            }
                            None => continue,
                        }
                    }
                    _ = self.cancel_notify.notified() => {
                        return Err(RunWaitError::Canceled);
                    }
                }
            },
        }
    }

    fn cancel(&self) {
        self.cancel_notify.notify_one();
    }
}

/// An in-memory executor. Every run started through it is recorded; the
/// test controls what each run does either via a crate-wide default
/// script or a per-run override installed before the run is minted.
pub struct FakeExecutor {
    default_script: Script,
    overrides: Mutex<HashMap<RunId, Script>>,
    executions: Mutex<Vec<QueuedRun>>,
    manual_handles: Mutex<HashMap<RunId, ManualRunHandle>>,
}

impl FakeExecutor {
    pub fn new(default_script: Script) -> Arc<Self> {
        Arc::new(Self {
            default_script,
            overrides: Mutex::new(HashMap::new()),
            executions: Mutex::new(Vec::new()),
            manual_handles: Mutex::new(HashMap::new()),
        })
    }

    pub fn execution_count(&self) -> usize {
        self.executions.lock().unwrap().len()
    }

    /// The `QueuedRun::now` of every run handed to `execute`, in order.
    pub fn executions_nows(&self) -> Vec<i64> {
        self.executions.lock().unwrap().iter().map(|r| r.now).collect()
    }

    /// Returns the handle for a manually-scripted run, once it has been
    /// started. `None` if the run hasn't reached `execute` yet.
    pub fn handle_for(&self, run_id: &RunId) -> Option<ManualRunHandle> {
        self.manual_handles.lock().unwrap().get(run_id).cloned()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(
        &self,
        _cancel: &CancellationToken,
        run: QueuedRun,
    ) -> anyhow::Result<Box<dyn RunPromise>> {
        let script = self
            .overrides
            .lock()
            .unwrap()
            .get(&run.run_id)
            .copied()
            .unwrap_or(self.default_script);

        self.executions.lock().unwrap().push(run.clone());

        let manual_outcome = Arc::new(Mutex::new(None));
        let manual_ready = Arc::new(Notify::new());
        let cancel_notify = Arc::new(Notify::new());

        if matches!(script, Script::Manual) {
            self.manual_handles.lock().unwrap().insert(
                run.run_id.clone(),
                ManualRunHandle {
                    outcome: Arc::clone(&manual_outcome),
                    ready: Arc::clone(&manual_ready),
                },
            );
        }

        Ok(Box::new(ScriptedPromise {
            script,
            manual_outcome,
            manual_ready,
            cancel_notify,
        }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub task_id: TaskId,
    pub run_id: RunId,
    pub status: RunStatus,
}

pub struct FakeLogWriter {
    entries: Mutex<Vec<LogEntry>>,
}

impl FakeLogWriter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn statuses_for(&self, run_id: &RunId) -> Vec<RunStatus> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.run_id == run_id)
            .map(|e| e.status)
            .collect()
    }
}

#[async_trait]
impl LogWriter for FakeLogWriter {
    async fn update_run_state(
        &self,
        _cancel: &CancellationToken,
        task: &StoreTask,
        run_id: &RunId,
        _at: std::time::SystemTime,
        status: RunStatus,
    ) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(LogEntry {
            task_id: task.id.clone(),
            run_id: run_id.clone(),
            status,
        });
        Ok(())
    }
}

/// Polls `check` until it returns true or `attempts` is exhausted,
/// yielding the executor between polls so spawned runner tasks get a
/// chance to make progress. Returns the final value of `check`.
pub async fn wait_until(mut check: impl FnMut() -> bool, attempts: usize) -> bool {
    for _ in 0..attempts {
        if check() {
            return true;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    check()
}
