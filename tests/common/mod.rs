//! Shared fixtures: a scripted executor and fast configuration.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use steward::config::Config;
use steward::domain::{ExecutionOutcome, Metadata, Task, TaskStatus, keys};
use steward::error::{Result, StewardError};
use steward::executor::{ExecutionRequest, Executor, commit_claim};
use steward::store::{MemoryTaskStore, TaskStore};
use tokio::sync::watch;

/// One scripted executor behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Conclude done and write it to the store
    Finish,
    /// Report done without writing it
    Claim,
    /// Write done to the store but report in-progress
    FinishQuietly,
    Progress,
    Fail,
    /// Return `Err`
    Raise,
    /// Report in-progress and request shutdown
    ProgressThenStop,
    /// Write done to the store but report failed
    FinishThenFail,
}

pub struct ScriptedExecutor {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    requests: Mutex<Vec<ExecutionRequest>>,
    stop: Mutex<Option<watch::Sender<bool>>>,
}

impl ScriptedExecutor {
    pub fn new(steps: &[Step], fallback: Step) -> Self {
        Self {
            steps: Mutex::new(steps.iter().copied().collect()),
            fallback,
            requests: Mutex::new(Vec::new()),
            stop: Mutex::new(None),
        }
    }

    /// Always behaves the same way
    pub fn always(step: Step) -> Self {
        Self::new(&[], step)
    }

    pub fn with_stop(self, stop: watch::Sender<bool>) -> Self {
        *self.stop.lock().unwrap() = Some(stop);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn invoke(&self, store: &dyn TaskStore, request: &ExecutionRequest) -> Result<ExecutionOutcome> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(self.fallback);

        match step {
            Step::Finish => {
                let outcome = ExecutionOutcome::done(format!("Finished {}", request.task_id))
                    .with_output("All sections written");
                commit_claim(store, &request.task_id, &outcome)?;
                Ok(outcome)
            }
            Step::Claim => Ok(ExecutionOutcome::done("Claimed without writing")),
            Step::FinishQuietly => {
                store.update_metadata(
                    &request.task_id,
                    &Metadata::new().with(keys::STATUS, TaskStatus::Done.as_str()),
                )?;
                Ok(ExecutionOutcome::in_progress("Wrote done directly", "None"))
            }
            Step::Progress => Ok(ExecutionOutcome::in_progress(
                format!("Cycle {} partial", request.cycle),
                format!("Sections left after cycle {}", request.cycle),
            )),
            Step::Fail => Ok(ExecutionOutcome::failed("model refused")),
            Step::Raise => Err(StewardError::Executor("connection reset".to_string())),
            Step::FinishThenFail => {
                store.update_metadata(
                    &request.task_id,
                    &Metadata::new().with(keys::STATUS, TaskStatus::Done.as_str()),
                )?;
                Ok(ExecutionOutcome::failed("lost the connection after saving"))
            }
            Step::ProgressThenStop => {
                if let Some(stop) = self.stop.lock().unwrap().as_ref() {
                    let _ = stop.send(true);
                }
                Ok(ExecutionOutcome::in_progress("partial", "more"))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Defaults with every wait set to zero
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.scheduler.cycle_cooldown_ms = 0;
    config.scheduler.poll_interval_ms = 0;
    config
}

pub fn ready_task(id: &str, priority: Option<&str>, body: &str) -> Task {
    let mut metadata = Metadata::new().with(keys::STATUS, TaskStatus::Ready.as_str());
    if let Some(priority) = priority {
        metadata.set(keys::PRIORITY, priority);
    }
    Task::new(id, metadata, format!("\n\n# {}\n\n{}\n", id, body))
}

pub fn escalations(store: &dyn TaskStore) -> Vec<Task> {
    store
        .list_pending()
        .unwrap()
        .into_iter()
        .filter(Task::is_escalation)
        .collect()
}

/// In-memory store that fails on request
pub struct FlakyStore {
    inner: MemoryTaskStore,
    progress_faults: AtomicUsize,
    broken_moves: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryTaskStore::new(),
            progress_faults: AtomicUsize::new(0),
            broken_moves: Mutex::new(HashSet::new()),
        }
    }

    /// Fail the next `count` metadata writes that record remaining work
    pub fn fail_progress_writes(self, count: usize) -> Self {
        self.progress_faults.store(count, Ordering::SeqCst);
        self
    }

    /// Every move of `id` to the terminal area fails
    pub fn break_moves_for(self, id: &str) -> Self {
        self.broken_moves.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn insert(&self, task: Task) -> Result<()> {
        self.inner.insert(task)
    }
}

impl TaskStore for FlakyStore {
    fn verify_layout(&self) -> Result<bool> {
        self.inner.verify_layout()
    }

    fn list_pending(&self) -> Result<Vec<Task>> {
        self.inner.list_pending()
    }

    fn list_terminal(&self) -> Result<Vec<Task>> {
        self.inner.list_terminal()
    }

    fn read(&self, id: &str) -> Result<Task> {
        self.inner.read(id)
    }

    fn update_metadata(&self, id: &str, updates: &Metadata) -> Result<()> {
        if updates.contains(keys::REMAINING_WORK)
            && self
                .progress_faults
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(StewardError::Store("disk hiccup".to_string()));
        }
        self.inner.update_metadata(id, updates)
    }

    fn append_body(&self, id: &str, text: &str) -> Result<()> {
        self.inner.append_body(id, text)
    }

    fn move_to_terminal(&self, id: &str) -> Result<String> {
        if self.broken_moves.lock().unwrap().contains(id) {
            return Err(StewardError::Store("done area unavailable".to_string()));
        }
        self.inner.move_to_terminal(id)
    }

    fn create(&self, id: &str, metadata: &Metadata, body: &str) -> Result<String> {
        self.inner.create(id, metadata, body)
    }
}
