//! Scheduler loop: poll, order, gate, dispatch, repeat.
//!
//! Single-threaded by construction. One task runs at a time and the loop
//! blocks on it, cooldowns included. Shutdown is cooperative and checked
//! between tasks, attempts, cycles and polls.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;

use super::priority::{PriorityTable, dispatch_queue};
use super::session::SessionFailures;
use crate::audit::{AuditRecord, AuditSink, AuditStatus};
use crate::config::Config;
use crate::domain::{EngineOutcome, Severity, Task};
use crate::engine::{CompletionEngine, pause};
use crate::error::{Result, StewardError};
use crate::executor::Executor;
use crate::store::TaskStore;

const LIFECYCLE_REF: &str = "scheduler";

/// What one poll did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Dispatchable tasks found
    pub queued: usize,
    /// Handed to the engine this poll
    pub dispatched: usize,
    pub completed: usize,
    /// Blocked at the tier gate
    pub halted: usize,
    /// Ran out of cycles
    pub exhausted: usize,
    /// Skipped because they already failed this session
    pub skipped: usize,
    /// Store faults while processing a task
    pub faulted: usize,
    /// Shutdown was requested before the queue was drained
    pub interrupted: bool,
    /// Dispatch order, for diagnostics
    pub order: Vec<String>,
}

/// The dispatch loop.
///
/// Owns the completion engine and the session state that outlives single
/// polls: the failure set and the completion counter.
pub struct Scheduler<S, E, A>
where
    S: TaskStore,
    E: Executor + ?Sized,
    A: AuditSink + ?Sized,
{
    engine: CompletionEngine<S, E, A>,
    priorities: PriorityTable,
    failures: SessionFailures,
    handbook: PathBuf,
    poll_interval: Duration,
    self_check_every: u64,
    completed_total: u64,
}

impl<S, E, A> Scheduler<S, E, A>
where
    S: TaskStore,
    E: Executor + ?Sized,
    A: AuditSink + ?Sized,
{
    /// Create a scheduler around `engine`, with ordering and timing from `config`
    pub fn new(engine: CompletionEngine<S, E, A>, config: &Config) -> Self {
        Self {
            engine,
            priorities: PriorityTable::new(&config.priority),
            failures: SessionFailures::new(),
            handbook: config.vault.handbook_path(),
            poll_interval: config.scheduler.poll_interval(),
            self_check_every: config.scheduler.self_check_every,
            completed_total: 0,
        }
    }

    /// Override the pause between polls
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Engine every dispatched task runs through
    pub fn engine(&self) -> &CompletionEngine<S, E, A> {
        &self.engine
    }

    /// Tasks that failed this session and will not be dispatched again
    pub fn failures(&self) -> &SessionFailures {
        &self.failures
    }

    /// Tasks completed since the scheduler was created
    pub fn completed_total(&self) -> u64 {
        self.completed_total
    }

    fn store(&self) -> &Arc<S> {
        self.engine.store()
    }

    fn emit(&self, record: AuditRecord) {
        if let Err(e) = self.engine.audit().record(&record) {
            log::warn!("Failed to write audit record: {}", e);
        }
    }

    /// Verify the layout and load the handbook. A missing handbook is E4:
    /// the scheduler refuses to start.
    pub fn preflight(&mut self) -> Result<()> {
        let started = Local::now();
        if !self.store().verify_layout()? {
            log::warn!("Store layout was incomplete and has been repaired");
        }

        let handbook = match fs::read_to_string(&self.handbook) {
            Ok(text) => text,
            Err(e) => {
                let message = format!("{} unreadable: {}", self.handbook.display(), e);
                log::error!("Policy source missing, refusing to start: {}", message);
                self.emit(
                    AuditRecord::new(LIFECYCLE_REF, "Startup refused", AuditStatus::Failure, started)
                        .category("lifecycle")
                        .fault(Severity::E4, &message),
                );
                return Err(StewardError::PolicyMissing(message));
            }
        };

        self.engine.set_constitution(handbook);
        log::info!("Handbook loaded from {}", self.handbook.display());
        Ok(())
    }

    /// One pass over the pending area.
    pub async fn poll_once(&mut self, shutdown: &watch::Receiver<bool>) -> Result<PollReport> {
        self.store().verify_layout()?;
        let queue = dispatch_queue(&self.priorities, self.store().list_pending()?);

        let mut report = PollReport {
            queued: queue.len(),
            ..PollReport::default()
        };

        for task in queue {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }
            if self.failures.contains(&task.id) {
                report.skipped += 1;
                continue;
            }

            report.dispatched += 1;
            report.order.push(task.id.clone());

            match self.dispatch(&task, shutdown).await {
                Ok(outcome) => {
                    if outcome.is_session_failure() {
                        self.failures.insert(task.id.clone());
                    }
                    match outcome {
                        EngineOutcome::Completed { .. } => {
                            report.completed += 1;
                            self.on_completed();
                        }
                        EngineOutcome::Halted { .. } => report.halted += 1,
                        EngineOutcome::Exhausted { .. } => report.exhausted += 1,
                        EngineOutcome::Interrupted { .. } => {
                            report.interrupted = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    log::error!("Fault while processing {}: {}", task.id, e);
                    self.failures.insert(task.id.clone());
                    report.faulted += 1;
                    if let Err(mark) = self.engine.record_fault(&task.id, &e.to_string()) {
                        log::error!("Could not mark {} failed: {}", task.id, mark);
                    }
                    self.emit(
                        AuditRecord::new(&task.id, "Processing fault", AuditStatus::Failure, Local::now())
                            .fault(Severity::E2, e.to_string()),
                    );
                }
            }
        }

        Ok(report)
    }

    /// Gate, then run the engine
    async fn dispatch(&self, task: &Task, shutdown: &watch::Receiver<bool>) -> Result<EngineOutcome> {
        let tier = self.engine.classify(task);
        if tier.requires_approval() {
            return self.engine.halt(task, tier);
        }
        self.engine.run(&task.id, shutdown).await
    }

    fn on_completed(&mut self) {
        self.completed_total += 1;
        if self.self_check_every == 0 || self.completed_total % self.self_check_every != 0 {
            return;
        }

        match self.store().verify_layout() {
            Ok(intact) => {
                log::info!("Self-check after {} completions: layout intact={}", self.completed_total, intact);
                self.emit(
                    AuditRecord::new(LIFECYCLE_REF, "Self-check", AuditStatus::Info, Local::now())
                        .category("lifecycle")
                        .output(format!("{} tasks completed, layout intact: {}", self.completed_total, intact)),
                );
            }
            Err(e) => log::error!("Self-check failed: {}", e),
        }
    }

    /// Run until shutdown is signalled.
    ///
    /// Only a failed preflight returns `Err`; every later fault is logged,
    /// audited and followed by the next poll.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let session_start = Local::now();
        self.preflight()?;
        log::info!(
            "Scheduler started: poll every {:?}, {} cycles x {} attempts",
            self.poll_interval,
            self.engine.settings().max_cycles,
            self.engine.settings().max_attempts
        );
        self.emit(AuditRecord::new(LIFECYCLE_REF, "Scheduler started", AuditStatus::Info, session_start).category("lifecycle"));

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once(&shutdown).await {
                Ok(report) if report.dispatched > 0 => log::info!(
                    "Poll: {} dispatched, {} completed, {} halted, {} exhausted, {} skipped",
                    report.dispatched,
                    report.completed,
                    report.halted,
                    report.exhausted,
                    report.skipped
                ),
                Ok(report) => log::debug!("Poll: nothing to do ({} skipped)", report.skipped),
                Err(e) => {
                    log::error!("Poll failed: {}", e);
                    self.emit(
                        AuditRecord::new(LIFECYCLE_REF, "Poll fault", AuditStatus::Failure, Local::now())
                            .category("lifecycle")
                            .fault(Severity::E2, e.to_string()),
                    );
                }
            }

            if pause(self.poll_interval, &shutdown).await {
                break;
            }
        }

        log::info!("Scheduler interrupted; {} tasks completed this session", self.completed_total);
        self.emit(
            AuditRecord::new(LIFECYCLE_REF, "Scheduler stopped by interrupt", AuditStatus::Info, session_start)
                .category("lifecycle")
                .output(format!("{} tasks completed this session", self.completed_total)),
        );
        Ok(())
    }
}
