//! Completion engine: drives one authorized task to `done` or `failed`.
//!
//! Two nested budgets bound the work:
//! - cycles: re-invocation after an in-progress outcome
//! - attempts: retries inside a cycle after a failed outcome or executor error
//!
//! Completion is decided by the store alone. An executor claiming `done`
//! without the store showing `status: done` is treated as in-progress.
//! A store fault inside an attempt spends that attempt like an executor
//! failure; the task is put back to `ready` before the retry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::watch;

use crate::audit::{AuditRecord, AuditSink, AuditStatus, Escalation};
use crate::config::{Config, SchedulerConfig};
use crate::domain::{
    EngineOutcome, ExecutionOutcome, Metadata, OutcomeStatus, Severity, Task, TaskStatus, TransitionRecord, keys,
};
use crate::error::Result;
use crate::executor::{ExecutionRequest, Executor};
use crate::id::{timestamp_now, truncate_chars};
use crate::memory::{MemoryBank, Reflection, TaskProfile};
use crate::policy::{SkillRegistry, Tier, TierPolicy, load_skill_context};
use crate::store::TaskStore;

/// Actor recorded in transition history rows
pub const ACTOR: &str = "scheduler";

const SUMMARY_LIMIT: usize = 200;

/// Budgets for one task run
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Invocations allowed to leave work in progress before giving up
    pub max_cycles: u32,
    /// Attempts per cycle (retries + 1)
    pub max_attempts: u32,
    /// Pause between cycles
    pub cooldown: Duration,
}

impl From<&SchedulerConfig> for EngineSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            max_cycles: config.max_cycles.max(1),
            max_attempts: config.max_attempts(),
            cooldown: config.cycle_cooldown(),
        }
    }
}

/// Bookkeeping carried across the cycles of one run
struct RunState {
    started: DateTime<Local>,
    attempts: u32,
    last_error: String,
    last_outcome: Option<ExecutionOutcome>,
    skill_id: String,
    profile: Option<TaskProfile>,
    memory_applied: bool,
}

impl RunState {
    fn new() -> Self {
        Self {
            started: Local::now(),
            attempts: 0,
            last_error: String::new(),
            last_outcome: None,
            skill_id: "-".to_string(),
            profile: None,
            memory_applied: false,
        }
    }
}

enum AttemptEnd {
    /// The store shows `done`
    Done(ExecutionOutcome),
    /// Human approval required before anything runs
    Gate(Task, Tier),
    /// In-progress outcome recorded; the cycle is over
    Progress,
    Failed(ExecutionOutcome),
}

enum CycleEnd {
    Finished(EngineOutcome),
    Continue,
    Interrupted,
}

/// Sleep for `duration` unless shutdown is requested first.
///
/// Returns `true` when shutdown has been requested.
pub(crate) async fn pause(duration: Duration, shutdown: &watch::Receiver<bool>) -> bool {
    if duration.is_zero() {
        return *shutdown.borrow();
    }

    let mut rx = shutdown.clone();
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        Ok(()) = rx.changed() => {}
    }
    let requested = *rx.borrow();
    requested
}

/// Drives one task at a time through cycles and attempts.
///
/// Holds the store, executor and audit sink plus the policies consulted on
/// every attempt: tier gate, skill registry and memory.
pub struct CompletionEngine<S, E, A>
where
    S: TaskStore,
    E: Executor + ?Sized,
    A: AuditSink + ?Sized,
{
    store: Arc<S>,
    executor: Arc<E>,
    audit: Arc<A>,
    tiers: TierPolicy,
    skills: SkillRegistry,
    settings: EngineSettings,
    skills_dir: PathBuf,
    memory: MemoryBank,
    constitution: String,
}

impl<S, E, A> CompletionEngine<S, E, A>
where
    S: TaskStore,
    E: Executor + ?Sized,
    A: AuditSink + ?Sized,
{
    /// Create an engine with budgets, policies and memory taken from `config`
    pub fn new(store: Arc<S>, executor: Arc<E>, audit: Arc<A>, config: &Config) -> Self {
        Self {
            store,
            executor,
            audit,
            tiers: TierPolicy::new(&config.tiers),
            skills: SkillRegistry::new(&config.skills),
            settings: EngineSettings::from(&config.scheduler),
            skills_dir: config.vault.skills_path(),
            memory: MemoryBank::from_config(config),
            constitution: String::new(),
        }
    }

    /// Replace the budgets read from config
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Handbook rules handed to every executor invocation
    pub fn set_constitution(&mut self, constitution: impl Into<String>) {
        self.constitution = constitution.into();
    }

    /// Store the engine reads and writes tasks through
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Sink receiving every audit record the engine emits
    pub fn audit(&self) -> &Arc<A> {
        &self.audit
    }

    /// Budgets in effect
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Approval tier of the task as it reads now
    pub fn classify(&self, task: &Task) -> Tier {
        self.tiers.classify(&task.metadata, &task.body)
    }

    /// Run the cycle/attempt loop for one task.
    ///
    /// Executor faults and store faults inside an attempt are absorbed into
    /// the attempt budget. `Err` is returned only when a terminal write
    /// (finalize, halt, exhaust, interrupt) fails.
    pub async fn run(&self, task_id: &str, shutdown: &watch::Receiver<bool>) -> Result<EngineOutcome> {
        let mut state = RunState::new();
        log::info!("Running {} (max {} cycles)", task_id, self.settings.max_cycles);

        for cycle in 1..=self.settings.max_cycles {
            match self.run_cycle(task_id, cycle, &mut state, shutdown).await? {
                CycleEnd::Finished(outcome) => return Ok(outcome),
                CycleEnd::Interrupted => return self.interrupt(task_id, cycle),
                CycleEnd::Continue => {}
            }

            if self.shows_done(task_id) {
                log::info!("Late completion confirmed for {} after cycle {}", task_id, cycle);
                let outcome = confirmed(state.last_outcome.as_ref());
                return self.finalize(task_id, &outcome, cycle, &state);
            }

            if cycle < self.settings.max_cycles {
                log::debug!("Cooling down {:?} before cycle {}", self.settings.cooldown, cycle + 1);
                if pause(self.settings.cooldown, shutdown).await {
                    return self.interrupt(task_id, cycle);
                }
            }
        }

        self.exhaust(task_id, &state)
    }

    async fn run_cycle(
        &self,
        task_id: &str,
        cycle: u32,
        state: &mut RunState,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleEnd> {
        let max_attempts = self.settings.max_attempts;

        for attempt in 1..=max_attempts {
            if *shutdown.borrow() {
                return Ok(CycleEnd::Interrupted);
            }

            let outcome = match self.attempt(task_id, cycle, attempt, state).await {
                Ok(AttemptEnd::Done(outcome)) => {
                    state.last_outcome = Some(outcome.clone());
                    return self.finalize(task_id, &outcome, cycle, state).map(CycleEnd::Finished);
                }
                Ok(AttemptEnd::Gate(task, tier)) => return self.halt(&task, tier).map(CycleEnd::Finished),
                Ok(AttemptEnd::Progress) => return Ok(CycleEnd::Continue),
                Ok(AttemptEnd::Failed(outcome)) => outcome,
                Err(e) => {
                    log::warn!("Store fault in attempt {} on {}: {}", attempt, task_id, e);
                    ExecutionOutcome::failed(format!("store fault: {}", e))
                }
            };

            state.last_error = outcome.errors.clone();
            self.record_attempt_fault(task_id, cycle, attempt, &outcome, state);
            state.last_outcome = Some(outcome);
            if attempt < max_attempts {
                if let Err(e) = self.reset_for_retry(task_id, attempt, state) {
                    log::warn!("Could not reset {} for retry: {}", task_id, e);
                }
                continue;
            }
            log::warn!("{}: cycle {} used all {} attempts", task_id, cycle, max_attempts);
            return Ok(CycleEnd::Continue);
        }

        Ok(CycleEnd::Continue)
    }

    /// One executor invocation with the reads and writes around it
    async fn attempt(&self, task_id: &str, cycle: u32, attempt: u32, state: &mut RunState) -> Result<AttemptEnd> {
        let task = self.store.read(task_id)?;
        if task.status().is_done() {
            return Ok(AttemptEnd::Done(confirmed(state.last_outcome.as_ref())));
        }

        let tier = self.classify(&task);
        if tier.requires_approval() {
            return Ok(AttemptEnd::Gate(task, tier));
        }

        self.mark_in_progress(&task)?;

        let skill = self.skills.resolve(&task.metadata, &task.body).clone();
        let skill_context = load_skill_context(&self.skills_dir, &skill);
        state.skill_id = skill.skill_id.clone();

        let profile = TaskProfile::analyze(&task.metadata, &task.body);
        let memory_note = self.memory.recall(&profile).note();
        state.memory_applied = memory_note.is_some();
        state.profile = Some(profile);

        let request = ExecutionRequest {
            task_id: task.id.clone(),
            content: task.to_document(),
            skill,
            skill_context,
            constitution: self.constitution.clone(),
            memory_note,
            prior_remaining: task.remaining_work().map(str::to_string),
            cycle,
            attempt,
        };

        let max_attempts = self.settings.max_attempts;
        log::info!("{}: cycle {}/{} attempt {}/{}", task_id, cycle, self.settings.max_cycles, attempt, max_attempts);
        state.attempts += 1;
        let outcome = match self.executor.invoke(&*self.store, &request).await {
            Ok(outcome) if outcome.status == OutcomeStatus::Halted => {
                ExecutionOutcome::failed("executor returned the reserved halted status")
            }
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Executor {} raised on {}: {}", self.executor.name(), task_id, e);
                ExecutionOutcome::failed(e.to_string())
            }
        };

        // A stored done wins over whatever status was reported
        if self.store.read(task_id)?.status().is_done() {
            return Ok(AttemptEnd::Done(confirmed(Some(&outcome))));
        }

        if outcome.status == OutcomeStatus::Failed {
            return Ok(AttemptEnd::Failed(outcome));
        }

        if outcome.status == OutcomeStatus::Done {
            log::warn!("{} claimed done but the store does not show it; continuing", task_id);
        }
        self.record_progress(task_id, cycle, &outcome)?;
        state.last_outcome = Some(outcome);
        Ok(AttemptEnd::Progress)
    }

    fn shows_done(&self, task_id: &str) -> bool {
        match self.store.read(task_id) {
            Ok(task) => task.status().is_done(),
            Err(e) => {
                log::warn!("Could not re-read {}: {}", task_id, e);
                false
            }
        }
    }

    fn mark_in_progress(&self, task: &Task) -> Result<()> {
        let status = task.status();
        if status == TaskStatus::InProgress {
            return Ok(());
        }

        let mut updates = Metadata::new().with(keys::STATUS, TaskStatus::InProgress.as_str());
        if !task.metadata.contains(keys::STARTED) {
            updates.set(keys::STARTED, timestamp_now());
        }
        self.store.update_metadata(&task.id, &updates)?;
        self.store.append_transition(
            &task.id,
            &TransitionRecord::now(status.as_str(), TaskStatus::InProgress.as_str(), "start", ACTOR),
        )
    }

    fn reset_for_retry(&self, task_id: &str, attempt: u32, state: &RunState) -> Result<()> {
        let from = self.store.read(task_id)?.status();
        if from.is_done() {
            return Ok(());
        }

        let updates = Metadata::new()
            .with(keys::STATUS, TaskStatus::Ready.as_str())
            .with(keys::ERROR, truncate_chars(&state.last_error, SUMMARY_LIMIT))
            .with(keys::ATTEMPTS, state.attempts.to_string());
        self.store.update_metadata(task_id, &updates)?;
        self.store.append_transition(
            task_id,
            &TransitionRecord::now(
                from.as_str(),
                TaskStatus::Ready.as_str(),
                format!("retry (attempt {} failed)", attempt),
                ACTOR,
            ),
        )
    }

    fn record_progress(&self, task_id: &str, cycle: u32, outcome: &ExecutionOutcome) -> Result<()> {
        let updates = Metadata::new()
            .with(keys::REMAINING_WORK, outcome.remaining.clone())
            .with(keys::LAST_CYCLE, cycle.to_string());
        self.store.update_metadata(task_id, &updates)?;
        self.store.append_transition(
            task_id,
            &TransitionRecord::now(
                TaskStatus::InProgress.as_str(),
                TaskStatus::InProgress.as_str(),
                format!("reprocess (cycle {})", cycle),
                ACTOR,
            ),
        )
    }

    fn record_attempt_fault(&self, task_id: &str, cycle: u32, attempt: u32, outcome: &ExecutionOutcome, state: &RunState) {
        let record = AuditRecord::new(
            task_id,
            format!("Attempt {} of cycle {} failed", attempt, cycle),
            AuditStatus::Failure,
            state.started,
        )
        .skill(&state.skill_id)
        .output(outcome.summary.clone())
        .fault(Severity::E2, &outcome.errors);
        self.emit(&record);
    }

    /// Block a task that needs human approval: one escalation, one audit record.
    pub fn halt(&self, task: &Task, tier: Tier) -> Result<EngineOutcome> {
        let started = Local::now();
        let keyword = self
            .tiers
            .matched_keyword(&task.body)
            .or_else(|| task.metadata.get(keys::TITLE).and_then(|t| self.tiers.matched_keyword(t)))
            .unwrap_or("policy");
        let reason = format!("{}: requires human approval (matched \"{}\")", tier, keyword);
        log::warn!("Blocking {}: {}", task.id, reason);

        let updates = Metadata::new()
            .with(keys::STATUS, TaskStatus::Blocked.as_str())
            .with(keys::BLOCKED_REASON, reason.clone());
        self.store.update_metadata(&task.id, &updates)?;
        self.store.append_transition(
            &task.id,
            &TransitionRecord::now(
                task.status().as_str(),
                TaskStatus::Blocked.as_str(),
                format!("block (tier {})", tier.level()),
                ACTOR,
            ),
        )?;

        Escalation::new(&task.id, Severity::E3)
            .happened(format!("The task was classified {} and blocked before execution. {}", tier, reason))
            .tried("Nothing. Work at tier 2 or above never runs automatically.")
            .needed("Review the task. Approve it by rewriting the flagged action or handle it manually, then set status back to ready.")
            .impact("The task stays blocked and the scheduler skips it.")
            .file(&*self.store)?;

        let record = AuditRecord::new(&task.id, format!("Blocked at {}", tier), AuditStatus::Blocked, started)
            .decisions(reason)
            .fault(Severity::E3, "human approval required");
        self.emit(&record);

        Ok(EngineOutcome::Halted { tier })
    }

    fn finalize(&self, task_id: &str, outcome: &ExecutionOutcome, cycles: u32, state: &RunState) -> Result<EngineOutcome> {
        let updates = Metadata::new()
            .with(keys::STATUS, TaskStatus::Done.as_str())
            .with(keys::COMPLETED, timestamp_now())
            .with(keys::COMPLETION_CYCLES, cycles.to_string())
            .with(keys::RESULT_SUMMARY, truncate_chars(&outcome.summary, SUMMARY_LIMIT));
        self.store.update_metadata(task_id, &updates)?;
        self.store.append_transition(
            task_id,
            &TransitionRecord::now(TaskStatus::InProgress.as_str(), TaskStatus::Done.as_str(), "complete", ACTOR),
        )?;
        self.store.append_body(task_id, &result_section(outcome, cycles))?;

        let terminal_id = self.store.move_to_terminal(task_id)?;
        log::info!("Completed {} in {} cycle(s) -> {}", task_id, cycles, terminal_id);
        self.reflect(&terminal_id, cycles, state);

        let record = AuditRecord::new(task_id, format!("Completed in {} cycle(s)", cycles), AuditStatus::Success, state.started)
            .skill(&state.skill_id)
            .output(outcome.summary.clone())
            .decisions(outcome.decisions.clone());
        self.emit(&record);

        Ok(EngineOutcome::Completed { cycles, terminal_id })
    }

    fn exhaust(&self, task_id: &str, state: &RunState) -> Result<EngineOutcome> {
        let cycles = self.settings.max_cycles;
        let error = if state.last_error.is_empty() {
            format!("No completion after {} cycles", cycles)
        } else {
            state.last_error.clone()
        };
        log::error!("Giving up on {} after {} cycles: {}", task_id, cycles, error);

        let from = self.store.read(task_id)?.status();
        let updates = Metadata::new()
            .with(keys::STATUS, TaskStatus::Failed.as_str())
            .with(keys::ERROR, truncate_chars(&error, SUMMARY_LIMIT))
            .with(keys::ATTEMPTS, state.attempts.to_string())
            .with(keys::COMPLETION_CYCLES, cycles.to_string())
            .with(keys::SEVERITY, Severity::E3.as_str());
        self.store.update_metadata(task_id, &updates)?;
        self.store.append_transition(
            task_id,
            &TransitionRecord::now(
                from.as_str(),
                TaskStatus::Failed.as_str(),
                format!("fail ({})", Severity::E3),
                ACTOR,
            ),
        )?;

        Escalation::new(task_id, Severity::E3)
            .happened(format!("The task did not reach done within {} cycles. Last error: {}", cycles, error))
            .tried(format!(
                "{} executor attempts across {} cycles, up to {} attempts per cycle.",
                state.attempts, cycles, self.settings.max_attempts
            ))
            .needed("Inspect the remaining work and errors, fix the task, then set status back to ready.")
            .impact("The task stays failed and is not retried until a human resets it or the scheduler restarts.")
            .file(&*self.store)?;

        let record = AuditRecord::new(task_id, format!("Failed after {} cycles", cycles), AuditStatus::Failure, state.started)
            .skill(&state.skill_id)
            .fault(Severity::E3, &error);
        self.emit(&record);

        Ok(EngineOutcome::Exhausted { cycles, last_error: error })
    }

    /// Mark a task whose processing ended in a fault: `failed`, the error,
    /// severity E2 and a `fail (E2)` row.
    pub fn record_fault(&self, task_id: &str, error: &str) -> Result<()> {
        let from = self.store.read(task_id)?.status();
        let updates = Metadata::new()
            .with(keys::STATUS, TaskStatus::Failed.as_str())
            .with(keys::ERROR, truncate_chars(error, SUMMARY_LIMIT))
            .with(keys::SEVERITY, Severity::E2.as_str());
        self.store.update_metadata(task_id, &updates)?;
        self.store.append_transition(
            task_id,
            &TransitionRecord::now(
                from.as_str(),
                TaskStatus::Failed.as_str(),
                format!("fail ({})", Severity::E2),
                ACTOR,
            ),
        )
    }

    fn reflect(&self, task_id: &str, cycles: u32, state: &RunState) {
        let Some(profile) = state.profile.clone() else {
            return;
        };
        let reflection = Reflection::new(task_id, profile)
            .cycles(cycles)
            .attempts(state.attempts)
            .errors(state.last_error.clone())
            .memory_applied(state.memory_applied);
        if let Err(e) = self.memory.reflect(&reflection) {
            log::warn!("Failed to journal a reflection for {}: {}", task_id, e);
        }
    }

    fn interrupt(&self, task_id: &str, cycles: u32) -> Result<EngineOutcome> {
        log::info!("Shutdown requested while running {}; returning it to ready", task_id);
        let status = self.store.read(task_id)?.status();
        if status != TaskStatus::Ready {
            self.store
                .update_metadata(task_id, &Metadata::new().with(keys::STATUS, TaskStatus::Ready.as_str()))?;
            self.store.append_transition(
                task_id,
                &TransitionRecord::now(status.as_str(), TaskStatus::Ready.as_str(), "interrupt", ACTOR),
            )?;
        }
        Ok(EngineOutcome::Interrupted { cycles })
    }

    fn emit(&self, record: &AuditRecord) {
        if let Err(e) = self.audit.record(record) {
            log::warn!("Failed to write audit record for {}: {}", record.task_ref, e);
        }
    }
}

/// The outcome to finalize with once the store shows `done`
fn confirmed(outcome: Option<&ExecutionOutcome>) -> ExecutionOutcome {
    match outcome {
        Some(o) if o.status == OutcomeStatus::Done => o.clone(),
        Some(o) => ExecutionOutcome::done("Completion confirmed by the store").with_output(o.output.clone()),
        None => ExecutionOutcome::done("Completion confirmed by the store"),
    }
}

fn result_section(outcome: &ExecutionOutcome, cycles: u32) -> String {
    format!(
        "\n\n## Execution Result\n\n\
         - **Status:** {}\n\
         - **Cycles:** {}\n\
         - **Summary:** {}\n\n\
         ### Output\n\n{}\n\n\
         ### Decisions\n\n{}\n",
        TaskStatus::Done,
        cycles,
        outcome.summary,
        if outcome.output.trim().is_empty() { "None" } else { outcome.output.trim() },
        if outcome.decisions.trim().is_empty() { "None" } else { outcome.decisions.trim() },
    )
}
