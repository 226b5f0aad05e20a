//! Executor and engine outcome types.

use serde::{Deserialize, Serialize};

use crate::policy::Tier;

/// Status reported for one executor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Done,
    InProgress,
    Failed,
    /// Produced by the engine's tier gate only, never by an executor
    Halted,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Done => "done",
            OutcomeStatus::InProgress => "in_progress",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Halted => "halted",
        }
    }
}

/// What an executor reports back for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: OutcomeStatus,
    pub summary: String,
    pub output: String,
    pub decisions: String,
    pub errors: String,
    pub remaining: String,
}

impl ExecutionOutcome {
    pub fn new(status: OutcomeStatus, summary: impl Into<String>) -> Self {
        Self {
            status,
            summary: summary.into(),
            output: String::new(),
            decisions: String::new(),
            errors: "None".to_string(),
            remaining: "None".to_string(),
        }
    }

    pub fn done(summary: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Done, summary)
    }

    pub fn in_progress(summary: impl Into<String>, remaining: impl Into<String>) -> Self {
        Self {
            remaining: remaining.into(),
            ..Self::new(OutcomeStatus::InProgress, summary)
        }
    }

    pub fn failed(errors: impl Into<String>) -> Self {
        let errors = errors.into();
        Self {
            errors: errors.clone(),
            ..Self::new(OutcomeStatus::Failed, format!("Execution failed: {}", errors))
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_decisions(mut self, decisions: impl Into<String>) -> Self {
        self.decisions = decisions.into();
        self
    }
}

/// How the completion engine left a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    /// Store confirmed `status: done`; task relocated to the terminal area
    Completed { cycles: u32, terminal_id: String },
    /// Tier gate stopped the task before execution
    Halted { tier: Tier },
    /// Every cycle ran without the store reaching `done`
    Exhausted { cycles: u32, last_error: String },
    /// Shutdown requested between attempts or cycles; task reset to `ready`
    Interrupted { cycles: u32 },
}

impl EngineOutcome {
    /// Halted and exhausted tasks are not retried again in the same session
    pub fn is_session_failure(&self) -> bool {
        matches!(self, EngineOutcome::Halted { .. } | EngineOutcome::Exhausted { .. })
    }
}
