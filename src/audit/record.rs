//! Audit records: one markdown document per action taken.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{Metadata, Severity, render_document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failure,
    Blocked,
    Rejected,
    /// Lifecycle notes (start, stop, self-check)
    Info,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failure => "failure",
            AuditStatus::Blocked => "blocked",
            AuditStatus::Rejected => "rejected",
            AuditStatus::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub task_ref: String,
    pub action_taken: String,
    pub status: AuditStatus,
    pub category: String,
    pub skill_id: Option<String>,
    pub input: String,
    pub output: String,
    pub decisions: String,
    pub errors: String,
    pub started: DateTime<Local>,
    pub ended: DateTime<Local>,
}

impl AuditRecord {
    /// Start a record; `ended` is stamped now and can be moved with [`Self::finished_at`]
    pub fn new(
        task_ref: impl Into<String>,
        action_taken: impl Into<String>,
        status: AuditStatus,
        started: DateTime<Local>,
    ) -> Self {
        Self {
            task_ref: task_ref.into(),
            action_taken: action_taken.into(),
            status,
            category: "orchestration".to_string(),
            skill_id: None,
            input: String::new(),
            output: String::new(),
            decisions: String::new(),
            errors: "None".to_string(),
            started,
            ended: Local::now(),
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn decisions(mut self, decisions: impl Into<String>) -> Self {
        self.decisions = decisions.into();
        self
    }

    pub fn errors(mut self, errors: impl Into<String>) -> Self {
        self.errors = errors.into();
        self
    }

    /// Errors tagged with a severity, e.g. `E2: executor timed out`
    pub fn fault(self, severity: Severity, message: impl AsRef<str>) -> Self {
        let errors = format!("{}: {}", severity, message.as_ref());
        self.errors(errors)
    }

    pub fn finished_at(mut self, ended: DateTime<Local>) -> Self {
        self.ended = ended;
        self
    }

    /// `HH:MM:SS -> HH:MM:SS (Ns)`
    pub fn duration_text(&self) -> String {
        let secs = (self.ended - self.started).num_seconds().max(0);
        format!(
            "{} -> {} ({}s)",
            self.started.format("%H:%M:%S"),
            self.ended.format("%H:%M:%S"),
            secs
        )
    }

    /// Render the full log document under the given log id
    pub fn render(&self, log_id: &str) -> String {
        let metadata = Metadata::new()
            .with("log_id", log_id)
            .with("task_ref", &self.task_ref)
            .with("skill_id", self.skill_id.as_deref().unwrap_or("-"))
            .with("created", self.ended.format("%Y-%m-%d %H:%M").to_string())
            .with("status", self.status.as_str())
            .with("tags", format!("[log, {}]", self.category));

        let body = format!(
            "\n\n# Execution Log - {}\n\n\
             ## Action Taken\n{}\n\n\
             ## Input\n{}\n\n\
             ## Output\n{}\n\n\
             ## Decisions Made\n{}\n\n\
             ## Errors Encountered\n{}\n\n\
             ## Duration\n{}\n",
            self.task_ref,
            self.action_taken,
            or_none(&self.input),
            or_none(&self.output),
            or_none(&self.decisions),
            or_none(&self.errors),
            self.duration_text()
        );

        render_document(&metadata, &body)
    }
}

fn or_none(value: &str) -> &str {
    if value.trim().is_empty() { "None" } else { value }
}
