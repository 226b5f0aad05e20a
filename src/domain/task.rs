//! Task records and their lifecycle status.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::metadata::{Metadata, parse_document, render_document};

/// Well-known metadata keys
pub mod keys {
    pub const STATUS: &str = "status";
    pub const PRIORITY: &str = "priority";
    pub const CLASSIFICATION: &str = "classification";
    pub const TITLE: &str = "title";
    pub const TYPE: &str = "type";
    pub const STARTED: &str = "started";
    pub const COMPLETED: &str = "completed";
    pub const REMAINING_WORK: &str = "remaining_work";
    pub const LAST_CYCLE: &str = "last_cycle";
    pub const ATTEMPTS: &str = "attempts";
    pub const COMPLETION_CYCLES: &str = "completion_cycles";
    pub const RESULT_SUMMARY: &str = "result_summary";
    pub const BLOCKED_REASON: &str = "blocked_reason";
    pub const ERROR: &str = "error";
    pub const SEVERITY: &str = "severity";
}

/// Value of the `type` key marking escalation records
pub const ESCALATION_TYPE: &str = "escalation";

/// Lifecycle status stored in the `status` metadata field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Ready,
    InProgress,
    Blocked,
    Failed,
    Done,
    Completed,
    Rejected,
    AwaitingHuman,
    /// Any other value found in a record
    Other(String),
}

impl TaskStatus {
    /// Parse a stored status value. A missing status means `Ready`.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return TaskStatus::Ready;
        };
        match value.trim().to_lowercase().as_str() {
            "" | "ready" => TaskStatus::Ready,
            "in_progress" => TaskStatus::InProgress,
            "blocked" => TaskStatus::Blocked,
            "failed" => TaskStatus::Failed,
            "done" => TaskStatus::Done,
            "completed" => TaskStatus::Completed,
            "rejected" => TaskStatus::Rejected,
            "awaiting_human" => TaskStatus::AwaitingHuman,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    /// Stored string form
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Ready => "ready",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Failed => "failed",
            TaskStatus::Done => "done",
            TaskStatus::Completed => "completed",
            TaskStatus::Rejected => "rejected",
            TaskStatus::AwaitingHuman => "awaiting_human",
            TaskStatus::Other(s) => s.as_str(),
        }
    }

    /// Whether the scheduler may pick this task up.
    ///
    /// Terminal, blocked, failed and in-progress (left over from a prior run)
    /// tasks are skipped.
    pub fn is_dispatchable(&self) -> bool {
        !matches!(
            self,
            TaskStatus::InProgress
                | TaskStatus::Blocked
                | TaskStatus::Failed
                | TaskStatus::Done
                | TaskStatus::Completed
                | TaskStatus::Rejected
                | TaskStatus::AwaitingHuman
        )
    }

    /// Only `done` is authoritative completion.
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work: stable identifier, metadata record and free-form body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub metadata: Metadata,
    pub body: String,
}

impl Task {
    pub fn new(id: impl Into<String>, metadata: Metadata, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata,
            body: body.into(),
        }
    }

    /// Build a task from a stored document
    pub fn from_document(id: impl Into<String>, content: &str) -> Self {
        let (metadata, body) = parse_document(content);
        Self::new(id, metadata, body)
    }

    /// Render back to the stored document form
    pub fn to_document(&self) -> String {
        render_document(&self.metadata, &self.body)
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::parse(self.metadata.get(keys::STATUS))
    }

    /// Priority label, if one was recorded
    pub fn priority(&self) -> Option<&str> {
        self.metadata.get(keys::PRIORITY)
    }

    pub fn classification(&self) -> Option<&str> {
        self.metadata.get(keys::CLASSIFICATION)
    }

    /// Escalation and rejection notes live beside tasks but are never dispatched
    pub fn is_escalation(&self) -> bool {
        self.metadata
            .get(keys::TYPE)
            .is_some_and(|t| t.eq_ignore_ascii_case(ESCALATION_TYPE))
    }

    pub fn remaining_work(&self) -> Option<&str> {
        self.metadata
            .get(keys::REMAINING_WORK)
            .filter(|r| !r.trim().is_empty())
    }
}
