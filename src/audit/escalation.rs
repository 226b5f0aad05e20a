//! Escalation notes: human-directed records written beside pending tasks.

use chrono::Local;

use crate::domain::{ESCALATION_TYPE, Metadata, Severity, TaskStatus, keys};
use crate::error::Result;
use crate::id::name_stem;
use crate::store::TaskStore;

/// A task that cannot proceed without a human.
///
/// The four narrative fields are always rendered, in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub task_ref: String,
    pub severity: Severity,
    pub what_happened: String,
    pub what_was_tried: String,
    pub what_is_needed: String,
    pub impact: String,
    /// Additional metadata written after the standard keys
    pub extra: Metadata,
}

impl Escalation {
    pub fn new(task_ref: impl Into<String>, severity: Severity) -> Self {
        Self {
            task_ref: task_ref.into(),
            severity,
            what_happened: String::new(),
            what_was_tried: String::new(),
            what_is_needed: String::new(),
            impact: String::new(),
            extra: Metadata::new(),
        }
    }

    pub fn happened(mut self, text: impl Into<String>) -> Self {
        self.what_happened = text.into();
        self
    }

    pub fn tried(mut self, text: impl Into<String>) -> Self {
        self.what_was_tried = text.into();
        self
    }

    pub fn needed(mut self, text: impl Into<String>) -> Self {
        self.what_is_needed = text.into();
        self
    }

    pub fn impact(mut self, text: impl Into<String>) -> Self {
        self.impact = text.into();
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.set(key, value);
        self
    }

    /// `ESCALATION_{date}_{task stem}.md`
    pub fn file_name(&self) -> String {
        format!(
            "ESCALATION_{}_{}.md",
            Local::now().format("%Y-%m-%d"),
            name_stem(&self.task_ref)
        )
    }

    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new()
            .with(keys::TYPE, ESCALATION_TYPE)
            .with(keys::SEVERITY, self.severity.as_str())
            .with("task_ref", &self.task_ref)
            .with("created", Local::now().format("%Y-%m-%d %H:%M").to_string())
            .with(keys::STATUS, TaskStatus::AwaitingHuman.as_str());
        metadata.merge(&self.extra);
        metadata
    }

    pub fn body(&self) -> String {
        format!(
            "\n\n# ESCALATION - {}\n\n\
             ## What Happened\n{}\n\n\
             ## What Was Tried\n{}\n\n\
             ## What Is Needed\n{}\n\n\
             ## Impact If Unresolved\n{}\n",
            self.task_ref, self.what_happened, self.what_was_tried, self.what_is_needed, self.impact
        )
    }

    /// Write the note into the pending area, never overwriting an existing one.
    ///
    /// Returns the identifier of the created note.
    pub fn file(&self, store: &dyn TaskStore) -> Result<String> {
        let id = store.create(&self.file_name(), &self.metadata(), &self.body())?;
        log::warn!("Escalation created: {} ({})", id, self.severity);
        Ok(id)
    }
}
