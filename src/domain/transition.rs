//! Append-only transition history kept in the task body.
//!
//! Rows are appended to a markdown table under a `## Transition History`
//! heading and are never rewritten.

use serde::{Deserialize, Serialize};

use crate::id::{parse_timestamp, timestamp_now};

pub const HISTORY_HEADING: &str = "## Transition History";

const TABLE_HEADER: &str = "| Timestamp | From | To | Action | By |\n|-----------|------|----|--------|-----|";

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub at: String,
    pub from: String,
    pub to: String,
    pub action: String,
    pub actor: String,
}

impl TransitionRecord {
    /// Record a transition happening now
    pub fn now(
        from: impl Into<String>,
        to: impl Into<String>,
        action: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            at: timestamp_now(),
            from: from.into(),
            to: to.into(),
            action: action.into(),
            actor: actor.into(),
        }
    }

    pub fn to_row(&self) -> String {
        format!(
            "| {} | {} | {} | {} | {} |",
            cell(&self.at),
            cell(&self.from),
            cell(&self.to),
            cell(&self.action),
            cell(&self.actor)
        )
    }

    fn from_row(line: &str) -> Option<Self> {
        let inner = line.trim().strip_prefix('|')?.strip_suffix('|')?;
        let cells: Vec<&str> = inner.split('|').map(str::trim).collect();
        if cells.len() != 5 {
            return None;
        }
        // Header and separator rows do not carry a timestamp
        parse_timestamp(cells[0])?;
        Some(Self {
            at: cells[0].to_string(),
            from: cells[1].to_string(),
            to: cells[2].to_string(),
            action: cells[3].to_string(),
            actor: cells[4].to_string(),
        })
    }
}

fn cell(value: &str) -> String {
    value.replace('|', "/").replace(['\n', '\r'], " ")
}

/// Text to append to `body` so the record lands at the end of the history.
///
/// The first record also introduces the heading and table header.
pub fn history_append_text(body: &str, record: &TransitionRecord) -> String {
    if body.contains(HISTORY_HEADING) {
        format!("\n{}\n", record.to_row())
    } else {
        format!("\n\n{}\n\n{}\n{}\n", HISTORY_HEADING, TABLE_HEADER, record.to_row())
    }
}

/// All recorded transitions, oldest first
pub fn parse_history(body: &str) -> Vec<TransitionRecord> {
    let Some(start) = body.find(HISTORY_HEADING) else {
        return Vec::new();
    };
    body[start..]
        .lines()
        .filter_map(TransitionRecord::from_row)
        .collect()
}
