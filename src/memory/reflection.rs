//! Scored journal entries written after each completion.

use chrono::{DateTime, Local, NaiveDate};

use super::TaskProfile;
use crate::id::{format_timestamp, truncate_chars};

pub const REFLECTIONS_FILE: &str = "reflections.md";

pub(super) const JOURNAL_HEADER: &str = "\
# Reflections

Scores run from 1 to 5. Entries are appended and never edited.
";

const ISSUE_CHARS: usize = 200;

/// How one completed task went
#[derive(Debug, Clone)]
pub struct Reflection {
    pub task_id: String,
    pub profile: TaskProfile,
    pub cycles: u32,
    pub attempts: u32,
    /// Last error seen during the run, empty when there was none
    pub errors: String,
    pub memory_applied: bool,
}

impl Reflection {
    pub fn new(task_id: impl Into<String>, profile: TaskProfile) -> Self {
        Self {
            task_id: task_id.into(),
            profile,
            cycles: 1,
            attempts: 1,
            errors: String::new(),
            memory_applied: false,
        }
    }

    pub fn cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn errors(mut self, errors: impl Into<String>) -> Self {
        self.errors = errors.into();
        self
    }

    pub fn memory_applied(mut self, applied: bool) -> Self {
        self.memory_applied = applied;
        self
    }

    pub fn plan_quality(&self) -> u8 {
        if self.profile.structured { 5 } else { 4 }
    }

    pub fn execution_efficiency(&self) -> u8 {
        if !self.errors.trim().is_empty() {
            3
        } else if self.cycles > 1 || self.attempts > self.cycles {
            4
        } else {
            5
        }
    }

    pub fn memory_effectiveness(&self) -> u8 {
        if self.memory_applied { 5 } else { 3 }
    }

    pub fn pattern_candidate(&self) -> bool {
        self.profile.domain.is_pattern_source() && self.plan_quality() >= 4
    }

    fn issues(&self) -> String {
        if self.errors.trim().is_empty() {
            "None identified".to_string()
        } else {
            truncate_chars(self.errors.trim(), ISSUE_CHARS)
        }
    }

    fn next_time(&self) -> &'static str {
        match (self.execution_efficiency(), self.memory_applied) {
            (3, _) => "Record the failure and its prevention in failures.md.",
            (4, _) => "Split the work so it fits in a single cycle.",
            (_, false) => "Add a pattern for this kind of task to task_patterns.md.",
            _ => "Keep the recalled patterns current.",
        }
    }

    pub fn render(&self, id: &str, at: &DateTime<Local>) -> String {
        format!(
            "\n### Reflection ID: {}\n\
             **Task ID**: {}\n\
             **Date/Time**: {}\n\
             **Plan Quality Score**: {}/5\n\
             **Execution Efficiency Score**: {}/5\n\
             **Memory Usage Effectiveness**: {}/5\n\
             **Cycles / Attempts**: {} / {}\n\
             **Issues Encountered**: {}\n\
             **What Should Be Done Differently Next Time**: {}\n\
             **Pattern Candidate**: {}\n\
             **Notes for Future Optimization**: domain {}, complexity {}, memory influence {}\n\n---\n",
            id,
            self.task_id,
            format_timestamp(at),
            self.plan_quality(),
            self.execution_efficiency(),
            self.memory_effectiveness(),
            self.cycles,
            self.attempts,
            self.issues(),
            self.next_time(),
            if self.pattern_candidate() { "Yes" } else { "No" },
            self.profile.domain,
            self.profile.complexity.as_str(),
            if self.memory_applied { "applied" } else { "not applied" },
        )
    }
}

/// Next `YYYY-MM-DD_REF-NNN` id; numbering continues across days
pub fn next_reflection_id(journal: &str, date: NaiveDate) -> String {
    let highest = journal
        .lines()
        .filter_map(|line| line.trim().strip_prefix("### Reflection ID:"))
        .filter_map(|id| id.trim().rsplit_once("_REF-"))
        .filter_map(|(_, number)| number.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}_REF-{:03}", date.format("%Y-%m-%d"), highest + 1)
}
