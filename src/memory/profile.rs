//! Coarse task profile used to match memory entries.

use std::fmt;

use crate::domain::{Metadata, keys};
use crate::id::truncate_chars;

const INTENT_CHARS: usize = 100;

const PLAN_MARKERS: [&str; 3] = ["plan", "step", "objective"];

/// Work area inferred from task wording; first matching group wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Code,
    Review,
    Research,
    Documentation,
    Planning,
    General,
}

impl Domain {
    const KEYWORDS: [(Domain, &'static [&'static str]); 5] = [
        (
            Domain::Code,
            &["code", "python", "javascript", "program", "function", "class", "method", "bug", "fix", "debug"],
        ),
        (Domain::Review, &["review", "analyze", "check", "examine", "audit", "validate"]),
        (Domain::Research, &["research", "find", "search", "information", "data", "study"]),
        (
            Domain::Documentation,
            &["document", "write", "create", "draft", "text", "article", "documentation"],
        ),
        (Domain::Planning, &["plan", "strategy", "organize", "schedule", "arrange", "design"]),
    ];

    pub fn infer(content: &str) -> Self {
        let lower = content.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(domain, _)| *domain)
            .unwrap_or(Domain::General)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Code => "code",
            Domain::Review => "review",
            Domain::Research => "research",
            Domain::Documentation => "documentation",
            Domain::Planning => "planning",
            Domain::General => "general",
        }
    }

    /// Domains whose completions are worth promoting to patterns
    pub fn is_pattern_source(&self) -> bool {
        matches!(
            self,
            Domain::Code | Domain::Documentation | Domain::Research | Domain::Planning
        )
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size class by word count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    pub fn from_words(words: usize) -> Self {
        match words {
            0..50 => Complexity::Simple,
            50..200 => Complexity::Medium,
            _ => Complexity::Complex,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::Complex => "complex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProfile {
    pub domain: Domain,
    pub complexity: Complexity,
    /// First non-blank body line, lowercased
    pub intent: String,
    /// Classification tag from metadata, lowercased
    pub classification: Option<String>,
    /// The task spells out a plan, steps or objectives
    pub structured: bool,
}

impl TaskProfile {
    pub fn analyze(metadata: &Metadata, body: &str) -> Self {
        let intent = body
            .lines()
            .map(|line| line.trim().trim_start_matches('#').trim())
            .find(|line| !line.is_empty())
            .map(|line| truncate_chars(&line.to_lowercase(), INTENT_CHARS))
            .unwrap_or_default();

        let lower = body.to_lowercase();
        Self {
            domain: Domain::infer(body),
            complexity: Complexity::from_words(body.split_whitespace().count()),
            intent,
            classification: metadata
                .get(keys::CLASSIFICATION)
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
            structured: PLAN_MARKERS.iter().any(|m| lower.contains(m)),
        }
    }

    /// Whether a memory entry's text concerns this kind of task
    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if lower.contains(self.domain.as_str()) || lower.contains(self.complexity.as_str()) {
            return true;
        }
        if !self.intent.is_empty() && lower.contains(&self.intent) {
            return true;
        }
        self.classification.as_deref().is_some_and(|c| lower.contains(c))
    }
}
