//! Memory file parsing and the influence note handed to executors.

use crate::id::truncate_chars;

/// One of the curated memory files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Pattern,
    Failure,
    Decision,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 3] = [MemoryKind::Pattern, MemoryKind::Failure, MemoryKind::Decision];

    pub fn file_name(&self) -> &'static str {
        match self {
            MemoryKind::Pattern => "task_patterns.md",
            MemoryKind::Failure => "failures.md",
            MemoryKind::Decision => "decisions.md",
        }
    }

    /// Word used in entry headings: `### Pattern ID: TP-001`
    pub fn label(&self) -> &'static str {
        match self {
            MemoryKind::Pattern => "Pattern",
            MemoryKind::Failure => "Failure",
            MemoryKind::Decision => "Decision",
        }
    }

    /// Section that describes the entry in one line
    fn headline_section(&self) -> &'static str {
        match self {
            MemoryKind::Pattern => "Pattern Description",
            MemoryKind::Failure => "Failure Description",
            MemoryKind::Decision => "Situation",
        }
    }
}

/// One `### <Kind> ID:` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    pub id: String,
    /// Everything under the heading up to the next entry or `---` rule
    pub text: String,
}

impl MemoryEntry {
    /// Text under a `#### **Name**` heading
    pub fn section(&self, name: &str) -> Option<String> {
        let heading = format!("#### **{}**", name);
        let mut lines = self.text.lines().skip_while(|line| line.trim() != heading);
        lines.next()?;

        let body: Vec<&str> = lines
            .take_while(|line| !line.trim_start().starts_with("####"))
            .collect();
        let body = body.join("\n").trim().to_string();
        (!body.is_empty()).then_some(body)
    }

    /// Value of a `Label: value` line
    pub fn field(&self, label: &str) -> Option<String> {
        let prefix = format!("{}:", label);
        self.text
            .lines()
            .find_map(|line| line.trim().strip_prefix(&prefix))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

fn entry_id<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let rest = line.strip_prefix("###")?.trim_start();
    let id = rest.strip_prefix(label)?.trim_start().strip_prefix("ID:")?.trim();
    (!id.is_empty()).then_some(id)
}

/// Split a memory file into its entries
pub fn parse_entries(kind: MemoryKind, text: &str) -> Vec<MemoryEntry> {
    let mut entries = Vec::new();
    let mut current: Option<(String, Vec<&str>, bool)> = None;

    for line in text.lines() {
        if let Some(id) = entry_id(line, kind.label()) {
            if let Some((id, lines, _)) = current.take() {
                entries.push(MemoryEntry { id, text: lines.join("\n") });
            }
            current = Some((id.to_string(), Vec::new(), false));
            continue;
        }

        if let Some((_, lines, closed)) = current.as_mut() {
            if line.trim() == "---" {
                *closed = true;
            } else if !*closed {
                lines.push(line);
            }
        }
    }
    if let Some((id, lines, _)) = current {
        entries.push(MemoryEntry { id, text: lines.join("\n") });
    }
    entries
}

/// Entries recalled for one task
#[derive(Debug, Clone, Default)]
pub struct Recall {
    pub patterns: Vec<MemoryEntry>,
    pub failures: Vec<MemoryEntry>,
    pub decisions: Vec<MemoryEntry>,
    excerpt: usize,
}

impl Recall {
    pub fn with_excerpt(excerpt: usize) -> Self {
        Self {
            excerpt,
            ..Self::default()
        }
    }

    pub fn push(&mut self, kind: MemoryKind, entries: Vec<MemoryEntry>) {
        match kind {
            MemoryKind::Pattern => self.patterns.extend(entries),
            MemoryKind::Failure => self.failures.extend(entries),
            MemoryKind::Decision => self.decisions.extend(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len() + self.failures.len() + self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn excerpt(&self, text: &str) -> String {
        let limit = if self.excerpt == 0 { 100 } else { self.excerpt };
        if text.chars().count() > limit {
            format!("{}...", truncate_chars(text, limit))
        } else {
            text.to_string()
        }
    }

    fn headline(&self, kind: MemoryKind, entry: &MemoryEntry) -> String {
        let text = entry
            .section(kind.headline_section())
            .map(|s| self.excerpt(s.lines().next().unwrap_or_default()))
            .unwrap_or_else(|| "No description".to_string());
        format!("- [{} ID: {}] {}", kind.label(), entry.id, text)
    }

    /// Render the influence note, or `None` when nothing was recalled
    pub fn note(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut lines = vec!["MEMORY INFLUENCE NOTE".to_string()];

        if !self.patterns.is_empty() {
            lines.push(String::new());
            lines.push(format!("From {}:", MemoryKind::Pattern.file_name()));
            for entry in &self.patterns {
                let mut line = self.headline(MemoryKind::Pattern, entry);
                if let Some(score) = entry.field("Reusability Score") {
                    line.push_str(&format!(" (Reusability: {})", score));
                }
                lines.push(line);
            }
        }

        if !self.failures.is_empty() {
            lines.push(String::new());
            lines.push(format!("From {}:", MemoryKind::Failure.file_name()));
            for entry in &self.failures {
                lines.push(self.headline(MemoryKind::Failure, entry));
                if let Some(prevention) = entry.section("Prevention Strategy") {
                    lines.push(format!("  Prevention: {}", self.excerpt(&prevention)));
                }
            }
        }

        if !self.decisions.is_empty() {
            lines.push(String::new());
            lines.push(format!("From {}:", MemoryKind::Decision.file_name()));
            for entry in &self.decisions {
                lines.push(self.headline(MemoryKind::Decision, entry));
                if let Some(outcome) = entry.section("Actual Outcome") {
                    lines.push(format!("  Outcome: {}", self.excerpt(&outcome)));
                }
            }
        }

        lines.push(String::new());
        lines.push("Reuse the patterns, avoid the recorded failures and apply the decisions where they fit.".to_string());
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAILURES: &str = "\
# Failures

### Failure ID: F-007
Severity Level: high
#### **Failure Description**
Sent a draft before the numbers were checked.
#### **Prevention Strategy**
Reconcile totals first.

---

Trailing notes that belong to no entry.

### Failure ID: F-008
#### **Failure Description**
Lost the attachment.
";

    #[test]
    fn test_parse_entries() {
        let entries = parse_entries(MemoryKind::Failure, FAILURES);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "F-007");
        assert_eq!(entries[0].field("Severity Level").as_deref(), Some("high"));
        assert_eq!(
            entries[0].section("Failure Description").as_deref(),
            Some("Sent a draft before the numbers were checked.")
        );
        assert!(!entries[0].text.contains("Trailing notes"));
        assert_eq!(entries[1].section("Prevention Strategy"), None);
    }

    #[test]
    fn test_parse_ignores_other_kinds() {
        assert!(parse_entries(MemoryKind::Pattern, FAILURES).is_empty());
    }

    #[test]
    fn test_note_sections_and_excerpts() {
        let mut recall = Recall::with_excerpt(10);
        recall.push(MemoryKind::Failure, parse_entries(MemoryKind::Failure, FAILURES));
        let note = recall.note().unwrap();

        assert!(note.starts_with("MEMORY INFLUENCE NOTE"));
        assert!(note.contains("From failures.md:"));
        assert!(note.contains("- [Failure ID: F-007] Sent a dra..."));
        assert!(note.contains("  Prevention: Reconcile ..."));
        assert!(note.contains("- [Failure ID: F-008] Lost the a..."));
        assert!(!note.contains("From task_patterns.md"));
    }

    #[test]
    fn test_empty_recall_has_no_note() {
        assert_eq!(Recall::default().note(), None);
    }
}
