//! Text-level triage: title, classification and priority of an inbox file.

use crate::config::PriorityKeywords;
use crate::domain::{Metadata, keys};
use crate::id::name_stem;
use crate::policy::Classification;

/// Frontmatter title, then the first `# ` heading, then the humanised file name
pub fn extract_title(file_name: &str, metadata: &Metadata, body: &str) -> String {
    if let Some(title) = metadata.get(keys::TITLE).filter(|t| !t.trim().is_empty()) {
        return title.trim().to_string();
    }

    body.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|heading| heading.trim().to_string())
        .filter(|heading| !heading.is_empty())
        .unwrap_or_else(|| humanize(name_stem(file_name)))
}

/// `quarterly_report-draft` -> `Quarterly Report Draft`
fn humanize(stem: &str) -> String {
    stem.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Skill definitions, plans and logs are recognised by their markers;
/// everything else is a task.
pub fn classify_content(metadata: &Metadata, body: &str) -> Classification {
    let lower = body.to_lowercase();

    if metadata.contains("skill_id") || metadata.contains("trigger") || lower.contains("## execution steps") {
        return Classification::Skill;
    }
    if ["## steps", "## goals", "## milestones", "## phases"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return Classification::Plan;
    }
    if metadata.contains("log_id") || lower.contains("## action taken") {
        return Classification::Log;
    }
    Classification::Task
}

/// Frontmatter priority, else the first rule with a matching keyword
pub fn assign_priority(metadata: &Metadata, content: &str, rules: &[PriorityKeywords], default_label: &str) -> String {
    if let Some(priority) = metadata.get(keys::PRIORITY).filter(|p| !p.trim().is_empty()) {
        return priority.trim().to_string();
    }

    let lower = content.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| lower.contains(&k.to_lowercase())))
        .map(|rule| rule.label.clone())
        .unwrap_or_else(|| default_label.to_string())
}
