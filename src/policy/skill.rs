//! Skill resolution: classification -> execution context descriptor.
//!
//! Resolution is total. Registry lookup by classification, then `#tag`
//! markers in the content, then the default descriptor.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SkillConfig;
use crate::domain::{Metadata, keys};

/// Finite set of task classifications with an explicit fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Task,
    Code,
    Review,
    Complex,
    Research,
    Docs,
    Test,
    Plan,
    Skill,
    Log,
    /// Anything unrecognised
    General,
}

impl Classification {
    pub const ALL: [Classification; 11] = [
        Classification::Task,
        Classification::Code,
        Classification::Review,
        Classification::Complex,
        Classification::Research,
        Classification::Docs,
        Classification::Test,
        Classification::Plan,
        Classification::Skill,
        Classification::Log,
        Classification::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Task => "task",
            Classification::Code => "code",
            Classification::Review => "review",
            Classification::Complex => "complex",
            Classification::Research => "research",
            Classification::Docs => "docs",
            Classification::Test => "test",
            Classification::Plan => "plan",
            Classification::Skill => "skill",
            Classification::Log => "log",
            Classification::General => "general",
        }
    }

    /// Parse a stored tag; unknown tags map to `General`
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == value)
            .unwrap_or(Classification::General)
    }

    /// Content marker for tag-based resolution, e.g. `#research`
    pub fn tag(&self) -> String {
        format!("#{}", self.as_str())
    }
}

/// Execution context descriptor handed to the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub skill_id: String,
    pub name: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl SkillDescriptor {
    pub fn new(skill_id: impl Into<String>, name: impl Into<String>, file: Option<&str>) -> Self {
        Self {
            skill_id: skill_id.into(),
            name: name.into(),
            file: file.map(str::to_string),
        }
    }

    /// The general-purpose descriptor every classification falls back to
    pub fn task_executor() -> Self {
        Self::new("task-executor", "Task Executor", Some("task_executor.md"))
    }
}

impl Default for SkillDescriptor {
    fn default() -> Self {
        Self::task_executor()
    }
}

#[derive(Debug, Clone)]
pub struct SkillRegistry {
    entries: BTreeMap<Classification, SkillDescriptor>,
    default: SkillDescriptor,
}

impl SkillRegistry {
    pub fn new(config: &SkillConfig) -> Self {
        Self {
            entries: config.registry.clone(),
            default: config.default.clone(),
        }
    }

    /// Resolve the descriptor for a task. Deterministic and never fails.
    pub fn resolve(&self, metadata: &Metadata, content: &str) -> &SkillDescriptor {
        if let Some(raw) = metadata.get(keys::CLASSIFICATION) {
            let classification = Classification::parse(raw);
            if let Some(skill) = self.entries.get(&classification) {
                return skill;
            }
        }

        let lower = content.to_lowercase();
        self.entries
            .iter()
            .find(|(class, _)| lower.contains(&class.tag()))
            .map(|(_, skill)| skill)
            .unwrap_or(&self.default)
    }

    pub fn default_skill(&self) -> &SkillDescriptor {
        &self.default
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new(&SkillConfig::default())
    }
}

/// Load the skill definition text from the skills area.
///
/// Missing or unreadable files produce a descriptive placeholder instead of
/// an error.
pub fn load_skill_context(skills_dir: &Path, skill: &SkillDescriptor) -> String {
    let Some(file) = &skill.file else {
        return format!(
            "[Skill {} - {}]: No detailed definition file. Process using general task handling.",
            skill.skill_id, skill.name
        );
    };

    let path = skills_dir.join(file);
    match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Skill file {} unavailable: {}", path.display(), e);
            format!("[WARNING] Skill file not found: {}", file)
        }
    }
}
