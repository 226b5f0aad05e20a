//! Vault memory: notes from earlier work fed back into new attempts.
//!
//! Three curated files hold reusable knowledge:
//! - `task_patterns.md`: approaches that worked
//! - `failures.md`: mistakes and how to prevent them
//! - `decisions.md`: reasoning worth repeating
//!
//! Entries relevant to a task are recalled into the prompt. Every completion
//! appends a scored entry to `reflections.md`.

mod profile;
mod recall;
mod reflection;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

pub use profile::{Complexity, Domain, TaskProfile};
pub use recall::{MemoryEntry, MemoryKind, Recall, parse_entries};
pub use reflection::{REFLECTIONS_FILE, Reflection, next_reflection_id};

use crate::config::{Config, MemoryConfig};
use crate::error::Result;

/// Reader and journal for the vault's memory area
#[derive(Debug, Clone)]
pub struct MemoryBank {
    dir: PathBuf,
    config: MemoryConfig,
}

impl MemoryBank {
    pub fn new(dir: impl Into<PathBuf>, config: MemoryConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.vault.memory_path(), config.memory.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entries from every memory file that match the profile.
    ///
    /// Missing or unreadable files contribute nothing.
    pub fn recall(&self, profile: &TaskProfile) -> Recall {
        if !self.config.recall {
            return Recall::default();
        }

        let mut recall = Recall::with_excerpt(self.config.excerpt_chars);
        for kind in MemoryKind::ALL {
            let path = self.dir.join(kind.file_name());
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    log::debug!("Memory file {} skipped: {}", path.display(), e);
                    continue;
                }
            };
            let entries = parse_entries(kind, &text)
                .into_iter()
                .filter(|entry| profile.matches(&entry.text))
                .collect();
            recall.push(kind, entries);
        }

        if !recall.is_empty() {
            log::info!("Recalled {} memory entries for {}", recall.len(), profile.domain);
        }
        recall
    }

    /// Append a reflection to the journal.
    ///
    /// Returns the reflection id, or `None` when journaling is off or the
    /// memory area does not exist.
    pub fn reflect(&self, reflection: &Reflection) -> Result<Option<String>> {
        if !self.config.reflect || !self.dir.is_dir() {
            return Ok(None);
        }

        let path = self.dir.join(REFLECTIONS_FILE);
        let existing = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let now = Local::now();
        let id = next_reflection_id(&existing, now.date_naive());
        let mut entry = String::new();
        if existing.is_empty() {
            entry.push_str(reflection::JOURNAL_HEADER);
        }
        entry.push_str(&reflection.render(&id, &now));

        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(entry.as_bytes())?;
        log::info!("Reflection {} recorded for {}", id, reflection.task_id);
        Ok(Some(id))
    }
}
