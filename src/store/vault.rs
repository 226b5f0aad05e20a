//! File-backed task store: one markdown document per task.
//!
//! Layout under the vault root:
//! - `pending/` - tasks that are not done yet, plus escalation notes
//! - `done/` - terminal area
//!
//! Writes go to a temporary sibling first and are renamed into place.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use glob::Pattern;

use super::traits::{TaskStore, appended};
use crate::config::VaultConfig;
use crate::domain::{Metadata, Task, render_document};
use crate::error::{Result, StewardError};
use crate::id::collision_free_name;

const TASK_EXTENSION: &str = "md";

pub struct VaultStore {
    layout: VaultConfig,
}

impl VaultStore {
    pub fn new(layout: VaultConfig) -> Self {
        Self { layout }
    }

    /// Vault with the default directory names under `root`
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::new(VaultConfig::at(root))
    }

    pub fn layout(&self) -> &VaultConfig {
        &self.layout
    }

    fn pending_dir(&self) -> PathBuf {
        self.layout.pending_path()
    }

    fn terminal_dir(&self) -> PathBuf {
        self.layout.done_path()
    }

    /// Pending area first, then terminal
    fn locate(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        [self.pending_dir(), self.terminal_dir()]
            .into_iter()
            .map(|dir| dir.join(id))
            .find(|path| path.is_file())
            .ok_or_else(|| StewardError::NotFound(id.to_string()))
    }

    fn load(&self, id: &str, path: &Path) -> Result<Task> {
        let content = fs::read_to_string(path)?;
        Ok(Task::from_document(id, &content))
    }

    fn list_area(&self, dir: &Path) -> Result<Vec<Task>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!("{}/*.{}", Pattern::escape(&dir.to_string_lossy()), TASK_EXTENSION);
        let entries = glob::glob(&pattern).map_err(|e| StewardError::Store(format!("Bad listing pattern: {}", e)))?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| match entry {
                Ok(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .collect();
        names.sort();

        let mut tasks = Vec::with_capacity(names.len());
        for name in names {
            match self.load(&name, &dir.join(&name)) {
                Ok(task) => tasks.push(task),
                Err(e) => log::warn!("Skipping {} in {}: {}", name, dir.display(), e),
            }
        }
        Ok(tasks)
    }

    fn rewrite(&self, path: &Path, task: &Task) -> Result<()> {
        write_atomic(path, &task.to_document())
    }
}

impl TaskStore for VaultStore {
    fn verify_layout(&self) -> Result<bool> {
        let mut intact = true;
        for dir in self.layout.directories() {
            if !dir.is_dir() {
                fs::create_dir_all(&dir)?;
                log::warn!("Recreated missing vault directory: {}", dir.display());
                intact = false;
            }
        }
        Ok(intact)
    }

    fn list_pending(&self) -> Result<Vec<Task>> {
        self.list_area(&self.pending_dir())
    }

    fn list_terminal(&self) -> Result<Vec<Task>> {
        self.list_area(&self.terminal_dir())
    }

    fn read(&self, id: &str) -> Result<Task> {
        let path = self.locate(id)?;
        self.load(id, &path)
    }

    fn update_metadata(&self, id: &str, updates: &Metadata) -> Result<()> {
        let path = self.locate(id)?;
        let mut task = self.load(id, &path)?;
        task.metadata.merge(updates);
        self.rewrite(&path, &task)
    }

    fn append_body(&self, id: &str, text: &str) -> Result<()> {
        let path = self.locate(id)?;
        let mut task = self.load(id, &path)?;
        task.body = appended(&task.body, text);
        self.rewrite(&path, &task)
    }

    fn move_to_terminal(&self, id: &str) -> Result<String> {
        validate_id(id)?;
        let source = self.pending_dir().join(id);
        if !source.is_file() {
            return Err(StewardError::NotFound(id.to_string()));
        }

        let terminal = self.terminal_dir();
        fs::create_dir_all(&terminal)?;
        let name = collision_free_name(id, &self.layout.done_dir, |n| terminal.join(n).exists())?;
        fs::rename(&source, terminal.join(&name))?;
        log::debug!("Moved {} to {}/{}", id, self.layout.done_dir, name);
        Ok(name)
    }

    fn create(&self, id: &str, metadata: &Metadata, body: &str) -> Result<String> {
        validate_id(id)?;
        let pending = self.pending_dir();
        fs::create_dir_all(&pending)?;
        let name = collision_free_name(id, &self.layout.pending_dir, |n| pending.join(n).exists())?;

        // create_new refuses to replace a file that appeared since the check
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(pending.join(&name))?;
        file.write_all(render_document(metadata, body).as_bytes())?;
        file.sync_all()?;
        Ok(name)
    }
}

/// Identifiers are bare file names
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(StewardError::InvalidTask(format!("Bad task identifier: {:?}", id)));
    }
    Ok(())
}

/// Write through a temporary sibling and rename over the target
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StewardError::Store(format!("Not a file path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TransitionRecord, keys, parse_history};
    use tempfile::TempDir;

    fn create_test_store() -> (VaultStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = VaultStore::open(temp.path());
        store.verify_layout().unwrap();
        (store, temp)
    }

    #[test]
    fn test_verify_layout_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = VaultStore::open(temp.path());
        assert!(!store.verify_layout().unwrap());
        assert!(store.verify_layout().unwrap());
        assert!(temp.path().join("pending").is_dir());
        assert!(temp.path().join("done").is_dir());
    }

    #[test]
    fn test_create_and_read() {
        let (store, _temp) = create_test_store();
        let meta = Metadata::new().with(keys::STATUS, "ready").with(keys::PRIORITY, "P1");
        let id = store.create("task.md", &meta, "\n# Do it\n").unwrap();
        assert_eq!(id, "task.md");

        let task = store.read("task.md").unwrap();
        assert_eq!(task.metadata, meta);
        assert_eq!(task.body, "\n# Do it\n");
    }

    #[test]
    fn test_read_missing() {
        let (store, _temp) = create_test_store();
        assert!(matches!(store.read("nope.md"), Err(StewardError::NotFound(_))));
    }

    #[test]
    fn test_rejects_path_identifiers() {
        let (store, _temp) = create_test_store();
        assert!(matches!(
            store.create("../escape.md", &Metadata::new(), ""),
            Err(StewardError::InvalidTask(_))
        ));
    }

    #[test]
    fn test_update_metadata_merges() {
        let (store, _temp) = create_test_store();
        let meta = Metadata::new().with(keys::STATUS, "ready").with(keys::TITLE, "Keep me");
        store.create("t.md", &meta, "body\n").unwrap();

        store
            .update_metadata("t.md", &Metadata::new().with(keys::STATUS, "in_progress"))
            .unwrap();

        let task = store.read("t.md").unwrap();
        assert_eq!(task.metadata.get(keys::STATUS), Some("in_progress"));
        assert_eq!(task.metadata.get(keys::TITLE), Some("Keep me"));
        assert_eq!(task.body, "body\n");
    }

    #[test]
    fn test_append_transition_keeps_history_prefix() {
        let (store, _temp) = create_test_store();
        store.create("t.md", &Metadata::new(), "\n# Task\n").unwrap();

        let mut seen = Vec::new();
        for action in ["start", "reprocess (cycle 1)", "complete"] {
            store
                .append_transition("t.md", &TransitionRecord::now("a", "b", action, "scheduler"))
                .unwrap();
            let history = parse_history(&store.read("t.md").unwrap().body);
            assert!(history.starts_with(&seen));
            assert_eq!(history.len(), seen.len() + 1);
            seen = history;
        }
    }

    #[test]
    fn test_list_pending_is_lexicographic_and_stable() {
        let (store, _temp) = create_test_store();
        for name in ["b.md", "a.md", "c.md"] {
            store.create(name, &Metadata::new(), "").unwrap();
        }
        fs::write(store.pending_dir().join("notes.txt"), "ignored").unwrap();

        let first: Vec<String> = store.list_pending().unwrap().into_iter().map(|t| t.id).collect();
        let second: Vec<String> = store.list_pending().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(first, vec!["a.md", "b.md", "c.md"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_move_to_terminal_suffixes_on_clash() {
        let (store, temp) = create_test_store();
        fs::write(temp.path().join("done/t.md"), "original").unwrap();
        store.create("t.md", &Metadata::new().with(keys::STATUS, "done"), "").unwrap();

        let terminal = store.move_to_terminal("t.md").unwrap();
        assert_eq!(terminal, "t_2.md");
        assert_eq!(fs::read_to_string(temp.path().join("done/t.md")).unwrap(), "original");
        assert!(!temp.path().join("pending/t.md").exists());
        assert_eq!(store.read("t_2.md").unwrap().metadata.get(keys::STATUS), Some("done"));
    }

    #[test]
    fn test_create_collision_overflow() {
        let (store, _temp) = create_test_store();
        for _ in 0..100 {
            store.create("esc.md", &Metadata::new(), "").unwrap();
        }
        assert!(store.read("esc_100.md").is_ok());
        assert!(matches!(
            store.create("esc.md", &Metadata::new(), ""),
            Err(StewardError::CollisionOverflow { .. })
        ));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (store, temp) = create_test_store();
        store.create("t.md", &Metadata::new(), "").unwrap();
        store.append_body("t.md", "\nmore\n").unwrap();
        let leftovers: Vec<_> = fs::read_dir(temp.path().join("pending"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
