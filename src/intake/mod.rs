//! Inbox triage: turn files dropped into the inbox into ready tasks.
//!
//! Files present when the watcher starts are left alone. Every new
//! `(name, mtime)` pair is processed exactly once, whatever the result.
//! Rejected files stay in the inbox and get an escalation note.

mod classify;
mod secrets;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tokio::sync::watch;

pub use classify::{assign_priority, classify_content, extract_title};
pub use secrets::SecretScanner;

use crate::audit::{AuditRecord, AuditSink, AuditStatus, Escalation};
use crate::config::{Config, IntakeConfig};
use crate::domain::{Metadata, Severity, TaskStatus, TransitionRecord, history_append_text, keys, parse_document};
use crate::engine::pause;
use crate::error::Result;
use crate::id::name_stem;
use crate::store::TaskStore;

const ACTOR: &str = "intake";

/// What happened to one inbox file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeDecision {
    Created { source: String, task_id: String, priority: String },
    Rejected { source: String, note_id: String, severity: Severity, reason: String },
}

pub struct Intake<S, A>
where
    S: TaskStore,
    A: AuditSink + ?Sized,
{
    store: Arc<S>,
    audit: Arc<A>,
    config: IntakeConfig,
    default_priority: String,
    inbox: PathBuf,
    inbox_name: String,
    scanner: SecretScanner,
    seen: HashSet<(String, SystemTime)>,
}

impl<S, A> Intake<S, A>
where
    S: TaskStore,
    A: AuditSink + ?Sized,
{
    pub fn new(store: Arc<S>, audit: Arc<A>, config: &Config) -> Result<Self> {
        Ok(Self {
            store,
            audit,
            config: config.intake.clone(),
            default_priority: config.priority.default_label.clone(),
            inbox: config.vault.inbox_path(),
            inbox_name: config.vault.inbox_dir.clone(),
            scanner: SecretScanner::new()?,
            seen: HashSet::new(),
        })
    }

    fn inbox_files(&self) -> Result<Vec<(String, PathBuf, SystemTime)>> {
        if !self.inbox.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.inbox)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push((name, entry.path(), meta.modified()?));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Mark every file currently in the inbox as already seen
    pub fn snapshot(&mut self) -> Result<usize> {
        let files = self.inbox_files()?;
        let count = files.len();
        for (name, _, mtime) in files {
            log::info!("Existing inbox file skipped: {}", name);
            self.seen.insert((name, mtime));
        }
        Ok(count)
    }

    /// Process every inbox file not seen before
    pub fn scan_once(&mut self) -> Result<Vec<IntakeDecision>> {
        let files = self.inbox_files()?;
        // Forget files that left the inbox or changed since they were seen
        let present: HashSet<(String, SystemTime)> =
            files.iter().map(|(name, _, mtime)| (name.clone(), *mtime)).collect();
        self.seen.retain(|key| present.contains(key));

        let mut decisions = Vec::new();
        for (name, path, mtime) in files {
            let key = (name.clone(), mtime);
            if self.seen.contains(&key) {
                continue;
            }

            match self.process_file(&name, &path) {
                Ok(decision) => decisions.push(decision),
                Err(e) => {
                    log::error!("Error processing inbox file {}: {}", name, e);
                    self.emit(
                        AuditRecord::new(&name, format!("Failed to process {}", name), AuditStatus::Failure, Local::now())
                            .category("intake-error")
                            .fault(Severity::E3, e.to_string()),
                    );
                }
            }
            // Seen whatever the result, so a bad file is not retried forever
            self.seen.insert(key);
        }
        Ok(decisions)
    }

    /// Validate, scan and triage one file
    pub fn process_file(&self, name: &str, path: &Path) -> Result<IntakeDecision> {
        let started = Local::now();
        log::info!("Processing inbox file: {}", name);

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !self.config.allowed_extensions.iter().any(|e| e.eq_ignore_ascii_case(&extension)) {
            return self.reject(name, Severity::E2, format!("Unsupported extension: {:?}", extension), started);
        }

        let size = fs::metadata(path)?.len();
        if size > self.config.max_file_bytes {
            return self.reject(
                name,
                Severity::E2,
                format!("File too large: {} bytes (limit {})", size, self.config.max_file_bytes),
                started,
            );
        }

        let Ok(content) = String::from_utf8(fs::read(path)?) else {
            return self.reject(name, Severity::E2, "File is not valid UTF-8 text".to_string(), started);
        };

        if content.trim().is_empty() {
            return self.reject(name, Severity::E1, "File is empty".to_string(), started);
        }

        let secrets = self.scanner.scan(&content);
        if !secrets.is_empty() {
            log::error!("Secrets detected in {}; leaving it untouched", name);
            return self.reject(
                name,
                Severity::E3,
                format!(
                    "Secrets detected ({}). File left in the inbox untouched.",
                    secrets.join("; ")
                ),
                started,
            );
        }

        self.triage(name, &content, size, started)
    }

    fn triage(&self, name: &str, content: &str, size: u64, started: DateTime<Local>) -> Result<IntakeDecision> {
        let (source_meta, body) = parse_document(content);
        let title = extract_title(name, &source_meta, &body);
        let classification = classify_content(&source_meta, &body);
        let priority = assign_priority(
            &source_meta,
            content,
            &self.config.priority_keywords,
            &self.default_priority,
        );

        let now = Local::now().format("%Y-%m-%d %H:%M").to_string();
        let requester = source_meta
            .get("requester")
            .or_else(|| source_meta.get("author"))
            .unwrap_or(ACTOR)
            .to_string();
        let metadata = Metadata::new()
            .with(keys::TITLE, title.clone())
            .with("requester", requester)
            .with("received", now)
            .with(keys::PRIORITY, priority.clone())
            .with(keys::STATUS, TaskStatus::Ready.as_str())
            .with(keys::CLASSIFICATION, classification.as_str())
            .with("source", source_meta.get("source").unwrap_or("automated"))
            .with("source_file", name);

        let mut task_body = format!(
            "\n\n# {}\n\n\
             ## Source\n\
             - **Original file:** `{}/{}`\n\
             - **Detected type:** {}\n\
             - **Priority:** {}\n\n\
             ## Original Content\n\n{}\n",
            title,
            self.inbox_name,
            name,
            classification.as_str(),
            priority,
            body.trim()
        );
        let triage = TransitionRecord::now(self.inbox_name.as_str(), TaskStatus::Ready.as_str(), "triage", ACTOR);
        task_body.push_str(&history_append_text(&task_body, &triage));

        let task_name = format!("{}_{}.md", Local::now().format("%Y-%m-%d"), name_stem(name));
        let task_id = self.store.create(&task_name, &metadata, &task_body)?;
        log::info!("Task created: {} [{}]", task_id, priority);

        self.emit(
            AuditRecord::new(&task_id, "Triaged inbox file into a ready task", AuditStatus::Success, started)
                .category("intake")
                .input(format!("{}/{} ({} bytes)", self.inbox_name, name, size))
                .output(format!("Task {} [priority {}, type {}]", task_id, priority, classification.as_str()))
                .decisions(format!("Title: {}", title)),
        );

        Ok(IntakeDecision::Created {
            source: name.to_string(),
            task_id,
            priority,
        })
    }

    fn reject(
        &self,
        name: &str,
        severity: Severity,
        reason: String,
        started: DateTime<Local>,
    ) -> Result<IntakeDecision> {
        log::warn!("Rejected {}: {}", name, reason);

        let note_id = Escalation::new(name, severity)
            .field(keys::TITLE, format!("File rejected: {}", name))
            .field("source_file", format!("{}/{}", self.inbox_name, name))
            .field("reason", reason.clone())
            .happened(format!(
                "File `{}/{}` was picked up by intake but failed validation: {}",
                self.inbox_name, name, reason
            ))
            .tried("The file was checked for type, size, encoding, content and credentials.")
            .needed("Fix the file and save it to the inbox again, move it by hand, or delete it.")
            .impact("The file stays in the inbox and no task is created for it.")
            .file(&*self.store)?;

        self.emit(
            AuditRecord::new(name, "Rejected inbox file", AuditStatus::Rejected, started)
                .category(if severity == Severity::E3 { "security-escalation" } else { "file-rejection" })
                .input(format!("{}/{}", self.inbox_name, name))
                .output(format!("Escalation note {}", note_id))
                .fault(severity, &reason),
        );

        Ok(IntakeDecision::Rejected {
            source: name.to_string(),
            note_id,
            severity,
            reason,
        })
    }

    fn emit(&self, record: AuditRecord) {
        if let Err(e) = self.audit.record(&record) {
            log::warn!("Failed to write audit record: {}", e);
        }
    }

    /// Snapshot the inbox, then poll until shutdown
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.store.verify_layout()?;
        let existing = self.snapshot()?;
        let interval = self.config.poll_interval();
        log::info!("Intake watching {} ({} existing files skipped)", self.inbox.display(), existing);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let polled = self.store.verify_layout().and_then(|_| self.scan_once());
            match polled {
                Ok(decisions) if !decisions.is_empty() => log::info!("Intake processed {} file(s)", decisions.len()),
                Ok(_) => {}
                Err(e) => {
                    log::error!("Intake poll failed: {}", e);
                    self.emit(
                        AuditRecord::new(ACTOR, "Intake poll fault", AuditStatus::Failure, Local::now())
                            .category("intake-error")
                            .fault(Severity::E2, e.to_string()),
                    );
                }
            }

            if pause(interval, &shutdown).await {
                break;
            }
        }

        log::info!("Intake stopped by interrupt");
        self.emit(AuditRecord::new(ACTOR, "Intake stopped by interrupt", AuditStatus::Info, Local::now()).category("lifecycle"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::config::VaultConfig;
    use crate::store::VaultStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn bump_mtime(path: &Path, by: Duration) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        let mtime = fs::metadata(path).unwrap().modified().unwrap() + by;
        file.set_modified(mtime).unwrap();
    }

    struct Fixture {
        _temp: TempDir,
        inbox: PathBuf,
        store: Arc<VaultStore>,
        audit: Arc<MemoryAuditSink>,
        intake: Intake<VaultStore, MemoryAuditSink>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let config = Config {
            vault: VaultConfig::at(temp.path()),
            ..Config::default()
        };
        let store = Arc::new(VaultStore::new(config.vault.clone()));
        store.verify_layout().unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let intake = Intake::new(store.clone(), audit.clone(), &config).unwrap();
        Fixture {
            inbox: config.vault.inbox_path(),
            _temp: temp,
            store,
            audit,
            intake,
        }
    }

    #[test]
    fn test_creates_ready_task() {
        let mut fx = fixture();
        fs::write(fx.inbox.join("fix_login.md"), "# Fix login\n\nUsers are locked out, urgent.").unwrap();

        let decisions = fx.intake.scan_once().unwrap();
        let [IntakeDecision::Created { task_id, priority, .. }] = decisions.as_slice() else {
            panic!("unexpected decisions: {:?}", decisions);
        };
        assert_eq!(priority, "P0");

        let task = fx.store.read(task_id).unwrap();
        assert_eq!(task.status(), TaskStatus::Ready);
        assert_eq!(task.metadata.get(keys::TITLE), Some("Fix login"));
        assert_eq!(task.classification(), Some("task"));
        let history = crate::domain::parse_history(&task.body);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, "triage");
        assert_eq!(fx.audit.records().len(), 1);
    }

    #[test]
    fn test_each_file_processed_once() {
        let mut fx = fixture();
        let path = fx.inbox.join("note.txt");
        fs::write(&path, "add a feature").unwrap();
        assert_eq!(fx.intake.scan_once().unwrap().len(), 1);
        assert!(fx.intake.scan_once().unwrap().is_empty());

        // A modified file is new work
        bump_mtime(&path, Duration::from_secs(5));
        assert_eq!(fx.intake.scan_once().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_skips_existing_files() {
        let mut fx = fixture();
        fs::write(fx.inbox.join("old.md"), "# Old").unwrap();
        assert_eq!(fx.intake.snapshot().unwrap(), 1);
        assert!(fx.intake.scan_once().unwrap().is_empty());
    }

    #[test]
    fn test_seen_forgets_departed_files() {
        let mut fx = fixture();
        let keep = fx.inbox.join("keep.md");
        let gone = fx.inbox.join("gone.md");
        fs::write(&keep, "# Keep").unwrap();
        fs::write(&gone, "# Gone").unwrap();
        assert_eq!(fx.intake.scan_once().unwrap().len(), 2);
        assert_eq!(fx.intake.seen.len(), 2);

        fs::remove_file(&gone).unwrap();
        assert!(fx.intake.scan_once().unwrap().is_empty());
        assert_eq!(fx.intake.seen.len(), 1);

        // An edited file replaces its old entry
        bump_mtime(&keep, Duration::from_secs(5));
        assert_eq!(fx.intake.scan_once().unwrap().len(), 1);
        assert_eq!(fx.intake.seen.len(), 1);
    }

    fn rejected_severity(fx: &mut Fixture) -> Severity {
        let decisions = fx.intake.scan_once().unwrap();
        match decisions.as_slice() {
            [IntakeDecision::Rejected { severity, note_id, .. }] => {
                assert!(fx.store.read(note_id).unwrap().is_escalation());
                *severity
            }
            other => panic!("expected one rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_rejections() {
        let mut fx = fixture();
        fs::write(fx.inbox.join("tool.exe"), "MZ").unwrap();
        assert_eq!(rejected_severity(&mut fx), Severity::E2);

        fs::write(fx.inbox.join("blank.md"), "  \n").unwrap();
        assert_eq!(rejected_severity(&mut fx), Severity::E1);

        fs::write(fx.inbox.join("binary.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        assert_eq!(rejected_severity(&mut fx), Severity::E2);

        let secret = fx.inbox.join("creds.md");
        fs::write(&secret, "password = hunter2").unwrap();
        assert_eq!(rejected_severity(&mut fx), Severity::E3);
        assert!(secret.exists());
    }

    #[test]
    fn test_oversized_file_rejected() {
        let mut fx = fixture();
        fx.intake.config.max_file_bytes = 4;
        fs::write(fx.inbox.join("big.md"), "# Too big").unwrap();
        assert_eq!(rejected_severity(&mut fx), Severity::E2);
    }
}
