//! Audit sinks: where audit records are persisted.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;

use super::record::AuditRecord;
use crate::error::{Result, StewardError};
use crate::id::{collision_free_name, generate_log_id};
use crate::store::write_atomic;

/// Receives audit records at the engine's and scheduler's trigger points.
pub trait AuditSink: Send + Sync {
    /// Persist one record, returning the log identifier it was stored under.
    fn record(&self, record: &AuditRecord) -> Result<String>;
}

/// Writes one `LOG_*.md` file per record into the vault's logs area.
pub struct VaultAuditSink {
    logs_dir: PathBuf,
}

impl VaultAuditSink {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }
}

impl AuditSink for VaultAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<String> {
        fs::create_dir_all(&self.logs_dir)?;

        let log_id = generate_log_id(&Local::now(), &record.task_ref);
        let file_name = collision_free_name(&format!("{}.md", log_id), "logs", |n| self.logs_dir.join(n).exists())?;
        write_atomic(&self.logs_dir.join(&file_name), &record.render(&log_id))?;

        log::info!("Audit log: {}", file_name);
        Ok(file_name)
    }
}

/// Keeps records in memory, for tests and dry runs.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<String> {
        let mut records = self.records.lock().map_err(|e| StewardError::Store(e.to_string()))?;
        records.push(record.clone());
        Ok(format!("memory-{}", records.len()))
    }
}
