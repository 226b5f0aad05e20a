//! Scheduler loop integration tests
//!
//! Priority order, session failures, preflight and lifecycle records.

mod common;

use std::fs;
use std::sync::Arc;

use common::{FlakyStore, ScriptedExecutor, Step, escalations, fast_config, ready_task};
use steward::audit::{AuditStatus, MemoryAuditSink};
use steward::config::{Config, VaultConfig};
use steward::domain::{Metadata, TaskStatus, keys, parse_history};
use steward::engine::CompletionEngine;
use steward::error::StewardError;
use steward::executor::LocalExecutor;
use steward::scheduler::Scheduler;
use steward::store::{MemoryTaskStore, TaskStore, VaultStore};
use tempfile::TempDir;
use tokio::sync::watch;

fn scheduler(
    store: Arc<MemoryTaskStore>,
    executor: ScriptedExecutor,
    config: &Config,
) -> (Scheduler<MemoryTaskStore, ScriptedExecutor, MemoryAuditSink>, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let engine = CompletionEngine::new(store, Arc::new(executor), audit.clone(), config);
    (Scheduler::new(engine, config), audit)
}

/// Tasks run in priority order; ties keep listing order
#[tokio::test]
async fn test_dispatch_in_priority_order() {
    let store = Arc::new(MemoryTaskStore::new());
    store.insert(ready_task("a_low.md", Some("P3"), "Tidy up.")).unwrap();
    store.insert(ready_task("b_urgent.md", Some("P0"), "Restore the report.")).unwrap();
    store.insert(ready_task("c_mid.md", Some("P1"), "Draft the brief.")).unwrap();
    store.insert(ready_task("d_default.md", None, "Read the notes.")).unwrap();
    store.insert(ready_task("e_mid.md", Some("p1"), "Draft the summary.")).unwrap();

    let (mut scheduler, _audit) = scheduler(store.clone(), ScriptedExecutor::always(Step::Finish), &fast_config());
    let (_tx, rx) = watch::channel(false);

    let report = scheduler.poll_once(&rx).await.unwrap();
    assert_eq!(
        report.order,
        vec!["b_urgent.md", "c_mid.md", "e_mid.md", "d_default.md", "a_low.md"]
    );
    assert_eq!(report.completed, 5);
    assert_eq!(scheduler.completed_total(), 5);
    assert_eq!(store.list_terminal().unwrap().len(), 5);
}

/// A second poll over an unchanged store dispatches nothing new
#[tokio::test]
async fn test_repoll_is_idempotent() {
    let store = Arc::new(MemoryTaskStore::new());
    store.insert(ready_task("once.md", None, "Reply to the thread.")).unwrap();

    let (mut scheduler, _audit) = scheduler(store.clone(), ScriptedExecutor::always(Step::Finish), &fast_config());
    let (_tx, rx) = watch::channel(false);

    assert_eq!(scheduler.poll_once(&rx).await.unwrap().completed, 1);
    let second = scheduler.poll_once(&rx).await.unwrap();
    assert_eq!(second.queued, 0);
    assert_eq!(second.dispatched, 0);
}

/// Tier 3 tasks are halted at the gate; the escalation note is never dispatched
#[tokio::test]
async fn test_gate_halts_and_skips_escalations() {
    let store = Arc::new(MemoryTaskStore::new());
    store.insert(ready_task("pay.md", Some("P0"), "Make the payment to the vendor.")).unwrap();
    store.insert(ready_task("plain.md", Some("P2"), "Summarise the notes.")).unwrap();

    let (mut scheduler, _audit) = scheduler(store.clone(), ScriptedExecutor::always(Step::Finish), &fast_config());
    let (_tx, rx) = watch::channel(false);

    let report = scheduler.poll_once(&rx).await.unwrap();
    assert_eq!(report.halted, 1);
    assert_eq!(report.completed, 1);
    assert!(scheduler.failures().contains("pay.md"));
    assert_eq!(store.read("pay.md").unwrap().status(), TaskStatus::Blocked);
    assert_eq!(escalations(&*store).len(), 1);

    let second = scheduler.poll_once(&rx).await.unwrap();
    assert_eq!(second.queued, 0);
    assert_eq!(escalations(&*store).len(), 1);
}

/// An exhausted task is not retried in the same session, even if reset to ready
#[tokio::test]
async fn test_session_failures_are_skipped() {
    let mut config = fast_config();
    config.scheduler.max_cycles = 2;
    let store = Arc::new(MemoryTaskStore::new());
    store.insert(ready_task("stuck.md", None, "Keep going.")).unwrap();

    let (mut scheduler, _audit) = scheduler(store.clone(), ScriptedExecutor::always(Step::Progress), &config);
    let (_tx, rx) = watch::channel(false);

    let report = scheduler.poll_once(&rx).await.unwrap();
    assert_eq!(report.exhausted, 1);
    assert_eq!(store.read("stuck.md").unwrap().status(), TaskStatus::Failed);

    store
        .update_metadata("stuck.md", &Metadata::new().with(keys::STATUS, TaskStatus::Ready.as_str()))
        .unwrap();
    let second = scheduler.poll_once(&rx).await.unwrap();
    assert_eq!(second.queued, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.dispatched, 0);
}

/// One task's store fault is recorded on the task and the poll moves on
#[tokio::test]
async fn test_task_fault_does_not_stop_the_poll() {
    let store = Arc::new(FlakyStore::new().break_moves_for("a_stuck.md"));
    store.insert(ready_task("a_stuck.md", Some("P1"), "File the report.")).unwrap();
    store.insert(ready_task("b_fine.md", Some("P2"), "File the notes.")).unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let config = fast_config();
    let engine = CompletionEngine::new(
        store.clone(),
        Arc::new(ScriptedExecutor::always(Step::Finish)),
        audit.clone(),
        &config,
    );
    let mut scheduler = Scheduler::new(engine, &config);
    let (_tx, rx) = watch::channel(false);

    let report = scheduler.poll_once(&rx).await.unwrap();
    assert_eq!(report.order, vec!["a_stuck.md", "b_fine.md"]);
    assert_eq!(report.faulted, 1);
    assert_eq!(report.completed, 1);
    assert!(scheduler.failures().contains("a_stuck.md"));

    let stuck = store.read("a_stuck.md").unwrap();
    assert_eq!(stuck.status(), TaskStatus::Failed);
    assert_eq!(stuck.metadata.get(keys::SEVERITY), Some("E2"));
    assert!(stuck.metadata.get(keys::ERROR).unwrap().contains("done area unavailable"));
    let last = parse_history(&stuck.body).pop().unwrap();
    assert_eq!(last.action, "fail (E2)");

    let terminal = store.list_terminal().unwrap();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].id, "b_fine.md");

    let second = scheduler.poll_once(&rx).await.unwrap();
    assert_eq!(second.dispatched, 0);
}

/// A self-check record is written every N completions
#[tokio::test]
async fn test_periodic_self_check() {
    let mut config = fast_config();
    config.scheduler.self_check_every = 2;
    let store = Arc::new(MemoryTaskStore::new());
    for id in ["one.md", "two.md", "three.md"] {
        store.insert(ready_task(id, None, "Do it.")).unwrap();
    }

    let (mut scheduler, audit) = scheduler(store, ScriptedExecutor::always(Step::Finish), &config);
    let (_tx, rx) = watch::channel(false);
    scheduler.poll_once(&rx).await.unwrap();

    let checks = audit
        .records()
        .into_iter()
        .filter(|r| r.action_taken == "Self-check")
        .count();
    assert_eq!(checks, 1);
}

/// Without a handbook the scheduler refuses to start and records E4
#[tokio::test]
async fn test_preflight_requires_handbook() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        vault: VaultConfig::at(temp.path()),
        ..fast_config()
    };
    let store = Arc::new(MemoryTaskStore::new());
    let (mut scheduler, audit) = scheduler(store, ScriptedExecutor::always(Step::Finish), &config);

    let result = scheduler.preflight();
    assert!(matches!(result, Err(StewardError::PolicyMissing(_))));

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].errors.starts_with("E4"));
}

/// A full run over the vault: preflight, dispatch with the handbook, stop on interrupt
#[tokio::test]
async fn test_run_until_interrupt() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        vault: VaultConfig::at(temp.path()),
        ..fast_config()
    };
    fs::write(config.vault.handbook_path(), "# Handbook\n\nNever send anything outside.\n").unwrap();

    let store = Arc::new(VaultStore::new(config.vault.clone()));
    store.verify_layout().unwrap();
    store
        .create("brief.md", &ready_task("brief.md", None, "").metadata, "\n\n# Brief\n")
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let engine = CompletionEngine::new(store.clone(), Arc::new(LocalExecutor::new()), audit.clone(), &config);
    let mut scheduler = Scheduler::new(engine, &config);

    scheduler.preflight().unwrap();
    let (tx, rx) = watch::channel(false);
    assert_eq!(scheduler.poll_once(&rx).await.unwrap().completed, 1);
    assert!(config.vault.done_path().join("brief.md").exists());

    tx.send(true).unwrap();
    scheduler.run(rx).await.unwrap();

    let actions: Vec<String> = audit
        .records()
        .into_iter()
        .filter(|r| r.status == AuditStatus::Info)
        .map(|r| r.action_taken)
        .collect();
    assert_eq!(actions, vec!["Scheduler started", "Scheduler stopped by interrupt"]);
}
