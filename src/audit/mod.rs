//! Audit and escalation emission.
//!
//! Audit records are persisted markdown documents, separate from the `log`
//! diagnostics. Escalations are notes for a human, created in the pending
//! area through the task store.

mod escalation;
mod record;
mod sink;

pub use escalation::Escalation;
pub use record::{AuditRecord, AuditStatus};
pub use sink::{AuditSink, MemoryAuditSink, VaultAuditSink};
