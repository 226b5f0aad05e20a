//! Domain types: task records, metadata, transition history, outcomes.

pub mod metadata;
pub mod outcome;
pub mod severity;
pub mod task;
pub mod transition;

pub use metadata::{Metadata, parse_document, render_document, render_metadata};
pub use outcome::{EngineOutcome, ExecutionOutcome, OutcomeStatus};
pub use severity::Severity;
pub use task::{ESCALATION_TYPE, Task, TaskStatus, keys};
pub use transition::{HISTORY_HEADING, TransitionRecord, history_append_text, parse_history};
