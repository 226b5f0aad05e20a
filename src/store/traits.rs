//! Task store trait.

use crate::domain::{Metadata, Task, TransitionRecord, history_append_text};
use crate::error::Result;

/// Durable record store keyed by task identifier.
///
/// Tasks live in one of two areas: pending (everything not yet done) and
/// terminal. Nothing is ever deleted; finishing a task relocates it.
pub trait TaskStore: Send + Sync {
    /// Create any missing areas. Returns `true` when nothing had to be created.
    fn verify_layout(&self) -> Result<bool>;

    /// Every task in the pending area, in lexicographic identifier order.
    fn list_pending(&self) -> Result<Vec<Task>>;

    /// Every task in the terminal area, in lexicographic identifier order.
    fn list_terminal(&self) -> Result<Vec<Task>>;

    /// Read one task, looking in the pending area first.
    fn read(&self, id: &str) -> Result<Task>;

    /// Merge `updates` into the metadata record. Unspecified keys and the body
    /// are left untouched.
    fn update_metadata(&self, id: &str, updates: &Metadata) -> Result<()>;

    /// Append text to the body.
    fn append_body(&self, id: &str, text: &str) -> Result<()>;

    /// Relocate a pending task to the terminal area, returning its terminal
    /// identifier (suffixed when the name was already taken there).
    fn move_to_terminal(&self, id: &str) -> Result<String>;

    /// Create a new record in the pending area without overwriting anything,
    /// returning the identifier actually used.
    fn create(&self, id: &str, metadata: &Metadata, body: &str) -> Result<String>;

    /// Append one row to the task's transition history.
    fn append_transition(&self, id: &str, record: &TransitionRecord) -> Result<()> {
        let task = self.read(id)?;
        self.append_body(id, &history_append_text(&task.body, record))
    }
}

/// Join body and appended text; trailing whitespace is dropped first so
/// history rows stay contiguous.
pub(crate) fn appended(body: &str, text: &str) -> String {
    let mut out = body.trim_end().to_string();
    out.push_str(text);
    out
}
