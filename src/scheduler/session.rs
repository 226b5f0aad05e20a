//! Process-local record of tasks that failed or were blocked this run.

use std::collections::HashSet;

/// Never persisted; a restart starts empty.
#[derive(Debug, Default, Clone)]
pub struct SessionFailures {
    ids: HashSet<String>,
}

impl SessionFailures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the id was not recorded before
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
