//! In-memory task store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::traits::{TaskStore, appended};
use crate::domain::{Metadata, Task};
use crate::error::{Result, StewardError};
use crate::id::collision_free_name;

#[derive(Default)]
struct Areas {
    pending: BTreeMap<String, Task>,
    terminal: BTreeMap<String, Task>,
}

/// Same contract as the vault store, kept in two ordered maps.
#[derive(Default)]
pub struct MemoryTaskStore {
    areas: Mutex<Areas>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pending task, replacing any task with the same id
    pub fn insert(&self, task: Task) -> Result<()> {
        self.lock()?.pending.insert(task.id.clone(), task);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Areas>> {
        self.areas.lock().map_err(|e| StewardError::Store(e.to_string()))
    }

    fn with_task<R>(&self, id: &str, f: impl FnOnce(&mut Task) -> R) -> Result<R> {
        let mut areas = self.lock()?;
        let Areas { pending, terminal } = &mut *areas;
        let task = pending
            .get_mut(id)
            .or_else(|| terminal.get_mut(id))
            .ok_or_else(|| StewardError::NotFound(id.to_string()))?;
        Ok(f(task))
    }
}

impl TaskStore for MemoryTaskStore {
    fn verify_layout(&self) -> Result<bool> {
        let _areas = self.lock()?;
        Ok(true)
    }

    fn list_pending(&self) -> Result<Vec<Task>> {
        Ok(self.lock()?.pending.values().cloned().collect())
    }

    fn list_terminal(&self) -> Result<Vec<Task>> {
        Ok(self.lock()?.terminal.values().cloned().collect())
    }

    fn read(&self, id: &str) -> Result<Task> {
        self.with_task(id, |task| task.clone())
    }

    fn update_metadata(&self, id: &str, updates: &Metadata) -> Result<()> {
        self.with_task(id, |task| task.metadata.merge(updates))
    }

    fn append_body(&self, id: &str, text: &str) -> Result<()> {
        self.with_task(id, |task| task.body = appended(&task.body, text))
    }

    fn move_to_terminal(&self, id: &str) -> Result<String> {
        let mut areas = self.lock()?;
        let mut task = areas
            .pending
            .remove(id)
            .ok_or_else(|| StewardError::NotFound(id.to_string()))?;

        let name = match collision_free_name(id, "terminal", |n| areas.terminal.contains_key(n)) {
            Ok(name) => name,
            Err(e) => {
                areas.pending.insert(id.to_string(), task);
                return Err(e);
            }
        };
        task.id = name.clone();
        areas.terminal.insert(name.clone(), task);
        Ok(name)
    }

    fn create(&self, id: &str, metadata: &Metadata, body: &str) -> Result<String> {
        let mut areas = self.lock()?;
        let name = collision_free_name(id, "pending", |n| areas.pending.contains_key(n))?;
        areas
            .pending
            .insert(name.clone(), Task::new(name.clone(), metadata.clone(), body));
        Ok(name)
    }
}
