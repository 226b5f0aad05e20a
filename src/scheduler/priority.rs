//! Priority ordering for pending tasks.
//!
//! Lower rank runs first. Sorting is stable, so tasks with the same rank keep
//! the store's listing order from poll to poll.

use std::collections::BTreeMap;

use crate::config::PriorityConfig;
use crate::domain::Task;

#[derive(Debug, Clone)]
pub struct PriorityTable {
    order: BTreeMap<String, u32>,
    default_rank: u32,
}

impl PriorityTable {
    pub fn new(config: &PriorityConfig) -> Self {
        let order: BTreeMap<String, u32> = config
            .order
            .iter()
            .map(|(label, rank)| (label.trim().to_uppercase(), *rank))
            .collect();
        let default_rank = order
            .get(&config.default_label.trim().to_uppercase())
            .copied()
            .unwrap_or_else(|| order.values().copied().max().unwrap_or(0));
        Self { order, default_rank }
    }

    /// Rank for a label; missing or unknown labels get the default rank
    pub fn rank(&self, label: Option<&str>) -> u32 {
        label
            .and_then(|l| self.order.get(&l.trim().to_uppercase()))
            .copied()
            .unwrap_or(self.default_rank)
    }

    /// Stable sort by rank
    pub fn sort(&self, tasks: &mut [Task]) {
        tasks.sort_by_key(|task| self.rank(task.priority()));
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::new(&PriorityConfig::default())
    }
}

/// Filter a pending listing down to dispatchable work tasks, in dispatch order.
///
/// Escalation notes and tasks that are terminal, blocked, failed or left
/// in progress by a prior run are dropped.
pub fn dispatch_queue(table: &PriorityTable, tasks: Vec<Task>) -> Vec<Task> {
    let mut queue: Vec<Task> = tasks
        .into_iter()
        .filter(|task| !task.is_escalation() && task.status().is_dispatchable())
        .collect();
    table.sort(&mut queue);
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Metadata, keys};

    fn task(id: &str, priority: Option<&str>, status: &str) -> Task {
        let mut meta = Metadata::new().with(keys::STATUS, status);
        if let Some(p) = priority {
            meta.set(keys::PRIORITY, p);
        }
        Task::new(id, meta, "")
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_rank_defaults() {
        let table = PriorityTable::default();
        assert_eq!(table.rank(Some("P0")), 0);
        assert_eq!(table.rank(Some(" p1 ")), 1);
        assert_eq!(table.rank(None), 2);
        assert_eq!(table.rank(Some("urgent")), 2);
    }

    #[test]
    fn test_priority_order() {
        let tasks = vec![
            task("a.md", Some("P2"), "ready"),
            task("b.md", Some("P0"), "ready"),
            task("c.md", Some("P3"), "ready"),
            task("d.md", Some("P1"), "ready"),
        ];
        let queue = dispatch_queue(&PriorityTable::default(), tasks);
        assert_eq!(ids(&queue), vec!["b.md", "d.md", "a.md", "c.md"]);
    }

    #[test]
    fn test_ties_keep_listing_order() {
        let tasks = vec![
            task("a.md", Some("P1"), "ready"),
            task("b.md", None, "ready"),
            task("c.md", Some("P1"), "ready"),
            task("d.md", Some("P2"), "ready"),
        ];
        let queue = dispatch_queue(&PriorityTable::default(), tasks);
        assert_eq!(ids(&queue), vec!["a.md", "c.md", "b.md", "d.md"]);
    }

    #[test]
    fn test_filters_non_dispatchable() {
        let mut escalation = task("e.md", Some("P0"), "ready");
        escalation.metadata.set(keys::TYPE, "escalation");
        let tasks = vec![
            task("a.md", None, "ready"),
            task("b.md", None, "blocked"),
            task("c.md", None, "in_progress"),
            task("d.md", None, "failed"),
            escalation,
        ];
        let queue = dispatch_queue(&PriorityTable::default(), tasks);
        assert_eq!(ids(&queue), vec!["a.md"]);
    }
}
