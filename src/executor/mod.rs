//! Executors: the capability that actually works on a task.
//!
//! An executor that concludes `done` must also write `status: done` through
//! the store handle it is given. The engine only trusts the store.

mod anthropic;
mod local;
mod prompt;
mod response;

use std::sync::Arc;

use async_trait::async_trait;

pub use anthropic::{API_KEY_VAR, AnthropicExecutor};
pub use local::LocalExecutor;
pub use prompt::build_prompt;
pub use response::parse_response;

use crate::config::{ExecutorConfig, ExecutorMode};
use crate::domain::{ExecutionOutcome, Metadata, OutcomeStatus, TaskStatus, keys};
use crate::error::Result;
use crate::policy::SkillDescriptor;
use crate::store::TaskStore;

/// Everything an executor gets for one attempt
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub task_id: String,
    /// Full task document as last read from the store
    pub content: String,
    pub skill: SkillDescriptor,
    pub skill_context: String,
    /// Handbook rules
    pub constitution: String,
    /// Relevant entries recalled from the memory area
    pub memory_note: Option<String>,
    /// Remaining work recorded by the previous cycle, if any
    pub prior_remaining: Option<String>,
    pub cycle: u32,
    pub attempt: u32,
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Work on the task once. `Err` is an attempt fault, retried like a
    /// `failed` outcome. Never returns `halted`.
    async fn invoke(&self, store: &dyn TaskStore, request: &ExecutionRequest) -> Result<ExecutionOutcome>;

    fn name(&self) -> &str;
}

/// Persist a `done` conclusion to the store
pub fn commit_claim(store: &dyn TaskStore, task_id: &str, outcome: &ExecutionOutcome) -> Result<()> {
    if outcome.status == OutcomeStatus::Done {
        store.update_metadata(task_id, &Metadata::new().with(keys::STATUS, TaskStatus::Done.as_str()))?;
    }
    Ok(())
}

/// Pick the executor for the configured mode
pub fn build_executor(config: &ExecutorConfig) -> Result<Arc<dyn Executor>> {
    let use_api = match config.mode {
        ExecutorMode::Anthropic => true,
        ExecutorMode::Local => false,
        ExecutorMode::Auto => std::env::var(API_KEY_VAR).is_ok_and(|k| !k.trim().is_empty()),
    };

    if use_api {
        log::info!("Using Anthropic executor with model {}", config.model);
        Ok(Arc::new(AnthropicExecutor::new(config)?))
    } else {
        log::info!("Using local simulation executor");
        Ok(Arc::new(LocalExecutor::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use crate::store::MemoryTaskStore;

    #[test]
    fn test_commit_claim_only_for_done() {
        let store = MemoryTaskStore::new();
        store.insert(Task::new("t.md", Metadata::new(), "")).unwrap();

        commit_claim(&store, "t.md", &ExecutionOutcome::in_progress("half", "rest")).unwrap();
        assert_eq!(store.read("t.md").unwrap().status(), TaskStatus::Ready);

        commit_claim(&store, "t.md", &ExecutionOutcome::done("ok")).unwrap();
        assert_eq!(store.read("t.md").unwrap().status(), TaskStatus::Done);
    }

    #[test]
    fn test_build_local_executor() {
        let config = ExecutorConfig {
            mode: ExecutorMode::Local,
            ..ExecutorConfig::default()
        };
        assert_eq!(build_executor(&config).unwrap().name(), "local");
    }
}
