//! Offline executor: simulates processing and always concludes `done`.

use async_trait::async_trait;

use super::{ExecutionRequest, Executor, commit_claim};
use crate::domain::ExecutionOutcome;
use crate::error::Result;
use crate::store::TaskStore;

#[derive(Debug, Default, Clone)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn invoke(&self, store: &dyn TaskStore, request: &ExecutionRequest) -> Result<ExecutionOutcome> {
        log::info!("[local] Simulating execution of {} (cycle {})", request.task_id, request.cycle);

        let outcome = ExecutionOutcome::done(format!(
            "Task '{}' processed in local simulation mode.",
            request.task_id
        ))
        .with_output(format!(
            "## Processing Result - {}\n\n\
             - **Mode:** local simulation\n\
             - **Skill:** {}\n\
             - **Constitution loaded:** {}\n\n\
             > Set ANTHROPIC_API_KEY to enable model-backed execution.\n",
            request.task_id,
            request.skill.skill_id,
            if request.constitution.trim().is_empty() { "no" } else { "yes" }
        ))
        .with_decisions("Local simulation: task structure validated and marked done");

        commit_claim(store, &request.task_id, &outcome)?;
        Ok(outcome)
    }

    fn name(&self) -> &str {
        "local"
    }
}
