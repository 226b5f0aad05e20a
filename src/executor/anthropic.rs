//! Executor backed by the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::prompt::build_prompt;
use super::response::parse_response;
use super::{ExecutionRequest, Executor, commit_claim};
use crate::config::ExecutorConfig;
use crate::domain::ExecutionOutcome;
use crate::error::{Result, StewardError};
use crate::store::TaskStore;

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

pub struct AnthropicExecutor {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicExecutor {
    /// Create an executor reading the key from `ANTHROPIC_API_KEY`
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        let api_key =
            std::env::var(API_KEY_VAR).map_err(|_| StewardError::Executor(format!("{} not set", API_KEY_VAR)))?;
        Self::with_api_key(api_key, config)
    }

    pub fn with_api_key(api_key: String, config: &ExecutorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| StewardError::Executor(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }]
        })
    }

    async fn send_request(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| StewardError::Executor(format!("Request failed: {}", e)))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(StewardError::Executor(format!(
                "Rate limited, retry after {} seconds",
                retry_after
            )));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StewardError::Executor(format!("API error {}: {}", status, error_body)));
        }

        response
            .json()
            .await
            .map_err(|e| StewardError::Executor(format!("Failed to parse response: {}", e)))
    }
}

/// Concatenate every text block of a Messages API response
fn response_text(body: &Value) -> String {
    body["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"].as_str() == Some("text"))
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

#[async_trait]
impl Executor for AnthropicExecutor {
    async fn invoke(&self, store: &dyn TaskStore, request: &ExecutionRequest) -> Result<ExecutionOutcome> {
        let prompt = build_prompt(request);
        let body = self.build_request(&prompt);
        let response = self.send_request(body).await?;
        log::info!("Model response received for {} (cycle {})", request.task_id, request.cycle);

        let outcome = parse_response(&response_text(&response));
        commit_claim(store, &request.task_id, &outcome)?;
        Ok(outcome)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

impl std::fmt::Debug for AnthropicExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicExecutor")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        let executor = AnthropicExecutor::with_api_key("key".to_string(), &ExecutorConfig::default()).unwrap();
        let body = executor.build_request("hello");
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "RESULT_STATUS: done" },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "RESULT_SUMMARY: ok" }
            ]
        });
        assert_eq!(response_text(&body), "RESULT_STATUS: done\nRESULT_SUMMARY: ok");
        assert_eq!(response_text(&json!({})), "");
    }

    #[test]
    fn test_debug_hides_key() {
        let executor = AnthropicExecutor::with_api_key("secret".to_string(), &ExecutorConfig::default()).unwrap();
        assert!(!format!("{:?}", executor).contains("secret"));
    }
}
