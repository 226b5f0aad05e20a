//! Error types for Steward
//!
//! Centralized error handling using thiserror. Severity tags (E1-E4) are
//! domain values, see [`crate::domain::Severity`].

use thiserror::Error;

/// All error types that can occur in Steward
#[derive(Debug, Error)]
pub enum StewardError {
    /// Task not found in the store
    #[error("Task not found: {0}")]
    NotFound(String),

    /// No free name after the bounded number of suffix attempts
    #[error("Name collision overflow: {name} in {area}")]
    CollisionOverflow { name: String, area: String },

    /// Task content or metadata cannot be used
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Storage/persistence error
    #[error("Store error: {0}")]
    Store(String),

    /// Executor invocation error
    #[error("Executor error: {0}")]
    Executor(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// The authorization policy source is missing
    #[error("Policy source missing: {0}")]
    PolicyMissing(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Steward operations
pub type Result<T> = std::result::Result<T, StewardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = StewardError::NotFound("2026-01-01_report.md".to_string());
        assert_eq!(err.to_string(), "Task not found: 2026-01-01_report.md");
    }

    #[test]
    fn test_collision_overflow_error() {
        let err = StewardError::CollisionOverflow {
            name: "task.md".to_string(),
            area: "done".to_string(),
        };
        assert_eq!(err.to_string(), "Name collision overflow: task.md in done");
    }

    #[test]
    fn test_policy_missing_error() {
        let err = StewardError::PolicyMissing("HANDBOOK.md".to_string());
        assert_eq!(err.to_string(), "Policy source missing: HANDBOOK.md");
    }

    #[test]
    fn test_executor_error() {
        let err = StewardError::Executor("rate limited".to_string());
        assert_eq!(err.to_string(), "Executor error: rate limited");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StewardError = io_err.into();
        assert!(matches!(err, StewardError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: StewardError = json_err.into();
        assert!(matches!(err, StewardError::Json(_)));
    }
}
