//! Error types for evalrun
//!
//! Errors here abort a run or a command. Failures of individual remote calls
//! never surface as an [`EvalError`]: the runner turns them into failure
//! records instead.

use llm::LlmError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for evalrun operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Main error type for evalrun operations
#[derive(Debug, Error)]
pub enum EvalError {
    /// Invalid configuration, detected before any work starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset could not be read or parsed
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Strategy name not present in the registry
    #[error("Unknown strategy '{name}'. Available strategies: {available}")]
    UnknownStrategy { name: String, available: String },

    /// Output files from an earlier run are in the way
    #[error("Output files already exist: {}", display_paths(.0))]
    OutputExists(Vec<PathBuf>),

    /// The same task index reached the sink twice
    #[error("Task index {0} was offered to the sink more than once")]
    DuplicateIndex(usize),

    /// LLM client error outside of a task (setup, configuration)
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = EvalError::Config("max_concurrent must be greater than 0".to_string());
        assert_eq!(err.to_string(), "Configuration error: max_concurrent must be greater than 0");

        let err = EvalError::OutputExists(vec![PathBuf::from("a.jsonl"), PathBuf::from("b.jsonl")]);
        assert_eq!(err.to_string(), "Output files already exist: a.jsonl, b.jsonl");

        let err = EvalError::UnknownStrategy {
            name: "magic".to_string(),
            available: "oneshot, cot".to_string(),
        };
        assert!(err.to_string().contains("oneshot, cot"));
    }

    #[test]
    fn test_llm_conversion() {
        let err: EvalError = LlmError::ConfigError("bad".to_string()).into();
        assert!(matches!(err, EvalError::Llm(_)));
    }
}
