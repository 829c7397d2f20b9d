//! Configuration schema for evalrun

use crate::dataset::{ProcessingOrder, DEFAULT_SEED};
use crate::error::{EvalError, Result};
use crate::strategy::get_strategy;
use llm::{RemoteLlmConfig, DEFAULT_BASE_URL};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tooling::async_utils::retry::RetryPolicy;
use tooling::logging::LogFormat;

/// Main evalrun configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Model every call of a run is pinned to
    pub model: String,

    /// API key (supports environment variable interpolation)
    pub api_key: Option<String>,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    pub organization: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: Some("${OPENAI_API_KEY}".to_string()),
            timeout_secs: 120,
            organization: None,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Transport settings, failing when no usable API key is configured.
    pub fn to_remote(&self) -> Result<RemoteLlmConfig> {
        let api_key = match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && !key.contains("${") => key.to_string(),
            _ => {
                return Err(EvalError::Config(
                    "no API key configured; set OPENAI_API_KEY or llm.api_key".to_string(),
                ))
            }
        };

        let mut remote = RemoteLlmConfig::new(api_key, &self.base_url, &self.model)
            .with_timeout(self.timeout());
        if let Some(org) = &self.organization {
            remote = remote.with_organization(org);
        }
        remote.validate()?;
        Ok(remote)
    }
}

/// Scheduling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum simultaneous remote calls
    pub max_concurrent: usize,

    /// Registered strategy name
    pub strategy: String,

    pub processing_order: ProcessingOrder,

    /// Items to evaluate after ordering, 0 for all
    pub max_entries: usize,

    /// Seed for `shuffled` ordering
    pub seed: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            strategy: "oneshot".to_string(),
            processing_order: ProcessingOrder::ContextLength,
            max_entries: 50,
            seed: DEFAULT_SEED,
        }
    }
}

/// Backoff for retriable call failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call, first one included
    pub max_attempts: usize,

    pub initial_delay_secs: f64,

    pub backoff_factor: f64,

    /// Total backoff budget per call
    pub max_elapsed_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay_secs: 1.0,
            backoff_factor: 2.0,
            max_elapsed_secs: 60.0,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
            .with_initial_interval(self.initial_delay_secs)
            .with_backoff_factor(self.backoff_factor)
            .with_max_elapsed(self.max_elapsed_secs)
    }
}

/// Where results go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub save_dir: PathBuf,

    /// Append every request/response pair to `<save_dir>/requests/<strategy>.jsonl`
    pub audit_logging: bool,

    /// Remove output files of an earlier run instead of refusing to start
    pub delete_old: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("results"),
            audit_logging: false,
            delete_old: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. "info" or "evalrun=debug"
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

impl EvalConfig {
    /// Resolve `${VAR_NAME}` references in string values
    ///
    /// Unset variables are left as written.
    pub fn resolve_env_vars(&mut self) {
        if let Some(api_key) = &self.llm.api_key {
            self.llm.api_key = Some(expand_env_vars(api_key));
        }
        if let Some(org) = &self.llm.organization {
            self.llm.organization = Some(expand_env_vars(org));
        }
        self.llm.base_url = expand_env_vars(&self.llm.base_url);
    }

    /// Reject settings that would fail only after work has started
    pub fn validate(&self) -> Result<()> {
        if self.execution.max_concurrent == 0 {
            return Err(EvalError::Config(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(EvalError::Config(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.retry.initial_delay_secs < 0.0 || self.retry.backoff_factor < 1.0 {
            return Err(EvalError::Config(
                "retry delays must be non-negative and non-decreasing".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(EvalError::Config("llm.model must not be empty".to_string()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(EvalError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }
        get_strategy(&self.execution.strategy)?;
        Ok(())
    }
}

fn expand_env_vars(value: &str) -> String {
    static VAR: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = VAR
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
    else {
        return value.to_string();
    };

    re.replace_all(value, |caps: &Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.execution.max_concurrent, 5);
        assert_eq!(config.execution.strategy, "oneshot");
        assert_eq!(config.execution.processing_order, ProcessingOrder::ContextLength);
        assert_eq!(config.execution.max_entries, 50);
        assert_eq!(config.output.save_dir, PathBuf::from("results"));
        assert!(!config.output.audit_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let toml = r#"
            [execution]
            max_concurrent = 12
            processing_order = "shuffled"

            [logging]
            format = "json"
        "#;
        let config: EvalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.execution.max_concurrent, 12);
        assert_eq!(config.execution.processing_order, ProcessingOrder::Shuffled);
        assert_eq!(config.execution.strategy, "oneshot");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryConfig::default().to_policy();
        assert_eq!(policy.max_attempts, 6);
        assert_eq!(policy.max_elapsed, Some(60.0));
        assert_eq!(
            policy.delays(),
            [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EvalConfig::default();
        config.execution.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));

        let mut config = EvalConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.llm.timeout_secs = 0;
        match config.validate() {
            Err(EvalError::Config(message)) => assert!(message.contains("timeout_secs")),
            other => panic!("expected Config error, got {:?}", other),
        }

        let mut config = EvalConfig::default();
        config.execution.strategy = "nope".to_string();
        assert!(matches!(
            config.validate(),
            Err(EvalError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("EVALRUN_SCHEMA_TEST_KEY", "sk-123");
        let mut config = EvalConfig::default();
        config.llm.api_key = Some("${EVALRUN_SCHEMA_TEST_KEY}".to_string());
        config.llm.base_url = "http://${EVALRUN_SCHEMA_TEST_UNSET}/v1".to_string();
        config.resolve_env_vars();

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-123"));
        assert_eq!(config.llm.base_url, "http://${EVALRUN_SCHEMA_TEST_UNSET}/v1");
        std::env::remove_var("EVALRUN_SCHEMA_TEST_KEY");
    }

    #[test]
    fn test_to_remote_requires_resolved_key() {
        let mut llm = LlmConfig {
            api_key: Some("${EVALRUN_SCHEMA_TEST_MISSING}".to_string()),
            ..Default::default()
        };
        assert!(matches!(llm.to_remote(), Err(EvalError::Config(_))));

        llm.api_key = None;
        assert!(llm.to_remote().is_err());

        llm.api_key = Some("sk-live".to_string());
        llm.timeout_secs = 9;
        let remote = llm.to_remote().unwrap();
        assert_eq!(remote.api_key, "sk-live");
        assert_eq!(remote.timeout, Duration::from_secs(9));
    }
}
