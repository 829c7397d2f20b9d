//! Resilient call client.
//!
//! Wraps a [`ChatTransport`] with the policies every evaluation call needs:
//!
//! - a shared [`ConcurrencyGate`], held only while a transport attempt is in
//!   flight and never across backoff sleeps
//! - a per-attempt timeout
//! - retry with deterministic exponential backoff for retriable errors
//! - model pinning: one client, one model
//! - per-model usage accounting keyed by the model the endpoint reports
//! - an optional audit log entry per completed call
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{ChatRequest, ConcurrencyGate, ResilientClientConfig};
//! use llm::remote::OpenAiClient;
//! use std::sync::Arc;
//!
//! let transport = Arc::new(OpenAiClient::new(remote_config)?);
//! let template = ResilientClientConfig::new(transport, "gpt-4o-mini", ConcurrencyGate::new(5)?);
//!
//! let client = template.build("item-42");
//! let response = client.call(ChatRequest::user("Hello")).await?;
//! println!("{:?}", client.usage_snapshot(None));
//! ```

use crate::audit::AuditLog;
use crate::error::{LlmError, Result};
use crate::gate::ConcurrencyGate;
use crate::transport::ChatTransport;
use crate::types::{ChatRequest, ChatResponse, TokenUsage};
use crate::usage::UsageLedger;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tooling::async_utils::retry::{with_retry_if, RetryPolicy};
use tooling::async_utils::timeout::with_timeout_or;
use tracing::debug;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared settings from which per-task clients are built.
///
/// Clones share the transport, the gate and the audit log.
#[derive(Clone)]
pub struct ResilientClientConfig {
    transport: Arc<dyn ChatTransport>,
    model: String,
    gate: ConcurrencyGate,
    retry: RetryPolicy,
    call_timeout: Duration,
    audit: Option<Arc<AuditLog>>,
}

impl ResilientClientConfig {
    /// Bind a transport to one model behind a gate.
    ///
    /// Uses the default retry policy (6 attempts, 1s doubling, 60s budget).
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        model: impl Into<String>,
        gate: ConcurrencyGate,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            gate,
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            audit: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound each transport attempt. Expiry is retried like a rate limit.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Create a client whose audit entries carry `correlation_id`.
    pub fn build(&self, correlation_id: impl Into<String>) -> ResilientClient {
        ResilientClient {
            config: self.clone(),
            correlation_id: correlation_id.into(),
            ledger: UsageLedger::new(),
        }
    }
}

impl std::fmt::Debug for ResilientClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClientConfig")
            .field("model", &self.model)
            .field("gate", &self.gate)
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .field("audit", &self.audit.as_ref().map(|a| a.path().to_path_buf()))
            .finish()
    }
}

/// A model-pinned client owning its own usage ledger.
#[derive(Debug)]
pub struct ResilientClient {
    config: ResilientClientConfig,
    correlation_id: String,
    ledger: UsageLedger,
}

impl ResilientClient {
    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Perform one logical call, retrying transient failures.
    ///
    /// A request naming a model other than the bound one fails with
    /// [`LlmError::ConfigError`] before anything is sent.
    pub async fn call(&self, request: ChatRequest) -> Result<ChatResponse> {
        let request = self.pin_model(request)?;

        let response = with_retry_if(
            &self.config.retry,
            |e: &LlmError| e.is_retryable(),
            || self.attempt(&request),
        )
        .await?;

        self.ledger.record(&response.model, response.usage);
        debug!(
            request_id = %self.correlation_id,
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Call completed"
        );

        if let Some(audit) = &self.config.audit {
            audit.record(&self.correlation_id, &request, &response);
        }

        Ok(response)
    }

    /// Accumulated usage for one model, or all models.
    pub fn usage_snapshot(&self, model: Option<&str>) -> BTreeMap<String, TokenUsage> {
        self.ledger.snapshot(model)
    }

    fn pin_model(&self, mut request: ChatRequest) -> Result<ChatRequest> {
        match request.model.as_deref() {
            Some(requested) if requested != self.config.model => {
                return Err(LlmError::ConfigError(format!(
                    "client is bound to model '{}' but the request asked for '{}'",
                    self.config.model, requested
                )));
            }
            _ => {}
        }
        request.model = Some(self.config.model.clone());
        Ok(request)
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let _permit = self.config.gate.acquire().await?;
        with_timeout_or(
            self.config.call_timeout,
            self.config.transport.complete(request),
            |d| LlmError::Timeout(format!("no response within {:?}", d)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ChatTransport for Echo {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                id: "echo".to_string(),
                model: request.model.clone().unwrap_or_default(),
                content: request.messages[0].content.clone(),
                finish_reason: None,
                usage: TokenUsage::new(1, 1),
                raw: None,
            })
        }
    }

    fn template() -> ResilientClientConfig {
        ResilientClientConfig::new(Arc::new(Echo), "gpt-4o-mini", ConcurrencyGate::new(1).unwrap())
    }

    #[test]
    fn test_pin_model_substitutes_bound_model() {
        let client = template().build("t");
        let pinned = client.pin_model(ChatRequest::user("q")).unwrap();
        assert_eq!(pinned.model.as_deref(), Some("gpt-4o-mini"));

        let same = client
            .pin_model(ChatRequest::user("q").with_model("gpt-4o-mini"))
            .unwrap();
        assert_eq!(same.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_pin_model_rejects_mismatch() {
        let client = template().build("t");
        let err = client
            .pin_model(ChatRequest::user("q").with_model("gpt-4o"))
            .unwrap_err();
        assert!(matches!(err, LlmError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_each_built_client_has_its_own_ledger() {
        let template = template();
        let a = template.build("a");
        let b = template.build("b");

        a.call(ChatRequest::user("hello")).await.unwrap();
        assert_eq!(a.usage_snapshot(None).len(), 1);
        assert!(b.usage_snapshot(None).is_empty());
        assert_eq!(a.correlation_id(), "a");
    }
}
