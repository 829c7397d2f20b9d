//! Error types for LLM calls.

use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when calling a chat model.
///
/// The variants split into two classes. Retriable ones ([`LlmError::is_retryable`])
/// are transient conditions at the endpoint and are retried with backoff;
/// everything else fails the call immediately.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The endpoint signalled rate limiting (HTTP 429).
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// A single attempt did not finish in time.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Connection level failure before a response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider reported a server side failure (HTTP 5xx).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid response from provider.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Any other provider failure.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Invalid configuration, including a request for a model the client is not bound to.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimitExceeded(_)
                | LlmError::Timeout(_)
                | LlmError::Network(_)
                | LlmError::ServiceUnavailable(_)
        )
    }

    /// Short stable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            LlmError::RateLimitExceeded(_) => "rate_limited",
            LlmError::Timeout(_) => "timeout",
            LlmError::Network(_) => "network",
            LlmError::ServiceUnavailable(_) => "unavailable",
            LlmError::AuthenticationError(_) => "auth",
            LlmError::ApiKeyNotFound(_) => "missing_api_key",
            LlmError::InvalidRequest(_) => "invalid_request",
            LlmError::InvalidResponse(_) => "invalid_response",
            LlmError::SerializationError(_) => "serialization",
            LlmError::ProviderError(_) => "provider",
            LlmError::ConfigError(_) => "config",
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            LlmError::Network(err.to_string())
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::ProviderError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(LlmError::RateLimitExceeded("429".into()).is_retryable());
        assert!(LlmError::Timeout("slow".into()).is_retryable());
        assert!(LlmError::Network("reset".into()).is_retryable());
        assert!(LlmError::ServiceUnavailable("503".into()).is_retryable());

        assert!(!LlmError::AuthenticationError("401".into()).is_retryable());
        assert!(!LlmError::InvalidRequest("400".into()).is_retryable());
        assert!(!LlmError::ConfigError("model".into()).is_retryable());
        assert!(!LlmError::ProviderError("boom".into()).is_retryable());
    }

    #[test]
    fn test_codes() {
        assert_eq!(LlmError::RateLimitExceeded(String::new()).code(), "rate_limited");
        assert_eq!(LlmError::ConfigError(String::new()).code(), "config");
    }

    #[test]
    fn test_from_serde_error() {
        let err: LlmError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, LlmError::SerializationError(_)));
    }
}
