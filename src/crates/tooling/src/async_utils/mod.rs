//! Async utilities for common async patterns
//!
//! - Retry policies with deterministic exponential backoff and an elapsed budget
//! - Timeout wrappers
//!
//! # Example
//!
//! ```rust,ignore
//! use tooling::async_utils::retry::{RetryPolicy, with_retry_if};
//! use tooling::async_utils::timeout::with_timeout_or;
//! use std::time::Duration;
//!
//! async fn robust_call() -> Result<String, ApiError> {
//!     let policy = RetryPolicy::default();
//!
//!     with_retry_if(&policy, ApiError::is_retryable, || async {
//!         with_timeout_or(Duration::from_secs(10), call_api(), |_| ApiError::Timeout).await
//!     })
//!     .await
//! }
//! ```

pub mod retry;
pub mod timeout;
