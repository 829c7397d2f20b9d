//! Timeout utilities for async operations

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout as tokio_timeout;

/// Error type for timeout operations
#[derive(Debug, Error)]
pub enum TimeoutError<E> {
    /// Operation completed but failed
    #[error("Operation failed: {0}")]
    OperationFailed(E),
    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Execute an async operation with a timeout
///
/// # Example
///
/// ```rust,ignore
/// use tooling::async_utils::timeout::with_timeout;
/// use std::time::Duration;
///
/// let result = with_timeout(Duration::from_secs(1), slow_operation()).await;
/// assert!(result.is_err());
/// ```
pub async fn with_timeout<F, T, E>(duration: Duration, operation: F) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio_timeout(duration, operation).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(error)) => Err(TimeoutError::OperationFailed(error)),
        Err(_elapsed) => Err(TimeoutError::Timeout(duration)),
    }
}

/// Execute an async operation with a timeout, mapping expiry into the
/// operation's own error type
///
/// Useful when a timeout is just another failure class for the caller's
/// error taxonomy, for example a retriable one.
pub async fn with_timeout_or<F, T, E, M>(duration: Duration, operation: F, on_timeout: M) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    M: FnOnce(Duration) -> E,
{
    match with_timeout(duration, operation).await {
        Ok(result) => Ok(result),
        Err(TimeoutError::OperationFailed(error)) => Err(error),
        Err(TimeoutError::Timeout(d)) => Err(on_timeout(d)),
    }
}
