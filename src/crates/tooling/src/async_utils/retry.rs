//! Retry utilities for async operations
//!
//! Provides configurable retry policies with exponential backoff for handling
//! transient failures in async operations. Delays are deterministic, and a
//! policy may bound the total time spent retrying in addition to the number
//! of attempts.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for retrying failed operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,

    /// Initial interval between retries in seconds
    pub initial_interval: f64,

    /// Multiplier for the interval after each retry
    pub backoff_factor: f64,

    /// Maximum interval between retries in seconds
    pub max_interval: f64,

    /// Upper bound on the time spent across all attempts, in seconds
    pub max_elapsed: Option<f64>,
}

impl RetryPolicy {
    /// Create a new retry policy with the given max attempts
    ///
    /// # Example
    ///
    /// ```rust
    /// use tooling::async_utils::retry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(6);
    /// assert_eq!(policy.max_attempts, 6);
    /// assert_eq!(policy.delays().len(), 5);
    /// ```
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: 1.0,
            backoff_factor: 2.0,
            max_interval: f64::MAX,
            max_elapsed: None,
        }
    }

    /// Set the initial interval between retries
    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    /// Set the backoff factor
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the maximum interval between retries
    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    /// Bound the total time spent retrying
    pub fn with_max_elapsed(mut self, seconds: f64) -> Self {
        self.max_elapsed = Some(seconds);
        self
    }

    /// Calculate the delay after a given failed attempt (0-indexed)
    ///
    /// Uses exponential backoff: initial_interval * (backoff_factor ^ attempt)
    /// capped at max_interval.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        if attempt >= self.max_attempts {
            return Duration::ZERO;
        }

        let base_delay = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_interval).max(0.0);

        Duration::try_from_secs_f64(capped_delay).unwrap_or(Duration::MAX)
    }

    /// Delays that would be slept between attempts, ignoring the elapsed budget
    pub fn delays(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.calculate_delay(attempt))
            .collect()
    }

    /// Check if more retries are allowed
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    fn elapsed_budget(&self) -> Option<Duration> {
        self.max_elapsed
            .map(|secs| Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX))
    }
}

impl Default for RetryPolicy {
    /// Six attempts, one second base delay doubling each time, sixty seconds total.
    fn default() -> Self {
        Self::new(6).with_max_elapsed(60.0)
    }
}

/// Execute an async operation, retrying only failures the classifier accepts
///
/// Errors rejected by `is_retryable` are returned immediately. Retryable
/// errors are retried until `max_attempts` is reached or the elapsed budget
/// runs out; a delay that would overrun the budget is shortened to fit it.
///
/// # Example
///
/// ```rust,ignore
/// use tooling::async_utils::retry::{RetryPolicy, with_retry_if};
///
/// let policy = RetryPolicy::default();
/// let body = with_retry_if(&policy, |e: &ApiError| e.is_rate_limit(), || call_api()).await?;
/// ```
pub async fn with_retry_if<F, Fut, T, E, C>(
    policy: &RetryPolicy,
    is_retryable: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let budget = policy.elapsed_budget();
    let mut attempt = 0usize;

    loop {
        let error = match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };
        attempt += 1;

        if !is_retryable(&error) {
            debug!(attempt, error = %error, "Operation failed with non-retryable error");
            return Err(error);
        }

        if !policy.should_retry(attempt) {
            warn!(attempts = attempt, error = %error, "Retry attempts exhausted");
            return Err(error);
        }

        let mut delay = policy.calculate_delay(attempt - 1);
        if let Some(budget) = budget {
            let elapsed = start.elapsed();
            if elapsed >= budget {
                warn!(
                    attempts = attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "Retry time budget exhausted"
                );
                return Err(error);
            }
            delay = delay.min(budget - elapsed);
        }

        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Operation failed, will retry"
        );
        tokio::time::sleep(delay).await;
    }
}
