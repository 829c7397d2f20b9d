//! Concurrency gate bounding simultaneous remote calls.

use crate::error::{LlmError, Result};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Counting semaphore shared by every client of one run.
///
/// Cloning is cheap and yields a handle to the same pool. A permit is
/// released when dropped, so every exit path of a call gives its slot back.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `capacity` calls at once.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(LlmError::ConfigError(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(LlmError::ConfigError(format!(
                "max_concurrent must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| LlmError::ConfigError("concurrency gate closed".to_string()))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(ConcurrencyGate::new(0), Err(LlmError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_permits_are_returned_on_drop() {
        let gate = ConcurrencyGate::new(2).unwrap();
        assert_eq!(gate.available(), 2);

        {
            let _a = gate.acquire().await.unwrap();
            let _b = gate.acquire().await.unwrap();
            assert_eq!(gate.in_flight(), 2);
            assert_eq!(gate.available(), 0);
        }

        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_the_pool() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let other = gate.clone();

        let _held = gate.acquire().await.unwrap();
        assert_eq!(other.available(), 0);
        assert_eq!(other.capacity(), 1);
    }
}
