//! The seam between the resilient client and the wire.

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse};
use async_trait::async_trait;

/// Performs exactly one chat completion attempt.
///
/// Implementations must not retry or throttle on their own; that is the job
/// of [`crate::ResilientClient`]. Errors should be classified into the
/// [`crate::LlmError`] taxonomy so retry decisions are correct.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

