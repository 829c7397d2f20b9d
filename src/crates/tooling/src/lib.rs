//! Tooling utilities shared across the evalrun workspace
//!
//! # Modules
//!
//! - `async_utils` - Retry policies and timeout utilities for async operations
//! - `logging` - Subscriber initialisation and structured logging helpers

pub mod async_utils;
pub mod logging;

use thiserror::Error;

/// Errors that can occur in the tooling crate
#[derive(Debug, Error)]
pub enum ToolingError {
    /// Logging could not be initialised
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for tooling operations
pub type Result<T> = std::result::Result<T, ToolingError>;

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
