//! Configuration management for evalrun
//!
//! Supports dual-location configuration:
//! - User-level: ~/.evalrun/evalrun.toml
//! - Project-level: ./.evalrun/evalrun.toml
//!
//! Project-level config overrides user-level config. Command-line flags are
//! applied on top by the binary.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    EvalConfig, ExecutionConfig, LlmConfig, LoggingConfig, OutputConfig, RetryConfig,
};

use crate::error::Result;
use std::path::Path;

/// Load configuration from the standard locations, then `explicit` if given
pub async fn load_config(explicit: Option<&Path>) -> Result<EvalConfig> {
    ConfigLoader::new().load_from(explicit).await
}
