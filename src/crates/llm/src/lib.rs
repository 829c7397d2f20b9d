//! Chat-completion plumbing for evalrun.
//!
//! The centre of this crate is [`ResilientClient`], which turns a single-shot
//! [`ChatTransport`] into a call that is bounded in concurrency, retried with
//! deterministic backoff on transient failures, pinned to one model, and
//! accounted per model.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::{ChatRequest, ConcurrencyGate, RemoteLlmConfig, ResilientClientConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RemoteLlmConfig::new(
//!         std::env::var("OPENAI_API_KEY")?,
//!         "https://api.openai.com/v1",
//!         "gpt-4o-mini",
//!     );
//!     let transport = Arc::new(OpenAiClient::new(config)?);
//!     let gate = ConcurrencyGate::new(5)?;
//!
//!     let client = ResilientClientConfig::new(transport, "gpt-4o-mini", gate).build("demo");
//!     let response = client
//!         .call(ChatRequest::user("Explain backoff briefly").with_temperature(0.1))
//!         .await?;
//!
//!     println!("{}", response.content);
//!     println!("{:?}", client.usage_snapshot(None));
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod gate;
pub mod remote;
pub mod resilient;
pub mod transport;
pub mod types;
pub mod usage;

// Re-export commonly used types
pub use audit::{AuditEntry, AuditLog};
pub use config::{RemoteLlmConfig, DEFAULT_BASE_URL};
pub use error::{LlmError, Result};
pub use gate::ConcurrencyGate;
pub use resilient::{ResilientClient, ResilientClientConfig};
pub use transport::ChatTransport;
pub use types::{ChatRequest, ChatResponse, Message, Role, TokenUsage};
pub use usage::UsageLedger;
