//! Remote chat-completion transports.
//!
//! - **OpenAI** - OpenAI and OpenAI-compatible `/chat/completions` endpoints

pub mod openai;

pub use openai::OpenAiClient;
