//! Prompting strategies
//!
//! A strategy turns one [`QuestionItem`] into a predicted label (`A`..`D`, or
//! `N` when no answer could be extracted) by talking to the model through a
//! [`ResilientClient`]. The scheduler never looks inside a strategy; it only
//! sees the record the runner builds from the result.
//!
//! # Available strategies
//!
//! | name             | calls per item        | notes                                  |
//! |------------------|-----------------------|----------------------------------------|
//! | `oneshot`        | 1                     | short direct answer                    |
//! | `cot`            | 1                     | step-by-step reasoning before answering |
//! | `quotes`         | 1                     | cite supporting quotes, then answer    |
//! | `quotes_chunked` | one per chunk + 1 (+ compression) | map over context chunks, reduce to quotes |

mod chain_of_thought;
mod extract_quotes;
mod oneshot;
pub mod prompt;
mod quotes_chunked;

pub use chain_of_thought::ChainOfThought;
pub use extract_quotes::ExtractQuotes;
pub use oneshot::Oneshot;
pub use prompt::extract_answer;
pub use quotes_chunked::{split_into_chunks, QuotesChunked};

use crate::error::{EvalError, Result};
use crate::task::QuestionItem;
use async_trait::async_trait;
use llm::{ChatRequest, LlmError, ResilientClient};
use serde::Serialize;
use std::sync::Arc;

/// Pluggable unit of work: one item in, one predicted label out.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Registry name, also written as `agent` in every record.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Produce a predicted label for `item`.
    async fn invoke(
        &self,
        item: &QuestionItem,
        client: &ResilientClient,
    ) -> std::result::Result<String, LlmError>;
}

/// Name and description of a registered strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub description: &'static str,
}

fn registry() -> Vec<Arc<dyn Strategy>> {
    vec![
        Arc::new(Oneshot),
        Arc::new(ChainOfThought),
        Arc::new(ExtractQuotes),
        Arc::new(QuotesChunked::default()),
    ]
}

/// Look up a strategy by name.
pub fn get_strategy(name: &str) -> Result<Arc<dyn Strategy>> {
    let strategies = registry();
    if let Some(found) = strategies.iter().find(|s| s.name() == name) {
        return Ok(Arc::clone(found));
    }

    let available = strategies
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join(", ");
    Err(EvalError::UnknownStrategy {
        name: name.to_string(),
        available,
    })
}

/// All registered strategies in registration order.
pub fn list_strategies() -> Vec<StrategyInfo> {
    registry()
        .iter()
        .map(|s| StrategyInfo {
            name: s.name(),
            description: s.description(),
        })
        .collect()
}

/// Send one user prompt and return the reply text.
async fn ask(
    client: &ResilientClient,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
) -> std::result::Result<String, LlmError> {
    let request = ChatRequest::user(prompt)
        .with_temperature(temperature)
        .with_max_tokens(max_tokens);
    Ok(client.call(request).await?.content)
}
