//! # Evalrun - Bounded-Concurrency LLM Evaluation
//!
//! Evalrun runs a multiple-choice benchmark against a chat-completion model
//! with many questions in flight at once, while producing a results file
//! whose lines are in dataset order.
//!
//! ## Features
//!
//! - **Bounded concurrency**: one gate caps simultaneous remote calls for the whole run
//! - **Resilient calls**: deterministic exponential backoff on rate limits and transient failures
//! - **Ordered output**: results are buffered and flushed as a contiguous prefix
//! - **Failure isolation**: a failing question becomes an error record, never a crashed run
//! - **Strategies**: pluggable prompting strategies selected by name
//! - **Live progress**: written, accuracy and error counts as results land
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evalrun::{load_config, run_evaluation, ShutdownCoordinator};
//! use evalrun::dataset::load_items;
//! use llm::remote::OpenAiClient;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(None).await?;
//!     let transport = Arc::new(OpenAiClient::new(config.llm.to_remote()?)?);
//!     let items = load_items(Path::new("data.json"))?;
//!
//!     let shutdown = ShutdownCoordinator::new();
//!     let report = run_evaluation(&config, transport, items, &shutdown, true).await?;
//!     println!("{} written", report.summary.counters.written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod progress;
pub mod record;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod shutdown;
pub mod sink;
pub mod strategy;
pub mod task;

// Error types
pub use error::{EvalError, Result};

// Engine
pub use progress::{Counters, ProgressAggregator};
pub use scheduler::{BoundedScheduler, RunSummary};
pub use shutdown::ShutdownCoordinator;
pub use sink::{JsonlWriter, OrderedSink, RecordWriter};
pub use task::{QuestionItem, Task};

// Evaluation
pub use config::{load_config, ConfigLoader, EvalConfig};
pub use dataset::ProcessingOrder;
pub use evaluation::{run_evaluation, EvaluationReport, RunPaths};
pub use record::{Classify, EvalRecord, Verdict};
pub use runner::TaskRunner;
pub use strategy::{get_strategy, list_strategies, Strategy, StrategyInfo};

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
