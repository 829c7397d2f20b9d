//! Unit-of-work runner
//!
//! Binds one item to the active strategy and a client scoped to that item,
//! and turns whatever happens into exactly one [`EvalRecord`].

use crate::record::EvalRecord;
use crate::strategy::Strategy;
use crate::task::QuestionItem;
use futures::FutureExt;
use llm::ResilientClientConfig;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs the active strategy for one item at a time.
///
/// Cheap to clone; clones share the strategy and the client template.
#[derive(Clone)]
pub struct TaskRunner {
    strategy: Arc<dyn Strategy>,
    clients: ResilientClientConfig,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("strategy", &self.strategy.name())
            .field("clients", &self.clients)
            .finish()
    }
}

impl TaskRunner {
    pub fn new(strategy: Arc<dyn Strategy>, clients: ResilientClientConfig) -> Self {
        Self { strategy, clients }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Evaluate one item. Never fails: errors and panics become failure
    /// records.
    pub async fn run(&self, item: &QuestionItem) -> EvalRecord {
        let agent = self.strategy.name();
        let client = self.clients.build(item.id.clone());

        let outcome = AssertUnwindSafe(self.strategy.invoke(item, &client))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(pred)) => {
                debug!(item = %item.id, pred = %pred, "Item answered");
                EvalRecord::success(item, pred, client.usage_snapshot(None), agent)
            }
            Ok(Err(e)) => {
                warn!(item = %item.id, error = %e, code = e.code(), "Item failed");
                EvalRecord::failure(item, e.to_string(), agent)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(item = %item.id, panic = %message, "Strategy panicked");
                EvalRecord::failure(item, format!("strategy panicked: {}", message), agent)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
