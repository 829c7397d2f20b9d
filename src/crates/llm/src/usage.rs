//! Per-model token accounting.

use crate::types::TokenUsage;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Accumulated token usage keyed by model identifier.
///
/// Owned by a single [`crate::ResilientClient`]. Entries only ever grow.
#[derive(Debug, Default)]
pub struct UsageLedger {
    entries: Mutex<BTreeMap<String, TokenUsage>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one call's usage to the model's running totals.
    pub fn record(&self, model: &str, usage: TokenUsage) {
        let mut entries = self.entries.lock();
        *entries.entry(model.to_string()).or_default() += usage;
    }

    /// Totals for one model, or for every model when `model` is `None`.
    ///
    /// An unknown model yields an empty map.
    pub fn snapshot(&self, model: Option<&str>) -> BTreeMap<String, TokenUsage> {
        let entries = self.entries.lock();
        match model {
            Some(model) => entries
                .get_key_value(model)
                .map(|(k, v)| (k.clone(), *v))
                .into_iter()
                .collect(),
            None => entries.clone(),
        }
    }
}
