//! Dataset loading and ordering

use crate::error::{EvalError, Result};
use crate::task::{enumerate, QuestionItem, Task};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Seed used for `shuffled` ordering unless configured otherwise.
pub const DEFAULT_SEED: u64 = 42;

/// Order in which items are submitted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ProcessingOrder {
    /// As stored in the dataset file
    File,
    /// Deterministic shuffle
    Shuffled,
    /// Shortest context first
    #[default]
    ContextLength,
}

impl std::fmt::Display for ProcessingOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Shuffled => "shuffled",
            Self::ContextLength => "context_length",
        };
        f.write_str(name)
    }
}

/// Read items from a `.json` array or a JSON Lines file.
///
/// Blank lines in JSON Lines input are skipped. A malformed line is an error
/// naming its line number.
pub fn load_items(path: &Path) -> Result<Vec<QuestionItem>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EvalError::Dataset(format!("cannot read {}: {}", path.display(), e)))?;

    let is_json_array = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let items = if is_json_array {
        serde_json::from_str(&text)
            .map_err(|e| EvalError::Dataset(format!("{}: {}", path.display(), e)))?
    } else {
        parse_jsonl(&text)
            .map_err(|e| EvalError::Dataset(format!("{}: {}", path.display(), e)))?
    };

    info!(path = %path.display(), items = items.len(), "Loaded dataset");
    Ok(items)
}

fn parse_jsonl(text: &str) -> std::result::Result<Vec<QuestionItem>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| serde_json::from_str(line).map_err(|e| format!("line {}: {}", n + 1, e)))
        .collect()
}

/// Order items, cap them at `max_entries` (0 keeps all) and number them.
pub fn prepare(
    mut items: Vec<QuestionItem>,
    order: ProcessingOrder,
    max_entries: usize,
    seed: u64,
) -> Vec<Task<QuestionItem>> {
    match order {
        ProcessingOrder::File => {}
        ProcessingOrder::Shuffled => {
            let mut rng = StdRng::seed_from_u64(seed);
            items.shuffle(&mut rng);
        }
        ProcessingOrder::ContextLength => {
            items.sort_by_key(|item| item.context.chars().count());
        }
    }

    if max_entries > 0 && items.len() > max_entries {
        items.truncate(max_entries);
    }

    debug!(order = %order, seed, tasks = items.len(), "Prepared tasks");
    enumerate(items)
}
