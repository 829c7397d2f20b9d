//! Offline reporting over result files
//!
//! Reads the JSON Lines files written by `evalrun run` back in. Records are
//! handled as loose JSON so that files from older runs with extra or missing
//! fields still aggregate.

use crate::error::{EvalError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Score given to an unanswered item in compensated mode, the expected score
/// of a random guess among four choices.
pub const GUESS_CREDIT: f64 = 0.25;

pub const REPORT_HEADER: &str = "Model\tOverall\tEasy\tHard\tShort\tMedium\tLong\tErrors";

/// Fields describing the item rather than a strategy's answer to it.
const METADATA_FIELDS: [&str; 12] = [
    "_id",
    "domain",
    "sub_domain",
    "difficulty",
    "length",
    "question",
    "choice_A",
    "choice_B",
    "choice_C",
    "choice_D",
    "context",
    "answer",
];

/// Fields carried per strategy in a unified document.
const STRATEGY_FIELDS: [&str; 3] = ["pred", "judge", "token_usage"];

/// Accumulated score over a group of records.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bucket {
    pub count: usize,
    pub score: f64,
}

impl Bucket {
    fn add(&mut self, score: f64) {
        self.count += 1;
        self.score += score;
    }

    /// Mean score in percent, `None` for an empty group.
    pub fn percent(&self) -> Option<f64> {
        (self.count > 0).then(|| 100.0 * self.score / self.count as f64)
    }
}

/// Accuracy breakdown of one result file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStats {
    pub easy: Bucket,
    pub hard: Bucket,
    pub short: Bucket,
    pub medium: Bucket,
    pub long: Bucket,
    pub errors: usize,
}

impl ResultStats {
    /// Every successful record; each one lands in exactly one difficulty.
    pub fn overall(&self) -> Bucket {
        Bucket {
            count: self.easy.count + self.hard.count,
            score: self.easy.score + self.hard.score,
        }
    }

    pub fn total(&self) -> usize {
        self.overall().count + self.errors
    }

    fn add(&mut self, record: &Value, compensated: bool) {
        if record.get("error").is_some() {
            self.errors += 1;
            return;
        }

        let score = record_score(record, compensated);
        match record.get("difficulty").and_then(Value::as_str) {
            Some("easy") => self.easy.add(score),
            _ => self.hard.add(score),
        }
        match record.get("length").and_then(Value::as_str) {
            Some("short") => self.short.add(score),
            Some("medium") => self.medium.add(score),
            _ => self.long.add(score),
        }
    }

    /// One tab-separated report row.
    pub fn row(&self, name: &str) -> String {
        let pct = |b: Bucket, empty: &str| match b.percent() {
            Some(p) => format!("{:.1}", p),
            None => empty.to_string(),
        };
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            name,
            pct(self.overall(), "nan"),
            pct(self.easy, "none"),
            pct(self.hard, "none"),
            pct(self.short, "none"),
            pct(self.medium, "none"),
            pct(self.long, "none"),
            self.errors
        )
    }
}

fn record_score(record: &Value, compensated: bool) -> f64 {
    if compensated {
        let unanswered = match record.get("pred") {
            None | Some(Value::Null) => true,
            Some(pred) => pred.as_str() == Some(crate::strategy::prompt::NO_ANSWER),
        };
        if unanswered {
            return GUESS_CREDIT;
        }
    }
    match record.get("judge").and_then(Value::as_bool) {
        Some(true) => 1.0,
        _ => 0.0,
    }
}

fn read_records(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(EvalError::from))
        .collect()
}

/// Aggregate one result file.
pub fn file_stats(path: &Path, compensated: bool) -> Result<ResultStats> {
    let mut stats = ResultStats::default();
    for record in read_records(path)? {
        stats.add(&record, compensated);
    }
    Ok(stats)
}

/// `*.jsonl` files directly inside `dir`, sorted by name.
pub fn result_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EvalError::Dataset(format!(
            "results directory {} not found",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "jsonl"))
        .collect();
    files.sort();
    Ok(files)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Render the accuracy table for every result file in `dir`.
///
/// Files that cannot be parsed are skipped with a warning.
pub fn render_report(dir: &Path, compensated: bool) -> Result<String> {
    let files = result_files(dir)?;
    if files.is_empty() {
        return Err(EvalError::Dataset(format!(
            "no .jsonl result files in {}",
            dir.display()
        )));
    }

    let mut lines = vec![REPORT_HEADER.to_string()];
    for path in &files {
        match file_stats(path, compensated) {
            Ok(stats) => lines.push(stats.row(&stem(path))),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable result file"),
        }
    }
    Ok(lines.join("\n"))
}

/// Write the accuracy table to `output`, creating parent directories.
pub fn write_report(dir: &Path, output: &Path, compensated: bool) -> Result<()> {
    let table = render_report(dir, compensated)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, table)?;
    info!(output = %output.display(), compensated, "Report written");
    Ok(())
}

/// Summary block of a unified document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedMetadata {
    pub agents: Vec<String>,
    pub total_items: usize,
    pub error_counts: BTreeMap<String, usize>,
}

/// Results of several strategies merged per item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedResults {
    pub metadata: UnifiedMetadata,
    pub results: Vec<Map<String, Value>>,
}

/// Merge per-strategy result files in `dir` by item id.
///
/// `strategies` selects files by strategy name; `None` takes every result
/// file. Each item keeps its metadata once plus one entry per strategy with
/// `error` (empty on success), `pred`, `judge` and `token_usage`.
pub fn unify(dir: &Path, strategies: Option<&[String]>) -> Result<UnifiedResults> {
    let agents: Vec<String> = match strategies {
        Some(names) => names.to_vec(),
        None => result_files(dir)?.iter().map(|p| stem(p)).collect(),
    };

    let mut order: Vec<String> = Vec::new();
    let mut items: HashMap<String, Map<String, Value>> = HashMap::new();

    for agent in &agents {
        let path = dir.join(format!("{}.jsonl", agent));
        if !path.exists() {
            warn!(path = %path.display(), "Result file not found");
            continue;
        }
        let text = std::fs::read_to_string(&path)?;

        for (n, line) in text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            let record: Map<String, Value> = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), line = n + 1, error = %e, "Skipping invalid line");
                    continue;
                }
            };
            let Some(id) = record.get("_id").and_then(Value::as_str).map(str::to_string) else {
                warn!(path = %path.display(), line = n + 1, "Skipping record without _id");
                continue;
            };

            let entry = items.entry(id.clone()).or_insert_with(|| {
                order.push(id);
                Map::new()
            });
            for field in METADATA_FIELDS {
                if let Some(value) = record.get(field) {
                    entry.entry(field).or_insert_with(|| value.clone());
                }
            }

            let result = entry
                .entry(agent.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(result) = result {
                let error = record.get("error").cloned().unwrap_or_else(|| Value::from(""));
                result.insert("error".to_string(), error);
                for field in STRATEGY_FIELDS {
                    if let Some(value) = record.get(field) {
                        result.insert(field.to_string(), value.clone());
                    }
                }
            }
        }
    }

    let results: Vec<Map<String, Value>> = order
        .iter()
        .filter_map(|id| items.remove(id))
        .collect();

    let mut error_counts = BTreeMap::new();
    for item in &results {
        for agent in &agents {
            let failed = item
                .get(agent)
                .and_then(|r| r.get("error"))
                .and_then(Value::as_str)
                .is_some_and(|e| !e.is_empty());
            if failed {
                *error_counts.entry(agent.clone()).or_insert(0) += 1;
            }
        }
    }

    Ok(UnifiedResults {
        metadata: UnifiedMetadata {
            agents,
            total_items: results.len(),
            error_counts,
        },
        results,
    })
}

/// Unify and write the document as pretty JSON to `dir/output`.
pub fn write_unified(dir: &Path, output: &Path, strategies: Option<&[String]>) -> Result<(PathBuf, UnifiedResults)> {
    let unified = unify(dir, strategies)?;
    let path = dir.join(output);
    std::fs::write(&path, serde_json::to_string_pretty(&unified)?)?;
    info!(
        output = %path.display(),
        items = unified.metadata.total_items,
        "Unified results written"
    );
    Ok((path, unified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats_of(records: &[Value], compensated: bool) -> ResultStats {
        let mut stats = ResultStats::default();
        for r in records {
            stats.add(r, compensated);
        }
        stats
    }

    #[test]
    fn test_buckets_by_difficulty_and_length() {
        let records = [
            json!({"_id": "1", "pred": "A", "judge": true, "difficulty": "easy", "length": "short"}),
            json!({"_id": "2", "pred": "B", "judge": false, "difficulty": "hard", "length": "medium"}),
            json!({"_id": "3", "pred": "C", "judge": true, "difficulty": "odd", "length": "huge"}),
            json!({"_id": "4", "error": "timeout", "agent": "oneshot"}),
        ];
        let stats = stats_of(&records, false);

        assert_eq!(stats.easy, Bucket { count: 1, score: 1.0 });
        assert_eq!(stats.hard, Bucket { count: 2, score: 1.0 });
        assert_eq!(stats.long.count, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.row("oneshot"), "oneshot\t66.7\t100.0\t50.0\t100.0\t0.0\t100.0\t1");
    }

    #[test]
    fn test_compensated_credit_for_unanswered() {
        let records = [
            json!({"pred": "N", "judge": false, "difficulty": "easy", "length": "short"}),
            json!({"judge": false, "difficulty": "easy", "length": "short"}),
            json!({"pred": "B", "judge": false, "difficulty": "easy", "length": "short"}),
        ];
        assert_eq!(stats_of(&records, false).easy.score, 0.0);
        assert_eq!(stats_of(&records, true).easy.score, 0.5);
    }

    #[test]
    fn test_empty_groups_render_placeholders() {
        let stats = stats_of(&[json!({"error": "boom"})], false);
        assert_eq!(stats.row("x"), "x\tnan\tnone\tnone\tnone\tnone\tnone\t1");
    }

    #[test]
    fn test_unify_merges_by_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("oneshot.jsonl"),
            [
                json!({"_id": "a", "pred": "A", "judge": true, "token_usage": {}, "question": "q?", "difficulty": "easy"}),
                json!({"_id": "b", "error": "Rate limit exceeded", "agent": "oneshot"}),
            ]
            .map(|v| v.to_string())
            .join("\n"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("cot.jsonl"),
            json!({"_id": "a", "pred": "B", "judge": false, "question": "q?"}).to_string() + "\nnot json\n",
        )
        .unwrap();

        let unified = unify(dir.path(), None).unwrap();
        assert_eq!(unified.metadata.agents, vec!["cot", "oneshot"]);
        assert_eq!(unified.metadata.total_items, 2);
        assert_eq!(unified.metadata.error_counts.get("oneshot"), Some(&1));
        assert_eq!(unified.metadata.error_counts.get("cot"), None);

        let a = &unified.results[0];
        assert_eq!(a["_id"], "a");
        assert_eq!(a["question"], "q?");
        assert_eq!(a["difficulty"], "easy");
        assert_eq!(a["cot"]["pred"], "B");
        assert_eq!(a["cot"]["error"], "");
        assert_eq!(a["oneshot"]["judge"], true);

        let b = &unified.results[1];
        assert_eq!(b["oneshot"]["error"], "Rate limit exceeded");
        assert!(b.get("cot").is_none());
    }

    #[test]
    fn test_unify_named_strategies_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quotes.jsonl"), json!({"_id": "z", "pred": "D", "judge": true}).to_string())
            .unwrap();

        let names = vec!["quotes".to_string(), "absent".to_string()];
        let (path, unified) = write_unified(dir.path(), Path::new("unified.json"), Some(names.as_slice())).unwrap();

        assert_eq!(unified.metadata.total_items, 1);
        let written: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["metadata"]["agents"], json!(["quotes", "absent"]));
        assert_eq!(written["results"][0]["quotes"]["pred"], "D");
    }
}
