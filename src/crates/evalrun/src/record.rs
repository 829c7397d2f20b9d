//! Output records
//!
//! One record per task, written as one JSON line. The field layout is what
//! downstream tooling (`evalrun report`, `evalrun unify`) reads back.

use crate::task::QuestionItem;
use llm::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Characters of context kept in a success record.
pub const CONTEXT_PREVIEW_CHARS: usize = 1000;

/// How a flushed record counts towards progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
    Error,
}

/// Records the progress aggregator can classify.
pub trait Classify {
    fn verdict(&self) -> Verdict;
}

/// A task whose strategy produced a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub pred: String,
    pub judge: bool,
    pub token_usage: BTreeMap<String, TokenUsage>,
    pub domain: String,
    pub sub_domain: String,
    pub difficulty: String,
    pub length: String,
    pub question: String,
    #[serde(rename = "choice_A")]
    pub choice_a: String,
    #[serde(rename = "choice_B")]
    pub choice_b: String,
    #[serde(rename = "choice_C")]
    pub choice_c: String,
    #[serde(rename = "choice_D")]
    pub choice_d: String,
    pub context: String,
    pub agent: String,
}

/// A task whose strategy failed, retries included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub error: String,
    pub agent: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub sub_domain: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub length: String,
}

/// Outcome of one task as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvalRecord {
    Failure(FailureRecord),
    Success(SuccessRecord),
}

impl EvalRecord {
    pub fn success(
        item: &QuestionItem,
        pred: impl Into<String>,
        token_usage: BTreeMap<String, TokenUsage>,
        agent: &str,
    ) -> Self {
        let pred = pred.into();
        Self::Success(SuccessRecord {
            id: item.id.clone(),
            judge: item.is_correct(&pred),
            pred,
            token_usage,
            domain: item.domain.clone(),
            sub_domain: item.sub_domain.clone(),
            difficulty: item.difficulty.clone(),
            length: item.length.clone(),
            question: item.question.clone(),
            choice_a: item.choice_a.clone(),
            choice_b: item.choice_b.clone(),
            choice_c: item.choice_c.clone(),
            choice_d: item.choice_d.clone(),
            context: truncate_chars(&item.context, CONTEXT_PREVIEW_CHARS).to_string(),
            agent: agent.to_string(),
        })
    }

    pub fn failure(item: &QuestionItem, error: impl Into<String>, agent: &str) -> Self {
        Self::Failure(FailureRecord {
            id: item.id.clone(),
            error: error.into(),
            agent: agent.to_string(),
            domain: item.domain.clone(),
            sub_domain: item.sub_domain.clone(),
            difficulty: item.difficulty.clone(),
            length: item.length.clone(),
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Success(r) => &r.id,
            Self::Failure(r) => &r.id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

impl Classify for EvalRecord {
    fn verdict(&self) -> Verdict {
        match self {
            Self::Failure(_) => Verdict::Error,
            Self::Success(r) if r.judge => Verdict::Correct,
            Self::Success(_) => Verdict::Incorrect,
        }
    }
}

/// Longest prefix of `s` with at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
