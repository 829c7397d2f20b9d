//! Tasks and the multiple-choice question payload

use serde::{Deserialize, Serialize};

/// One unit of submitted work.
///
/// `index` is the task's position in the submission sequence and the only key
/// used to restore order on output.
#[derive(Debug, Clone, PartialEq)]
pub struct Task<P> {
    pub index: usize,
    pub payload: P,
}

impl<P> Task<P> {
    pub fn new(index: usize, payload: P) -> Self {
        Self { index, payload }
    }
}

/// Number payloads 0..N in iteration order.
pub fn enumerate<P>(payloads: impl IntoIterator<Item = P>) -> Vec<Task<P>> {
    payloads
        .into_iter()
        .enumerate()
        .map(|(index, payload)| Task::new(index, payload))
        .collect()
}

/// A long-context multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionItem {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub sub_domain: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
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
    /// Ground-truth label, one of `A`..`D`
    pub answer: String,
    #[serde(default)]
    pub context: String,
}

impl QuestionItem {
    /// Choices paired with their labels, in label order.
    pub fn choices(&self) -> [(char, &str); 4] {
        [
            ('A', self.choice_a.as_str()),
            ('B', self.choice_b.as_str()),
            ('C', self.choice_c.as_str()),
            ('D', self.choice_d.as_str()),
        ]
    }

    /// Whether `pred` matches the ground truth.
    pub fn is_correct(&self, pred: &str) -> bool {
        pred == self.answer
    }
}
