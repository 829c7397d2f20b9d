//! Prompt assembly and answer extraction shared by the strategies

use crate::task::QuestionItem;
use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

/// Label recorded when no answer can be found in a reply.
pub const NO_ANSWER: &str = "N";

/// Closing instruction every answer prompt ends with.
pub const ANSWER_FORMAT: &str =
    "Format your final answer as: \"The correct answer is (insert answer here)\".";

fn answer_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)answer is \(?([a-d])\)?",
            r"(?i)answer: \(?([a-d])\)?",
            r"(?i)option \(?([a-d])\)?",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Pull the chosen label out of a model reply.
///
/// Tries the phrasings models use most ("the answer is (B)", "Answer: B",
/// "option B") first, then any bare `(X)`, and gives up with `N`. Labels
/// match in either case and always come back upper-case.
pub fn extract_answer(reply: &str) -> String {
    for pattern in answer_patterns() {
        if let Some(label) = pattern.captures(reply).and_then(|c| c.get(1)) {
            return label.as_str().to_ascii_uppercase();
        }
    }

    ["A", "B", "C", "D"]
        .into_iter()
        .find(|label| {
            reply.contains(&format!("({})", label))
                || reply.contains(&format!("({})", label.to_ascii_lowercase()))
        })
        .unwrap_or(NO_ANSWER)
        .to_string()
}

/// Question followed by the four labelled choices.
pub fn question_block(item: &QuestionItem) -> String {
    let mut block = format!(
        "What is the correct answer to this question: {}\n\nChoices:\n",
        item.question.trim()
    );
    for (label, choice) in item.choices() {
        let _ = writeln!(block, "({}) {}", label, choice.trim());
    }
    block
}

/// Context wrapped in a tag, then the question block.
pub fn context_prompt(tag: &str, context: &str, item: &QuestionItem) -> String {
    format!(
        "Read the text below carefully, then answer the question that follows.\n\n<{tag}>\n{}\n</{tag}>\n\n{}",
        context.trim(),
        question_block(item),
    )
}

/// Word count as used for chunking decisions.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_answer_phrasings() {
        assert_eq!(extract_answer("The correct answer is (C)."), "C");
        assert_eq!(extract_answer("THE ANSWER IS B"), "B");
        assert_eq!(extract_answer("Answer: (D)"), "D");
        assert_eq!(extract_answer("I would pick option A here"), "A");
    }

    #[test]
    fn test_extract_answer_fallbacks() {
        assert_eq!(extract_answer("Between (B) and (D), (D) fits"), "B");
        assert_eq!(extract_answer("I cannot tell."), "N");
        assert_eq!(extract_answer(""), "N");
    }

    #[test]
    fn test_first_pattern_wins_over_bare_labels() {
        assert_eq!(extract_answer("(A) is tempting but the answer is (C)"), "C");
    }

    #[test]
    fn test_lowercase_label_is_normalized() {
        assert_eq!(extract_answer("The answer is (b)"), "B");
        assert_eq!(extract_answer("the answer is c"), "C");
        assert_eq!(extract_answer("answer: d"), "D");
        assert_eq!(extract_answer("Going with (a) then"), "A");
    }

    #[test]
    fn test_question_block_lists_choices_in_order() {
        let item: QuestionItem = serde_json::from_value(serde_json::json!({
            "_id": "1",
            "question": " Which? ",
            "choice_A": "one",
            "choice_B": "two ",
            "choice_C": "three",
            "choice_D": "four",
            "answer": "A"
        }))
        .unwrap();

        let block = question_block(&item);
        assert!(block.starts_with("What is the correct answer to this question: Which?\n"));
        assert!(block.ends_with("(A) one\n(B) two\n(C) three\n(D) four\n"));

        let prompt = context_prompt("text", "  body  ", &item);
        assert!(prompt.contains("<text>\nbody\n</text>"));
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  a b\n\tc  "), 3);
        assert_eq!(word_count(""), 0);
    }
}
