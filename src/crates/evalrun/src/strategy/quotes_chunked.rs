use super::prompt::{extract_answer, question_block, word_count, ANSWER_FORMAT};
use super::{ask, Strategy};
use crate::task::QuestionItem;
use async_trait::async_trait;
use futures::future::try_join_all;
use llm::{LlmError, ResilientClient};
use tracing::debug;

const QUOTES_MARKER: &str = "Quotes:";

/// Map-reduce over a long context.
///
/// The context is cut into overlapping word windows, quotes are extracted
/// from every window concurrently, oversized quote collections are
/// summarized, and the final answer is asked for against the quotes only.
#[derive(Debug, Clone, Copy)]
pub struct QuotesChunked {
    pub chunk_words: usize,
    pub overlap_words: usize,
    /// Quote collections longer than this are summarized first.
    pub compress_above_words: usize,
    pub compress_chunk_words: usize,
}

impl Default for QuotesChunked {
    fn default() -> Self {
        Self {
            chunk_words: 1000,
            overlap_words: 200,
            compress_above_words: 8000,
            compress_chunk_words: 4000,
        }
    }
}

/// Split `text` into windows of `chunk_size` words, each starting
/// `chunk_size - overlap` words after the previous one.
///
/// Whitespace inside a window is normalized to single spaces.
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(overlap).max(1);

    (0..words.len())
        .step_by(step)
        .map(|start| {
            let end = (start + chunk_size).min(words.len());
            words[start..end].join(" ")
        })
        .collect()
}

/// Text after the first quotes marker, if the reply found anything.
fn quotes_section(reply: &str) -> Option<&str> {
    reply
        .split_once(QUOTES_MARKER)
        .map(|(_, quotes)| quotes.trim())
}

impl QuotesChunked {
    fn chunk_prompt(&self, question: &str, window: &str, total_words: usize) -> String {
        format!(
            "You are one of several readers working in parallel on a text of {total_words} words. \
You see a window of about {chunk} words that overlaps its neighbours by {overlap} words. \
Extract the quotes from this window that help answer the question: {question}\n\n\
For every quote add a short explanation and a confidence between 0 and 1. \
If the window has nothing relevant, say so and give a confidence.\n\n\
Reply in one of these forms:\n\
Quotes:\n1. \"quote\" - explanation (confidence: 0.8)\n\
or\n\
No relevant information (confidence: 0.7)\n\n\
Window:\n{window_text}\n\nQuestion: {question}",
            chunk = self.chunk_words,
            overlap = self.overlap_words,
            window_text = window,
        )
    }

    fn compress_prompt(question: &str, quotes: &str) -> String {
        format!(
            "The quotes below were taken from a long text because they may help answer this \
question: {question}\n\nSummarize them briefly, keeping every fact that helps decide between \
the answer choices.\n\nQuotes:\n{quotes}\n\nQuestion: {question}\n\nSummary:"
        )
    }

    fn final_prompt(item: &QuestionItem, quotes: &str) -> String {
        format!(
            "Read the quotes below carefully, then answer the question that follows.\n\n\
<quotes>\n{quotes}\n</quotes>\n\n{}\n\
1. Relate the quotes to the question\n\
2. Pick the choice the quotes support best\n\
3. {}",
            question_block(item),
            ANSWER_FORMAT
        )
    }
}

#[async_trait]
impl Strategy for QuotesChunked {
    fn name(&self) -> &'static str {
        "quotes_chunked"
    }

    fn description(&self) -> &'static str {
        "Extracts quotes from overlapping context chunks in parallel, then answers from the quotes"
    }

    async fn invoke(&self, item: &QuestionItem, client: &ResilientClient) -> Result<String, LlmError> {
        let question = item.question.trim();
        let total_words = word_count(&item.context);
        let chunks = split_into_chunks(&item.context, self.chunk_words, self.overlap_words);

        let replies = try_join_all(chunks.iter().map(|chunk| {
            ask(client, self.chunk_prompt(question, chunk, total_words), 0.1, 1024)
        }))
        .await?;

        let relevant: Vec<&str> = replies.iter().filter_map(|r| quotes_section(r)).collect();
        let collected = relevant.join("\n\n");
        let collected_words = word_count(&collected);

        let compressed = collected_words > self.compress_above_words;
        let quotes = if compressed {
            let parts = split_into_chunks(&collected, self.compress_chunk_words, 0);
            let summaries = try_join_all(
                parts
                    .iter()
                    .map(|part| ask(client, Self::compress_prompt(question, part), 0.1, 1024)),
            )
            .await?;
            summaries.join("\n\n")
        } else {
            collected
        };

        let reply = ask(client, Self::final_prompt(item, &quotes), 0.1, 1024).await?;

        debug!(
            item = %item.id,
            chunks = chunks.len(),
            relevant_chunks = relevant.len(),
            collected_words,
            compressed,
            final_context_words = word_count(&quotes),
            "Chunked quote extraction finished"
        );

        Ok(extract_answer(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_split_into_overlapping_windows() {
        let chunks = split_into_chunks(&words(2500), 1000, 200);
        // windows start at 0, 800, 1600, 2400
        assert_eq!(chunks.len(), 4);
        assert!(chunks[1].starts_with("w800 "));
        assert_eq!(word_count(&chunks[0]), 1000);
        assert_eq!(word_count(&chunks[3]), 100);
    }

    #[test]
    fn test_split_without_overlap() {
        let chunks = split_into_chunks(&words(10), 4, 0);
        assert_eq!(chunks, vec!["w0 w1 w2 w3", "w4 w5 w6 w7", "w8 w9"]);
    }

    #[test]
    fn test_split_degenerate_inputs() {
        assert!(split_into_chunks("", 1000, 200).is_empty());
        assert!(split_into_chunks("   \n ", 10, 0).is_empty());
        // overlap at least as large as the window still makes progress
        assert_eq!(split_into_chunks("a b c", 2, 5).len(), 3);
    }

    #[test]
    fn test_quotes_section() {
        assert_eq!(
            quotes_section("Quotes:\n1. \"x\" - y (confidence: 0.9)"),
            Some("1. \"x\" - y (confidence: 0.9)")
        );
        assert_eq!(quotes_section("No relevant information (confidence: 0.7)"), None);
    }
}
