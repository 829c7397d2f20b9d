use super::prompt::{context_prompt, extract_answer, ANSWER_FORMAT};
use super::{ask, Strategy};
use crate::task::QuestionItem;
use async_trait::async_trait;
use llm::{LlmError, ResilientClient};

const REASONING_STEPS: &str = "\
Work through the problem before answering:
1. Restate what the question is asking
2. Find the passages of the text that bear on it
3. Weigh every choice against those passages
4. Explain why the rejected choices fail
5. Pick the choice the text supports best";

/// Step-by-step reasoning before the final answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainOfThought;

#[async_trait]
impl Strategy for ChainOfThought {
    fn name(&self) -> &'static str {
        "cot"
    }

    fn description(&self) -> &'static str {
        "Chain-of-thought prompt that reasons step by step before answering"
    }

    async fn invoke(&self, item: &QuestionItem, client: &ResilientClient) -> Result<String, LlmError> {
        let prompt = format!(
            "{}\n{}\n\nAfter your reasoning, give the answer. {}",
            context_prompt("text", &item.context, item),
            REASONING_STEPS,
            ANSWER_FORMAT
        );
        let reply = ask(client, prompt, 0.1, 1024).await?;
        Ok(extract_answer(&reply))
    }
}
