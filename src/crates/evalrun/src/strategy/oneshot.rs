use super::prompt::{context_prompt, extract_answer, ANSWER_FORMAT};
use super::{ask, Strategy};
use crate::task::QuestionItem;
use async_trait::async_trait;
use llm::{LlmError, ResilientClient};

/// Ask for the answer directly, with a small token budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oneshot;

#[async_trait]
impl Strategy for Oneshot {
    fn name(&self) -> &'static str {
        "oneshot"
    }

    fn description(&self) -> &'static str {
        "Single prompt asking for the answer directly"
    }

    async fn invoke(&self, item: &QuestionItem, client: &ResilientClient) -> Result<String, LlmError> {
        let prompt = format!("{}\n{}", context_prompt("text", &item.context, item), ANSWER_FORMAT);
        let reply = ask(client, prompt, 0.1, 128).await?;
        Ok(extract_answer(&reply))
    }
}
