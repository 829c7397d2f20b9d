use super::prompt::{context_prompt, extract_answer, ANSWER_FORMAT};
use super::{ask, Strategy};
use crate::task::QuestionItem;
use async_trait::async_trait;
use llm::{LlmError, ResilientClient};

const QUOTE_STEPS: &str = "\
Answer in these steps:
1. Quote two or three passages of the text that help answer the question
2. Say briefly why each quote matters
3. Relate each quote to the choices
4. Decide which choice the quotes support";

/// Ground the answer in quotes pulled from the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractQuotes;

#[async_trait]
impl Strategy for ExtractQuotes {
    fn name(&self) -> &'static str {
        "quotes"
    }

    fn description(&self) -> &'static str {
        "Quotes supporting evidence from the text before answering"
    }

    async fn invoke(&self, item: &QuestionItem, client: &ResilientClient) -> Result<String, LlmError> {
        let prompt = format!(
            "{}\n{}\n5. {}",
            context_prompt("text", &item.context, item),
            QUOTE_STEPS,
            ANSWER_FORMAT
        );
        let reply = ask(client, prompt, 0.1, 1024).await?;
        Ok(extract_answer(&reply))
    }
}
