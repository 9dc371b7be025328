use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

use super::{Tool, ToolInput, ToolName};
use crate::core::llm::prompts::{FINAL_ANSWER_PROMPT, render};
use crate::core::llm::{ChatMessage, LlmProvider};

pub const NO_ANSWER: &str = "Can't find answer";

/// Terminal tool: synthesizes the answer from everything gathered so far.
pub struct FinalAnswerTool {
    llm: Arc<dyn LlmProvider>,
}

impl FinalAnswerTool {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for FinalAnswerTool {
    fn name(&self) -> ToolName {
        ToolName::FinalAnswer
    }

    fn description(&self) -> &str {
        "Return a natural language response to the user, based on the original query and the \
         context aggregated from all other tool outputs"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The original user query" },
                "context": { "type": "string", "description": "Information gathered from the other tools" }
            },
            "required": ["query", "context"]
        })
    }

    async fn invoke(&self, input: &ToolInput) -> String {
        let prompt = render(
            FINAL_ANSWER_PROMPT,
            &[
                ("query", input.query.as_str()),
                ("context", input.context.as_deref().unwrap_or_default()),
            ],
        );
        match self.llm.generate(&[ChatMessage::human(prompt)]).await {
            Ok(answer) => {
                info!("Final answer generated");
                answer
            }
            Err(e) => {
                error!("Failed to get final answer from LLM: {:#}", e);
                NO_ANSWER.to_string()
            }
        }
    }
}
