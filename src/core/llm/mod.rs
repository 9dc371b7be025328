pub mod openai;
pub mod prompts;
#[cfg(test)]
pub mod testing;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Closed set of chat roles, shared by persisted chat rows and LLM messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    System,
    Ai,
    Human,
    Tool,
}

impl RoleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleType::System => "system",
            RoleType::Ai => "ai",
            RoleType::Human => "human",
            RoleType::Tool => "tool",
        }
    }

    pub fn from_role(value: &str) -> Option<Self> {
        match value {
            "system" => Some(RoleType::System),
            "ai" => Some(RoleType::Ai),
            "human" => Some(RoleType::Human),
            "tool" => Some(RoleType::Tool),
            _ => None,
        }
    }

    /// Role name on the OpenAI-compatible wire.
    pub fn wire_role(self) -> &'static str {
        match self {
            RoleType::System => "system",
            RoleType::Ai => "assistant",
            RoleType::Human | RoleType::Tool => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: RoleType,
    pub content: String,
    /// Base64-encoded PNG images attached after the text part.
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn new(role: RoleType, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(RoleType::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(RoleType::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(RoleType::Ai, content)
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Function-tool declaration offered to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call returned by the model, arguments already decoded from JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Value,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model_id(&self) -> &str;

    // Plain completion over a structured conversation
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;

    // Completion constrained to call one of `tools`; returns every call the model emitted
    async fn generate_tool_calls(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<Vec<ToolCall>>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
