use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::config::LlmConfig;
use crate::core::llm::{ChatMessage, Embedder, LlmProvider, ToolCall, ToolSpec};

// ── Chat completion request/response ──

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

// ── Embeddings request/response ──

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn message_to_wire(message: &ChatMessage) -> Value {
    if message.images.is_empty() {
        return json!({
            "role": message.role.wire_role(),
            "content": message.content,
        });
    }

    let mut parts = Vec::with_capacity(message.images.len() + 1);
    if !message.content.is_empty() {
        parts.push(json!({ "type": "text", "text": message.content }));
    }
    for image in &message.images {
        parts.push(json!({
            "type": "image_url",
            "image_url": { "url": format!("data:image/png;base64,{}", image) }
        }));
    }
    json!({ "role": message.role.wire_role(), "content": parts })
}

fn tool_to_wire(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Client for any OpenAI-compatible chat/embeddings API.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig, model: &str) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            model: model.to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: Client::new(),
        }
    }

    async fn post_chat(&self, req: &ChatRequest<'_>) -> Result<ResponseMessage> {
        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(req)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "LLM API Error ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: ChatResponse = res.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow!("LLM API returned no choices"))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let req = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(message_to_wire).collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: None,
            tool_choice: None,
        };
        let message = self.post_chat(&req).await?;
        Ok(message.content.unwrap_or_default())
    }

    async fn generate_tool_calls(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<Vec<ToolCall>> {
        let req = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(message_to_wire).collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: Some(tools.iter().map(tool_to_wire).collect()),
            tool_choice: Some("required"),
        };
        let message = self.post_chat(&req).await?;
        Ok(message
            .tool_calls
            .into_iter()
            .map(|call| {
                // Arguments arrive as a JSON-encoded string
                let args = serde_json::from_str::<Value>(&call.function.arguments)
                    .unwrap_or_else(|_| json!({}));
                ToolCall {
                    name: call.function.name,
                    args,
                }
            })
            .collect())
    }
}

pub struct OpenAiEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };
        let res = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Embedding API Error ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let mut parsed: EmbeddingResponse = res.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "Embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            ));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::RoleType;

    #[test]
    fn text_message_serializes_as_plain_content() {
        let wire = message_to_wire(&ChatMessage::ai("hello"));
        assert_eq!(wire, json!({ "role": "assistant", "content": "hello" }));
    }

    #[test]
    fn image_message_serializes_as_content_parts() {
        let msg = ChatMessage::new(RoleType::Human, "")
            .with_images(vec!["AAAA".to_string(), "BBBB".to_string()]);
        let wire = message_to_wire(&msg);
        let parts = wire["content"].as_array().expect("content parts");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,BBBB");
    }

    #[test]
    fn tool_spec_wraps_function_declaration() {
        let wire = tool_to_wire(&ToolSpec {
            name: "final_answer".to_string(),
            description: "answer".to_string(),
            parameters: json!({ "type": "object" }),
        });
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "final_answer");
    }
}
