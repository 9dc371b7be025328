//! Deterministic LLM, embedder and renderer doubles for unit tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ChatMessage, Embedder, LlmProvider, ToolCall, ToolSpec};
use crate::ingest::pdf::DocumentRenderer;

type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync>;

/// Replays queued tool calls and answers plain completions with a closure.
pub struct ScriptedLlm {
    tool_calls: Mutex<VecDeque<Vec<ToolCall>>>,
    responder: Responder,
    pub generate_calls: AtomicUsize,
    pub tool_call_requests: AtomicUsize,
    pub offered_tools: Mutex<Vec<Vec<String>>>,
}

impl ScriptedLlm {
    pub fn new(
        responder: impl Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tool_calls: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            generate_calls: AtomicUsize::new(0),
            tool_call_requests: AtomicUsize::new(0),
            offered_tools: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(anyhow!("llm unavailable")))
    }

    /// Queue one turn of tool calls; an empty vec simulates a response without calls.
    pub fn push_turn(&self, calls: Vec<ToolCall>) {
        self.tool_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(calls);
    }

    pub fn push_call(&self, name: &str, args: serde_json::Value) {
        self.push_turn(vec![ToolCall {
            name: name.to_string(),
            args,
        }]);
    }

    pub fn total_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst) + self.tool_call_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(messages)
    }

    async fn generate_tool_calls(
        &self,
        _messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<Vec<ToolCall>> {
        self.tool_call_requests.fetch_add(1, Ordering::SeqCst);
        self.offered_tools
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tools.iter().map(|t| t.name.clone()).collect());
        let next = self
            .tool_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(next.unwrap_or_else(|| {
            vec![ToolCall {
                name: "final_answer".to_string(),
                args: serde_json::json!({}),
            }]
        }))
    }
}

/// Bag-of-words hashing embedder: texts sharing words land close together.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            word.hash(&mut hasher);
            v[(hasher.finish() % self.dims as u64) as usize] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Treats every input file as UTF-8 text; "pages" are split on form feeds.
pub struct PlainTextRenderer;

#[async_trait]
impl DocumentRenderer for PlainTextRenderer {
    async fn extract_text(&self, path: &Path) -> Result<Vec<String>> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(text.split('\x0c').map(|p| p.to_string()).collect())
    }

    async fn render_pages(&self, path: &Path) -> Result<Vec<Vec<u8>>> {
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![bytes])
    }
}
