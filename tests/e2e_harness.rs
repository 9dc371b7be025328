#![allow(dead_code)]

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "e2e-admin-password";
pub const MOCK_ANSWER: &str = "Roll back release 42 of the trends service.";
const MOCK_EMBEDDING_DIMS: usize = 256;

/// A running `ai-sre serve` process backed by a scratch data directory.
pub struct ServerHarness {
    child: Child,
    pub api_port: u16,
    pub api_base: String,
    data_dir: tempfile::TempDir,
    trace_log: Arc<Mutex<Vec<String>>>,
}

impl ServerHarness {
    pub async fn spawn(llm_base_url: &str) -> TestResult<Self> {
        let api_port = find_free_port()?;
        let data_dir = tempfile::tempdir()?;
        let root = data_dir.path();
        std::fs::create_dir_all(root.join("kb"))?;
        let server_log = root.join(format!("server-{}.log", api_port));

        let bin = server_binary_path()?;
        let log_file = std::fs::File::create(&server_log)?;
        let log_file_err = log_file.try_clone()?;

        let child = Command::new(bin)
            .arg("serve")
            .env("AI_SRE_CONFIG", root.join("absent.toml"))
            .env("AI_SRE_HOST", "127.0.0.1")
            .env("AI_SRE_PORT", api_port.to_string())
            .env("AI_SRE_DB_PATH", root.join("ai_sre.db"))
            .env("AI_SRE_VECTOR_DB_PATH", root.join("vectors.db"))
            .env("AI_SRE_DATA_DIR", root.join("kb"))
            .env("AI_SRE_LLM_BASE_URL", llm_base_url)
            .env("AI_SRE_ADMIN_PASSWORD", ADMIN_PASSWORD)
            .env("OPENAI_API_KEY", "sk-mock")
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            .spawn()?;

        let mut harness = Self {
            child,
            api_port,
            api_base: format!("http://127.0.0.1:{}", api_port),
            data_dir,
            trace_log: Arc::new(Mutex::new(Vec::new())),
        };

        harness.wait_until_ready().await?;
        Ok(harness)
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    async fn wait_until_ready(&mut self) -> TestResult<()> {
        for _ in 0..80 {
            if let Some(status) = self.child.try_wait()? {
                return Err(format!("ai-sre server exited early with status: {}", status).into());
            }

            let res = reqwest::Client::new()
                .get(format!("{}/status", self.api_base))
                .timeout(Duration::from_millis(700))
                .send()
                .await;

            if let Ok(resp) = res
                && resp.status().is_success()
            {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        Err("Timed out waiting for ai-sre API readiness".into())
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResult<String> {
        let (status, out) = self
            .request_json(
                reqwest::Method::POST,
                "/api/auth/token",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await?;
        match out.get("access_token").and_then(Value::as_str) {
            Some(token) if status == 200 => Ok(token.to_string()),
            _ => Err(format!("login failed ({}): {}", status, out).into()),
        }
    }

    pub async fn chat(&self, token: &str, query: &str) -> TestResult<(u16, Value)> {
        self.request_json(
            reqwest::Method::POST,
            "/api/ai-sre/chat-completion",
            Some(token),
            Some(json!({ "query": query })),
        )
        .await
    }

    pub async fn chat_history(&self, token: &str) -> TestResult<Vec<Value>> {
        let (_, out) = self
            .request_json(
                reqwest::Method::GET,
                "/api/ai-sre/chat-history",
                Some(token),
                None,
            )
            .await?;
        Ok(out
            .get("chat_history")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn request_json(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResult<(u16, Value)> {
        let url = format!("{}{}", self.api_base, path);
        let client = reqwest::Client::new();
        let mut req = client
            .request(method.clone(), &url)
            .timeout(Duration::from_secs(30));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(payload) = body.clone() {
            req = req.json(&payload);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let parsed = serde_json::from_str::<Value>(&text)
            .unwrap_or_else(|_| json!({ "raw": text, "error": "non-json response" }));

        let mut traces = self.trace_log.lock().unwrap_or_else(|e| e.into_inner());
        traces.push(format!(
            "REQUEST {} {}\nBODY {}\nSTATUS {}\nRESPONSE {}",
            method,
            path,
            body.unwrap_or(Value::Null),
            status,
            parsed
        ));
        drop(traces);

        Ok((status.as_u16(), parsed))
    }

    pub fn persist_trace_file(&self, name: &str) -> TestResult<PathBuf> {
        let path = self.data_dir.path().join(format!("{}.trace.log", name));
        let lines = self.trace_log.lock().unwrap_or_else(|e| e.into_inner());
        std::fs::write(&path, lines.join("\n\n---\n\n"))?;
        Ok(path)
    }
}

impl Drop for ServerHarness {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[derive(Clone)]
struct MockServerState {
    chat_requests: Arc<Mutex<usize>>,
}

/// OpenAI-compatible stand-in: the router always picks `final_answer`, and
/// plain completions return `MOCK_ANSWER`.
pub struct MockLlmServer {
    pub port: u16,
    chat_requests: Arc<Mutex<usize>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Debug, Deserialize)]
struct MockChatRequest {
    messages: Vec<Value>,
    #[serde(default)]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct MockEmbeddingRequest {
    input: Vec<String>,
}

async fn mock_chat_completion(
    State(state): State<MockServerState>,
    Json(payload): Json<MockChatRequest>,
) -> Json<Value> {
    *state.chat_requests.lock().unwrap_or_else(|e| e.into_inner()) += 1;

    if payload.tools.is_some() {
        let query = payload
            .messages
            .iter()
            .rev()
            .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
            .and_then(|m| m.get("content").and_then(Value::as_str))
            .unwrap_or_default();
        let arguments = json!({ "query": query, "context": "" }).to_string();
        return Json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_0",
                        "type": "function",
                        "function": { "name": "final_answer", "arguments": arguments }
                    }]
                }
            }]
        }));
    }

    Json(json!({
        "choices": [{
            "message": { "role": "assistant", "content": MOCK_ANSWER }
        }]
    }))
}

async fn mock_embeddings(Json(payload): Json<MockEmbeddingRequest>) -> Json<Value> {
    let data: Vec<Value> = payload
        .input
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let mut embedding = vec![0.0f32; MOCK_EMBEDDING_DIMS];
            for (i, b) in text.bytes().enumerate() {
                embedding[(i + b as usize) % MOCK_EMBEDDING_DIMS] += 1.0;
            }
            json!({ "index": index, "embedding": embedding })
        })
        .collect();
    Json(json!({ "data": data }))
}

impl MockLlmServer {
    pub async fn start() -> TestResult<Self> {
        let port = find_free_port()?;
        let chat_requests = Arc::new(Mutex::new(0));
        let state = MockServerState {
            chat_requests: Arc::clone(&chat_requests),
        };
        let app = Router::new()
            .route("/v1/chat/completions", post(mock_chat_completion))
            .route("/v1/embeddings", post(mock_embeddings))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            port,
            chat_requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/v1", self.port)
    }

    pub fn chat_requests(&self) -> usize {
        *self.chat_requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

pub fn find_free_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn server_binary_path() -> TestResult<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_ai-sre") {
        return Ok(PathBuf::from(path));
    }

    let candidate = PathBuf::from("target")
        .join("debug")
        .join(if cfg!(windows) { "ai-sre.exe" } else { "ai-sre" });
    if candidate.exists() {
        return Ok(candidate);
    }

    Err("Could not locate ai-sre test binary path".into())
}
