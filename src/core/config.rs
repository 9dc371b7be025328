use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "./ai-sre.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub chat: ChatConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:4000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub vector_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/ai_sre.db"),
            vector_path: PathBuf::from("./data/vectors.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub vision_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            temperature: 0.01,
            max_tokens: 8192,
            embedding_model: "text-embedding-3-large".to_string(),
            embedding_dimensions: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Cap on distinct passages returned by engineering-document retrieval.
    pub max_results: usize,
    /// Matches fetched per expanded query.
    pub per_query_k: usize,
    /// Summaries fetched by the multi-vector retriever.
    pub summary_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            per_query_k: 3,
            summary_k: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
    pub incident_subdir: String,
    pub object_store_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            incident_subdir: "incident_summaries".to_string(),
            object_store_dir: PathBuf::from("./data/object-store"),
            chunk_size: 1000,
            chunk_overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Recency window for answer reuse, in question/answer pairs.
    pub recent_chats: usize,
    /// Prior question/answer pairs handed to the router as chat history.
    pub history_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            recent_chats: 50,
            history_turns: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_ttl_minutes: u32,
    pub admin_username: String,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 15,
            admin_username: "admin".to_string(),
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// Load from `path` (a missing file means defaults), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("AI_SRE_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            Self::from_toml(&raw)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("parsing config TOML")
    }

    /// Apply environment overrides; `lookup` is injected so tests need not touch the process env.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("AI_SRE_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(path) = lookup("AI_SRE_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("AI_SRE_VECTOR_DB_PATH") {
            self.database.vector_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("AI_SRE_DATA_DIR") {
            let dir = PathBuf::from(dir);
            self.ingest.object_store_dir = dir.join("object-store");
            self.ingest.data_dir = dir;
        }
        if let Some(host) = lookup("AI_SRE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("AI_SRE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("AI_SRE_PORT is not a valid port: {}", port))?;
        }
        if let Some(password) = lookup("AI_SRE_ADMIN_PASSWORD") {
            self.auth.admin_password = Some(password);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be positive");
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            bail!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            );
        }
        if self.retrieval.max_results == 0 {
            bail!("retrieval.max_results must be positive");
        }
        if self.llm.embedding_dimensions == 0 {
            bail!("llm.embedding_dimensions must be positive");
        }
        Ok(())
    }
}
