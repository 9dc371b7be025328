use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::config::AppConfig;
use crate::core::db::Database;
use crate::core::db::types::ChatRecord;
use crate::core::graph::RagGraph;
use crate::core::llm::openai::{OpenAiEmbedder, OpenAiProvider};
use crate::core::llm::{ChatMessage, Embedder, LlmProvider, RoleType};
use crate::core::vectorstore::multi_vector::MultiVectorRetriever;
use crate::core::vectorstore::object_store::LocalFileStore;
use crate::core::vectorstore::{Collection, VectorStore};
use crate::ingest::pdf::{DocumentRenderer, PopplerRenderer};
use crate::ingest::{IngestReport, IngestionPipeline};
use crate::tools::ToolRegistry;
use crate::tools::final_answer::NO_ANSWER;

/// External clients the assistant is built from.
pub struct AssistantDeps {
    pub llm: Arc<dyn LlmProvider>,
    pub vision: Arc<dyn LlmProvider>,
    pub vectorstore: Arc<VectorStore>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

impl AssistantDeps {
    /// OpenAI-compatible chat, vision and embedding clients, sqlite-vec and poppler.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(&config.llm));
        let vectorstore =
            Arc::new(VectorStore::open(&config.database.vector_path, embedder).await?);
        Ok(Self {
            llm: Arc::new(OpenAiProvider::new(&config.llm, &config.llm.chat_model)),
            vision: Arc::new(OpenAiProvider::new(&config.llm, &config.llm.vision_model)),
            vectorstore,
            renderer: Arc::new(PopplerRenderer::default()),
        })
    }
}

/// Chat completion, knowledge-base ingestion and chat history for users.
pub struct Assistant {
    db: Database,
    vectorstore: Arc<VectorStore>,
    graph: RagGraph,
    ingestion: IngestionPipeline,
    ingest_lock: Mutex<()>,
    recent_chats: usize,
    history_turns: usize,
}

impl Assistant {
    pub fn new(config: &AppConfig, db: Database, deps: AssistantDeps) -> Self {
        info!(
            "Assistant using router model {} and vision model {}",
            deps.llm.model_id(),
            deps.vision.model_id()
        );
        let docstore = Arc::new(LocalFileStore::new(&config.ingest.object_store_dir));
        let retriever = Arc::new(MultiVectorRetriever::new(
            deps.vectorstore.clone(),
            docstore.clone(),
            Collection::Summary,
            config.retrieval.summary_k,
        ));
        let tools = Arc::new(ToolRegistry::standard(
            deps.llm.clone(),
            deps.vision.clone(),
            deps.vectorstore.clone(),
            retriever,
            &config.retrieval,
        ));
        let ingestion = IngestionPipeline::new(
            &config.ingest,
            db.clone(),
            deps.vectorstore.clone(),
            docstore,
            deps.renderer,
            deps.vision,
        );
        Self {
            db,
            vectorstore: deps.vectorstore,
            graph: RagGraph::new(deps.llm, tools),
            ingestion,
            ingest_lock: Mutex::new(()),
            recent_chats: config.chat.recent_chats,
            history_turns: config.chat.history_turns,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Answer `question` for a user, reusing a recent answer to the same question.
    pub async fn gen_ai_completion(&self, user_id: i64, question: &str) -> Result<String> {
        let history = self
            .db
            .find_recent_chat_history(user_id, self.recent_chats)
            .await?;
        if let Some(answer) = history.get(question)
            && !answer.is_empty()
        {
            info!("Question asked recently by user {}, reusing answer", user_id);
            return Ok(answer.to_string());
        }
        if !history.is_empty() {
            debug!(
                "{} recent question/answer pairs for user {}",
                history.len(),
                user_id
            );
        }

        self.db
            .create_chat(user_id, RoleType::Human, question)
            .await?;

        let mut chat_history = Vec::new();
        for (q, a) in history.last_pairs(self.history_turns) {
            chat_history.push(ChatMessage::human(q.clone()));
            if !a.is_empty() {
                chat_history.push(ChatMessage::ai(a.clone()));
            }
        }

        let state = self.graph.invoke(question, chat_history).await?;
        let completion = state.final_answer().unwrap_or(NO_ANSWER).to_string();
        self.db
            .create_chat(user_id, RoleType::Ai, &completion)
            .await?;
        Ok(completion)
    }

    /// Ingest new files from the data directory; runs are serialized.
    pub async fn gen_knowledgebase(&self) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;
        self.ingestion.run().await
    }

    /// Ingested file count, text chunks and incident summaries.
    pub async fn knowledge_base_size(&self) -> Result<(usize, usize, usize)> {
        Ok((
            self.db.count_ingested_files().await?,
            self.vectorstore.count(Collection::Text).await?,
            self.vectorstore.count(Collection::Summary).await?,
        ))
    }

    /// The user's latest questions, newest first.
    pub async fn recent_questions(&self, user_id: i64, limit: usize) -> Result<Vec<String>> {
        let records = self.db.find_recent_human_records(user_id, limit).await?;
        Ok(records.into_iter().map(|r| r.content).collect())
    }

    pub async fn get_chat_history(&self, user_id: i64) -> Result<Vec<ChatRecord>> {
        self.db.find_chats_by_user_id(user_id).await
    }
}
