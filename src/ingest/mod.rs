//! Knowledge-base ingestion: engineering PDFs into the text collection,
//! incident analysis PDFs into the summary collection plus object store.

pub mod hash;
pub mod id;
pub mod pdf;
pub mod splitter;

use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::config::IngestConfig;
use crate::core::db::Database;
use crate::core::llm::prompts::INCIDENT_SUMMARY_PROMPT;
use crate::core::llm::{ChatMessage, LlmProvider};
use crate::core::vectorstore::multi_vector::ID_KEY;
use crate::core::vectorstore::object_store::{LocalFileStore, encode_pages};
use crate::core::vectorstore::{Collection, Document, VectorStore};
use pdf::DocumentRenderer;
use splitter::RecursiveSplitter;

#[derive(Debug, Default)]
pub struct DataFiles {
    pub text_files: Vec<PathBuf>,
    pub incident_files: Vec<PathBuf>,
}

async fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Data directory {} does not exist", dir.display());
            return Ok(files);
        }
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// PDFs directly under `data_dir`, and those under its incident subdirectory.
pub async fn find_all_data_files(data_dir: &Path, incident_subdir: &str) -> Result<DataFiles> {
    Ok(DataFiles {
        text_files: list_pdfs(data_dir).await?,
        incident_files: list_pdfs(&data_dir.join(incident_subdir)).await?,
    })
}

#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub ingested: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
}

impl IngestReport {
    pub fn status(&self) -> &'static str {
        if self.errors.is_empty() {
            "Success"
        } else {
            "Failed"
        }
    }

    pub fn error(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("\n"))
        }
    }
}

enum Outcome {
    Ingested,
    Skipped,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct IngestionPipeline {
    db: Database,
    vectorstore: Arc<VectorStore>,
    docstore: Arc<LocalFileStore>,
    renderer: Arc<dyn DocumentRenderer>,
    vision: Arc<dyn LlmProvider>,
    splitter: RecursiveSplitter,
    data_dir: PathBuf,
    incident_subdir: String,
}

impl IngestionPipeline {
    pub fn new(
        config: &IngestConfig,
        db: Database,
        vectorstore: Arc<VectorStore>,
        docstore: Arc<LocalFileStore>,
        renderer: Arc<dyn DocumentRenderer>,
        vision: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            db,
            vectorstore,
            docstore,
            renderer,
            vision,
            splitter: RecursiveSplitter::new(config.chunk_size, config.chunk_overlap),
            data_dir: config.data_dir.clone(),
            incident_subdir: config.incident_subdir.clone(),
        }
    }

    /// Ingest every new file sequentially; per-file failures are collected, not fatal.
    pub async fn run(&self) -> Result<IngestReport> {
        let files = find_all_data_files(&self.data_dir, &self.incident_subdir).await?;
        info!(
            "Found {} engineering and {} incident analysis files",
            files.text_files.len(),
            files.incident_files.len()
        );

        let mut report = IngestReport::default();
        for path in &files.text_files {
            let name = file_name(path);
            match self.ingest_text_file(path, &name).await {
                Ok(Outcome::Ingested) => report.ingested.push(name),
                Ok(Outcome::Skipped) => report.skipped.push(name),
                Err(e) => {
                    error!("Failed to load PDF file {}: {:#}", name, e);
                    report.errors.push(format!("Failed to load PDF file {}", name));
                }
            }
        }
        for path in &files.incident_files {
            let name = file_name(path);
            match self.ingest_incident_file(path, &name).await {
                Ok(Outcome::Ingested) => report.ingested.push(name),
                Ok(Outcome::Skipped) => report.skipped.push(name),
                Err(e) => {
                    error!("Failed to load incident analysis file {}: {:#}", name, e);
                    report
                        .errors
                        .push(format!("Failed to load incident analysis file {}", name));
                }
            }
        }

        info!(
            "Ingestion finished: {} ingested, {} skipped, {} failed",
            report.ingested.len(),
            report.skipped.len(),
            report.errors.len()
        );
        Ok(report)
    }

    async fn ingest_text_file(&self, path: &Path, name: &str) -> Result<Outcome> {
        let file_hash = hash::file_hash(path).await?;
        if self.db.find_ingested_file_by_hash(&file_hash).await?.is_some() {
            info!("Skipping {}: already ingested", name);
            return Ok(Outcome::Skipped);
        }

        let pages = self.renderer.extract_text(path).await?;
        let mut chunks = Vec::new();
        for (page_no, text) in pages.iter().enumerate() {
            for chunk in self.splitter.split_text(text) {
                chunks.push(
                    Document::new(chunk)
                        .with_metadata("source", name)
                        .with_metadata("page", page_no as u64),
                );
            }
        }

        let stored = self.vectorstore.add_documents(Collection::Text, &chunks).await?;
        self.db.create_ingested_file(name, &file_hash).await?;
        info!("Ingested {} ({} chunks)", name, stored);
        Ok(Outcome::Ingested)
    }

    async fn ingest_incident_file(&self, path: &Path, name: &str) -> Result<Outcome> {
        let file_hash = hash::file_hash(path).await?;
        if self.db.find_ingested_file_by_hash(&file_hash).await?.is_some() {
            info!("Skipping {}: already ingested", name);
            return Ok(Outcome::Skipped);
        }

        let pages = self.renderer.render_pages(path).await?;
        if pages.is_empty() {
            bail!("no pages rendered from {}", name);
        }
        let images: Vec<String> = pages.iter().map(|p| STANDARD.encode(p)).collect();
        let messages = [
            ChatMessage::system(INCIDENT_SUMMARY_PROMPT),
            ChatMessage::human("Summarize this incident analysis document.").with_images(images),
        ];
        let summary = self.vision.generate(&messages).await?;
        if summary.trim().is_empty() {
            bail!("vision model returned an empty summary for {}", name);
        }

        let doc_id = id::gen_document_id();
        self.docstore
            .mset(&[(doc_id.clone(), encode_pages(&pages)?)])
            .await?;
        self.vectorstore
            .add_documents(
                Collection::Summary,
                &[Document::new(summary)
                    .with_metadata(ID_KEY, doc_id.as_str())
                    .with_metadata("source", name)],
            )
            .await?;
        self.db.create_ingested_file(name, &file_hash).await?;
        info!("Ingested incident analysis {} as {}", name, doc_id);
        Ok(Outcome::Ingested)
    }
}
