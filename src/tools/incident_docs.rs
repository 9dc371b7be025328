use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use super::{Tool, ToolInput, ToolName, no_relevant_information};
use crate::core::llm::prompts::INCIDENT_EXTRACTION_PROMPT;
use crate::core::llm::{ChatMessage, LlmProvider};
use crate::core::vectorstore::multi_vector::MultiVectorRetriever;
use crate::core::vectorstore::object_store::decode_pages;

/// Finds the closest incident summary, then has a vision model read the
/// original document pages.
pub struct IncidentDocsTool {
    retriever: Arc<MultiVectorRetriever>,
    vision: Arc<dyn LlmProvider>,
}

impl IncidentDocsTool {
    pub fn new(retriever: Arc<MultiVectorRetriever>, vision: Arc<dyn LlmProvider>) -> Self {
        Self { retriever, vision }
    }

    async fn extract(&self, query: &str) -> Result<Option<String>> {
        let docs = self.retriever.invoke(query).await?;
        let Some(raw) = docs.first() else {
            return Ok(None);
        };
        let pages = decode_pages(raw)?;
        if pages.is_empty() {
            bail!("stored incident document has no pages");
        }
        let messages = [
            ChatMessage::system(INCIDENT_EXTRACTION_PROMPT),
            ChatMessage::human(String::new()).with_images(pages),
        ];
        let text = self.vision.generate(&messages).await?;
        Ok(Some(text))
    }
}

/// Prefix `text` with the canonical label, replacing any label line the model wrote itself.
fn with_source_label(name: ToolName, text: &str) -> String {
    let text = text.trim_start();
    let body = match text.strip_prefix("Data source:") {
        Some(rest) => rest.split_once('\n').map_or("", |(_, body)| body),
        None => text,
    };
    format!("Data source: {}\n{}", name.source_label(), body)
}

#[async_trait]
impl Tool for IncidentDocsTool {
    fn name(&self) -> ToolName {
        ToolName::IncidentAnalysisDocuments
    }

    fn description(&self) -> &str {
        "Retrieve incident analysis documents related to the query and extract the incident \
         title, description and root cause analysis from them"
    }

    async fn invoke(&self, input: &ToolInput) -> String {
        match self.extract(&input.query).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                info!("Extracted incident information from document images");
                with_source_label(self.name(), &text)
            }
            Ok(_) => no_relevant_information(self.name()),
            Err(e) => {
                error!("Failed to retrieve information from incident documents: {:#}", e);
                no_relevant_information(self.name())
            }
        }
    }
}
