use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{error, info};

use super::{Tool, ToolInput, ToolName, no_relevant_information};
use crate::core::llm::prompts::{QUERY_TRANSLATION_PROMPT, render};
use crate::core::llm::{ChatMessage, LlmProvider};
use crate::core::vectorstore::{Collection, VectorStore};

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+").expect("valid regex"));

/// Multi-query retrieval over the engineering document collection.
pub struct EngineeringDocsTool {
    llm: Arc<dyn LlmProvider>,
    vectorstore: Arc<VectorStore>,
    per_query_k: usize,
    max_results: usize,
}

/// Split the model's alternative queries, one per line, dropping list markers.
pub fn parse_queries(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Best-scored distinct passages first, at most `cap` of them.
pub fn merge_ranked(mut hits: Vec<(f32, String)>, cap: usize) -> Vec<String> {
    hits.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for (_, content) in hits {
        if results.len() >= cap {
            break;
        }
        if seen.insert(content.clone()) {
            results.push(content);
        }
    }
    results
}

impl EngineeringDocsTool {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        vectorstore: Arc<VectorStore>,
        per_query_k: usize,
        max_results: usize,
    ) -> Self {
        Self {
            llm,
            vectorstore,
            per_query_k,
            max_results,
        }
    }

    async fn translate_query(&self, query: &str) -> Vec<String> {
        let prompt = render(QUERY_TRANSLATION_PROMPT, &[("query", query)]);
        match self.llm.generate(&[ChatMessage::human(prompt)]).await {
            Ok(raw) => {
                let queries = parse_queries(&raw);
                if queries.is_empty() {
                    vec![query.to_string()]
                } else {
                    queries
                }
            }
            Err(e) => {
                error!("Failed to get related queries from LLM: {:#}", e);
                vec![query.to_string()]
            }
        }
    }

    async fn retrieve(&self, queries: &[String]) -> Result<Vec<String>> {
        let mut hits = Vec::new();
        for query in queries {
            let results = self
                .vectorstore
                .similarity_search_with_score(Collection::Text, query, self.per_query_k)
                .await?;
            hits.extend(
                results
                    .into_iter()
                    .map(|(doc, score)| (score, doc.page_content)),
            );
        }
        Ok(merge_ranked(hits, self.max_results))
    }
}

#[async_trait]
impl Tool for EngineeringDocsTool {
    fn name(&self) -> ToolName {
        ToolName::EngineeringDocuments
    }

    fn description(&self) -> &str {
        "Search engineering guidelines, runbooks and technical documents related to the query"
    }

    async fn invoke(&self, input: &ToolInput) -> String {
        let queries = self.translate_query(&input.query).await;
        let passages = match self.retrieve(&queries).await {
            Ok(passages) => passages,
            Err(e) => {
                error!(
                    "Failed to retrieve results from vector store for queries {:?}: {:#}",
                    queries, e
                );
                return no_relevant_information(self.name());
            }
        };
        if passages.is_empty() {
            return no_relevant_information(self.name());
        }
        info!(
            "Retrieved {} engineering passages for {} queries",
            passages.len(),
            queries.len()
        );
        format!(
            "Data source: {}\nRelated information:\n{}\n",
            self.name().source_label(),
            passages.join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::testing::{HashEmbedder, ScriptedLlm};
    use crate::core::vectorstore::Document;
    use std::sync::atomic::Ordering;

    #[test]
    fn queries_are_split_per_line_without_numbering() {
        let raw = "1. trends report outage cause\n\n2) trends 500 errors\n- trends service down\nplain";
        assert_eq!(
            parse_queries(raw),
            vec![
                "trends report outage cause",
                "trends 500 errors",
                "trends service down",
                "plain"
            ]
        );
    }

    #[test]
    fn merge_dedups_ranks_and_caps() {
        let mut hits = Vec::new();
        for i in 0..30 {
            hits.push((i as f32 / 100.0, format!("passage {}", i % 15)));
        }
        let merged = merge_ranked(hits, 10);
        assert_eq!(merged.len(), 10);
        let unique: HashSet<_> = merged.iter().collect();
        assert_eq!(unique.len(), merged.len());
        // passage 14 carries the top score (0.29)
        assert_eq!(merged[0], "passage 14");
    }

    async fn seeded_store(texts: &[&str]) -> Arc<VectorStore> {
        let store =
            Arc::new(VectorStore::open_in_memory(Arc::new(HashEmbedder::new(32))).expect("store"));
        let docs: Vec<Document> = texts.iter().map(|t| Document::new(*t)).collect();
        store
            .add_documents(Collection::Text, &docs)
            .await
            .expect("insert");
        store
    }

    #[tokio::test]
    async fn overlapping_queries_never_repeat_a_passage() {
        let store = seeded_store(&[
            "restart the trends service pod",
            "trends report dashboard latency",
            "kafka consumer lag runbook",
        ])
        .await;
        let llm = Arc::new(ScriptedLlm::answering("trends service\ntrends report\ntrends"));
        let tool = EngineeringDocsTool::new(llm.clone(), store, 3, 10);

        let out = tool.invoke(&ToolInput::query("trends outage")).await;
        assert!(out.starts_with("Data source: engineering documents"));
        for passage in [
            "restart the trends service pod",
            "trends report dashboard latency",
            "kafka consumer lag runbook",
        ] {
            assert_eq!(out.matches(passage).count(), 1, "{}", passage);
        }
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn translation_failure_falls_back_to_original_query() {
        let store = seeded_store(&["disk pressure on node"]).await;
        let tool = EngineeringDocsTool::new(Arc::new(ScriptedLlm::failing()), store, 3, 10);
        let out = tool.invoke(&ToolInput::query("disk pressure")).await;
        assert!(out.contains("disk pressure on node"));
    }

    #[tokio::test]
    async fn empty_collection_reports_no_information() {
        let store =
            Arc::new(VectorStore::open_in_memory(Arc::new(HashEmbedder::new(32))).expect("store"));
        let tool = EngineeringDocsTool::new(Arc::new(ScriptedLlm::answering("q")), store, 3, 10);
        assert_eq!(
            tool.invoke(&ToolInput::query("anything")).await,
            no_relevant_information(ToolName::EngineeringDocuments)
        );
    }
}
