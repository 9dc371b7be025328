pub mod engineering_docs;
pub mod final_answer;
pub mod incident_docs;
pub mod stubs;

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::config::RetrievalConfig;
use crate::core::llm::{LlmProvider, ToolSpec};
use crate::core::vectorstore::VectorStore;
use crate::core::vectorstore::multi_vector::MultiVectorRetriever;

/// The closed set of tools the router can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    EngineeringDocuments,
    IncidentAnalysisDocuments,
    HistoricalIncidents,
    CodeChangeHistory,
    MonitoringData,
    FinalAnswer,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::EngineeringDocuments,
        ToolName::IncidentAnalysisDocuments,
        ToolName::HistoricalIncidents,
        ToolName::CodeChangeHistory,
        ToolName::MonitoringData,
        ToolName::FinalAnswer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::EngineeringDocuments => "query_relevant_engineering_documents",
            ToolName::IncidentAnalysisDocuments => "query_relevant_incident_analysis_documents",
            ToolName::HistoricalIncidents => "query_relevant_historical_incidents",
            ToolName::CodeChangeHistory => "query_relevant_code_change_history",
            ToolName::MonitoringData => "query_relevant_application_monitoring_data",
            ToolName::FinalAnswer => "final_answer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn is_terminal(self) -> bool {
        self == ToolName::FinalAnswer
    }

    /// Label that opens every output of this tool.
    pub fn source_label(self) -> &'static str {
        match self {
            ToolName::EngineeringDocuments => "engineering documents",
            ToolName::IncidentAnalysisDocuments => "incident analysis documents",
            ToolName::HistoricalIncidents => "historical incident records",
            ToolName::CodeChangeHistory => "code change history",
            ToolName::MonitoringData => "application monitoring data",
            ToolName::FinalAnswer => "final answer",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn no_relevant_information(tool: ToolName) -> String {
    format!(
        "Data source: {}\nResult: No relevant information",
        tool.source_label()
    )
}

/// Arguments of a tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInput {
    pub query: String,
    pub context: Option<String>,
}

impl ToolInput {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: None,
        }
    }

    /// Decode model-supplied arguments; a missing `query` falls back to `default_query`.
    pub fn from_args(args: &Value, default_query: &str) -> Self {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(default_query)
            .to_string();
        let context = args
            .get("context")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self { query, context }
    }

    pub fn to_args(&self) -> Value {
        match &self.context {
            Some(context) => json!({ "query": self.query, "context": context }),
            None => json!({ "query": self.query }),
        }
    }
}

pub(crate) fn query_parameters(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": description }
        },
        "required": ["query"]
    })
}

/// A data source callable by the router. Implementations never fail: errors
/// degrade to a "no relevant information" result.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    fn description(&self) -> &str;

    fn parameters(&self) -> Value {
        query_parameters("The user's question, rephrased for this data source if useful")
    }

    async fn invoke(&self, input: &ToolInput) -> String;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every retrieval tool plus the terminal answer tool.
    pub fn standard(
        llm: Arc<dyn LlmProvider>,
        vision: Arc<dyn LlmProvider>,
        vectorstore: Arc<VectorStore>,
        incident_retriever: Arc<MultiVectorRetriever>,
        retrieval: &RetrievalConfig,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(engineering_docs::EngineeringDocsTool::new(
            llm.clone(),
            vectorstore,
            retrieval.per_query_k,
            retrieval.max_results,
        )));
        registry.register(Arc::new(incident_docs::IncidentDocsTool::new(
            incident_retriever,
            vision,
        )));
        for stub in stubs::PlaceholderTool::all() {
            registry.register(Arc::new(stub));
        }
        registry.register(Arc::new(final_answer::FinalAnswerTool::new(llm)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: ToolName) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name).cloned()
    }

    /// Declarations for the given tools, in `ToolName::ALL` order.
    pub fn specs(&self, names: &[ToolName]) -> Vec<ToolSpec> {
        ToolName::ALL
            .into_iter()
            .filter(|n| names.contains(n))
            .filter_map(|n| self.tools.get(&n))
            .map(|tool| ToolSpec {
                name: tool.name().as_str().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }
}
