//! The retrieval orchestration loop.
//!
//! `processor` asks the model for the next tool, `route` picks the node to run
//! from the last step, and the tool node records the tool's output. Every
//! retrieval tool leads back to `processor`; `final_answer` ends the run.

pub mod scratchpad;

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::llm::prompts::ROUTER_SYSTEM_PROMPT;
use crate::core::llm::{ChatMessage, LlmProvider};
use crate::tools::{ToolInput, ToolName, ToolRegistry};
use scratchpad::create_scratchpad;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// A tool choice. `tool` is kept as the model spelled it, so unknown names
/// surface at dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub tool: String,
    pub input: ToolInput,
}

impl Action {
    pub fn new(tool: impl Into<String>, input: ToolInput) -> Self {
        Self {
            tool: tool.into(),
            input,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Proposed(Action),
    Completed { action: Action, output: String },
}

#[cfg(test)]
impl Step {
    fn action(&self) -> &Action {
        match self {
            Step::Proposed(action) => action,
            Step::Completed { action, .. } => action,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentState {
    pub query: String,
    pub chat_history: Vec<ChatMessage>,
    /// Append-only.
    pub steps: Vec<Step>,
}

impl AgentState {
    pub fn new(query: impl Into<String>, chat_history: Vec<ChatMessage>) -> Self {
        Self {
            query: query.into(),
            chat_history,
            steps: Vec::new(),
        }
    }

    /// Output of the last step once the run has finished.
    pub fn final_answer(&self) -> Option<&str> {
        match self.steps.last() {
            Some(Step::Completed { output, .. }) => Some(output),
            _ => None,
        }
    }

    fn completed_tools(&self) -> HashSet<ToolName> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Completed { action, .. } => ToolName::from_name(&action.tool),
                Step::Proposed(_) => None,
            })
            .collect()
    }

    /// Outputs of every completed retrieval step, in order.
    fn gathered_context(&self) -> String {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Completed { action, output } if action.tool != ToolName::FinalAnswer.as_str() => {
                    Some(output.as_str())
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Name of the node to run next: the tool of the pending proposal, or the
/// terminal tool when there is none.
pub fn route(state: &AgentState) -> String {
    match state.steps.last() {
        Some(Step::Proposed(action)) => action.tool.clone(),
        Some(Step::Completed { .. }) => {
            warn!("Invalid route state: last step has no pending tool, finishing");
            ToolName::FinalAnswer.as_str().to_string()
        }
        None => {
            warn!("Invalid route state: no steps recorded, finishing");
            ToolName::FinalAnswer.as_str().to_string()
        }
    }
}

pub struct RagGraph {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
}

impl RagGraph {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self { llm, tools }
    }

    /// Run one query to completion. Only dispatch to an unregistered tool fails.
    pub async fn invoke(
        &self,
        query: &str,
        chat_history: Vec<ChatMessage>,
    ) -> Result<AgentState, GraphError> {
        let mut state = AgentState::new(query, chat_history);
        loop {
            self.run_processor(&mut state).await;
            let next = route(&state);
            if self.run_tool(&mut state, &next).await?.is_terminal() {
                break;
            }
        }
        Ok(state)
    }

    async fn run_processor(&self, state: &mut AgentState) {
        let used = state.completed_tools();
        let offered: Vec<ToolName> = ToolName::ALL
            .into_iter()
            .filter(|t| t.is_terminal() || !used.contains(t))
            .collect();

        let mut messages = vec![ChatMessage::system(ROUTER_SYSTEM_PROMPT)];
        messages.extend(state.chat_history.iter().cloned());
        messages.push(ChatMessage::human(state.query.clone()));
        messages.push(ChatMessage::ai(format!(
            "scratchpad: {}",
            create_scratchpad(&state.steps)
        )));

        let calls = match self
            .llm
            .generate_tool_calls(&messages, &self.tools.specs(&offered))
            .await
        {
            Ok(calls) => calls,
            Err(e) => {
                error!("Router failed to choose a tool: {:#}", e);
                return;
            }
        };
        let Some(call) = calls.into_iter().next() else {
            warn!("Router response contained no tool call");
            return;
        };

        let mut tool = call.name;
        if let Some(name) = ToolName::from_name(&tool)
            && !name.is_terminal()
            && used.contains(&name)
        {
            warn!("Tool {} was already used, finishing instead", name);
            tool = ToolName::FinalAnswer.as_str().to_string();
        }
        let input = ToolInput::from_args(&call.args, &state.query);
        info!("Next tool: {}, tool input: {}", tool, input.to_args());
        state.steps.push(Step::Proposed(Action::new(tool, input)));
    }

    async fn run_tool(&self, state: &mut AgentState, node: &str) -> Result<ToolName, GraphError> {
        let name =
            ToolName::from_name(node).ok_or_else(|| GraphError::UnknownTool(node.to_string()))?;
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| GraphError::UnknownTool(node.to_string()))?;

        let mut action = match state.steps.last() {
            Some(Step::Proposed(action)) if action.tool == node => action.clone(),
            _ => Action::new(node, ToolInput::query(state.query.clone())),
        };
        if name.is_terminal() {
            let gathered = state.gathered_context();
            action.input = ToolInput {
                query: state.query.clone(),
                context: if gathered.is_empty() {
                    action.input.context.take()
                } else {
                    Some(gathered)
                },
            };
        }

        let output = tool.invoke(&action.input).await;
        info!("Tool {} finished ({} chars)", name, output.len());
        state.steps.push(Step::Completed { action, output });
        Ok(name)
    }

    /// Mermaid flowchart of the node topology.
    pub fn to_mermaid() -> String {
        let mut out = String::from("flowchart TD\n");
        out.push_str("    __start__([start]) --> processor\n");
        for tool in ToolName::ALL {
            out.push_str(&format!("    processor -.-> {}\n", tool));
        }
        for tool in ToolName::ALL.into_iter().filter(|t| !t.is_terminal()) {
            out.push_str(&format!("    {} --> processor\n", tool));
        }
        out.push_str(&format!("    {} --> __end__([end])\n", ToolName::FinalAnswer));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ToolCall;
    use crate::core::llm::testing::ScriptedLlm;
    use crate::tools::stubs::PlaceholderTool;
    use crate::tools::{final_answer::FinalAnswerTool, no_relevant_information};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn graph(llm: Arc<ScriptedLlm>) -> RagGraph {
        let mut registry = ToolRegistry::new();
        for stub in PlaceholderTool::all() {
            registry.register(Arc::new(stub));
        }
        registry.register(Arc::new(FinalAnswerTool::new(llm.clone())));
        RagGraph::new(llm, Arc::new(registry))
    }

    #[test]
    fn route_falls_back_to_final_answer_on_malformed_state() {
        let mut state = AgentState::new("q", Vec::new());
        assert_eq!(route(&state), "final_answer");

        state.steps.push(Step::Completed {
            action: Action::new("query_relevant_code_change_history", ToolInput::query("q")),
            output: "x".into(),
        });
        assert_eq!(route(&state), "final_answer");

        state.steps.push(Step::Proposed(Action::new(
            "query_relevant_historical_incidents",
            ToolInput::query("q"),
        )));
        assert_eq!(route(&state), "query_relevant_historical_incidents");
    }

    #[tokio::test]
    async fn unknown_tool_is_fatal() {
        let llm = Arc::new(ScriptedLlm::answering("unused"));
        llm.push_call("query_relevant_weather", json!({ "query": "q" }));
        let err = graph(llm.clone()).invoke("q", Vec::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::UnknownTool(ref t) if t == "query_relevant_weather"));
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registered_name_without_implementation_is_fatal() {
        let llm = Arc::new(ScriptedLlm::answering("unused"));
        llm.push_call("query_relevant_engineering_documents", json!({ "query": "q" }));
        let err = graph(llm).invoke("q", Vec::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn no_hits_anywhere_still_produces_an_answer() {
        let llm = Arc::new(ScriptedLlm::new(|messages| {
            let prompt = &messages[0].content;
            assert!(prompt.contains("Data source: historical incident records"));
            assert!(prompt.contains("Data source: code change history"));
            Ok("No relevant information was found for this query.".to_string())
        }));
        llm.push_call("query_relevant_historical_incidents", json!({ "query": "trends" }));
        llm.push_call("query_relevant_code_change_history", json!({ "query": "trends" }));
        llm.push_call("final_answer", json!({ "query": "trends", "context": "" }));

        let state = graph(llm.clone())
            .invoke("What caused the trends report outage?", Vec::new())
            .await
            .expect("graph runs");

        assert_eq!(
            state.final_answer(),
            Some("No relevant information was found for this query.")
        );
        // three proposals and three completions
        assert_eq!(state.steps.len(), 6);
        assert_eq!(
            state.steps[1],
            Step::Completed {
                action: Action::new(
                    "query_relevant_historical_incidents",
                    ToolInput::query("trends")
                ),
                output: no_relevant_information(ToolName::HistoricalIncidents),
            }
        );
        let last = state.steps.last().expect("last step");
        assert_eq!(last.action().tool, "final_answer");
        assert_eq!(last.action().input.query, "What caused the trends report outage?");
    }

    #[tokio::test]
    async fn final_answer_is_a_fixed_point() {
        let llm = Arc::new(ScriptedLlm::answering("done"));
        llm.push_call("final_answer", json!({ "query": "q", "context": "from model" }));
        llm.push_call("query_relevant_code_change_history", json!({ "query": "q" }));

        let state = graph(llm.clone()).invoke("q", Vec::new()).await.expect("runs");
        assert_eq!(state.steps.len(), 2);
        assert_eq!(llm.tool_call_requests.load(Ordering::SeqCst), 1);
        assert_eq!(
            state.steps[1].action().input.context.as_deref(),
            Some("from model")
        );
    }

    #[tokio::test]
    async fn used_tools_are_not_offered_and_repeats_finish() {
        let llm = Arc::new(ScriptedLlm::answering("answer"));
        llm.push_call("query_relevant_code_change_history", json!({ "query": "q" }));
        llm.push_call("query_relevant_code_change_history", json!({ "query": "q" }));

        let state = graph(llm.clone()).invoke("q", Vec::new()).await.expect("runs");
        assert_eq!(state.final_answer(), Some("answer"));
        assert_eq!(state.steps[2].action().tool, "final_answer");

        let offered = llm.offered_tools.lock().expect("lock").clone();
        assert_eq!(offered.len(), 2);
        assert!(offered[0].contains(&"query_relevant_code_change_history".to_string()));
        assert!(!offered[1].contains(&"query_relevant_code_change_history".to_string()));
        assert!(offered[1].contains(&"final_answer".to_string()));
    }

    #[tokio::test]
    async fn router_failure_or_silence_goes_straight_to_final_answer() {
        let llm = Arc::new(ScriptedLlm::answering("fallback answer"));
        llm.push_turn(Vec::<ToolCall>::new());
        let state = graph(llm).invoke("q", Vec::new()).await.expect("runs");
        assert_eq!(state.steps.len(), 1);
        assert_eq!(state.final_answer(), Some("fallback answer"));
    }

    #[test]
    fn mermaid_lists_every_edge() {
        let chart = RagGraph::to_mermaid();
        assert!(chart.starts_with("flowchart TD\n"));
        assert_eq!(chart.matches("processor -.-> ").count(), 6);
        assert_eq!(chart.matches(" --> processor").count(), 6);
        assert!(chart.contains("final_answer --> __end__"));
        assert!(!chart.contains("final_answer --> processor"));
    }
}
