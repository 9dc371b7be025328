use async_trait::async_trait;

use super::{Tool, ToolInput, ToolName, no_relevant_information};

/// A data source that is not wired up yet; it only completes the router's choices.
pub struct PlaceholderTool {
    name: ToolName,
    description: &'static str,
}

impl PlaceholderTool {
    pub fn all() -> [PlaceholderTool; 3] {
        [
            PlaceholderTool {
                name: ToolName::HistoricalIncidents,
                description: "Find historical incidents related to the query in the incident records database",
            },
            PlaceholderTool {
                name: ToolName::CodeChangeHistory,
                description: "Find code change history related to the query from the source repository",
            },
            PlaceholderTool {
                name: ToolName::MonitoringData,
                description: "Find application monitoring data related to the query from the monitoring platform",
            },
        ]
    }
}

#[async_trait]
impl Tool for PlaceholderTool {
    fn name(&self) -> ToolName {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn invoke(&self, _input: &ToolInput) -> String {
        no_relevant_information(self.name)
    }
}
