use super::traits::{Tool, ToolResult};
use crate::search::{SearchClient, format_search_results};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// The assistant's single callable tool: web search through the relay.
/// `purpose` is required alongside `query` — making the model state why it
/// searches noticeably reduces reflexive tool use.
pub struct WebSearchTool {
    search: Arc<SearchClient>,
    default_count: usize,
}

impl WebSearchTool {
    pub fn new(search: Arc<SearchClient>, default_count: usize) -> Self {
        Self {
            search,
            default_count,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search web for information about technologies, trends, or best practices."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query in English"
                },
                "purpose": {
                    "type": "string",
                    "description": "Why you need this search"
                }
            },
            "required": ["query", "purpose"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let Some(query) = args.get("query").and_then(serde_json::Value::as_str) else {
            return Ok(ToolResult::fail("Missing 'query' parameter"));
        };
        if query.trim().is_empty() {
            return Ok(ToolResult::fail("Search query cannot be empty"));
        }

        let purpose = args
            .get("purpose")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("(not stated)");
        tracing::info!(query, purpose, "executing search_web");

        let results = self.search.search(query, self.default_count).await;
        if results.is_empty() {
            return Ok(ToolResult::fail("No results found"));
        }

        let mut result = ToolResult::ok(format_search_results(&results));
        result.sources = results;
        Ok(result)
    }
}
