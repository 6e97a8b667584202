pub mod gating;
pub mod recovery;
pub mod traits;
pub mod web_search;

pub use gating::should_disable_tools;
pub use recovery::{
    ToolCall, ToolCallSource, contains_xml_tool_syntax, extract_tool_calls,
    try_parse_xml_style_tool_call,
};
pub use traits::{Tool, ToolResult, ToolSpec};
pub use web_search::WebSearchTool;

use crate::search::SearchClient;
use std::sync::Arc;

/// Create the default tool registry: exactly one callable tool.
pub fn default_tools(search: Arc<SearchClient>, search_count: usize) -> Vec<Box<dyn Tool>> {
    vec![Box::new(WebSearchTool::new(search, search_count))]
}

/// Tool schemas in the chat-completions `function` wrapper, as sent on
/// every provider call.
pub fn tool_schemas(tools: &[Box<dyn Tool>]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                }
            })
        })
        .collect()
}

/// Dispatch one tool invocation by name. Unknown names and execution
/// errors come back as failed results, never as `Err` — the orchestrator
/// must always be able to continue the turn.
pub async fn execute_tool(
    tools: &[Box<dyn Tool>],
    name: &str,
    args: &serde_json::Value,
) -> ToolResult {
    let Some(tool) = tools.iter().find(|t| t.name() == name) else {
        return ToolResult::fail(format!("Unknown tool: {name}"));
    };

    match tool.execute(args.clone()).await {
        Ok(result) => result,
        Err(e) => ToolResult::fail(format!("Tool execution error: {e}")),
    }
}
