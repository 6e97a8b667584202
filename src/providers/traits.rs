use async_trait::async_trait;
use serde::Serialize;

/// Wire-shape message for a chat-completions request. The optional fields
/// exist so a follow-up call can replay the assistant's structured
/// tool-call message and attach a `tool` result to it by id.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<AssistantToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// The assistant message that carried structured tool calls, replayed
    /// verbatim so the provider can associate the results.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<AssistantToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// A structured tool-result message for one call id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionPayload,
}

impl AssistantToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: String) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionPayload {
                name: name.into(),
                arguments,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionPayload {
    pub name: String,
    pub arguments: String,
}

/// Whether the model may choose to call tools on this request. The tool
/// schema itself is always attached for response-shape stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
}

impl ToolChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::None => "none",
        }
    }
}

/// A structured tool call exactly as the provider returned it; arguments
/// stay an unparsed JSON string until normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<NativeToolCall>,
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 800,
            top_p: 0.95,
        }
    }
}

/// The named failure modes the orchestrator branches on. Everything else
/// would be string matching on provider prose, which breaks silently.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The model attempted a tool invocation the provider could not parse;
    /// `failed_generation` carries the offending text when present.
    #[error("provider rejected a malformed tool invocation")]
    ToolUseFailed { failed_generation: Option<String> },

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0} API key not set. Set GROQ_API_KEY or configure api_key in config.toml.")]
    MissingApiKey(String),

    #[error("no response from {0}")]
    EmptyResponse(String),
}

#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
        tool_choice: ToolChoice,
        model: &str,
        params: GenerationParams,
    ) -> Result<ChatResponse, ProviderError>;
}
