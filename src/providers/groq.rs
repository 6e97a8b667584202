//! Groq chat-completions provider.
//!
//! Groq speaks the OpenAI-compatible `/v1/chat/completions` format, so the
//! same implementation serves any compatible endpoint via a custom base
//! URL. The one Groq-specific concern handled here is the `tool_use_failed`
//! error body, which carries the model's malformed generation for local
//! recovery.

use crate::providers::traits::{
    ChatMessage, ChatResponse, GenerationParams, NativeToolCall, Provider, ProviderError,
    ToolChoice,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";

#[derive(Debug)]
pub struct GroqProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl GroqProvider {
    pub fn new(api_key: Option<&str>) -> Self {
        Self::with_base_url("Groq", DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [serde_json::Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    failed_generation: Option<String>,
}

fn map_error(provider: &str, status: u16, body: &str) -> ProviderError {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(detail) = parsed.error {
            if detail.code.as_deref() == Some("tool_use_failed") {
                return ProviderError::ToolUseFailed {
                    failed_generation: detail.failed_generation,
                };
            }
            if status == 429 {
                return ProviderError::RateLimited;
            }
            return ProviderError::Api {
                provider: provider.to_string(),
                status,
                message: detail.message.unwrap_or_else(|| body.to_string()),
            };
        }
    }
    if status == 429 {
        return ProviderError::RateLimited;
    }
    ProviderError::Api {
        provider: provider.to_string(),
        status,
        message: body.to_string(),
    }
}

#[async_trait]
impl Provider for GroqProvider {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
        tool_choice: ToolChoice,
        model: &str,
        params: GenerationParams,
    ) -> Result<ChatResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::MissingApiKey(self.name.clone()))?;

        let request = ChatRequest {
            model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice: if tools.is_empty() {
                None
            } else {
                Some(tool_choice.as_str())
            },
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error(&self.name, status.as_u16(), &body));
        }

        let parsed: ApiChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyResponse(self.name.clone()))?;

        Ok(ChatResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(|tc| NativeToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect(),
        })
    }
}
