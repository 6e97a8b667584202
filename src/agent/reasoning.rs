//! Multi-turn reasoning loop (optional, off by default).
//!
//! A bounded search → reflect cycle: each iteration calls the provider
//! with the accumulated steps as context; the model may search again or
//! report through a self-reflection tool that it has enough to answer.
//! Hitting the iteration cap forces a synthesis call over everything
//! gathered so far. Confidence is descriptive metadata only — nothing
//! branches on it.

use crate::providers::{
    ChatMessage, GenerationParams, Provider, ProviderError, ToolChoice,
};
use crate::search::SearchResult;
use crate::tools::{self, Tool};
use serde_json::{Value, json};
use std::fmt::Write;

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub max_iterations: u32,
    pub model: String,
    pub params: GenerationParams,
}

impl ReasoningConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model: model.into(),
            params: GenerationParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Search,
    Analyze,
    Synthesize,
}

#[derive(Debug, Clone)]
pub struct ReasoningAction {
    pub kind: ActionKind,
    pub query: Option<String>,
    pub purpose: Option<String>,
}

/// One iteration of the loop; append-only sequence.
#[derive(Debug, Clone)]
pub struct ReasoningStep {
    pub step_number: u32,
    pub thought: String,
    pub action: Option<ReasoningAction>,
    pub observation: Option<String>,
    pub reflection: Option<String>,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug)]
pub struct ReasoningResult {
    pub steps: Vec<ReasoningStep>,
    pub final_answer: String,
    pub search_results: Vec<SearchResult>,
    pub total_iterations: u32,
    pub confidence: Confidence,
}

pub struct ReasoningEngine<'a> {
    provider: &'a dyn Provider,
    tools: &'a [Box<dyn Tool>],
    system_prompt: String,
    config: ReasoningConfig,
    steps: Vec<ReasoningStep>,
    search_results: Vec<SearchResult>,
    iteration: u32,
}

impl<'a> ReasoningEngine<'a> {
    pub fn new(
        provider: &'a dyn Provider,
        tools: &'a [Box<dyn Tool>],
        system_prompt: impl Into<String>,
        config: ReasoningConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            system_prompt: system_prompt.into(),
            config,
            steps: Vec::new(),
            search_results: Vec::new(),
            iteration: 0,
        }
    }

    /// Run the loop until the model reports sufficiency or the cap forces
    /// a synthesis.
    pub async fn reason(
        mut self,
        user_query: &str,
        history: &[ChatMessage],
    ) -> Result<ReasoningResult, ProviderError> {
        let mut final_answer = String::new();
        let mut is_complete = false;

        while !is_complete && self.iteration < self.config.max_iterations {
            self.iteration += 1;
            tracing::debug!(
                iteration = self.iteration,
                max = self.config.max_iterations,
                "reasoning iteration"
            );

            let step = self.execute_step(user_query, history).await?;
            let step_complete = step.is_complete;
            let step_observation = step.observation.clone();
            self.steps.push(step);

            if step_complete {
                is_complete = true;
                final_answer = step_observation.unwrap_or_default();
            } else if self.iteration >= self.config.max_iterations {
                tracing::debug!("iteration cap reached, forcing synthesis");
                final_answer = self.force_synthesis(user_query, history).await?;
                is_complete = true;
            }
        }

        let confidence = self.calculate_confidence();
        Ok(ReasoningResult {
            final_answer,
            search_results: self.search_results,
            total_iterations: self.iteration,
            confidence,
            steps: self.steps,
        })
    }

    async fn execute_step(
        &mut self,
        user_query: &str,
        history: &[ChatMessage],
    ) -> Result<ReasoningStep, ProviderError> {
        let mut messages: Vec<ChatMessage> =
            vec![ChatMessage::system(self.reasoning_system_prompt())];
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(user_query.to_string()));

        let context = self.reasoning_context();
        if !context.is_empty() {
            messages.push(ChatMessage::system(context));
        }

        let mut schemas = tools::tool_schemas(self.tools);
        schemas.push(reflection_tool_schema());

        let response = self
            .provider
            .chat_with_tools(
                &messages,
                &schemas,
                ToolChoice::Auto,
                &self.config.model,
                self.config.params,
            )
            .await?;

        let mut step = ReasoningStep {
            step_number: self.iteration,
            thought: response.content.clone().unwrap_or_default(),
            action: None,
            observation: None,
            reflection: None,
            is_complete: false,
        };

        let Some(call) = response.tool_calls.first() else {
            // No tool call means the model went straight to an answer.
            step.is_complete = true;
            step.observation = response.content;
            return Ok(step);
        };

        let args: Value = serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));
        match call.name.as_str() {
            "search_web" => {
                step.action = Some(ReasoningAction {
                    kind: ActionKind::Search,
                    query: args.get("query").and_then(Value::as_str).map(String::from),
                    purpose: args
                        .get("purpose")
                        .and_then(Value::as_str)
                        .map(String::from),
                });

                let result = tools::execute_tool(self.tools, &call.name, &args).await;
                self.search_results.extend(result.sources.iter().cloned());
                step.observation = Some(if result.success {
                    result.output
                } else {
                    format!(
                        "Pencarian gagal: {}",
                        result.error.as_deref().unwrap_or("tidak diketahui")
                    )
                });
            }
            "reflect_on_findings" => {
                step.reflection = args
                    .get("reflection")
                    .and_then(Value::as_str)
                    .map(String::from);
                step.is_complete = args
                    .get("is_sufficient")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if step.is_complete {
                    step.observation = args
                        .get("final_answer")
                        .and_then(Value::as_str)
                        .map(String::from);
                }
            }
            other => {
                tracing::warn!(tool = other, "reasoning loop got an unknown tool call");
                step.observation = Some(format!("Unknown tool: {other}"));
            }
        }

        Ok(step)
    }

    fn reasoning_system_prompt(&self) -> String {
        format!(
            "{}\n\n**ITERATIVE MODE**: You can search multiple times if needed.\n\n\
             If you need more info after first search, call search_web again with a refined query.\n\
             When you have enough info, call reflect_on_findings with is_sufficient=true.\n\n\
             Max iterations: {}",
            self.system_prompt, self.config.max_iterations
        )
    }

    /// Prior steps and all gathered results, rendered as model context.
    fn reasoning_context(&self) -> String {
        if self.steps.is_empty() {
            return String::new();
        }

        let mut context = String::from("**PREVIOUS REASONING STEPS:**\n\n");
        for step in &self.steps {
            let _ = writeln!(context, "Step {}:", step.step_number);
            if !step.thought.is_empty() {
                let _ = writeln!(context, "- Thought: {}", step.thought);
            }
            if let Some(action) = &step.action {
                let _ = writeln!(
                    context,
                    "- Action: search ({})",
                    action.query.as_deref().unwrap_or("")
                );
            }
            if let Some(observation) = &step.observation {
                let preview: String = observation.chars().take(200).collect();
                let _ = writeln!(context, "- Observed: {preview}...");
            }
            if let Some(reflection) = &step.reflection {
                let _ = writeln!(context, "- Reflection: {reflection}");
            }
            context.push('\n');
        }

        if !self.search_results.is_empty() {
            let _ = writeln!(
                context,
                "**ALL SEARCH RESULTS SO FAR ({} sources):**",
                self.search_results.len()
            );
            context.push_str(&crate::search::format_search_results(&self.search_results));
        }

        context
    }

    async fn force_synthesis(
        &self,
        user_query: &str,
        history: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        let synthesis_prompt = format!(
            "You've gathered information through {} reasoning steps. Now SYNTHESIZE everything \
             you learned and provide a complete answer to: \"{user_query}\"\n\n\
             Use all search results and observations from your previous steps.",
            self.iteration
        );

        let mut messages: Vec<ChatMessage> = vec![ChatMessage::system(self.system_prompt.clone())];
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(user_query.to_string()));
        messages.push(ChatMessage::system(self.reasoning_context()));
        messages.push(ChatMessage::user(synthesis_prompt));

        let response = self
            .provider
            .chat_with_tools(
                &messages,
                &[],
                ToolChoice::None,
                &self.config.model,
                self.config.params,
            )
            .await?;
        Ok(response.content.unwrap_or_default())
    }

    fn calculate_confidence(&self) -> Confidence {
        let has_search = self
            .steps
            .iter()
            .any(|s| s.action.as_ref().is_some_and(|a| a.kind == ActionKind::Search));
        let has_reflection = self.steps.iter().any(|s| s.reflection.is_some());
        let completed_normally = self.iteration < self.config.max_iterations;

        if has_search && has_reflection && completed_normally {
            Confidence::High
        } else if has_search && completed_normally {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

fn reflection_tool_schema() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": "reflect_on_findings",
            "description": "Evaluate if you have enough information to answer completely. Use this to check if you need more iterations or can provide the final answer.",
            "parameters": {
                "type": "object",
                "properties": {
                    "reflection": {
                        "type": "string",
                        "description": "Your self-evaluation: what do you know? what is missing?"
                    },
                    "is_sufficient": {
                        "type": "boolean",
                        "description": "true if you have enough info for a complete answer"
                    },
                    "final_answer": {
                        "type": "string",
                        "description": "If is_sufficient=true, the complete final answer"
                    }
                },
                "required": ["reflection", "is_sufficient"]
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatResponse, NativeToolCall};
    use crate::search::SearchClient;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// Provider that replays a fixed script of responses.
    #[derive(Debug)]
    struct ScriptedProvider {
        script: Mutex<Vec<ChatResponse>>,
    }

    impl ScriptedProvider {
        fn new(mut responses: Vec<ChatResponse>) -> Self {
            responses.reverse();
            Self {
                script: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn chat_with_tools(
            &self,
            _messages: &[ChatMessage],
            _tools: &[Value],
            _tool_choice: ToolChoice,
            _model: &str,
            _params: GenerationParams,
        ) -> Result<ChatResponse, ProviderError> {
            Ok(self
                .script
                .lock()
                .unwrap()
                .pop()
                .expect("script exhausted"))
        }
    }

    fn text(content: &str) -> ChatResponse {
        ChatResponse {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: vec![NativeToolCall {
                id: "call_1".into(),
                name: name.into(),
                arguments: arguments.into(),
            }],
        }
    }

    fn registry() -> Vec<Box<dyn Tool>> {
        // Unreachable relay: searches fail soft, which is all these tests need.
        tools::default_tools(Arc::new(SearchClient::new("http://127.0.0.1:1")), 5)
    }

    fn engine<'a>(
        provider: &'a ScriptedProvider,
        tools: &'a [Box<dyn Tool>],
    ) -> ReasoningEngine<'a> {
        ReasoningEngine::new(provider, tools, "prompt", ReasoningConfig::new("model"))
    }

    #[tokio::test]
    async fn immediate_answer_completes_in_one_iteration() {
        let provider = ScriptedProvider::new(vec![text("Jawaban langsung.")]);
        let tools = registry();

        let result = engine(&provider, &tools).reason("q", &[]).await.unwrap();
        assert_eq!(result.total_iterations, 1);
        assert_eq!(result.final_answer, "Jawaban langsung.");
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.steps[0].is_complete);
    }

    #[tokio::test]
    async fn search_then_sufficient_reflection_is_high_confidence() {
        let provider = ScriptedProvider::new(vec![
            tool_call("search_web", r#"{"query":"x","purpose":"y"}"#),
            tool_call(
                "reflect_on_findings",
                r#"{"reflection":"cukup","is_sufficient":true,"final_answer":"Hasil akhir."}"#,
            ),
        ]);
        let tools = registry();

        let result = engine(&provider, &tools).reason("q", &[]).await.unwrap();
        assert_eq!(result.total_iterations, 2);
        assert_eq!(result.final_answer, "Hasil akhir.");
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.steps[0].action.is_some());
        assert!(result.steps[1].reflection.is_some());
    }

    #[tokio::test]
    async fn iteration_cap_forces_synthesis() {
        let provider = ScriptedProvider::new(vec![
            tool_call("search_web", r#"{"query":"a","purpose":"p"}"#),
            tool_call("search_web", r#"{"query":"b","purpose":"p"}"#),
            tool_call("search_web", r#"{"query":"c","purpose":"p"}"#),
            text("Sintesis dari semua langkah."),
        ]);
        let tools = registry();

        let result = engine(&provider, &tools).reason("q", &[]).await.unwrap();
        assert_eq!(result.total_iterations, 3);
        assert_eq!(result.final_answer, "Sintesis dari semua langkah.");
        // Cap reached: never better than low, regardless of searches.
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn insufficient_reflection_keeps_looping() {
        let provider = ScriptedProvider::new(vec![
            tool_call(
                "reflect_on_findings",
                r#"{"reflection":"belum cukup","is_sufficient":false}"#,
            ),
            text("Jawaban setelah refleksi."),
        ]);
        let tools = registry();

        let result = engine(&provider, &tools).reason("q", &[]).await.unwrap();
        assert_eq!(result.total_iterations, 2);
        assert_eq!(result.final_answer, "Jawaban setelah refleksi.");
        assert!(!result.steps[0].is_complete);
    }
}
