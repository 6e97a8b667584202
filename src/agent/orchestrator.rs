//! Single-turn reasoning orchestrator.
//!
//! Drives one user turn to a terminal state: mode detection, primary
//! provider call, tool-use-failure recovery, one repair retry for textual
//! tool-call syntax, tool execution with incremental status, and the final
//! follow-up call. Every entered turn ends `Answered` or `Errored` — there
//! is no state that leaves the placeholder bubble empty.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::prompt::SystemPromptBuilder;
use crate::context;
use crate::grounding;
use crate::memory::{self, SummarizeOptions, TranscriptMessage};
use crate::observability::{TurnCounters, TurnEvent};
use crate::profile::ProfileRecord;
use crate::providers::{
    AssistantToolCall, ChatMessage, ChatResponse, GenerationParams, Provider, ProviderError,
    ToolChoice,
};
use crate::search::SearchResult;
use crate::session::{ChatRole, MessagePhase, SearchMetadata, SearchStatus, Session};
use crate::tools::{self, Tool, ToolCall, ToolCallSource, ToolResult};

// User-facing terminal strings (Indonesian, like the rest of the product).
pub const MSG_TRANSPORT: &str = "Error: Neural link tidak stabil. Silakan coba lagi nanti.";
pub const MSG_RATE_LIMIT: &str =
    "Sistem sedang sibuk (rate limit). Silakan coba lagi sebentar lagi ya.";
pub const MSG_API: &str = "Terjadi kendala pada layanan AI. Silakan coba lagi nanti.";
pub const MSG_EMPTY: &str = "Koneksi terputus. Silakan coba lagi.";
pub const MSG_NO_KEY: &str =
    "API key belum dikonfigurasi. Isi api_key di config.toml atau set GROQ_API_KEY.";

/// Header for inlined results on the recovered path. The recovered call is
/// never echoed back as a structured tool message — providers reject
/// ill-formed tool-call echoes.
const INLINE_RESULTS_HEADER: &str = "HASIL PENCARIAN WEB (search_web)";

/// Sub-budget for assistant history entries in the prompt (tokens).
const HISTORY_REPLY_BUDGET: usize = 150;

/// Default pause between search status stages, for perceived
/// responsiveness in the UI. Tests run with zero.
pub const DEFAULT_STATUS_DELAY: Duration = Duration::from_millis(450);

pub struct TurnConfig<'a> {
    pub provider: &'a dyn Provider,
    pub tools: &'a [Box<dyn Tool>],
    pub profile: &'a ProfileRecord,
    pub model: &'a str,
    pub params: GenerationParams,
    pub memory_options: SummarizeOptions,
    pub context_max_tokens: usize,
    pub status_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Answered,
    Errored,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub content: String,
    pub sources: Vec<SearchResult>,
    pub tool_calls: u32,
    pub duration_ms: u64,
}

/// Passive subscriber to turn progress. All methods default to no-ops.
#[async_trait]
pub trait TurnSink: Send {
    async fn on_phase(&mut self, _phase: MessagePhase) {}
    async fn on_search_status(
        &mut self,
        _query: &str,
        _status: SearchStatus,
        _result_count: usize,
    ) {
    }
}

fn error_terminal(err: &ProviderError, counters: &mut TurnCounters) -> String {
    match err {
        ProviderError::RateLimited => {
            counters.record(TurnEvent::RateLimited);
            MSG_RATE_LIMIT.to_string()
        }
        ProviderError::Transport(e) => {
            counters.record(TurnEvent::TransportError);
            tracing::error!(error = %e, "provider transport failure");
            MSG_TRANSPORT.to_string()
        }
        ProviderError::MissingApiKey(_) => {
            counters.record(TurnEvent::ApiError);
            MSG_NO_KEY.to_string()
        }
        other => {
            counters.record(TurnEvent::ApiError);
            tracing::error!(error = %other, "provider call failed");
            MSG_API.to_string()
        }
    }
}

/// Map the kept transcript (plus any rolling summary) into provider
/// messages. Assistant replies are truncated — old full answers are the
/// main token sink in long chats.
fn history_messages(
    summary: Option<&TranscriptMessage>,
    kept: &[TranscriptMessage],
) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    if let Some(summary) = summary {
        out.push(ChatMessage::assistant(summary.content.clone()));
    }
    for m in kept {
        match m.role {
            ChatRole::User => out.push(ChatMessage::user(m.content.clone())),
            ChatRole::Assistant => out.push(ChatMessage::assistant(context::smart_truncate(
                &m.content,
                HISTORY_REPLY_BUDGET,
            ))),
        }
    }
    out
}

fn inline_results_message(formatted: &str) -> ChatMessage {
    ChatMessage::system(format!(
        "{INLINE_RESULTS_HEADER}:\n{formatted}\n\
         Gunakan hasil di atas untuk menjawab pertanyaan user. JANGAN melakukan tool call lagi."
    ))
}

fn query_of(call: &ToolCall) -> String {
    call.arguments
        .get("query")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Run one user turn to a terminal state.
#[allow(clippy::too_many_lines)]
pub async fn run_turn(
    config: TurnConfig<'_>,
    session: &mut Session,
    user_message: &str,
    counters: &mut TurnCounters,
    mut sink: Option<&mut (dyn TurnSink + '_)>,
) -> TurnOutcome {
    let start = Instant::now();
    let mut tool_calls_made: u32 = 0;
    let mut sources: Vec<SearchResult> = Vec::new();

    session.push_user(user_message);
    let history = session.transcript_excluding_last(1);
    session.push_placeholder();

    // Fold older turns into the rolling summary before prompting.
    let folded = memory::summarize_if_needed(&history, &session.memory, &config.memory_options);
    session.memory = folded.updated_state.clone();

    // ── Mode detection ───────────────────────────────────────────
    let tools_allowed = !tools::should_disable_tools(user_message);
    let routed = grounding::route_facts(config.profile, user_message);
    tracing::info!(
        tools_allowed,
        facts_mode = routed.mode.as_str(),
        "turn mode detected"
    );

    // Grounded turns get the routed deterministic facts; open turns get
    // the token-budgeted portfolio context.
    let data_block = if tools_allowed {
        context::build_optimized_context(config.profile, None, config.context_max_tokens)
            .user_context
    } else {
        routed.facts_block.clone()
    };

    let system_prompt = SystemPromptBuilder::new(config.profile)
        .grounded(!tools_allowed)
        .facts(&data_block)
        .build();

    let mut messages: Vec<ChatMessage> = vec![ChatMessage::system(system_prompt.clone())];
    messages.extend(history_messages(
        folded.summary_message.as_ref(),
        &folded.kept_messages,
    ));
    messages.push(ChatMessage::user(user_message.to_string()));

    // The schema rides along on every call for response-shape stability;
    // tool_choice is what actually gates tool use.
    let schemas = tools::tool_schemas(config.tools);
    let tool_choice = if tools_allowed {
        ToolChoice::Auto
    } else {
        ToolChoice::None
    };

    // ── Primary call ─────────────────────────────────────────────
    counters.record(TurnEvent::PrimaryCall);
    let primary = config
        .provider
        .chat_with_tools(&messages, &schemas, tool_choice, config.model, config.params)
        .await;

    let (status, content) = match primary {
        // ── Tool-use-failure recovery ────────────────────────────
        Err(ProviderError::ToolUseFailed { failed_generation }) => {
            counters.record(TurnEvent::ToolUseFailure);
            let parsed = failed_generation
                .as_deref()
                .and_then(tools::try_parse_xml_style_tool_call);

            match parsed {
                Some(parsed) if tools_allowed => {
                    counters.record(TurnEvent::RecoveredToolCall);
                    let call = ToolCall {
                        id: format!("xmltool_{}", uuid::Uuid::new_v4().simple()),
                        name: parsed.name,
                        arguments: parsed.arguments,
                        source: ToolCallSource::Recovered,
                    };
                    tool_calls_made += 1;

                    let result = run_tool_with_status(
                        &config,
                        session,
                        sink.as_deref_mut(),
                        counters,
                        &call,
                    )
                    .await;

                    if result.success {
                        sources.extend(result.sources.iter().cloned());
                        messages.push(inline_results_message(&result.output));
                        counters.record(TurnEvent::FollowUpCall);
                        let follow_up = config
                            .provider
                            .chat_with_tools(
                                &messages,
                                &schemas,
                                ToolChoice::None,
                                config.model,
                                config.params,
                            )
                            .await;
                        match follow_up {
                            Ok(response) => match response.content {
                                Some(content) if !content.is_empty() => {
                                    (TurnStatus::Answered, content)
                                }
                                _ => (TurnStatus::Errored, MSG_EMPTY.to_string()),
                            },
                            Err(err) => (TurnStatus::Errored, error_terminal(&err, counters)),
                        }
                    } else {
                        (TurnStatus::Answered, apology(&result))
                    }
                }
                _ => {
                    counters.record(TurnEvent::ApiError);
                    (TurnStatus::Errored, MSG_API.to_string())
                }
            }
        }

        Err(err) => (TurnStatus::Errored, error_terminal(&err, counters)),

        Ok(mut response) => {
            let mut calls =
                tools::extract_tool_calls(response.content.as_deref(), &response.tool_calls);

            // ── Repair retry: the model "talked" a tool call ─────
            let talked_tool_call = calls.is_empty()
                && response
                    .content
                    .as_deref()
                    .is_some_and(tools::contains_xml_tool_syntax);
            if talked_tool_call {
                counters.record(TurnEvent::RepairRetry);
                let repaired_prompt = SystemPromptBuilder::new(config.profile)
                    .grounded(!tools_allowed)
                    .facts(&data_block)
                    .repair(true)
                    .build();
                messages[0] = ChatMessage::system(repaired_prompt);

                match config
                    .provider
                    .chat_with_tools(&messages, &schemas, tool_choice, config.model, config.params)
                    .await
                {
                    Ok(retried) => {
                        response = retried;
                        calls = tools::extract_tool_calls(
                            response.content.as_deref(),
                            &response.tool_calls,
                        );
                    }
                    Err(err) => {
                        let content = error_terminal(&err, counters);
                        return settle(
                            session,
                            sink,
                            counters,
                            TurnStatus::Errored,
                            content,
                            sources,
                            tool_calls_made,
                            start,
                        )
                        .await;
                    }
                }
            }

            // ── Tool execution branch ────────────────────────────
            if !calls.is_empty() && tools_allowed {
                let recovered = calls
                    .iter()
                    .any(|c| c.source == ToolCallSource::Recovered);
                if recovered {
                    counters.record(TurnEvent::RecoveredToolCall);
                }

                let mut executed: Vec<(ToolCall, ToolResult)> = Vec::new();
                for call in &calls {
                    tool_calls_made += 1;
                    let result = run_tool_with_status(
                        &config,
                        session,
                        sink.as_deref_mut(),
                        counters,
                        call,
                    )
                    .await;
                    sources.extend(result.sources.iter().cloned());
                    executed.push((call.clone(), result));
                }

                if executed.iter().all(|(_, r)| !r.success) {
                    let apology_text = apology(&executed[0].1);
                    (TurnStatus::Answered, apology_text)
                } else {
                    // The two follow-up shapes are never mixed: native
                    // calls replay as structured tool messages; recovered
                    // ones inline as text with tool use forbidden.
                    let follow_up_choice = if recovered {
                        let combined: Vec<&str> = executed
                            .iter()
                            .map(|(_, r)| r.output.as_str())
                            .filter(|o| !o.is_empty())
                            .collect();
                        messages.push(inline_results_message(&combined.join("\n\n")));
                        ToolChoice::None
                    } else {
                        messages.push(ChatMessage::assistant_tool_calls(
                            response.content.clone(),
                            executed
                                .iter()
                                .map(|(call, _)| {
                                    AssistantToolCall::function(
                                        call.id.clone(),
                                        call.name.clone(),
                                        call.arguments.to_string(),
                                    )
                                })
                                .collect(),
                        ));
                        for (call, result) in &executed {
                            let body = if result.success {
                                result.output.clone()
                            } else {
                                format!(
                                    "Error: {}",
                                    result.error.as_deref().unwrap_or("Unknown error")
                                )
                            };
                            messages.push(ChatMessage::tool_result(call.id.clone(), body));
                        }
                        ToolChoice::Auto
                    };

                    counters.record(TurnEvent::FollowUpCall);
                    let final_call = config
                        .provider
                        .chat_with_tools(
                            &messages,
                            &schemas,
                            follow_up_choice,
                            config.model,
                            config.params,
                        )
                        .await;
                    match final_call {
                        Ok(ChatResponse {
                            content: Some(content),
                            ..
                        }) if !content.is_empty() => (TurnStatus::Answered, content),
                        Ok(_) => (TurnStatus::Errored, MSG_EMPTY.to_string()),
                        Err(err) => (TurnStatus::Errored, error_terminal(&err, counters)),
                    }
                }
            } else {
                // ── No-tool branch: primary response is the answer ──
                match response.content {
                    Some(content) if !content.is_empty() => (TurnStatus::Answered, content),
                    _ => (TurnStatus::Errored, MSG_EMPTY.to_string()),
                }
            }
        }
    };

    settle(
        session,
        sink,
        counters,
        status,
        content,
        sources,
        tool_calls_made,
        start,
    )
    .await
}

fn apology(result: &ToolResult) -> String {
    format!(
        "Maaf, pencarian web sedang bermasalah ({}). Aku jawab berdasarkan data portfolio saja ya — silakan tanyakan lagi.",
        result.error.as_deref().unwrap_or("tidak diketahui")
    )
}

/// Execute one tool call, driving searching → processing → completed on
/// the session placeholder (and sink) with the configured pacing delays.
async fn run_tool_with_status(
    config: &TurnConfig<'_>,
    session: &mut Session,
    mut sink: Option<&mut (dyn TurnSink + '_)>,
    counters: &mut TurnCounters,
    call: &ToolCall,
) -> ToolResult {
    let query = query_of(call);

    update_search_status(session, sink.as_deref_mut(), &query, SearchStatus::Searching, 0).await;
    tokio::time::sleep(config.status_delay).await;

    update_search_status(session, sink.as_deref_mut(), &query, SearchStatus::Processing, 0).await;
    tokio::time::sleep(config.status_delay).await;

    let result = tools::execute_tool(config.tools, &call.name, &call.arguments).await;
    counters.record(if result.success {
        TurnEvent::ToolExecuted
    } else {
        TurnEvent::ToolFailed
    });
    if let Some(err) = &result.error {
        tracing::warn!(tool = %call.name, error = %err, "tool execution failed");
    }

    update_search_status(
        session,
        sink,
        &query,
        SearchStatus::Completed,
        result.sources.len(),
    )
    .await;

    result
}

async fn update_search_status(
    session: &mut Session,
    sink: Option<&mut (dyn TurnSink + '_)>,
    query: &str,
    status: SearchStatus,
    result_count: usize,
) {
    session.update_last(|m| {
        m.search_metadata = Some(SearchMetadata {
            query: query.to_string(),
            status,
            result_count,
        });
    });
    let phase = match status {
        SearchStatus::Searching => Some(MessagePhase::Searching),
        SearchStatus::Processing | SearchStatus::Completed => Some(MessagePhase::Processing),
    };
    if let Some(phase) = phase {
        session.advance_phase(phase);
    }
    if let Some(sink) = sink {
        if let Some(phase) = phase {
            sink.on_phase(phase).await;
        }
        sink.on_search_status(query, status, result_count).await;
    }
}

/// Write the terminal content into the placeholder and close out the
/// phase sequence. Every turn passes through here exactly once.
#[allow(clippy::too_many_arguments)]
async fn settle(
    session: &mut Session,
    mut sink: Option<&mut (dyn TurnSink + '_)>,
    counters: &mut TurnCounters,
    status: TurnStatus,
    content: String,
    sources: Vec<SearchResult>,
    tool_calls: u32,
    start: Instant,
) -> TurnOutcome {
    counters.record(match status {
        TurnStatus::Answered => TurnEvent::Answered,
        TurnStatus::Errored => TurnEvent::Errored,
    });

    session.advance_phase(MessagePhase::Streaming);
    if let Some(s) = sink.as_deref_mut() {
        s.on_phase(MessagePhase::Streaming).await;
    }
    session.update_last(|m| {
        m.content = content.clone();
        m.sources = sources.clone();
        m.streaming = true;
    });

    session.advance_phase(MessagePhase::Settled);
    session.update_last(|m| m.streaming = false);
    if let Some(s) = sink {
        s.on_phase(MessagePhase::Settled).await;
    }

    TurnOutcome {
        status,
        content,
        sources,
        tool_calls,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_terminals_map_to_distinct_messages() {
        let mut counters = TurnCounters::default();

        let msg = error_terminal(&ProviderError::RateLimited, &mut counters);
        assert_eq!(msg, MSG_RATE_LIMIT);
        assert_eq!(counters.rate_limited, 1);

        let msg = error_terminal(
            &ProviderError::Api {
                provider: "Groq".into(),
                status: 500,
                message: "boom".into(),
            },
            &mut counters,
        );
        assert_eq!(msg, MSG_API);
        assert_eq!(counters.api_errors, 1);

        let msg = error_terminal(&ProviderError::MissingApiKey("Groq".into()), &mut counters);
        assert_eq!(msg, MSG_NO_KEY);
    }

    #[test]
    fn history_truncates_assistant_replies_only() {
        let long = "kata ".repeat(500);
        let kept = vec![
            TranscriptMessage::user(long.clone()),
            TranscriptMessage::assistant(long.clone()),
        ];
        let mapped = history_messages(None, &kept);

        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0].content.as_deref(), Some(long.as_str()));
        assert!(mapped[1].content.as_ref().unwrap().contains("diringkas"));
    }

    #[test]
    fn summary_leads_the_history() {
        let summary = TranscriptMessage::assistant("**RINGKASAN CHAT SEBELUMNYA (otomatis):**");
        let mapped = history_messages(Some(&summary), &[TranscriptMessage::user("halo")]);
        assert_eq!(mapped.len(), 2);
        assert!(mapped[0].content.as_ref().unwrap().contains("RINGKASAN"));
        assert_eq!(mapped[0].role, "assistant");
    }

    #[test]
    fn inline_results_block_forbids_further_tool_calls() {
        let msg = inline_results_message("1. hasil");
        let content = msg.content.unwrap();
        assert!(content.starts_with("HASIL PENCARIAN WEB (search_web)"));
        assert!(content.contains("JANGAN melakukan tool call lagi"));
        assert_eq!(msg.role, "system");
    }
}
