//! Rolling conversation memory.
//!
//! Older turns are folded into a deterministic textual summary (plain
//! string concatenation, never model-generated) once a turn-count or
//! token threshold is crossed. The `summarized_count` watermark guarantees
//! each message is folded at most once, so repeated calls with the same
//! state are idempotent.

use crate::context::estimate_tokens;
use crate::session::ChatRole;

/// Summary header used the first time the summary is created.
const SUMMARY_HEADER: &str = "**RINGKASAN CHAT SEBELUMNYA (otomatis):**";

/// A role/content pair — the slice of a message that memory cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMessage {
    pub role: ChatRole,
    pub content: String,
}

impl TranscriptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Owned by one chat session; never shared across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    /// Compact summary of older conversation turns.
    pub summary: String,
    /// How many head messages have already been folded into the summary.
    pub summarized_count: usize,
}

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    /// Trigger after this many user messages (turns).
    pub max_user_turns: usize,
    /// Keep this many latest messages verbatim.
    pub keep_last: usize,
    /// Trigger if the rough token estimate of the transcript exceeds this.
    pub max_approx_tokens: usize,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_user_turns: 4,
            keep_last: 6,
            max_approx_tokens: 1800,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummarizeOutcome {
    pub updated_state: MemoryState,
    pub kept_messages: Vec<TranscriptMessage>,
    pub summary_message: Option<TranscriptMessage>,
}

fn compact_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fixed keyword rules for user preference statements worth preserving
/// across summarization.
fn extract_preferences(text: &str) -> Vec<&'static str> {
    let t = text.to_lowercase();
    let mut prefs = Vec::new();
    if t.contains("bahasa indonesia") || t.contains("b indo") || t.contains("bahasa indo") {
        prefs.push("Prefer Bahasa Indonesia");
    }
    if t.contains("hemat token") || t.contains("ringkas") || t.contains("singkat") {
        prefs.push("Prefer jawaban ringkas/hemat token");
    }
    if t.contains("jangan halu") || t.contains("jangan mengarang") || t.contains("sesuai content")
    {
        prefs.push("Wajib grounding ke content.ts (anti halusinasi)");
    }
    prefs
}

fn uniq_case_insensitive(items: Vec<&'static str>) -> Vec<&'static str> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        let key = item.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(item);
    }
    out
}

/// Compress older turns into the rolling summary when a threshold is hit.
///
/// Below both thresholds this is a no-op: all messages come back unchanged
/// and the summary message is present only if a prior summary exists.
pub fn summarize_if_needed(
    messages: &[TranscriptMessage],
    state: &MemoryState,
    options: &SummarizeOptions,
) -> SummarizeOutcome {
    let user_turns = messages
        .iter()
        .filter(|m| m.role == ChatRole::User)
        .count();
    let token_estimate: usize = messages.iter().map(|m| estimate_tokens(&m.content)).sum();

    let should_summarize =
        user_turns >= options.max_user_turns || token_estimate >= options.max_approx_tokens;
    if !should_summarize {
        return SummarizeOutcome {
            updated_state: state.clone(),
            kept_messages: messages.to_vec(),
            summary_message: existing_summary(state),
        };
    }

    // Keep the last K messages verbatim; fold the rest.
    let cut = messages.len().saturating_sub(options.keep_last);
    let head = &messages[..cut];
    let tail = &messages[cut..];

    // Only the not-yet-summarized portion of the head is folded, so a
    // message is never summarized twice.
    let already = state.summarized_count.min(head.len());
    let new_head = &head[already..];
    if new_head.is_empty() {
        return SummarizeOutcome {
            updated_state: state.clone(),
            kept_messages: tail.to_vec(),
            summary_message: existing_summary(state),
        };
    }

    let prefs = uniq_case_insensitive(
        new_head
            .iter()
            .flat_map(|m| extract_preferences(&m.content))
            .collect(),
    );

    let mut topics = Vec::new();
    for m in new_head {
        let line = compact_line(&m.content);
        if line.is_empty() {
            continue;
        }
        let speaker = match m.role {
            ChatRole::User => "User",
            ChatRole::Assistant => "Luna",
        };
        topics.push(format!("- {speaker}: {line}"));
    }

    let mut parts: Vec<String> = Vec::new();
    parts.push(if state.summary.is_empty() {
        SUMMARY_HEADER.to_string()
    } else {
        state.summary.clone()
    });
    if !prefs.is_empty() {
        parts.push(format!(
            "**Preferensi / aturan:**\n{}",
            prefs
                .iter()
                .map(|p| format!("- {p}"))
                .collect::<Vec<_>>()
                .join("\n")
        ));
    }
    if !topics.is_empty() {
        parts.push(format!("**Ringkasan percakapan:**\n{}", topics.join("\n")));
    }
    let next_summary = parts.join("\n");

    let updated_state = MemoryState {
        summary: next_summary.clone(),
        summarized_count: state.summarized_count + new_head.len(),
    };

    SummarizeOutcome {
        updated_state,
        kept_messages: tail.to_vec(),
        summary_message: Some(TranscriptMessage::assistant(next_summary)),
    }
}

fn existing_summary(state: &MemoryState) -> Option<TranscriptMessage> {
    if state.summary.is_empty() {
        None
    } else {
        Some(TranscriptMessage::assistant(state.summary.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(turns: usize, keep: usize, tokens: usize) -> SummarizeOptions {
        SummarizeOptions {
            max_user_turns: turns,
            keep_last: keep,
            max_approx_tokens: tokens,
        }
    }

    fn eight_turn_transcript() -> Vec<TranscriptMessage> {
        vec![
            TranscriptMessage::user("siapa evi"),
            TranscriptMessage::assistant("Evi adalah..."),
            TranscriptMessage::user("proyek apa saja"),
            TranscriptMessage::assistant("Daftarnya..."),
            TranscriptMessage::user("jelaskan TING"),
            TranscriptMessage::assistant("TING itu..."),
            TranscriptMessage::user("timeline kerja"),
            TranscriptMessage::assistant("Discovery/Analysis/Design..."),
        ]
    }

    #[test]
    fn does_not_summarize_before_threshold() {
        let messages = vec![
            TranscriptMessage::user("siapa evi"),
            TranscriptMessage::assistant("Evi adalah..."),
            TranscriptMessage::user("proyek apa saja"),
        ];
        let res = summarize_if_needed(&messages, &MemoryState::default(), &opts(4, 6, 99_999));

        assert!(res.summary_message.is_none());
        assert_eq!(res.kept_messages.len(), messages.len());
        assert_eq!(res.updated_state.summarized_count, 0);
    }

    #[test]
    fn boundary_one_below_turn_threshold_is_quiet() {
        let messages = vec![
            TranscriptMessage::user("a"),
            TranscriptMessage::user("b"),
            TranscriptMessage::user("c"),
        ];
        let res = summarize_if_needed(&messages, &MemoryState::default(), &opts(4, 2, 99_999));
        assert!(res.summary_message.is_none());
        assert_eq!(res.kept_messages.len(), 3);
    }

    #[test]
    fn boundary_at_turn_threshold_triggers() {
        let messages = vec![
            TranscriptMessage::user("a"),
            TranscriptMessage::user("b"),
            TranscriptMessage::user("c"),
            TranscriptMessage::user("d"),
        ];
        let res = summarize_if_needed(&messages, &MemoryState::default(), &opts(4, 2, 99_999));
        assert!(res.summary_message.is_some());
        assert_eq!(res.kept_messages.len(), 2);
        assert_eq!(res.updated_state.summarized_count, 2);
    }

    #[test]
    fn summarizes_after_four_user_turns_and_keeps_tail() {
        let messages = eight_turn_transcript();
        let res = summarize_if_needed(&messages, &MemoryState::default(), &opts(4, 4, 99_999));

        let summary = res.summary_message.expect("summary expected");
        assert_eq!(res.kept_messages.len(), 4);
        assert!(summary.content.contains("RINGKASAN CHAT SEBELUMNYA"));
        assert!(summary.content.contains("User: siapa evi"));
        assert!(summary.content.contains("Luna: Evi adalah..."));
    }

    #[test]
    fn triggers_by_token_threshold_with_few_turns() {
        let big = "x".repeat(5000);
        let messages = vec![
            TranscriptMessage::user(big.clone()),
            TranscriptMessage::assistant(big),
        ];
        let res = summarize_if_needed(&messages, &MemoryState::default(), &opts(99, 1, 10));

        assert!(res.summary_message.is_some());
        assert_eq!(res.kept_messages.len(), 1);
    }

    #[test]
    fn repeated_calls_never_refold_messages() {
        let messages = eight_turn_transcript();
        let options = opts(4, 4, 99_999);

        let first = summarize_if_needed(&messages, &MemoryState::default(), &options);
        assert_eq!(first.updated_state.summarized_count, 4);

        // Same transcript, carried-forward state: nothing new to fold.
        let second = summarize_if_needed(&messages, &first.updated_state, &options);
        assert_eq!(
            second.updated_state.summarized_count,
            first.updated_state.summarized_count
        );
        assert_eq!(
            second.summary_message.as_ref().map(|m| m.content.clone()),
            first.summary_message.as_ref().map(|m| m.content.clone()),
        );

        // The already-folded line appears exactly once in the summary.
        let content = &second.summary_message.unwrap().content;
        assert_eq!(content.matches("User: siapa evi").count(), 1);
    }

    #[test]
    fn summarized_count_is_monotonic_as_transcript_grows() {
        let mut messages = eight_turn_transcript();
        let options = opts(4, 4, 99_999);

        let first = summarize_if_needed(&messages, &MemoryState::default(), &options);
        messages.push(TranscriptMessage::user("lanjut: pendidikan evi?"));
        messages.push(TranscriptMessage::assistant("Pendidikan Evi..."));

        let second = summarize_if_needed(&messages, &first.updated_state, &options);
        assert!(
            second.updated_state.summarized_count >= first.updated_state.summarized_count,
            "watermark regressed"
        );
        assert_eq!(second.kept_messages.len(), 4);
    }

    #[test]
    fn preferences_are_extracted_and_deduplicated() {
        let messages = vec![
            TranscriptMessage::user("tolong jawab ringkas ya"),
            TranscriptMessage::user("RINGKAS saja, hemat token"),
            TranscriptMessage::user("jangan halu, sesuai content.ts"),
            TranscriptMessage::user("ok"),
        ];
        let res = summarize_if_needed(&messages, &MemoryState::default(), &opts(4, 1, 99_999));

        let content = res.summary_message.unwrap().content;
        assert_eq!(
            content
                .matches("Prefer jawaban ringkas/hemat token")
                .count(),
            1
        );
        assert!(content.contains("Wajib grounding ke content.ts"));
    }
}
