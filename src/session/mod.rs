//! Per-session message state.
//!
//! One chat session owns one append-only message list plus its rolling
//! memory state. Messages are created when submitted or when a response
//! placeholder is inserted, then mutated in place as the turn progresses —
//! never deleted. Only the most recent placeholder is ever updated.

use crate::memory::{MemoryState, TranscriptMessage};
use crate::search::SearchResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Searching,
    Processing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub query: String,
    pub status: SearchStatus,
    pub result_count: usize,
}

/// Lifecycle of an assistant placeholder within one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePhase {
    Pending,
    Searching,
    Processing,
    Streaming,
    Settled,
}

impl MessagePhase {
    /// Legal forward transitions. Search stages may be skipped entirely
    /// (no-tool turns go pending → streaming or pending → settled).
    pub fn can_advance_to(self, next: MessagePhase) -> bool {
        use MessagePhase::{Pending, Processing, Searching, Settled, Streaming};
        matches!(
            (self, next),
            (Pending, Searching | Streaming | Settled)
                | (Searching, Processing)
                | (Processing, Streaming | Settled)
                | (Streaming, Settled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: ChatRole,
    pub content: String,
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_metadata: Option<SearchMetadata>,
    pub phase: MessagePhase,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            streaming: false,
            sources: Vec::new(),
            search_metadata: None,
            phase: MessagePhase::Settled,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            streaming: false,
            sources: Vec::new(),
            search_metadata: None,
            phase: MessagePhase::Settled,
        }
    }

    fn placeholder() -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            streaming: true,
            sources: Vec::new(),
            search_metadata: None,
            phase: MessagePhase::Pending,
        }
    }
}

/// One chat session: message list + memory state, single writer.
#[derive(Debug, Default)]
pub struct Session {
    messages: Vec<Message>,
    pub memory: MemoryState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session opening with the assistant greeting already in place.
    pub fn with_greeting() -> Self {
        let mut session = Self::new();
        session.messages.push(Message::assistant(
            "Halo! Saya Luna 👋 AI Assistant yang bisa menjawab semua pertanyaan Anda \
             seputar Evi dan portfolionya. Bagaimana saya bisa membantu Anda hari ini?",
        ));
        session
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Insert the streaming placeholder the current turn will fill in.
    pub fn push_placeholder(&mut self) {
        self.messages.push(Message::placeholder());
    }

    /// Mutate the most recent message in place (the turn's placeholder).
    pub fn update_last(&mut self, f: impl FnOnce(&mut Message)) {
        if let Some(last) = self.messages.last_mut() {
            f(last);
        }
    }

    /// Advance the placeholder's phase; illegal jumps are dropped with a
    /// warning rather than corrupting the display state.
    pub fn advance_phase(&mut self, next: MessagePhase) {
        self.update_last(|m| {
            if m.phase == next {
                return;
            }
            if m.phase.can_advance_to(next) {
                m.phase = next;
            } else {
                tracing::warn!(from = ?m.phase, to = ?next, "illegal message phase transition");
            }
        });
    }

    /// The transcript before the most recent `skip_last` messages, as
    /// role/content pairs for memory and prompt assembly. Empty contents
    /// (unfilled placeholders) are excluded.
    pub fn transcript_excluding_last(&self, skip_last: usize) -> Vec<TranscriptMessage> {
        let end = self.messages.len().saturating_sub(skip_last);
        self.messages[..end]
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| TranscriptMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_session_starts_settled() {
        let session = Session::with_greeting();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].phase, MessagePhase::Settled);
        assert!(!session.messages()[0].streaming);
    }

    #[test]
    fn placeholder_starts_pending_and_streaming() {
        let mut session = Session::new();
        session.push_user("halo");
        session.push_placeholder();

        let last = session.messages().last().unwrap();
        assert_eq!(last.phase, MessagePhase::Pending);
        assert!(last.streaming);
        assert!(last.content.is_empty());
    }

    #[test]
    fn phase_transitions_follow_the_turn_lifecycle() {
        use MessagePhase::*;
        assert!(Pending.can_advance_to(Searching));
        assert!(Searching.can_advance_to(Processing));
        assert!(Processing.can_advance_to(Streaming));
        assert!(Streaming.can_advance_to(Settled));
        // No-tool turns skip the search stages.
        assert!(Pending.can_advance_to(Settled));
        // Never backwards.
        assert!(!Settled.can_advance_to(Pending));
        assert!(!Processing.can_advance_to(Searching));
    }

    #[test]
    fn illegal_phase_jump_is_ignored() {
        let mut session = Session::new();
        session.push_placeholder();
        session.advance_phase(MessagePhase::Settled);
        session.advance_phase(MessagePhase::Searching);

        assert_eq!(
            session.messages().last().unwrap().phase,
            MessagePhase::Settled
        );
    }

    #[test]
    fn transcript_skips_placeholder_and_trailing_messages() {
        let mut session = Session::new();
        session.push_user("siapa evi");
        session.messages.push(Message::assistant("Evi adalah..."));
        session.push_user("proyek apa saja");
        session.push_placeholder();

        // Everything before the current user message + placeholder.
        let history = session.transcript_excluding_last(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "siapa evi");
        assert_eq!(history[1].content, "Evi adalah...");
    }

    #[test]
    fn update_last_touches_only_the_most_recent_entry() {
        let mut session = Session::new();
        session.push_user("a");
        session.push_placeholder();
        session.update_last(|m| m.content = "done".into());

        assert_eq!(session.messages()[0].content, "a");
        assert_eq!(session.messages()[1].content, "done");
    }
}
