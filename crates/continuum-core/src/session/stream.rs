//! Exchange state machine.
//!
//! [`StreamState`] holds the state of the single outstanding exchange of a
//! session. Events are folded strictly in arrival order:
//!
//! ```text
//! Idle ──begin──▶ Streaming ──done────────────────▶ Completed
//!                     │     ──aborted / abort()───▶ Aborted
//!                     │     ──session_unavailable─▶ SessionUnavailable ──resolve──▶ Idle
//!                     └─────error / transport─────▶ Error
//! ```
//!
//! A new exchange may begin from `Idle` or any terminal state except
//! `SessionUnavailable`, which must first be resolved by the user.

use super::event::{StreamEvent, tool_output_text};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{ContinuumError, Result};

/// A tool invocation recorded on the in-progress assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    /// Filled in by the matching `tool_result` event
    pub output: Option<String>,
    pub is_error: bool,
}

/// Accumulated state of an exchange that is still streaming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingExchange {
    pub session_id: Option<String>,
    pub session_title: Option<String>,
    pub model: Option<String>,
    pub available_tools: Vec<String>,
    pub partial_text: String,
    pub thinking: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// The assistant message produced by a completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub text: String,
    pub thinking: Option<String>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub completed_at: DateTime<Utc>,
}

/// Session metadata learned while streaming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMetadata {
    pub session_id: Option<String>,
    pub title: Option<String>,
    pub model: Option<String>,
    pub available_tools: Vec<String>,
}

/// Details carried by the `SessionUnavailable` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUnavailableInfo {
    pub session_id: Option<String>,
    pub reason: String,
    pub has_local_history: bool,
    pub prior_message_count: usize,
}

/// Distinguishes retryable transport failures from backend-reported errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamErrorKind {
    Transport,
    Protocol,
}

/// The two user choices that resolve `SessionUnavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecoveryChoice {
    /// Replay prior local history as context for a new underlying session.
    InjectContext,
    /// Discard prior context and start clean.
    FreshStart,
}

/// State of the single exchange of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum StreamState {
    #[default]
    Idle,
    Streaming(StreamingExchange),
    Completed {
        message: AssistantMessage,
        metadata: ExchangeMetadata,
    },
    /// `metadata` keeps the session the exchange was bound to before it stopped.
    Aborted {
        partial_text: String,
        metadata: ExchangeMetadata,
    },
    SessionUnavailable(SessionUnavailableInfo),
    Error {
        message: String,
        kind: StreamErrorKind,
        metadata: ExchangeMetadata,
    },
}

impl StreamingExchange {
    /// Session metadata learned so far, leaving the exchange's fields empty.
    fn take_metadata(&mut self) -> ExchangeMetadata {
        ExchangeMetadata {
            session_id: self.session_id.take(),
            title: self.session_title.take(),
            model: self.model.take(),
            available_tools: std::mem::take(&mut self.available_tools),
        }
    }
}

impl StreamState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, StreamState::Streaming(_))
    }

    /// Whether [`begin`](Self::begin) would accept a new exchange.
    pub fn can_begin(&self) -> bool {
        !matches!(
            self,
            StreamState::Streaming(_) | StreamState::SessionUnavailable(_)
        )
    }

    /// Terminal states end the exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed { .. }
                | StreamState::Aborted { .. }
                | StreamState::SessionUnavailable(_)
                | StreamState::Error { .. }
        )
    }

    /// Session metadata of a finished exchange. `None` for `Idle`,
    /// `Streaming` and `SessionUnavailable`.
    pub fn metadata(&self) -> Option<&ExchangeMetadata> {
        match self {
            StreamState::Completed { metadata, .. }
            | StreamState::Aborted { metadata, .. }
            | StreamState::Error { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    pub fn phase(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Streaming(_) => "streaming",
            StreamState::Completed { .. } => "completed",
            StreamState::Aborted { .. } => "aborted",
            StreamState::SessionUnavailable(_) => "session_unavailable",
            StreamState::Error { .. } => "error",
        }
    }

    /// Starts a new exchange.
    ///
    /// Rejected while another exchange is streaming, and while a
    /// `SessionUnavailable` condition waits for the user's choice.
    pub fn begin(&mut self) -> Result<()> {
        match self {
            StreamState::Streaming(_) => Err(ContinuumError::ExchangeInProgress),
            StreamState::SessionUnavailable(_) => Err(ContinuumError::invalid_state(
                "session unavailable: choose inject_context or fresh_start first",
            )),
            _ => {
                *self = StreamState::Streaming(StreamingExchange::default());
                Ok(())
            }
        }
    }

    /// Folds one protocol event. Returns `true` when the state is terminal afterwards.
    ///
    /// Events outside of `Streaming` belong to no exchange and are dropped.
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        let StreamState::Streaming(exchange) = self else {
            tracing::debug!(kind = event.kind(), phase = self.phase(), "Dropping event outside of an exchange");
            return self.is_terminal();
        };

        match event {
            StreamEvent::Session { session_id, title } => {
                exchange.session_id = Some(session_id);
                if title.is_some() {
                    exchange.session_title = title;
                }
            }
            StreamEvent::Init { tools } => exchange.available_tools = tools,
            StreamEvent::Model { model } => exchange.model = Some(model),
            StreamEvent::Text { content } => exchange.partial_text.push_str(&content),
            StreamEvent::Thinking { content } => exchange.thinking.push_str(&content),
            StreamEvent::ToolUse { id, name, input } => exchange.tool_calls.push(ToolCallRecord {
                id,
                name,
                input,
                output: None,
                is_error: false,
            }),
            StreamEvent::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => match exchange.tool_calls.iter_mut().find(|c| c.id == tool_use_id) {
                Some(call) => {
                    call.output = Some(tool_output_text(&content));
                    call.is_error = is_error;
                }
                None => tracing::warn!(tool_use_id = %tool_use_id, "tool_result without matching tool_use"),
            },
            StreamEvent::Done { session_id, title } => {
                let exchange = std::mem::take(exchange);
                let thinking = (!exchange.thinking.is_empty()).then_some(exchange.thinking);
                *self = StreamState::Completed {
                    message: AssistantMessage {
                        text: exchange.partial_text,
                        thinking,
                        tool_calls: exchange.tool_calls,
                        completed_at: Utc::now(),
                    },
                    metadata: ExchangeMetadata {
                        session_id: session_id.or(exchange.session_id),
                        title: title.or(exchange.session_title),
                        model: exchange.model,
                        available_tools: exchange.available_tools,
                    },
                };
            }
            StreamEvent::Aborted { .. } => {
                let partial_text = std::mem::take(&mut exchange.partial_text);
                let metadata = exchange.take_metadata();
                *self = StreamState::Aborted {
                    partial_text,
                    metadata,
                };
            }
            StreamEvent::SessionUnavailable {
                session_id,
                reason,
                has_markdown_history,
                message_count,
            } => {
                let session_id = session_id.or_else(|| exchange.session_id.take());
                *self = StreamState::SessionUnavailable(SessionUnavailableInfo {
                    session_id,
                    reason,
                    has_local_history: has_markdown_history,
                    prior_message_count: message_count,
                });
            }
            StreamEvent::Error { error } => {
                let metadata = exchange.take_metadata();
                *self = StreamState::Error {
                    message: error,
                    kind: StreamErrorKind::Protocol,
                    metadata,
                };
            }
            StreamEvent::Unknown => tracing::debug!("Ignoring unknown event kind"),
        }

        self.is_terminal()
    }

    /// User-initiated stop. Only meaningful while streaming.
    pub fn abort(&mut self) -> bool {
        if let StreamState::Streaming(exchange) = self {
            let partial_text = std::mem::take(&mut exchange.partial_text);
            let metadata = exchange.take_metadata();
            *self = StreamState::Aborted {
                partial_text,
                metadata,
            };
            return true;
        }
        false
    }

    /// Ends a streaming exchange because the transport failed.
    pub fn fail_transport(&mut self, message: impl Into<String>) -> bool {
        if let StreamState::Streaming(exchange) = self {
            let metadata = exchange.take_metadata();
            *self = StreamState::Error {
                message: message.into(),
                kind: StreamErrorKind::Transport,
                metadata,
            };
            return true;
        }
        false
    }

    /// Enters `SessionUnavailable` outside of a stream (resume probe failed).
    pub fn require_recovery(&mut self, info: SessionUnavailableInfo) -> Result<()> {
        if self.is_streaming() {
            return Err(ContinuumError::ExchangeInProgress);
        }
        *self = StreamState::SessionUnavailable(info);
        Ok(())
    }

    /// Applies the user's recovery choice, returning to `Idle`.
    pub fn resolve_unavailable(
        &mut self,
        choice: RecoveryChoice,
    ) -> Result<SessionUnavailableInfo> {
        match std::mem::take(self) {
            StreamState::SessionUnavailable(info) => {
                tracing::info!(choice = %choice, session_id = ?info.session_id, "Resolved unavailable session");
                Ok(info)
            }
            other => {
                let phase = other.phase();
                *self = other;
                Err(ContinuumError::invalid_state(format!(
                    "no unavailable session to resolve (phase: {})",
                    phase
                )))
            }
        }
    }

    /// Clears a finished exchange back to `Idle`.
    pub fn reset(&mut self) {
        if self.is_terminal() && !matches!(self, StreamState::SessionUnavailable(_)) {
            *self = StreamState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str) -> StreamEvent {
        StreamEvent::Text {
            content: content.into(),
        }
    }

    fn session(id: &str) -> StreamEvent {
        StreamEvent::Session {
            session_id: id.into(),
            title: None,
        }
    }

    fn done() -> StreamEvent {
        StreamEvent::Done {
            session_id: None,
            title: None,
        }
    }

    fn fold(events: Vec<StreamEvent>) -> StreamState {
        let mut state = StreamState::Idle;
        state.begin().unwrap();
        for event in events {
            state.apply(event);
        }
        state
    }

    #[test]
    fn test_session_init_text_done_completes() {
        let state = fold(vec![
            session("s-1"),
            StreamEvent::Init {
                tools: vec!["search".into()],
            },
            text("Hi"),
            done(),
        ]);
        match state {
            StreamState::Completed { message, metadata } => {
                assert_eq!(message.text, "Hi");
                assert_eq!(metadata.session_id.as_deref(), Some("s-1"));
                assert_eq!(metadata.available_tools, vec!["search".to_string()]);
                assert!(message.thinking.is_none());
            }
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn test_non_terminal_events_keep_streaming() {
        let mut state = StreamState::Idle;
        state.begin().unwrap();
        for event in [
            session("s"),
            StreamEvent::Model {
                model: "sonnet".into(),
            },
            text("a"),
            StreamEvent::Thinking {
                content: "hmm".into(),
            },
            StreamEvent::Unknown,
        ] {
            assert!(!state.apply(event));
            assert!(state.is_streaming());
        }
    }

    #[test]
    fn test_tool_result_attaches_to_tool_use() {
        let state = fold(vec![
            StreamEvent::ToolUse {
                id: "t1".into(),
                name: "read_file".into(),
                input: serde_json::json!({"path": "a.md"}),
            },
            StreamEvent::ToolResult {
                tool_use_id: "t1".into(),
                content: "contents".into(),
                is_error: false,
            },
            text("done reading"),
            done(),
        ]);
        let StreamState::Completed { message, .. } = state else {
            panic!("expected Completed");
        };
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].output.as_deref(), Some("contents"));
    }

    #[test]
    fn test_tool_result_with_block_content_is_not_an_error() {
        let mut state = StreamState::Idle;
        state.begin().unwrap();
        state.apply(StreamEvent::ToolUse {
            id: "t1".into(),
            name: "search".into(),
            input: serde_json::json!({}),
        });
        let event = StreamEvent::from_json(
            r#"{"type":"tool_result","tool_use_id":"t1","content":[{"type":"text","text":"3 hits"}]}"#,
        )
        .unwrap();
        assert!(!state.apply(event));
        state.apply(done());

        let StreamState::Completed { message, .. } = state else {
            panic!("expected Completed, got {:?}", state);
        };
        assert_eq!(message.tool_calls[0].output.as_deref(), Some("3 hits"));
    }

    #[test]
    fn test_session_unavailable_then_fresh_start_clears_partial() {
        let state = fold(vec![
            session("old"),
            text("partial"),
            StreamEvent::SessionUnavailable {
                session_id: None,
                reason: "expired".into(),
                has_markdown_history: true,
                message_count: 5,
            },
        ]);
        let mut state = state;
        match &state {
            StreamState::SessionUnavailable(info) => {
                assert!(info.has_local_history);
                assert_eq!(info.prior_message_count, 5);
                assert_eq!(info.session_id.as_deref(), Some("old"));
            }
            other => panic!("expected SessionUnavailable, got {:?}", other),
        }
        assert!(!state.can_begin());
        assert!(state.begin().is_err());

        state.resolve_unavailable(RecoveryChoice::FreshStart).unwrap();
        assert_eq!(state, StreamState::Idle);
        assert!(state.can_begin());
    }

    #[test]
    fn test_begin_rejected_while_streaming() {
        let mut state = StreamState::Idle;
        state.begin().unwrap();
        assert!(!state.can_begin());
        assert_eq!(state.begin(), Err(ContinuumError::ExchangeInProgress));
    }

    #[test]
    fn test_abort_keeps_partial_text() {
        let mut state = StreamState::Idle;
        state.begin().unwrap();
        state.apply(session("s-1"));
        state.apply(text("half"));
        assert!(state.abort());
        match &state {
            StreamState::Aborted {
                partial_text,
                metadata,
            } => {
                assert_eq!(partial_text, "half");
                assert_eq!(metadata.session_id.as_deref(), Some("s-1"));
            }
            other => panic!("expected Aborted, got {:?}", other),
        }
        // events after the terminal state are dropped
        state.apply(text("late"));
        assert!(matches!(state, StreamState::Aborted { .. }));
    }

    #[test]
    fn test_error_event_is_protocol_error() {
        let state = fold(vec![
            StreamEvent::Session {
                session_id: "s-1".into(),
                title: Some("Plans".into()),
            },
            text("x"),
            StreamEvent::Error { error: "boom".into() },
        ]);
        match &state {
            StreamState::Error {
                message,
                kind,
                metadata,
            } => {
                assert_eq!(message, "boom");
                assert_eq!(*kind, StreamErrorKind::Protocol);
                assert_eq!(metadata.session_id.as_deref(), Some("s-1"));
                assert_eq!(metadata.title.as_deref(), Some("Plans"));
            }
            other => panic!("expected Error, got {:?}", other),
        }
        assert_eq!(state.metadata().and_then(|m| m.session_id.as_deref()), Some("s-1"));
    }

    #[test]
    fn test_every_single_terminal_sequence_ends_terminal() {
        let prefixes: Vec<Vec<StreamEvent>> = vec![
            vec![],
            vec![session("s")],
            vec![session("s"), StreamEvent::Init { tools: vec![] }, text("t")],
            vec![StreamEvent::Unknown, StreamEvent::Thinking { content: "x".into() }],
        ];
        let terminals = vec![
            done(),
            StreamEvent::Aborted { message: None },
            StreamEvent::Error { error: "e".into() },
            StreamEvent::SessionUnavailable {
                session_id: None,
                reason: String::new(),
                has_markdown_history: false,
                message_count: 0,
            },
        ];
        for prefix in &prefixes {
            for terminal in &terminals {
                let mut events = prefix.clone();
                events.push(terminal.clone());
                let state = fold(events);
                assert!(state.is_terminal(), "not terminal: {:?}", state);
                assert!(!state.is_streaming());
            }
        }
    }

    #[test]
    fn test_resolve_without_condition_is_rejected() {
        let mut state = StreamState::Idle;
        assert!(state.resolve_unavailable(RecoveryChoice::InjectContext).is_err());
        assert_eq!(state, StreamState::Idle);
    }
}
