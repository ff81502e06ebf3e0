//! Export parsers.
//!
//! Pure functions that turn one external export format into ordered
//! canonical messages. Nothing here touches the file system; the import
//! pipeline feeds raw JSON in and decides what to persist.
//!
//! Both formats arrive as a JSON array of conversations. Each element is
//! decoded on its own so one malformed conversation does not poison the rest.

pub mod chatgpt;
pub mod claude;

use crate::error::{ContinuumError, Result};
use crate::import::ExportKind;
use crate::session::CanonicalMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub use chatgpt::ChatGptConversation;
pub use claude::{ClaudeConversation, ClaudeMemoryRecord, ClaudeProject};

/// One conversation mapped to the canonical model.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConversation {
    /// Conversation id in the export
    pub source_id: String,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub messages: Vec<CanonicalMessage>,
}

impl ParsedConversation {
    /// Earliest known time of the conversation.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.or_else(|| {
            self.messages
                .iter()
                .find(|m| !m.timestamp_inferred)
                .map(|m| m.timestamp)
        })
    }

    /// Latest known time of the conversation.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or_else(|| {
            self.messages
                .iter()
                .rev()
                .find(|m| !m.timestamp_inferred)
                .map(|m| m.timestamp)
        })
    }
}

/// Detects the export format from the first conversation object.
pub fn detect_kind(conversations: &[Value]) -> Option<ExportKind> {
    conversations.iter().find_map(|item| {
        let object = item.as_object()?;
        if object.contains_key("mapping") {
            Some(ExportKind::ChatGpt)
        } else if object.contains_key("chat_messages") {
            Some(ExportKind::Claude)
        } else {
            None
        }
    })
}

/// Decodes one raw conversation and maps it to canonical messages.
///
/// # Returns
///
/// - `Ok(Some(_))`: the conversation has something to import
/// - `Ok(None)`: the conversation is empty (no turns / empty active branch)
/// - `Err(_)`: the element does not match the format
pub fn parse_conversation(
    kind: ExportKind,
    raw: &Value,
    fallback: DateTime<Utc>,
) -> Result<Option<ParsedConversation>> {
    match kind {
        ExportKind::Claude => {
            let conversation = ClaudeConversation::deserialize_value(raw)?;
            if conversation.is_empty() {
                return Ok(None);
            }
            Ok(Some(conversation.parse(fallback)))
        }
        ExportKind::ChatGpt => {
            let conversation: ChatGptConversation = serde_json::from_value(raw.clone())?;
            let parsed = conversation.parse(fallback).ok_or_else(|| {
                ContinuumError::MalformedExport("conversation has no id".to_string())
            })?;
            if parsed.messages.is_empty() {
                return Ok(None);
            }
            Ok(Some(parsed))
        }
    }
}

/// Best-effort id and title of a raw conversation, for failure reports.
pub fn conversation_label(raw: &Value) -> (Option<String>, Option<String>) {
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| raw.get(*name).and_then(Value::as_str))
            .map(str::to_string)
    };
    (
        field(&["uuid", "id", "conversation_id"]),
        field(&["name", "title"]),
    )
}

impl ClaudeConversation {
    fn deserialize_value(raw: &Value) -> Result<Self> {
        Ok(serde_json::from_value(raw.clone())?)
    }
}

/// Reads an explicit `null` the same way as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses an RFC 3339 timestamp, returning `None` when absent or unparseable.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| tracing::debug!(value = %raw, error = %e, "Unparseable timestamp"))
        .ok()
}

/// Converts fractional epoch seconds to a UTC timestamp.
pub fn epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
