//! Flat-list export format (Claude).
//!
//! Each conversation carries an already ordered list of turns, so parsing is
//! a straight mapping. Conversations whose turn list is empty are dropped;
//! that decision looks at the turn count only.

use super::{ParsedConversation, parse_timestamp};
use crate::session::{CanonicalMessage, MessageRole};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeConversation {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub chat_messages: Vec<ClaudeTurn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeTurn {
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub sender: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub content: Vec<ClaudeContentBlock>,
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub attachments: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub files: Vec<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeContentBlock {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "crate::export::null_as_default"
    )]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Entry of `memories.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudeMemoryRecord {
    #[serde(default)]
    pub conversations_memory: Option<String>,
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub project_memories: BTreeMap<String, String>,
}

impl ClaudeMemoryRecord {
    pub fn is_empty(&self) -> bool {
        self.conversations_memory
            .as_deref()
            .is_none_or(|m| m.trim().is_empty())
            && self.project_memories.values().all(|m| m.trim().is_empty())
    }
}

/// Entry of `projects.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeProject {
    pub uuid: String,
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ClaudeConversation {
    /// Empty means zero turns, regardless of what the turns contain.
    pub fn is_empty(&self) -> bool {
        self.chat_messages.is_empty()
    }

    /// Maps the turns to canonical messages, in source order.
    ///
    /// `fallback` stamps turns that carry no parseable timestamp.
    pub fn to_messages(&self, fallback: DateTime<Utc>) -> Vec<CanonicalMessage> {
        self.chat_messages
            .iter()
            .filter_map(|turn| turn.to_message(fallback))
            .collect()
    }

    pub fn parse(&self, fallback: DateTime<Utc>) -> ParsedConversation {
        ParsedConversation {
            source_id: self.uuid.clone(),
            title: self.name.clone().filter(|n| !n.trim().is_empty()),
            created_at: parse_timestamp(self.created_at.as_deref()),
            updated_at: parse_timestamp(self.updated_at.as_deref()),
            messages: self.to_messages(fallback),
        }
    }
}

impl ClaudeTurn {
    fn role(&self) -> Option<MessageRole> {
        match self.sender.as_str() {
            "human" | "user" => Some(MessageRole::Human),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }

    /// `text` verbatim; content blocks only when `text` is missing or empty.
    fn body(&self) -> String {
        match self.text.as_deref() {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => self
                .content
                .iter()
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn to_message(&self, fallback: DateTime<Utc>) -> Option<CanonicalMessage> {
        let Some(role) = self.role() else {
            tracing::debug!(sender = %self.sender, "Skipping turn with unrecognized sender");
            return None;
        };
        let text = self.body();
        let message = match parse_timestamp(self.created_at.as_deref()) {
            Some(timestamp) => CanonicalMessage::new(role, text, timestamp),
            None => CanonicalMessage::with_inferred_timestamp(role, text, fallback),
        };
        let attachments = (self.attachments.len() + self.files.len()) as u32;
        Some(message.with_attachments(attachments))
    }
}
