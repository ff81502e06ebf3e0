//! Canonical conversation message types.
//!
//! Every external export format and every completed exchange is normalized
//! into [`CanonicalMessage`] before it reaches storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message from the user.
    #[strum(serialize = "Human")]
    Human,
    /// Message from the AI assistant.
    #[strum(serialize = "Assistant")]
    Assistant,
}

/// A single message in a conversation history.
///
/// Messages are owned by exactly one session and kept in turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The text body, verbatim from the source.
    pub text: String,
    /// When the message was written.
    pub timestamp: DateTime<Utc>,
    /// True when the source carried no timestamp and `timestamp` is the
    /// import-time fallback.
    #[serde(default)]
    pub timestamp_inferred: bool,
    /// Number of attachments/files the source message referenced.
    #[serde(default)]
    pub attachment_count: u32,
}

impl CanonicalMessage {
    /// Creates a message with a known timestamp and no attachments.
    pub fn new(role: MessageRole, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp,
            timestamp_inferred: false,
            attachment_count: 0,
        }
    }

    /// Creates a message stamped with a fallback time because the source had none.
    pub fn with_inferred_timestamp(
        role: MessageRole,
        text: impl Into<String>,
        fallback: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp_inferred: true,
            ..Self::new(role, text, fallback)
        }
    }

    pub fn with_attachments(mut self, count: u32) -> Self {
        self.attachment_count = count;
        self
    }

    pub fn is_human(&self) -> bool {
        self.role == MessageRole::Human
    }
}
