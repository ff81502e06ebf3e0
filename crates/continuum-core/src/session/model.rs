//! Session domain model.
//!
//! A [`Session`] record is the local "pointer" for a conversation. Native
//! sessions keep only metadata locally because the backend owns their
//! message log; imported sessions own their content locally in full.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where a session originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum SessionSource {
    /// Started in this client against the backend.
    #[serde(rename = "native")]
    #[strum(serialize = "native")]
    Native,
    /// Imported from a Claude export (flat-list format).
    #[serde(rename = "claude-import")]
    #[strum(serialize = "claude-import")]
    ClaudeImport,
    /// Imported from a ChatGPT export (parent-pointer tree format).
    #[serde(rename = "chatgpt-import")]
    #[strum(serialize = "chatgpt-import")]
    ChatGptImport,
}

impl SessionSource {
    pub fn is_import(self) -> bool {
        !matches!(self, SessionSource::Native)
    }

    /// Which side owns the message content for sessions of this source.
    pub fn content_owner(self) -> ContentOwner {
        if self.is_import() {
            ContentOwner::Local
        } else {
            ContentOwner::Remote
        }
    }
}

/// Two-tier ownership of session message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentOwner {
    /// Full message content lives in the local artifact.
    Local,
    /// The backend's durable log owns the content; locally there is only metadata.
    Remote,
}

/// Represents a conversation session in the application's domain layer.
///
/// This is the "pure" domain model that business logic operates on,
/// independent of the artifact format it is stored in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Stable session identifier. Imported sessions use their import identity.
    pub id: String,
    /// Human-readable session title (derived or set)
    pub title: Option<String>,
    /// Origin of the session
    pub source: SessionSource,
    /// Who owns the message content
    pub content_owner: ContentOwner,
    /// Conversation id in the external export, for imported sessions
    pub source_id: Option<String>,
    /// When the conversation started
    pub created_at: DateTime<Utc>,
    /// Last time the session was accessed or extended
    pub updated_at: DateTime<Utc>,
    /// When the session was imported
    pub imported_at: Option<DateTime<Utc>>,
    /// Archived sessions are hidden from default listings
    pub archived: bool,
    /// Number of locally owned messages
    pub message_count: usize,
    /// Imported session this native session was seeded from
    pub continued_from: Option<String>,
    /// Backend model that served the latest exchange
    pub model: Option<String>,
}

impl Session {
    /// Creates a pointer record for a native session.
    pub fn native(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: None,
            source: SessionSource::Native,
            content_owner: ContentOwner::Remote,
            source_id: None,
            created_at: now,
            updated_at: now,
            imported_at: None,
            archived: false,
            message_count: 0,
            continued_from: None,
            model: None,
        }
    }

    /// Creates the record of an imported conversation.
    pub fn imported(
        source: SessionSource,
        source_id: impl Into<String>,
        title: Option<String>,
        created_at: DateTime<Utc>,
        imported_at: DateTime<Utc>,
    ) -> Self {
        let source_id = source_id.into();
        Self {
            id: import_identity(source, &source_id),
            title,
            source,
            content_owner: source.content_owner(),
            source_id: Some(source_id),
            created_at,
            updated_at: imported_at,
            imported_at: Some(imported_at),
            archived: false,
            message_count: 0,
            continued_from: None,
            model: None,
        }
    }

    pub fn is_imported(&self) -> bool {
        self.source.is_import()
    }

    /// Title for display, falling back to a generic label.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Untitled conversation")
    }
}

/// Builds the stable `{source-kind}-{source-conversation-id}` import identity.
pub fn import_identity(source: SessionSource, source_id: &str) -> String {
    let prefix = match source {
        SessionSource::ClaudeImport => "claude",
        SessionSource::ChatGptImport => "chatgpt",
        SessionSource::Native => "native",
    };
    format!("{}-{}", prefix, source_id)
}

/// Derives a title from the first user message of a conversation.
///
/// Takes the first non-empty line, trimmed, and bounds it to `max_chars`
/// characters (an ellipsis marks truncation).
pub fn infer_title(first_message: &str, max_chars: usize) -> Option<String> {
    let line = first_message.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.chars().count() <= max_chars {
        return Some(line.to_string());
    }
    let truncated: String = line.chars().take(max_chars.saturating_sub(1)).collect();
    Some(format!("{}…", truncated.trim_end()))
}
