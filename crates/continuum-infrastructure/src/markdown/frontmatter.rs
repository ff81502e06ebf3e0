//! Frontmatter DTO (anti-corruption layer between the artifact file and `Session`).

use chrono::{DateTime, Utc};
use continuum_core::session::{ContentOwner, Session, SessionSource};
use serde::{Deserialize, Serialize};

/// Current frontmatter schema version.
pub const FRONTMATTER_VERSION: &str = "1.0.0";

fn default_version() -> String {
    FRONTMATTER_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFrontmatter {
    #[serde(default = "default_version")]
    pub version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source: SessionSource,
    pub content_owner: ContentOwner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continued_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl From<&Session> for SessionFrontmatter {
    fn from(session: &Session) -> Self {
        Self {
            version: default_version(),
            id: session.id.clone(),
            title: session.title.clone(),
            source: session.source,
            content_owner: session.content_owner,
            source_id: session.source_id.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            imported_at: session.imported_at,
            archived: session.archived,
            message_count: session.message_count,
            continued_from: session.continued_from.clone(),
            model: session.model.clone(),
        }
    }
}

impl From<SessionFrontmatter> for Session {
    fn from(dto: SessionFrontmatter) -> Self {
        Session {
            id: dto.id,
            title: dto.title,
            source: dto.source,
            content_owner: dto.content_owner,
            source_id: dto.source_id,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
            imported_at: dto.imported_at,
            archived: dto.archived,
            message_count: dto.message_count,
            continued_from: dto.continued_from,
            model: dto.model,
        }
    }
}
