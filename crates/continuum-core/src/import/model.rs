//! Import value types: scan summary, progress snapshots and the final result.

use crate::session::SessionSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The two supported external export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExportKind {
    /// Flat list of conversations with ordered turns.
    Claude,
    /// Parent-pointer tree per conversation.
    #[strum(serialize = "chatgpt")]
    #[serde(rename = "chatgpt")]
    ChatGpt,
}

impl ExportKind {
    pub fn session_source(self) -> SessionSource {
        match self {
            ExportKind::Claude => SessionSource::ClaudeImport,
            ExportKind::ChatGpt => SessionSource::ChatGptImport,
        }
    }

    /// Id of the single context artifact an import of this kind may create.
    pub fn context_artifact_id(self) -> String {
        format!("{}-memory", self)
    }
}

/// Project metadata found in an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub count: usize,
    pub names: Vec<String>,
}

/// Read-only summary of an external export. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportScanResult {
    /// `None` when the export could not be read or holds nothing recognizable.
    pub source_kind: Option<ExportKind>,
    pub total_conversations: usize,
    pub non_empty_conversations: usize,
    pub has_memory: bool,
    pub projects: Option<ProjectSummary>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

impl ImportScanResult {
    /// The zero-valued result for a missing or malformed export.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImportPhase {
    Scanning,
    Importing,
    Complete,
    Error,
}

/// A point-in-time progress snapshot. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub current_title: Option<String>,
    pub processed: usize,
    pub total: usize,
    pub phase: ImportPhase,
    pub error: Option<String>,
}

impl ImportProgress {
    pub fn scanning() -> Self {
        Self {
            current_title: None,
            processed: 0,
            total: 0,
            phase: ImportPhase::Scanning,
            error: None,
        }
    }

    pub fn importing(title: impl Into<String>, processed: usize, total: usize) -> Self {
        Self {
            current_title: Some(title.into()),
            processed,
            total,
            phase: ImportPhase::Importing,
            error: None,
        }
    }

    pub fn complete(processed: usize, total: usize) -> Self {
        Self {
            current_title: None,
            processed,
            total,
            phase: ImportPhase::Complete,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            current_title: None,
            processed: 0,
            total: 0,
            phase: ImportPhase::Error,
            error: Some(error.into()),
        }
    }
}

/// One conversation that could not be transformed or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportItemFailure {
    /// Source conversation id, when it could be read
    pub conversation_id: Option<String>,
    pub title: Option<String>,
    pub reason: String,
}

/// Terminal outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub source_kind: Option<ExportKind>,
    pub conversations_imported: usize,
    pub context_files_created: usize,
    /// Ids of the artifacts this run created
    pub created_artifacts: Vec<String>,
    /// Import identities skipped because they already existed
    pub skipped_existing: Vec<String>,
    pub failures: Vec<ImportItemFailure>,
    /// Set when the run stopped early on request
    pub cancelled: bool,
}
