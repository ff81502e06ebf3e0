use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The files that make up one export, as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFiles {
    /// The location the caller handed in
    pub root: PathBuf,
    /// `conversations.json`, if present
    pub conversations: Option<PathBuf>,
    /// `memories.json`, if present
    pub memories: Option<PathBuf>,
    /// `projects.json`, if present
    pub projects: Option<PathBuf>,
}

impl ExportFiles {
    pub fn has_supplementary_files(&self) -> bool {
        self.memories.is_some() || self.projects.is_some()
    }
}

/// Read-only access to raw export files.
#[async_trait]
pub trait ExportReader: Send + Sync {
    /// Resolves an export location (directory or `conversations.json` path).
    ///
    /// Fails with `ExportNotFound` only when the location itself does not exist.
    async fn locate(&self, location: &Path) -> Result<ExportFiles>;

    /// Reads a raw export file as text.
    async fn read_to_string(&self, path: &Path) -> Result<String>;
}
