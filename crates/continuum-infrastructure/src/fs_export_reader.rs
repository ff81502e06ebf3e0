//! File-system ExportReader implementation.

use async_trait::async_trait;
use continuum_core::import::{ExportFiles, ExportReader};
use continuum_core::{ContinuumError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

const CONVERSATIONS_FILE: &str = "conversations.json";
const MEMORIES_FILE: &str = "memories.json";
const PROJECTS_FILE: &str = "projects.json";

/// Reads unpacked export directories from the local file system.
#[derive(Debug, Default, Clone)]
pub struct FsExportReader;

impl FsExportReader {
    pub fn new() -> Self {
        Self
    }
}

async fn existing(path: PathBuf) -> Result<Option<PathBuf>> {
    Ok(fs::try_exists(&path).await?.then_some(path))
}

#[async_trait]
impl ExportReader for FsExportReader {
    async fn locate(&self, location: &Path) -> Result<ExportFiles> {
        let metadata = match fs::metadata(location).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContinuumError::export_not_found(location));
            }
            Err(e) => return Err(e.into()),
        };

        // A file location is the conversations file itself; siblings supply the rest.
        let (root, conversations) = if metadata.is_dir() {
            let root = location.to_path_buf();
            let conversations = existing(root.join(CONVERSATIONS_FILE)).await?;
            (root, conversations)
        } else {
            let root = location
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            (root, Some(location.to_path_buf()))
        };

        let files = ExportFiles {
            memories: existing(root.join(MEMORIES_FILE)).await?,
            projects: existing(root.join(PROJECTS_FILE)).await?,
            conversations,
            root,
        };
        tracing::debug!(?files, "Located export files");
        Ok(files)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path).await?)
    }
}
