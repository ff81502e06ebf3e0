//! Markdown-file based SessionStore implementation.

use crate::markdown::{SessionArtifact, parse_session_artifact, render_session_artifact};
use crate::paths::ContinuumPaths;
use crate::storage::{FileLock, create_new_atomic, write_atomic};
use async_trait::async_trait;
use continuum_core::config::EngineConfig;
use continuum_core::session::{CanonicalMessage, ImportLockGuard, Session, SessionStore};
use continuum_core::{ContinuumError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

const SESSIONS_DIR: &str = "sessions";
const CONTEXT_DIR: &str = "context";
const IMPORT_LOCK: &str = ".import.lock";
const EXTENSION: &str = "md";

/// Session store keeping one markdown artifact per session.
///
/// Directory structure:
/// ```text
/// base_dir/
/// ├── sessions/
/// │   ├── claude-xyz.md        # imported: full content
/// │   └── 0b6f...e2.md         # native: pointer record only
/// ├── context/
/// │   └── claude-memory.md
/// └── .import.lock
/// ```
pub struct MarkdownSessionStore {
    base_dir: PathBuf,
}

impl MarkdownSessionStore {
    /// Creates a store at the artifact root resolved from the config.
    pub async fn default_location(config: &EngineConfig) -> Result<Self> {
        let base_dir = ContinuumPaths::artifact_root(config)?;
        Self::new(base_dir).await
    }

    /// Creates a store rooted at `base_dir`, creating its directories.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join(SESSIONS_DIR)).await?;
        fs::create_dir_all(base_dir.join(CONTEXT_DIR)).await?;
        tracing::debug!(base_dir = %base_dir.display(), "Opened markdown session store");
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// File path of a session artifact.
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join(SESSIONS_DIR)
            .join(artifact_file_name(session_id))
    }

    /// File path of a context artifact.
    pub fn context_path(&self, artifact_id: &str) -> PathBuf {
        self.base_dir
            .join(CONTEXT_DIR)
            .join(artifact_file_name(artifact_id))
    }

    async fn read_artifact(&self, session_id: &str) -> Result<Option<SessionArtifact>> {
        let path = self.session_path(session_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let artifact = parse_session_artifact(&content).map_err(|e| {
            ContinuumError::data_access(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Some(artifact))
    }
}

/// Maps an artifact id to a portable file name.
///
/// Bytes outside `[A-Za-z0-9._-]` are written as `%XX`, so distinct ids
/// never share a file.
fn artifact_file_name(artifact_id: &str) -> String {
    let mut stem = String::with_capacity(artifact_id.len());
    for byte in artifact_id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    format!("{}.{}", stem, EXTENSION)
}

#[async_trait]
impl SessionStore for MarkdownSessionStore {
    async fn exists(&self, session_id: &str) -> Result<bool> {
        Ok(fs::try_exists(self.session_path(session_id)).await?)
    }

    async fn read_session_metadata(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.read_artifact(session_id).await?.map(|a| a.session))
    }

    async fn read_session_messages(&self, session_id: &str) -> Result<Vec<CanonicalMessage>> {
        match self.read_artifact(session_id).await? {
            Some(artifact) => Ok(artifact.messages),
            None => Err(ContinuumError::not_found("Session", session_id)),
        }
    }

    async fn write_session(&self, session: &Session, messages: &[CanonicalMessage]) -> Result<()> {
        let document = render_session_artifact(session, messages)?;
        write_atomic(&self.session_path(&session.id), &document).await?;
        tracing::debug!(session_id = %session.id, messages = messages.len(), "Wrote session artifact");
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let dir = self.base_dir.join(SESSIONS_DIR);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let parsed = match fs::read_to_string(&path).await {
                Ok(content) => parse_session_artifact(&content),
                Err(e) => Err(e.into()),
            };
            match parsed {
                Ok(artifact) => sessions.push(artifact.session),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session artifact");
                }
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn write_context_artifact(&self, artifact_id: &str, content: &str) -> Result<bool> {
        let created = create_new_atomic(&self.context_path(artifact_id), content).await?;
        if !created {
            tracing::debug!(artifact_id = %artifact_id, "Context artifact already exists; left untouched");
        }
        Ok(created)
    }

    async fn acquire_import_lock(&self) -> Result<ImportLockGuard> {
        let path = self.base_dir.join(IMPORT_LOCK);
        match FileLock::try_acquire(&path)? {
            Some(lock) => Ok(ImportLockGuard::new(lock)),
            None => Err(ContinuumError::ImportInProgress {
                path: path.display().to_string(),
            }),
        }
    }
}
