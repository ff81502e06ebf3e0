//! Session store trait.
//!
//! Defines the interface for the local artifact store: session records,
//! imported message content and supplementary context artifacts.

use super::message::CanonicalMessage;
use super::model::Session;
use crate::error::Result;
use async_trait::async_trait;
use std::any::Any;

/// Guard returned by [`SessionStore::acquire_import_lock`].
///
/// The lock is held for as long as the guard lives.
pub struct ImportLockGuard {
    _inner: Box<dyn Any + Send + Sync>,
}

impl ImportLockGuard {
    pub fn new(inner: impl Any + Send + Sync) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

impl std::fmt::Debug for ImportLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ImportLockGuard")
    }
}

/// An abstract store for session artifacts.
///
/// This trait decouples the engine from the concrete storage mechanism
/// (markdown files, database, in-memory for tests).
///
/// # Implementation Notes
///
/// Implementations should:
/// - Write each artifact in a single atomic step, so a cancelled import
///   never leaves a partially written file behind
/// - Keep message content only for sessions whose content is owned locally
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Checks whether a session record with the given id exists.
    ///
    /// Context artifacts live in their own namespace and are not consulted.
    async fn exists(&self, session_id: &str) -> Result<bool>;

    /// Reads the metadata of a session.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn read_session_metadata(&self, session_id: &str) -> Result<Option<Session>>;

    /// Reads the locally owned messages of a session, in turn order.
    ///
    /// Returns an empty list for pointer-only (native) sessions.
    async fn read_session_messages(&self, session_id: &str) -> Result<Vec<CanonicalMessage>>;

    /// Writes a session record together with its locally owned messages.
    ///
    /// Pointer records are written with an empty message slice.
    async fn write_session(&self, session: &Session, messages: &[CanonicalMessage]) -> Result<()>;

    /// Lists all session records, most recently updated first.
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Writes a context artifact unless one with the same id already exists.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Artifact created
    /// - `Ok(false)`: Artifact already existed and was left untouched
    async fn write_context_artifact(&self, artifact_id: &str, content: &str) -> Result<bool>;

    /// Takes the store-wide import lock, failing fast if another import holds it.
    async fn acquire_import_lock(&self) -> Result<ImportLockGuard>;
}
