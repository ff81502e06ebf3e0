use super::message::CanonicalMessage;
use super::stream::SessionUnavailableInfo;
use serde::{Deserialize, Serialize};

/// What opening a session view resolved to. Computed once per activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ContinuityDecision {
    /// No session bound; the next send starts a new one.
    FreshSession,
    /// A native session the backend can resume.
    ResumeSession { session_id: String },
    /// An imported session shown read-only until the user continues it.
    ContinueFromImported {
        original_session_id: String,
        prior_messages: Vec<CanonicalMessage>,
    },
    /// The backend cannot resume the native session; the user must choose.
    RecoveryNeeded(SessionUnavailableInfo),
}
