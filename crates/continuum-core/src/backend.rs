//! Backend session collaborator.
//!
//! The backend owns the durable log of native sessions and serves
//! exchanges as ordered streams of [`StreamEvent`]s.

use crate::error::{ContinuumError, Result};
use crate::session::{RecoveryChoice, SessionUnavailableInfo, StreamEvent};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Ordered events of one exchange. An `Err` item means the transport broke.
pub type EventStream = BoxStream<'static, std::result::Result<StreamEvent, ContinuumError>>;

/// Outcome of probing whether a native session can be resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumable,
    Unavailable(SessionUnavailableInfo),
}

/// Per-send options passed through to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Set on the first send after the user resolved `SessionUnavailable`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_mode: Option<RecoveryChoice>,
    /// Imported session the new native session continues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continued_from: Option<String>,
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    /// `None` asks the backend to create a new session.
    pub session_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub options: SendOptions,
}

/// Abstract backend that resumes sessions and streams exchanges.
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Probes whether the backend can resume the given native session.
    async fn resume(&self, session_id: &str) -> Result<ResumeOutcome>;

    /// Sends a message and returns the event sequence of the exchange.
    ///
    /// An `Err` here means the exchange could not be started at all.
    async fn send(&self, request: SendRequest) -> Result<EventStream>;
}
