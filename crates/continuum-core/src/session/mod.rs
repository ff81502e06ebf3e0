//! Session domain module.
//!
//! This module contains all session-related domain models, the store
//! interface, protocol events and the exchange state machine.
//!
//! # Module Structure
//!
//! - `model`: Session record (`Session`, `SessionSource`, `ContentOwner`)
//! - `message`: Canonical message types (`MessageRole`, `CanonicalMessage`)
//! - `event`: Protocol events of one exchange (`StreamEvent`)
//! - `stream`: Exchange state machine (`StreamState`)
//! - `repository`: Store trait for session artifacts
//! - `continuity`: Session activation decisions (`ContinuityDecision`)

mod continuity;
mod event;
mod message;
mod model;
mod repository;
mod stream;

// Re-export public API
pub use continuity::ContinuityDecision;
pub use event::{StreamEvent, tool_output_text};
pub use message::{CanonicalMessage, MessageRole};
pub use model::{ContentOwner, Session, SessionSource, import_identity, infer_title};
pub use repository::{ImportLockGuard, SessionStore};
pub use stream::{
    AssistantMessage, ExchangeMetadata, RecoveryChoice, SessionUnavailableInfo, StreamErrorKind,
    StreamState, StreamingExchange, ToolCallRecord,
};
