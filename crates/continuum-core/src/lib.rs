//! Domain layer of the continuity engine.
//!
//! Holds the canonical message model, the session record, the exchange
//! state machine, the export parsers and the collaborator traits. Nothing
//! in this crate performs I/O.

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod session;

// Re-export common error type
pub use error::{ContinuumError, Result};
