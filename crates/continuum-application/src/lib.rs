//! Application layer of the continuity engine.
//!
//! Use cases orchestrating the domain types of `continuum-core` over the
//! store, export reader and backend collaborators.

pub mod continuity_manager;
pub mod engine;
pub mod import_pipeline;
pub mod stream_consumer;

pub use continuity_manager::{Continuation, ContinuityManager};
pub use engine::{ContinuityEngine, ExchangeHandle};
pub use import_pipeline::{ImportOptions, ImportPipeline, ImportRun};
pub use stream_consumer::{Exchange, ExchangeId, SessionStreamConsumer};
