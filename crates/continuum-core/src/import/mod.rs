//! Import domain module.
//!
//! Value types exchanged by the import pipeline and the read-only
//! collaborator that hands it raw export files.

mod model;
mod reader;

pub use model::{
    ExportKind, ImportItemFailure, ImportPhase, ImportProgress, ImportResult, ImportScanResult,
    ProjectSummary,
};
pub use reader::{ExportFiles, ExportReader};
