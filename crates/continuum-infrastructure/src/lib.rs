pub mod config_service;
pub mod fs_export_reader;
pub mod markdown;
pub mod markdown_session_store;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::fs_export_reader::FsExportReader;
pub use crate::markdown_session_store::MarkdownSessionStore;
pub use crate::paths::ContinuumPaths;
