use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_archive_imported() -> bool {
    true
}

fn default_max_context_messages() -> usize {
    40
}

fn default_title_max_chars() -> usize {
    60
}

/// User-editable engine settings (`config.toml`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Overrides where session artifacts are stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Archived flag written on bulk-imported sessions.
    #[serde(default = "default_archive_imported")]
    pub archive_imported: bool,
    /// Trailing prior messages replayed when continuing an imported session.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
    /// Upper bound for titles inferred from the first message.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            archive_imported: default_archive_imported(),
            max_context_messages: default_max_context_messages(),
            title_max_chars: default_title_max_chars(),
            log_filter: None,
        }
    }
}
