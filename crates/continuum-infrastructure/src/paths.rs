//! Unified path management for continuum files.
//!
//! Platform directories are resolved through AppPaths from the
//! version-migrate crate, so every component agrees on one layout.

use continuum_core::config::EngineConfig;
use continuum_core::{ContinuumError, Result};
use std::path::PathBuf;
use version_migrate::AppPaths;

/// Unified path management for continuum.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/continuum/         # Config directory (AppPaths default)
/// └── config.toml              # Engine configuration
///
/// ~/.local/share/continuum/    # Data directory (overridable via `data_dir`)
/// ├── sessions/                # One markdown artifact per session
/// ├── context/                 # Context artifacts extracted from exports
/// └── .import.lock             # Held while an import runs
/// ```
pub struct ContinuumPaths;

impl ContinuumPaths {
    fn app_paths() -> AppPaths {
        AppPaths::new("continuum")
    }

    /// Returns the continuum configuration directory.
    pub fn config_dir() -> Result<PathBuf> {
        Self::app_paths()
            .config_dir()
            .map_err(|_| ContinuumError::config("Cannot resolve config directory"))
    }

    /// Returns the platform data directory.
    pub fn data_dir() -> Result<PathBuf> {
        Self::app_paths()
            .data_dir()
            .map_err(|_| ContinuumError::config("Cannot resolve data directory"))
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// The artifact root: `data_dir` from the config when set, the platform default otherwise.
    pub fn artifact_root(config: &EngineConfig) -> Result<PathBuf> {
        match &config.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::data_dir(),
        }
    }

    pub fn sessions_dir(config: &EngineConfig) -> Result<PathBuf> {
        Ok(Self::artifact_root(config)?.join("sessions"))
    }

    pub fn context_dir(config: &EngineConfig) -> Result<PathBuf> {
        Ok(Self::artifact_root(config)?.join("context"))
    }
}
