//! Configuration service implementation.
//!
//! Loads the engine configuration from `config.toml` in the continuum
//! config directory.

use crate::paths::ContinuumPaths;
use crate::storage::AtomicTomlFile;
use continuum_core::config::EngineConfig;
use continuum_core::{ContinuumError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the engine configuration.
#[derive(Clone)]
pub struct ConfigService {
    file: Arc<AtomicTomlFile<EngineConfig>>,
    cached: Arc<RwLock<Option<EngineConfig>>>,
}

impl ConfigService {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: Arc::new(AtomicTomlFile::new(path)),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a service for the platform config file.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(ContinuumPaths::config_file()?))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Returns the configuration, reading the file on first access.
    ///
    /// A missing or empty file yields the defaults; a malformed one is a
    /// `Config` error.
    pub fn get_config(&self) -> Result<EngineConfig> {
        if let Some(cached) = self.read_cache()?.as_ref() {
            return Ok(cached.clone());
        }

        let loaded = self
            .file
            .load()
            .map_err(|e| {
                ContinuumError::config(format!(
                    "Failed to load {}: {}",
                    self.file.path().display(),
                    e
                ))
            })?
            .unwrap_or_default();

        *self.write_cache()? = Some(loaded.clone());
        Ok(loaded)
    }

    /// Persists the configuration and refreshes the cache.
    pub fn save_config(&self, config: &EngineConfig) -> Result<()> {
        self.file.save(config)?;
        *self.write_cache()? = Some(config.clone());
        tracing::info!(path = %self.file.path().display(), "Saved configuration");
        Ok(())
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) -> Result<()> {
        *self.write_cache()? = None;
        Ok(())
    }

    fn read_cache(&self) -> Result<std::sync::RwLockReadGuard<'_, Option<EngineConfig>>> {
        self.cached
            .read()
            .map_err(|_| ContinuumError::internal("config cache lock poisoned"))
    }

    fn write_cache(&self) -> Result<std::sync::RwLockWriteGuard<'_, Option<EngineConfig>>> {
        self.cached
            .write()
            .map_err(|_| ContinuumError::internal("config cache lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));
        assert_eq!(service.get_config().unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_save_then_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let service = ConfigService::new(path.clone());

        let config = EngineConfig {
            data_dir: Some(temp_dir.path().join("data")),
            archive_imported: false,
            ..EngineConfig::default()
        };
        service.save_config(&config).unwrap();

        let fresh = ConfigService::new(path);
        assert_eq!(fresh.get_config().unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "archive_imported = \"sometimes\"").unwrap();

        let err = ConfigService::new(path).get_config().unwrap_err();
        assert!(matches!(err, ContinuumError::Config(_)));
    }

    #[test]
    fn test_cache_until_invalidated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let service = ConfigService::new(path.clone());
        assert!(service.get_config().unwrap().archive_imported);

        std::fs::write(&path, "archive_imported = false\n").unwrap();
        assert!(service.get_config().unwrap().archive_imported);

        service.invalidate_cache().unwrap();
        assert!(!service.get_config().unwrap().archive_imported);
    }
}
