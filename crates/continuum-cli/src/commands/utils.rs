use anyhow::Result;
use continuum_core::config::EngineConfig;
use continuum_infrastructure::{ConfigService, MarkdownSessionStore};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "warn,continuum_core=info,continuum_infrastructure=info,continuum_application=info";

/// The configuration service for the platform config file.
pub fn config_service() -> Result<ConfigService> {
    Ok(ConfigService::default_location()?)
}

/// Installs the stderr subscriber.
///
/// `RUST_LOG` wins over the configured `log_filter`, which wins over the default.
pub fn init_logging(config: &EngineConfig) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config
            .log_filter
            .as_deref()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn open_store(config: &EngineConfig) -> Result<MarkdownSessionStore> {
    Ok(MarkdownSessionStore::default_location(config).await?)
}

/// Shortens `text` to `max` characters for table output.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}
