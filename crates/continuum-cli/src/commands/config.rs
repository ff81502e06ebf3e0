use anyhow::Result;
use continuum_core::config::EngineConfig;
use continuum_infrastructure::{ConfigService, ContinuumPaths};

pub fn show(service: &ConfigService, config: &EngineConfig) -> Result<()> {
    println!("# config file: {}", service.path().display());
    println!("# sessions:    {}", ContinuumPaths::sessions_dir(config)?.display());
    println!("# context:     {}", ContinuumPaths::context_dir(config)?.display());
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

pub fn init(service: &ConfigService) -> Result<()> {
    let path = service.path();
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }
    service.save_config(&EngineConfig::default())?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
