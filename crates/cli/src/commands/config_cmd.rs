//! `parley config`: Configuration management commands.

use parley_config::AppConfig;

const REDACTED: &str = "***";

fn config_path() -> std::path::PathBuf {
    std::env::var("PARLEY_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| AppConfig::config_dir().join("config.toml"))
}

pub fn path() {
    println!("{}", config_path().display());
}

/// Write the default config unless one already exists.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

/// Print the effective configuration with secrets masked.
pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.generation.api_key.is_some() {
        config.generation.api_key = Some(REDACTED.into());
    }
    if config.embedding.api_key.is_some() {
        config.embedding.api_key = Some(REDACTED.into());
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
