//! Configuration module for overline-daemon.
//!
//! The TOML file carries feed credentials and settlement tuning; the
//! database URL comes from the environment so deploy tooling can inject it.

pub mod file;

pub use file::{FeedConfig, FileConfig, SettlementConfig};

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Read and validate the configuration file.
pub fn load(path: impl AsRef<Path>) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.feed.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "feed.base_url must not be empty".to_string(),
        ));
    }
    if config.settlement.leagues.is_empty() {
        return Err(ConfigError::ValidationError(
            "settlement.leagues must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
