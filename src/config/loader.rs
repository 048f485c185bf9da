//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ServiceConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Semantic validation; serde already handled the syntactic side.
/// Collects every problem instead of stopping at the first.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.is_empty() {
        errors.push("listener.bind_address must not be empty".to_string());
    }
    if config.timeouts.request_secs == 0 {
        errors.push("timeouts.request_secs must be greater than zero".to_string());
    }
    if config.timeouts.drain_grace_secs == 0 {
        errors.push("timeouts.drain_grace_secs must be greater than zero".to_string());
    }
    if config.persistence.snapshot_path.as_os_str().is_empty() {
        errors.push("persistence.snapshot_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
