//! Configuration loading from disk.
//!
//! Format is selected by file extension: `.toml` (default), `.yaml`/`.yml`,
//! or `.json` (§6: "A YAML or JSON document whose shape is defined in §3").
//! A small, explicit set of environment variables can override fields after
//! parsing — no generic env-to-struct reflection, so the override surface
//! stays auditable.

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};
use std::fs;
use std::path::Path;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Validation(Vec<ValidationError>),
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

fn parse_by_extension(path: &Path, content: &str) -> Result<ProxyConfig, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        Some("json") => {
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        _ => toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
    }
}

/// Apply the small allowlist of environment variable overrides.
fn apply_env_overrides(config: &mut ProxyConfig) {
    if let Ok(v) = std::env::var("GATECORE_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Ok(v) = std::env::var("GATECORE_REDIS_URL") {
        config.coordination.url = v;
    }
    if let Ok(v) = std::env::var("GATECORE_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Ok(v) = std::env::var("GATECORE_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }
}

/// Load, override, and validate configuration from disk.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config = parse_by_extension(path, &content)?;

    apply_env_overrides(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
