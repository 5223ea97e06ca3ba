//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable names consumed by the loader.
pub const ENV_ENABLED: &str = "INGEST_API_ENABLED";
pub const ENV_SECRET: &str = "INGEST_API_SECRET";
pub const ENV_SECRET_NEXT: &str = "INGEST_API_SECRET_NEXT";
pub const ENV_ENVIRONMENT: &str = "INGEST_ENVIRONMENT";
pub const ENV_BIND_ADDRESS: &str = "INGEST_BIND_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
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

/// Load and validate configuration from a TOML file, then apply
/// environment overrides.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults plus environment overrides only.
/// Used when no config file is present.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    apply_env(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides onto a loaded configuration.
///
/// Secrets and the enable flag only ever come from the environment so
/// they never land in a config file checked into source control.
fn apply_env(config: &mut GatewayConfig) {
    if let Ok(v) = std::env::var(ENV_ENABLED) {
        config.api.enabled = matches!(v.as_str(), "1" | "true" | "yes");
    }
    if let Ok(v) = std::env::var(ENV_SECRET) {
        config.api.active_secret = v;
    }
    if let Ok(v) = std::env::var(ENV_SECRET_NEXT) {
        if !v.is_empty() {
            config.api.next_secret = Some(v);
        }
    }
    if let Ok(v) = std::env::var(ENV_ENVIRONMENT) {
        config.api.environment = v;
    }
    if let Ok(v) = std::env::var(ENV_BIND_ADDRESS) {
        config.listener.bind_address = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [rate_limit]
            capacity = 10.0
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.rate_limit.capacity, 10.0);
        // Untouched sections keep their defaults.
        assert_eq!(config.idempotency.ttl_secs, 24 * 60 * 60);
        assert!(!config.api.enabled);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.rate_limit.capacity, 60.0);
        assert_eq!(config.rate_limit.refill_per_second, 1.0);
        assert_eq!(config.timeouts.request_secs, 30);
    }
}
