//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{AppConfig, ServiceRole};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variables overriding file values.
pub const ENV_GEOLOCATOR_URL: &str = "GEOLOCATOR_SERVICE_URL";
pub const ENV_ISS_DISTANCE_URL: &str = "ISS_DISTANCE_SERVICE_URL";
pub const ENV_ISS_NOW_URL: &str = "ISS_NOW_URL";
pub const ENV_NOMINATIM_URL: &str = "NOMINATIM_URL";
pub const ENV_BIND_ADDRESS: &str = "BIND_ADDRESS";
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration for `role`: the optional TOML file, then environment
/// overrides, then validation.
pub fn load_config(path: Option<&Path>, role: ServiceRole) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config, role).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = lookup(ENV_GEOLOCATOR_URL) {
        config.downstream.geolocator_url = Some(url);
    }
    if let Some(url) = lookup(ENV_ISS_DISTANCE_URL) {
        config.downstream.iss_distance_url = Some(url);
    }
    if let Some(url) = lookup(ENV_ISS_NOW_URL) {
        config.downstream.iss_now_url = url;
    }
    if let Some(url) = lookup(ENV_NOMINATIM_URL) {
        config.downstream.nominatim_url = url;
    }
    if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
    if let Some(endpoint) = lookup(ENV_OTLP_ENDPOINT) {
        config.observability.otlp_endpoint = Some(endpoint);
    }
}
