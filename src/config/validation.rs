//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the downstream URLs the selected role depends on
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of the config and the role
//! - Runs before any listener is bound; a failure is fatal at startup

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{AppConfig, ServiceRole};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required (set {env})")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    #[error("{field} is not a valid http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be shorter than {limit}")]
    NotShorter {
        field: &'static str,
        limit: &'static str,
    },
}

/// Validate `config` for the given role.
pub fn validate_config(config: &AppConfig, role: ServiceRole) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);

    match role {
        ServiceRole::Gateway => {
            check_required_url(
                "downstream.geolocator_url",
                "GEOLOCATOR_SERVICE_URL",
                config.downstream.geolocator_url.as_deref(),
                &mut errors,
            );
            check_required_url(
                "downstream.iss_distance_url",
                "ISS_DISTANCE_SERVICE_URL",
                config.downstream.iss_distance_url.as_deref(),
                &mut errors,
            );
        }
        ServiceRole::Geolocator => {
            check_url("downstream.nominatim_url", &config.downstream.nominatim_url, &mut errors);
            if config.downstream.user_agent.trim().is_empty() {
                errors.push(ValidationError::Empty {
                    field: "downstream.user_agent",
                });
            }
        }
        ServiceRole::Distance => {
            check_url("downstream.iss_now_url", &config.downstream.iss_now_url, &mut errors);
        }
    }

    for (field, value) in [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    // A downstream call must give up before the whole request does.
    if config.timeouts.upstream_secs >= config.timeouts.request_secs {
        errors.push(ValidationError::NotShorter {
            field: "timeouts.upstream_secs",
            limit: "timeouts.request_secs",
        });
    }

    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }
    if config.observability.span_buffer == 0 {
        errors.push(ValidationError::Zero {
            field: "observability.span_buffer",
        });
    }
    if let Some(endpoint) = config.observability.otlp_endpoint.as_deref() {
        check_url("observability.otlp_endpoint", endpoint, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse a downstream base URL, accepting only http and https.
pub fn parse_http_url(value: &str) -> Option<Url> {
    Url::parse(value)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

fn check_required_url(
    field: &'static str,
    env: &'static str,
    value: Option<&str>,
    errors: &mut Vec<ValidationError>,
) {
    match value {
        Some(v) if !v.trim().is_empty() => check_url(field, v, errors),
        _ => errors.push(ValidationError::Missing { field, env }),
    }
}

fn check_url(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if parse_http_url(value).is_none() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
