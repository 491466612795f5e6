//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the three
//! services. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FailurePolicy;

/// Default live position endpoint.
pub const DEFAULT_ISS_NOW_URL: &str = "http://api.open-notify.org/iss-now.json";
/// Default geocoding endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Which service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Gateway,
    Geolocator,
    Distance,
}

impl ServiceRole {
    /// Service name reported in spans, logs and metrics.
    pub fn service_name(&self) -> &'static str {
        match self {
            ServiceRole::Gateway => "gateway",
            ServiceRole::Geolocator => "geolocator-service",
            ServiceRole::Distance => "iss-distance-service",
        }
    }
}

/// Root configuration shared by every service role.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Downstream endpoints.
    pub downstream: DownstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Distance service behaviour.
    pub distance: DistanceConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Downstream endpoints. Which ones are required depends on the role.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Coordinate resolver base URL (gateway only).
    pub geolocator_url: Option<String>,

    /// Distance service base URL (gateway only).
    pub iss_distance_url: Option<String>,

    /// Live ISS position endpoint (distance service only).
    pub iss_now_url: String,

    /// Geocoding search endpoint (geolocator only).
    pub nominatim_url: String,

    /// User agent sent to the geocoding provider.
    pub user_agent: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            geolocator_url: None,
            iss_distance_url: None,
            iss_now_url: DEFAULT_ISS_NOW_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: concat!("iss-tracker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout for downstream calls, in seconds.
    pub connect_secs: u64,

    /// Total budget of one inbound request, in seconds.
    pub request_secs: u64,

    /// Upper bound for a single downstream call, in seconds.
    pub upstream_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            upstream_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Deployment environment reported with every span.
    pub environment: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Closed spans buffered for export before new ones are dropped.
    pub span_buffer: usize,

    /// OTLP gRPC collector for spans and metrics. Spans are logged when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            environment: "dev".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            span_buffer: 1024,
            otlp_endpoint: None,
        }
    }
}

/// Distance service configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DistanceConfig {
    /// What to do when the live position lookup fails.
    pub iss_failure_policy: FailurePolicy,
}
