//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (GEOLOCATOR_SERVICE_URL, ISS_DISTANCE_SERVICE_URL, ...)
//!     → validation.rs (semantic checks for the selected role)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - A missing required downstream URL is a startup error, never a runtime one

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, DistanceConfig, DownstreamConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ServiceRole, TimeoutConfig,
};
pub use validation::{parse_http_url, validate_config, ValidationError};
