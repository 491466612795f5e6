//! ISS distance tracker library
//!
//! Three HTTP services answering "how far is the ISS from location X?",
//! with one trace spanning all of them.

pub mod config;
pub mod distance;
pub mod error;
pub mod gateway;
pub mod geo;
pub mod geolocator;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::AppConfig;
pub use error::{FailurePolicy, ServiceError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use observability::ObservabilityContext;
