//! Error taxonomy shared by the three services.
//!
//! # Design Decisions
//! - Every variant maps to exactly one HTTP status; bodies are plain text
//! - `Upstream` carries the downstream status, content type and raw body
//!   bytes so the gateway can pass them through verbatim
//! - Whether a downstream failure fails the hop or degrades it is a
//!   `FailurePolicy` chosen per component, not control flow

use axum::{
    body::Bytes,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body returned when the gateway or geolocator gets no `location`.
pub const NO_LOCATION_GIVEN: &str = "No location given";
/// Body returned when the distance service misses a coordinate.
pub const NO_COORDINATES_GIVEN: &str = "No latitude/longitude given";
/// Body returned when the distance service gets unusable coordinates.
pub const INVALID_COORDINATES_GIVEN: &str = "Invalid latitude/longitude given";

/// Errors surfaced by request handlers.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// A required query parameter was absent or empty.
    #[error("{0}")]
    MissingParameter(&'static str),

    /// A query parameter was present but unusable.
    #[error("{0}")]
    InvalidParameter(&'static str),

    /// Valid input with no result.
    #[error("{0}")]
    NotFound(String),

    /// A downstream service answered with a non-success status.
    #[error("{service} responded with {status}")]
    Upstream {
        service: &'static str,
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// A downstream call failed without a usable answer.
    #[error("{service} request failed: {reason}")]
    UpstreamUnavailable {
        service: &'static str,
        reason: String,
    },

    /// The request budget ran out while waiting on a downstream service.
    #[error("{service} did not answer in time")]
    UpstreamTimeout { service: &'static str },

    /// A downstream success body did not decode into the expected payload.
    #[error("malformed response from {service}: {reason}")]
    MalformedUpstreamResponse {
        service: &'static str,
        reason: String,
    },
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::MissingParameter(_) | ServiceError::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Upstream { status, .. } => *status,
            ServiceError::UpstreamUnavailable { .. }
            | ServiceError::MalformedUpstreamResponse { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Stable, low-cardinality name used in span attributes and counter tags.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::MissingParameter(_) => "missing_parameter",
            ServiceError::InvalidParameter(_) => "invalid_parameter",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Upstream { .. } => "upstream_error",
            ServiceError::UpstreamUnavailable { .. } => "upstream_unavailable",
            ServiceError::UpstreamTimeout { .. } => "upstream_timeout",
            ServiceError::MalformedUpstreamResponse { .. } => "malformed_upstream_response",
        }
    }

    /// Value of the `response.status` tag for a failed downstream call.
    pub fn response_status_tag(&self) -> String {
        match self {
            ServiceError::Upstream { status, .. } => status.as_u16().to_string(),
            ServiceError::UpstreamTimeout { .. } => "timeout".to_string(),
            ServiceError::MalformedUpstreamResponse { .. } => "malformed".to_string(),
            _ => "error".to_string(),
        }
    }

    /// Body sent to the client, as text. Non-UTF-8 upstream bytes are replaced.
    pub fn body(&self) -> String {
        match self {
            ServiceError::Upstream { body, .. } => String::from_utf8_lossy(body).into_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Upstream {
                status,
                content_type: Some(content_type),
                body,
                ..
            } => (status, [(header::CONTENT_TYPE, content_type)], body).into_response(),
            ServiceError::Upstream { status, body, .. } => (status, body).into_response(),
            other => (other.status(), other.to_string()).into_response(),
        }
    }
}

/// How a component reacts when a downstream dependency fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the request with the downstream error.
    PropagateFailure,
    /// Answer with a documented sentinel value and report success.
    #[default]
    DegradeToSentinel,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::PropagateFailure => "propagate_failure",
            FailurePolicy::DegradeToSentinel => "degrade_to_sentinel",
        }
    }
}
