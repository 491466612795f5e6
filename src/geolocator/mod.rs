//! Coordinate resolver service.
//!
//! # Data Flow
//! ```text
//! GET /?location=<place>
//!     → server span (continues the caller's trace)
//!     → "getting-coordinates-for-location" span
//!     → GeocodingProvider (Nominatim) client span
//!     → 200 {latitude, longitude} | 404 | 400 | 502
//! ```

pub mod nominatim;

pub use nominatim::{GeocodingProvider, NominatimProvider, NOMINATIM};

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::error::{ServiceError, NO_LOCATION_GIVEN};
use crate::http::{first_param, request_id, CallScope, Hop};
use crate::observability::{keys, Counter, ObservabilityContext, SpanKind};
use crate::resilience::Deadline;

/// Name of the span wrapping the provider lookup.
pub const LOOKUP_SPAN: &str = "getting-coordinates-for-location";

/// The `location` query parameter, shared with the gateway.
#[derive(Debug, Default)]
pub struct LocationQuery {
    pub location: Option<String>,
}

impl LocationQuery {
    /// Read from the raw parameter list; the first `location` wins.
    pub fn from_params(params: &[(String, String)]) -> Self {
        Self {
            location: first_param(params, "location").map(String::from),
        }
    }
}

/// Shared state of the geolocator handlers.
#[derive(Clone)]
pub struct GeolocatorState {
    obs: ObservabilityContext,
    provider: Arc<dyn GeocodingProvider>,
    requests: Counter,
    request_budget: Duration,
}

impl GeolocatorState {
    pub fn new(
        obs: ObservabilityContext,
        provider: Arc<dyn GeocodingProvider>,
        request_budget: Duration,
    ) -> Self {
        let requests = obs.counter("geolocator.requests", "Location lookups by outcome");
        Self {
            obs,
            provider,
            requests,
            request_budget,
        }
    }
}

pub fn router(state: GeolocatorState) -> Router {
    Router::new().route("/", get(locate)).with_state(state)
}

async fn locate(
    State(state): State<GeolocatorState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let query = LocationQuery::from_params(&params);
    let mut hop = Hop::start(&state.obs, "geolocator.request", &headers, &state.requests);
    let span = hop.span_mut();
    span.set_attribute(keys::HTTP_METHOD, "GET");
    span.set_attribute(keys::HTTP_ROUTE, "/");
    if let Some(id) = request_id(&headers) {
        span.set_attribute(keys::REQUEST_ID, id.to_string());
    }
    if let Some(location) = &query.location {
        span.set_attribute(keys::GEO_LOCATION, location.clone());
    }

    let scope = CallScope {
        parent: hop.span(),
        request_id: request_id(&headers),
        deadline: Deadline::from_headers(&headers, state.request_budget),
    };
    let result = resolve(&state, query.location.as_deref(), &scope)
        .instrument(hop.span().tracing_span().clone())
        .await;

    hop.finish(result)
}

async fn resolve(
    state: &GeolocatorState,
    location: Option<&str>,
    scope: &CallScope<'_>,
) -> Result<Response, ServiceError> {
    let place = location
        .filter(|place| !place.is_empty())
        .ok_or(ServiceError::MissingParameter(NO_LOCATION_GIVEN))?;

    let mut lookup = scope.parent.child(LOOKUP_SPAN, SpanKind::Internal);
    lookup.set_attribute(keys::GEO_LOCATION, place.to_string());

    let found = state
        .provider
        .geocode(place, &scope.under(&lookup))
        .instrument(lookup.tracing_span().clone())
        .await;

    let result = match found {
        Ok(Some(coordinates)) => {
            lookup.set_attribute(keys::GEO_LATITUDE, coordinates.latitude);
            lookup.set_attribute(keys::GEO_LONGITUDE, coordinates.longitude);
            tracing::debug!(place, %coordinates, "Location resolved");
            Ok(Json(coordinates).into_response())
        }
        Ok(None) => {
            lookup.set_error("no match");
            Err(ServiceError::NotFound(format!(
                "No coordinates found for location '{place}'"
            )))
        }
        Err(e) => {
            lookup.set_attribute(keys::ERROR_KIND, e.kind());
            lookup.set_error(e.to_string());
            Err(e)
        }
    };
    lookup.end();
    result
}
