//! ISS distance service.
//!
//! # Data Flow
//! ```text
//! GET /?latitude=<lat>&longitude=<lon>
//!     → server span (continues the caller's trace), incoming.requests
//!     → parse + range-check the location
//!     → SatelliteTracker (live fix, or {0, 0} when degraded)
//!     → DistanceFn (geodesic km, 2 dp)
//!     → 200 {distance, location}
//! ```

pub mod position;

pub use position::{
    OpenNotifySource, PositionFix, PositionSource, SatelliteTracker, ISS_NOW, POSITION_SPAN,
};

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

use crate::error::{ServiceError, INVALID_COORDINATES_GIVEN, NO_COORDINATES_GIVEN};
use crate::geo::{Coordinates, DistanceFn, DistanceReport};
use crate::http::{first_param, request_id, CallScope, Hop};
use crate::observability::{keys, Counter, ObservabilityContext, SpanHandle};
use crate::resilience::Deadline;

#[derive(Debug, Default)]
pub struct CoordinatesQuery {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl CoordinatesQuery {
    /// Read from the raw parameter list; the first of each parameter wins.
    pub fn from_params(params: &[(String, String)]) -> Self {
        Self {
            latitude: first_param(params, "latitude").map(String::from),
            longitude: first_param(params, "longitude").map(String::from),
        }
    }

    /// The location to measure from.
    ///
    /// Absent or empty parameters are `MissingParameter`; values that do not
    /// parse or fall outside the coordinate ranges are `InvalidParameter`.
    pub fn location(&self) -> Result<Coordinates, ServiceError> {
        let given = |v: &Option<String>| v.clone().filter(|v| !v.trim().is_empty());
        let (Some(latitude), Some(longitude)) = (given(&self.latitude), given(&self.longitude))
        else {
            return Err(ServiceError::MissingParameter(NO_COORDINATES_GIVEN));
        };

        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| ServiceError::InvalidParameter(INVALID_COORDINATES_GIVEN))
        };
        let location = Coordinates::new(parse(&latitude)?, parse(&longitude)?);
        if !location.is_in_range() {
            return Err(ServiceError::InvalidParameter(INVALID_COORDINATES_GIVEN));
        }
        Ok(location)
    }
}

/// Shared state of the distance handlers.
#[derive(Clone)]
pub struct DistanceState {
    obs: ObservabilityContext,
    tracker: Arc<SatelliteTracker>,
    distance: DistanceFn,
    requests: Counter,
    request_budget: Duration,
}

impl DistanceState {
    pub fn new(
        obs: ObservabilityContext,
        tracker: Arc<SatelliteTracker>,
        distance: DistanceFn,
        request_budget: Duration,
    ) -> Self {
        let requests = obs.counter("incoming.requests", "Requests made to the service");
        Self {
            obs,
            tracker,
            distance,
            requests,
            request_budget,
        }
    }
}

pub fn router(state: DistanceState) -> Router {
    Router::new().route("/", get(measure)).with_state(state)
}

async fn measure(
    State(state): State<DistanceState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let query = CoordinatesQuery::from_params(&params);
    let mut hop = Hop::start(&state.obs, "iss-distance.request", &headers, &state.requests);
    let span = hop.span_mut();
    span.set_attribute(keys::HTTP_METHOD, "GET");
    span.set_attribute(keys::HTTP_ROUTE, "/");
    if let Some(id) = request_id(&headers) {
        span.set_attribute(keys::REQUEST_ID, id.to_string());
    }

    let tracing_span = span.tracing_span().clone();
    let result = compute(&state, span, &headers, &query)
        .instrument(tracing_span)
        .await;

    hop.finish(result)
}

async fn compute(
    state: &DistanceState,
    span: &mut SpanHandle,
    headers: &HeaderMap,
    query: &CoordinatesQuery,
) -> Result<Response, ServiceError> {
    let location = query.location()?;
    span.set_attribute(keys::GEO_LATITUDE, location.latitude);
    span.set_attribute(keys::GEO_LONGITUDE, location.longitude);

    let scope = CallScope {
        parent: &*span,
        request_id: request_id(headers),
        deadline: Deadline::from_headers(headers, state.request_budget),
    };
    let fix = state.tracker.current_position(&scope).await?;
    let satellite = fix.coordinates();

    let report = DistanceReport {
        distance_km: (state.distance)(&location, &satellite),
        satellite_location: satellite,
    };
    span.set_attribute(keys::DISTANCE_KM, report.distance_km);
    span.set_attribute(keys::ISS_DEGRADED, fix.is_degraded());
    tracing::debug!(
        %location,
        satellite = %satellite,
        distance_km = report.distance_km,
        degraded = fix.is_degraded(),
        "Distance computed"
    );

    Ok(Json(report).into_response())
}
