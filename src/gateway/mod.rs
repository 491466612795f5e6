//! Gateway orchestrator.
//!
//! # Data Flow
//! ```text
//! GET /?location=<place>
//!     → root span "gateway.request", gateway.requests
//!     → geolocator service      (client span, traceparent forwarded)
//!         non-2xx: status + body passed through, stop
//!     → iss-distance service    (client span, latitude/longitude)
//!         non-2xx: status + body passed through
//!     → 200, distance body relayed unmodified
//! ```
//!
//! # Design Decisions
//! - Calls are strictly sequential; the second needs the first's answer
//! - Every downstream failure is terminal for the request (PropagateFailure)
//! - Success bodies are decoded once to reject malformed answers, then the
//!   original bytes are relayed; failure bodies keep their content type
//! - A repeated `location` parameter resolves the first one

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tracing::Instrument;

use crate::error::{FailurePolicy, ServiceError, NO_LOCATION_GIVEN};
use crate::geo::{Coordinates, DistanceReport};
use crate::geolocator::LocationQuery;
use crate::http::{request_id, CallScope, DownstreamClient, Endpoint, Hop};
use crate::observability::{keys, Counter, ObservabilityContext};
use crate::resilience::Deadline;

/// Peer name of the coordinate resolver.
pub const GEOLOCATOR: &str = "geolocator-service";
/// Peer name of the distance service.
pub const ISS_DISTANCE: &str = "iss-distance-service";

/// Name of the root span of every gateway request.
pub const ROOT_SPAN: &str = "gateway.request";

const POLICY: FailurePolicy = FailurePolicy::PropagateFailure;

/// Shared state of the gateway handler.
#[derive(Clone)]
pub struct GatewayState {
    obs: ObservabilityContext,
    client: DownstreamClient,
    geolocator: Endpoint,
    distance: Endpoint,
    requests: Counter,
    request_budget: Duration,
}

impl GatewayState {
    pub fn new(
        obs: ObservabilityContext,
        client: DownstreamClient,
        geolocator_url: impl Into<String>,
        distance_url: impl Into<String>,
        request_budget: Duration,
    ) -> Self {
        let requests = obs.counter("gateway.requests", "Requests handled by the gateway");
        Self {
            obs,
            client,
            geolocator: Endpoint::new(GEOLOCATOR, "geolocator-service.locate", geolocator_url),
            distance: Endpoint::new(ISS_DISTANCE, "iss-distance-service.measure", distance_url),
            requests,
            request_budget,
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new().route("/", get(orchestrate)).with_state(state)
}

async fn orchestrate(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let query = LocationQuery::from_params(&params);
    let mut hop = Hop::start(&state.obs, ROOT_SPAN, &headers, &state.requests);
    let span = hop.span_mut();
    span.set_attribute(keys::HTTP_METHOD, "GET");
    span.set_attribute(keys::HTTP_ROUTE, "/");
    span.set_attribute(keys::FAILURE_POLICY, POLICY.as_str());
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
    let result = run(&state, query.location.as_deref(), &scope)
        .instrument(hop.span().tracing_span().clone())
        .await;

    hop.finish(result)
}

async fn run(
    state: &GatewayState,
    location: Option<&str>,
    scope: &CallScope<'_>,
) -> Result<Response, ServiceError> {
    let place = location
        .filter(|place| !place.is_empty())
        .ok_or(ServiceError::MissingParameter(NO_LOCATION_GIVEN))?;

    let reply = state
        .client
        .get(&state.geolocator, &[("location", place.to_string())], scope)
        .await?;
    if !reply.is_success() {
        return Err(reply.into_error(GEOLOCATOR));
    }
    let coordinates: Coordinates = reply.decode(GEOLOCATOR)?;
    tracing::debug!(place, %coordinates, "Location resolved");

    let reply = state
        .client
        .get(&state.distance, &coordinates.to_query(), scope)
        .await?;
    if !reply.is_success() {
        return Err(reply.into_error(ISS_DISTANCE));
    }
    let report: DistanceReport = reply.decode(ISS_DISTANCE)?;
    tracing::info!(
        place,
        distance_km = report.distance_km,
        satellite = %report.satellite_location,
        "Distance to ISS computed"
    );

    Ok(([(header::CONTENT_TYPE, "application/json")], reply.body).into_response())
}
