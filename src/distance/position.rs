//! Live satellite position lookup.
//!
//! # Responsibilities
//! - Fetch the current ISS position from the Open Notify endpoint
//! - Count every lookup in `iss.requests`, tagged with the answer status
//! - Apply the configured `FailurePolicy` when the lookup fails
//!
//! # Design Decisions
//! - Only a 200 answer is a live fix; anything else is a failed lookup
//! - Under `DegradeToSentinel` a failed lookup yields `{0, 0}` and the
//!   request still succeeds; the failure shows on the span and in the logs

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::Instrument;

use crate::error::{FailurePolicy, ServiceError};
use crate::geo::Coordinates;
use crate::http::{CallScope, DownstreamClient, Endpoint};
use crate::observability::{keys, Counter, ObservabilityContext, SpanKind};

/// Peer name of the position endpoint.
pub const ISS_NOW: &str = "iss-now";

/// Name of the span wrapping one position lookup.
pub const POSITION_SPAN: &str = "getting-iss-position";

/// Supplies the satellite's current position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self, scope: &CallScope<'_>) -> Result<Coordinates, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct IssNow {
    iss_position: IssPosition,
}

#[derive(Debug, Deserialize)]
struct IssPosition {
    latitude: String,
    longitude: String,
}

/// `GET iss-now.json` from Open Notify.
pub struct OpenNotifySource {
    client: DownstreamClient,
    endpoint: Endpoint,
}

impl OpenNotifySource {
    pub fn new(client: DownstreamClient, url: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: Endpoint::new(ISS_NOW, "iss-now.fetch", url),
        }
    }
}

#[async_trait]
impl PositionSource for OpenNotifySource {
    async fn current_position(&self, scope: &CallScope<'_>) -> Result<Coordinates, ServiceError> {
        let reply = self.client.get(&self.endpoint, &[], scope).await?;
        if reply.status != StatusCode::OK {
            return Err(reply.into_error(ISS_NOW));
        }

        let now: IssNow = reply.decode(ISS_NOW)?;
        let malformed = |field: &str| ServiceError::MalformedUpstreamResponse {
            service: ISS_NOW,
            reason: format!("unparseable {field}"),
        };
        let latitude = now
            .iss_position
            .latitude
            .trim()
            .parse()
            .map_err(|_| malformed("latitude"))?;
        let longitude = now
            .iss_position
            .longitude
            .trim()
            .parse()
            .map_err(|_| malformed("longitude"))?;
        Ok(Coordinates::new(latitude, longitude))
    }
}

/// Result of a position lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionFix {
    Live(Coordinates),
    /// The lookup failed and the sentinel position stands in.
    Degraded { reason: String },
}

impl PositionFix {
    /// Position to compute against; `Coordinates::UNKNOWN` when degraded.
    pub fn coordinates(&self) -> Coordinates {
        match self {
            PositionFix::Live(c) => *c,
            PositionFix::Degraded { .. } => Coordinates::UNKNOWN,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PositionFix::Degraded { .. })
    }
}

/// Position lookups with counting and failure policy applied.
pub struct SatelliteTracker {
    source: Arc<dyn PositionSource>,
    policy: FailurePolicy,
    requests: Counter,
}

impl SatelliteTracker {
    pub fn new(
        obs: &ObservabilityContext,
        source: Arc<dyn PositionSource>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            source,
            policy,
            requests: obs.counter("iss.requests", "Lookups of the live ISS position"),
        }
    }

    /// Look up the current position inside a span under `scope.parent`.
    pub async fn current_position(&self, scope: &CallScope<'_>) -> Result<PositionFix, ServiceError> {
        let mut span = scope.parent.child(POSITION_SPAN, SpanKind::Internal);
        span.set_attribute(keys::FAILURE_POLICY, self.policy.as_str());

        let result = self
            .source
            .current_position(&scope.under(&span))
            .instrument(span.tracing_span().clone())
            .await;

        let fix = match result {
            Ok(position) => {
                self.count(StatusCode::OK.as_u16().to_string());
                span.set_attribute(keys::ISS_LATITUDE, position.latitude);
                span.set_attribute(keys::ISS_LONGITUDE, position.longitude);
                span.set_attribute(keys::ISS_DEGRADED, false);
                Ok(PositionFix::Live(position))
            }
            Err(e) => {
                self.count(e.response_status_tag());
                span.set_attribute(keys::ERROR_KIND, e.kind());
                span.set_error(e.to_string());

                match self.policy {
                    FailurePolicy::PropagateFailure => Err(as_bad_gateway(e)),
                    FailurePolicy::DegradeToSentinel => {
                        span.set_attribute(keys::ISS_DEGRADED, true);
                        tracing::warn!(
                            parent: span.tracing_span(),
                            error = %e,
                            "ISS position unavailable, reporting {}",
                            Coordinates::UNKNOWN
                        );
                        Ok(PositionFix::Degraded {
                            reason: e.to_string(),
                        })
                    }
                }
            }
        };
        span.end();
        fix
    }

    fn count(&self, status: String) {
        self.requests
            .add(1, &[(keys::TAG_RESPONSE_STATUS, status)]);
    }
}

/// The position endpoint's own status is not ours to relay.
fn as_bad_gateway(error: ServiceError) -> ServiceError {
    match error {
        ServiceError::Upstream { service, status, .. } => ServiceError::UpstreamUnavailable {
            service,
            reason: format!("responded with {status}"),
        },
        other => other,
    }
}
