//! Response finishing for a service hop.
//!
//! # Responsibilities
//! - Map handler errors to their HTTP status and body
//! - Record the outcome on the hop's server span
//! - Count the request once, tagged with its outcome
//!
//! # Design Decisions
//! - Every handler ends through `Hop::finish`, so no exit path skips the
//!   span status or the counter
//! - A hop dropped before `finish` (the request future was cancelled)
//!   still counts once, as `cancelled`, and its span closes as cancelled

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::error::ServiceError;
use crate::observability::{keys, Counter, ObservabilityContext, SpanHandle, CANCELLED};

/// Outcome tag for requests that produced a success response.
pub const OUTCOME_OK: &str = "ok";

/// One inbound request: its server span and the counter it is reported to.
pub struct Hop {
    span: SpanHandle,
    requests: Counter,
    finished: bool,
}

impl Hop {
    /// Open the server span `name` for a request with `headers`.
    pub fn start(
        obs: &ObservabilityContext,
        name: &'static str,
        headers: &HeaderMap,
        requests: &Counter,
    ) -> Self {
        Self {
            span: obs.start_server_span(name, headers),
            requests: requests.clone(),
            finished: false,
        }
    }

    pub fn span(&self) -> &SpanHandle {
        &self.span
    }

    pub fn span_mut(&mut self) -> &mut SpanHandle {
        &mut self.span
    }

    /// Turn a handler result into the response, recording it on the span and counter.
    pub fn finish(mut self, result: Result<Response, ServiceError>) -> Response {
        self.finished = true;
        let span = &mut self.span;

        let response = match result {
            Ok(response) => {
                self.requests.add(
                    1,
                    &[
                        (keys::TAG_OUTCOME, OUTCOME_OK.to_string()),
                        (keys::TAG_RESPONSE_STATUS, response.status().as_u16().to_string()),
                    ],
                );
                response
            }
            Err(e) => {
                let status = e.status();
                span.set_attribute(keys::ERROR_KIND, e.kind());
                span.set_attribute(keys::HTTP_RESPONSE_BODY, e.body());
                span.set_error(e.to_string());
                self.requests.add(
                    1,
                    &[
                        (keys::TAG_OUTCOME, e.kind().to_string()),
                        (keys::TAG_RESPONSE_STATUS, status.as_u16().to_string()),
                    ],
                );

                if status.is_server_error() {
                    tracing::error!(parent: span.tracing_span(), status = status.as_u16(), error = %e, "Request failed");
                } else {
                    tracing::warn!(parent: span.tracing_span(), status = status.as_u16(), error = %e, "Request rejected");
                }
                e.into_response()
            }
        };

        span.set_attribute(keys::HTTP_STATUS_CODE, i64::from(response.status().as_u16()));
        span.end();
        response
    }
}

impl Drop for Hop {
    fn drop(&mut self) {
        if !self.finished {
            self.requests.add(
                1,
                &[
                    (keys::TAG_OUTCOME, CANCELLED.to_string()),
                    (keys::TAG_RESPONSE_STATUS, CANCELLED.to_string()),
                ],
            );
        }
    }
}
