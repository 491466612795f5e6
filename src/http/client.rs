//! Outbound HTTP calls to downstream services.
//!
//! # Responsibilities
//! - Open a client span per call, as a child of the hop's current span
//! - Propagate `traceparent`, `x-request-id` and the remaining deadline
//! - Bound every call by the request deadline
//! - Map transport failures to `ServiceError`
//!
//! # Design Decisions
//! - Non-2xx answers are returned as `Ok(UpstreamReply)`; the caller's
//!   `FailurePolicy` decides what they mean
//! - One pooled `reqwest::Client` per process
//! - No retries

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::config::{DownstreamConfig, TimeoutConfig};
use crate::error::ServiceError;
use crate::http::request::X_REQUEST_ID;
use crate::observability::{keys, Counter, ObservabilityContext, SpanHandle, SpanKind};
use crate::resilience::Deadline;

/// A downstream service as seen by a caller.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Peer name used in spans, counters and error messages.
    pub service: &'static str,
    /// Name of the client span opened for each call.
    pub span_name: &'static str,
    pub url: String,
}

impl Endpoint {
    pub fn new(service: &'static str, span_name: &'static str, url: impl Into<String>) -> Self {
        Self {
            service,
            span_name,
            url: url.into(),
        }
    }
}

/// What every outbound call of one request inherits: the span to hang
/// client spans under, the request ID and the request deadline.
#[derive(Clone, Copy)]
pub struct CallScope<'a> {
    pub parent: &'a SpanHandle,
    pub request_id: Option<&'a str>,
    pub deadline: Deadline,
}

impl<'a> CallScope<'a> {
    /// Same request, client spans opened under `parent` instead.
    pub fn under(&self, parent: &'a SpanHandle) -> CallScope<'a> {
        CallScope { parent, ..*self }
    }
}

/// Status, content type and raw body of a completed downstream call.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode a success body, mapping a mismatch to `MalformedUpstreamResponse`.
    pub fn decode<T: DeserializeOwned>(&self, service: &'static str) -> Result<T, ServiceError> {
        serde_json::from_slice(&self.body).map_err(|e| ServiceError::MalformedUpstreamResponse {
            service,
            reason: e.to_string(),
        })
    }

    /// Turn a non-2xx reply into the pass-through error.
    pub fn into_error(self, service: &'static str) -> ServiceError {
        ServiceError::Upstream {
            service,
            status: self.status,
            content_type: self.content_type,
            body: self.body,
        }
    }
}

/// Shared HTTP client for every outbound call of a service.
#[derive(Clone)]
pub struct DownstreamClient {
    http: reqwest::Client,
    call_limit: std::time::Duration,
    requests: Counter,
}

impl DownstreamClient {
    pub fn new(
        timeouts: &TimeoutConfig,
        downstream: &DownstreamConfig,
        obs: &ObservabilityContext,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .user_agent(downstream.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            call_limit: timeouts.upstream(),
            requests: obs.counter("upstream.requests", "Outbound calls by peer and status"),
        })
    }

    /// `GET endpoint.url` with `query`, inside a client span under `scope.parent`.
    pub async fn get(
        &self,
        endpoint: &Endpoint,
        query: &[(&str, String)],
        scope: &CallScope<'_>,
    ) -> Result<UpstreamReply, ServiceError> {
        let mut span = scope.parent.child(endpoint.span_name, SpanKind::Client);
        span.set_attribute(keys::HTTP_METHOD, "GET");
        span.set_attribute(keys::HTTP_URL, endpoint.url.clone());
        span.set_attribute(keys::PEER_SERVICE, endpoint.service);

        let tracing_span = span.tracing_span().clone();
        let result = self
            .send(endpoint, query, &span, scope.request_id, scope.deadline)
            .instrument(tracing_span)
            .await;

        match &result {
            Ok(reply) => {
                span.set_attribute(keys::HTTP_STATUS_CODE, i64::from(reply.status.as_u16()));
                if !reply.is_success() {
                    span.set_error(format!("{} responded with {}", endpoint.service, reply.status));
                }
                self.count(endpoint.service, reply.status.as_u16().to_string());
            }
            Err(e) => {
                span.set_attribute(keys::ERROR_KIND, e.kind());
                span.set_error(e.to_string());
                self.count(endpoint.service, e.response_status_tag());
            }
        }
        span.end();
        result
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        query: &[(&str, String)],
        span: &SpanHandle,
        request_id: Option<&str>,
        deadline: Deadline,
    ) -> Result<UpstreamReply, ServiceError> {
        if deadline.is_expired() {
            tracing::warn!(peer = endpoint.service, "Request budget spent before downstream call");
            return Err(ServiceError::UpstreamTimeout {
                service: endpoint.service,
            });
        }

        let mut request = self
            .http
            .get(&endpoint.url)
            .query(query)
            .timeout(deadline.call_budget(self.call_limit))
            .build()
            .map_err(|e| transport_error(endpoint.service, e))?;

        let headers = request.headers_mut();
        span.inject(headers);
        deadline.inject(headers);
        if let Some(id) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
            headers.insert(X_REQUEST_ID, id);
        }

        tracing::debug!(peer = endpoint.service, url = %request.url(), "Calling downstream");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| transport_error(endpoint.service, e))?;
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint.service, e))?;

        tracing::debug!(peer = endpoint.service, status = status.as_u16(), "Downstream answered");
        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }

    fn count(&self, service: &'static str, status: String) {
        self.requests.add(
            1,
            &[
                (keys::TAG_SERVICE, service.to_string()),
                (keys::TAG_RESPONSE_STATUS, status),
            ],
        );
    }
}

fn transport_error(service: &'static str, error: reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        tracing::warn!(peer = service, error = %error, "Downstream call timed out");
        ServiceError::UpstreamTimeout { service }
    } else {
        tracing::warn!(peer = service, error = %error, "Downstream call failed");
        ServiceError::UpstreamUnavailable {
            service,
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::test_support::{in_memory, is_error, named};
    use crate::observability::TRACEPARENT_HEADER;
    use axum::{http::HeaderMap, routing::get, Router};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn scope(parent: &SpanHandle, budget: Duration) -> CallScope<'_> {
        CallScope {
            parent,
            request_id: None,
            deadline: Deadline::after(budget),
        }
    }

    fn client(obs: &ObservabilityContext) -> DownstreamClient {
        DownstreamClient::new(&TimeoutConfig::default(), &DownstreamConfig::default(), obs).unwrap()
    }

    #[tokio::test]
    async fn test_propagates_context_and_counts() {
        let seen: Arc<Mutex<Option<HeaderMap>>> = Arc::default();
        let captured = seen.clone();
        let url = serve(Router::new().route(
            "/",
            get(move |headers: HeaderMap| {
                *captured.lock().unwrap() = Some(headers);
                async { (StatusCode::NOT_FOUND, "nothing here") }
            }),
        ))
        .await;

        let (obs, exporter) = in_memory("caller");
        let mut root = obs.start_span("root", SpanKind::Server, None);
        let endpoint = Endpoint::new("peer", "call-peer", url);

        let reply = client(&obs)
            .get(
                &endpoint,
                &[("q", "x".to_string())],
                &CallScope {
                    parent: &root,
                    request_id: Some("req-1"),
                    deadline: Deadline::after(Duration::from_secs(5)),
                },
            )
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(&reply.body[..], b"nothing here");
        assert_eq!(
            reply.content_type.as_ref().unwrap(),
            "text/plain; charset=utf-8"
        );

        let headers = seen.lock().unwrap().clone().unwrap();
        let traceparent = headers.get(TRACEPARENT_HEADER).unwrap().to_str().unwrap();
        let root_context = root.span_context();
        assert!(traceparent.starts_with(&format!("00-{}-", root_context.trace_id())));
        assert_eq!(headers.get(X_REQUEST_ID).unwrap(), "req-1");
        assert!(headers.contains_key(crate::resilience::DEADLINE_HEADER));

        let client_span = &named(&exporter, "call-peer")[0];
        assert!(traceparent.contains(&client_span.span_context.span_id().to_string()));
        assert_eq!(client_span.parent_span_id, root_context.span_id());
        assert!(is_error(client_span));
        assert_eq!(obs.open_spans(), 1);
        root.end();
        assert_eq!(
            obs.counters()
                .value("upstream.requests", &[("service", "peer"), ("response.status", "404")]),
            1
        );
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (obs, _exporter) = in_memory("caller");
        let root = obs.start_span("root", SpanKind::Server, None);
        let endpoint = Endpoint::new("peer", "call-peer", format!("http://{addr}"));

        let err = client(&obs)
            .get(&endpoint, &[], &scope(&root, Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamUnavailable { service: "peer", .. }));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_slow_peer_times_out() {
        let url = serve(Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;

        let (obs, _exporter) = in_memory("caller");
        let root = obs.start_span("root", SpanKind::Server, None);
        let endpoint = Endpoint::new("peer", "call-peer", url);

        let err = client(&obs)
            .get(&endpoint, &[], &scope(&root, Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamTimeout { service: "peer" }));
        assert_eq!(
            obs.counters()
                .value("upstream.requests", &[("response.status", "timeout")]),
            1
        );
    }

    #[test]
    fn test_decode_mismatch_is_malformed() {
        let reply = UpstreamReply {
            status: StatusCode::OK,
            content_type: None,
            body: Bytes::from_static(b"{\"lat\": 1}"),
        };
        let err = reply
            .decode::<crate::geo::Coordinates>("geolocator")
            .unwrap_err();
        assert!(matches!(err, ServiceError::MalformedUpstreamResponse { .. }));
    }
}
