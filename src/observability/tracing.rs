//! Request-scoped spans and W3C Trace Context propagation.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests (`traceparent`)
//! - Propagate trace context to downstream requests
//! - Provide scoped span handles that close on every exit path
//!
//! # Design Decisions
//! - Spans are OpenTelemetry SDK spans; the handle owns the OTel `Context`
//!   holding its span, so children and outbound calls hang off it directly
//! - Parents are passed explicitly; async handlers do not rely on an
//!   ambient "current span" to build the tree
//! - A handle dropped before `end` marks its span `ERROR cancelled`, so a
//!   handler future abandoned mid-flight still shows up in the trace
//! - Each handle also owns a `tracing::Span` carrying `trace_id`/`span_id`,
//!   so log lines emitted inside a hop are correlated with the trace

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue, Value};

use super::ObservabilityContext;

/// W3C Trace Context header name.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Status description of a span whose work was abandoned before it completed.
pub const CANCELLED: &str = "cancelled";

/// Reads propagation fields from request headers.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// Writes propagation fields into request headers.
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let name = HeaderName::from_bytes(key.as_bytes());
        let value = HeaderValue::from_str(&value);
        if let (Ok(name), Ok(value)) = (name, value) {
            self.0.insert(name, value);
        }
    }
}

/// Scoped handle for an open span.
///
/// Call `end` once the span's work is done. Dropping an un-ended handle
/// closes the span as cancelled.
pub struct SpanHandle {
    obs: ObservabilityContext,
    cx: Context,
    span: tracing::Span,
    failed: bool,
    ended: bool,
}

impl SpanHandle {
    pub(crate) fn open(
        obs: ObservabilityContext,
        name: &'static str,
        kind: SpanKind,
        parent: &Context,
    ) -> Self {
        let otel_span = obs
            .tracer()
            .span_builder(name)
            .with_kind(kind.clone())
            .start_with_context(obs.tracer(), parent);
        let cx = parent.with_span(otel_span);

        let span_context = cx.span().span_context().clone();
        let span = tracing::info_span!(
            "hop",
            service = %obs.service(),
            otel.name = name,
            otel.kind = ?kind,
            trace_id = %span_context.trace_id(),
            span_id = %span_context.span_id(),
            otel.status_code = tracing::field::Empty,
        );

        Self {
            obs,
            cx,
            span,
            failed: false,
            ended: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn span_context(&self) -> opentelemetry::trace::SpanContext {
        self.cx.span().span_context().clone()
    }

    /// The `tracing` span log lines of this hop should be emitted under.
    pub fn tracing_span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn set_attribute(&mut self, key: &'static str, value: impl Into<Value>) {
        self.cx.span().set_attribute(KeyValue::new(key, value));
    }

    /// Mark the span as failed.
    pub fn set_error(&mut self, description: impl Into<String>) {
        self.failed = true;
        self.cx.span().set_status(Status::error(description.into()));
    }

    /// Open a child span of this one within the same service.
    pub fn child(&self, name: &'static str, kind: SpanKind) -> SpanHandle {
        self.obs.start_span(name, kind, Some(&self.cx))
    }

    /// Write this span's `traceparent` into outgoing request headers.
    pub fn inject(&self, headers: &mut HeaderMap) {
        self.obs
            .propagator()
            .inject_context(&self.cx, &mut HeaderInjector(headers));
    }

    /// Close the span. Later calls are no-ops.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        let status = if self.failed { "ERROR" } else { "OK" };
        if !self.failed {
            self.cx.span().set_status(Status::Ok);
        }
        self.span.record("otel.status_code", status);
        self.cx.span().end();
        self.obs.span_closed();
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if !self.failed {
            tracing::warn!(parent: &self.span, "Span dropped before its work completed");
            self.set_error(CANCELLED);
        }
        self.end();
    }
}
