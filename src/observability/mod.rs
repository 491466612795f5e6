//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handlers produce:
//!     → tracing.rs (OTel span handles, W3C trace context in/out)
//!     → metrics.rs (tagged counters, latency histogram)
//!     → logging.rs (structured log events under the hop's span)
//!
//! Consumers:
//!     → export.rs (batch span processor → OTLP collector or span_export log records)
//!     → Metrics endpoint (Prometheus scrape) and OTLP metrics push
//!     → Log aggregation (stdout, pretty or JSON)
//! ```
//!
//! # Design Decisions
//! - One `ObservabilityContext` per service, built at startup and passed
//!   into every component; spans go through its own `TracerProvider`
//!   rather than the OTel global, so several services can share a process
//! - Trace ids travel between services in the `traceparent` header
//! - Counters are cheap (sharded map + facade increment)

pub mod export;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::export::{resource, tracer_provider, LogSpanExporter};
pub use self::metrics::{Counter, CounterRegistry};
pub use self::tracing::{HeaderExtractor, HeaderInjector, SpanHandle, CANCELLED, TRACEPARENT_HEADER};
pub use opentelemetry::trace::SpanKind;

use axum::http::HeaderMap;
use opentelemetry::global;
use opentelemetry::metrics::Meter;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::Context;
use opentelemetry_sdk::export::trace::SpanExporter;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

struct Inner {
    service: String,
    provider: TracerProvider,
    tracer: Tracer,
    propagator: TraceContextPropagator,
    meter: Meter,
    counters: Arc<CounterRegistry>,
    open_spans: AtomicUsize,
    started_spans: AtomicU64,
}

/// Telemetry handle of one service: span factory, counter registry and
/// export pipeline.
#[derive(Clone)]
pub struct ObservabilityContext {
    inner: Arc<Inner>,
}

impl ObservabilityContext {
    /// Build on `provider`, whose resource should name `service`.
    pub fn new(service: impl Into<String>, provider: TracerProvider) -> Self {
        let service = service.into();
        let tracer = provider.tracer(service.clone());
        let meter = global::meter(Box::leak(service.clone().into_boxed_str()));
        Self {
            inner: Arc::new(Inner {
                service,
                provider,
                tracer,
                propagator: TraceContextPropagator::new(),
                meter,
                counters: Arc::new(CounterRegistry::new()),
                open_spans: AtomicUsize::new(0),
                started_spans: AtomicU64::new(0),
            }),
        }
    }

    /// Context exporting every span synchronously to `exporter`.
    pub fn with_exporter(service: &str, exporter: impl SpanExporter + 'static) -> Self {
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter)
            .with_config(
                opentelemetry_sdk::trace::Config::default().with_resource(resource(service, "local")),
            )
            .build();
        Self::new(service, provider)
    }

    /// Service name of every span.
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// Open a span. Without a parent the span starts a new trace.
    pub fn start_span(
        &self,
        name: &'static str,
        kind: SpanKind,
        parent: Option<&Context>,
    ) -> SpanHandle {
        self.inner.open_spans.fetch_add(1, Ordering::Relaxed);
        self.inner.started_spans.fetch_add(1, Ordering::Relaxed);
        match parent {
            Some(parent) => SpanHandle::open(self.clone(), name, kind, parent),
            None => SpanHandle::open(self.clone(), name, kind, &Context::new()),
        }
    }

    /// Open the server span of an inbound request, continuing the caller's
    /// trace when the request carries a valid `traceparent`.
    pub fn start_server_span(&self, name: &'static str, headers: &HeaderMap) -> SpanHandle {
        let parent = self
            .inner
            .propagator
            .extract_with_context(&Context::new(), &HeaderExtractor(headers));
        self.start_span(name, SpanKind::Server, Some(&parent))
    }

    /// Handle to the counter `name`. Handles to the same name share one series set.
    pub fn counter(&self, name: &'static str, description: &'static str) -> Counter {
        ::metrics::describe_counter!(name, description);
        let instrument = self
            .inner
            .meter
            .u64_counter(name)
            .with_description(description)
            .with_unit("1")
            .init();
        Counter::new(name, self.inner.counters.clone(), instrument)
    }

    pub fn counters(&self) -> &CounterRegistry {
        &self.inner.counters
    }

    /// Spans opened and not yet closed.
    pub fn open_spans(&self) -> usize {
        self.inner.open_spans.load(Ordering::Relaxed)
    }

    /// Spans opened since startup.
    pub fn started_spans(&self) -> u64 {
        self.inner.started_spans.load(Ordering::Relaxed)
    }

    pub(crate) fn tracer(&self) -> &Tracer {
        &self.inner.tracer
    }

    pub(crate) fn propagator(&self) -> &TraceContextPropagator {
        &self.inner.propagator
    }

    pub(crate) fn span_closed(&self) {
        self.inner.open_spans.fetch_sub(1, Ordering::Relaxed);
    }

    /// Flush queued spans and stop the export pipeline.
    pub async fn shutdown(&self) {
        // The batch processor blocks on its worker, which needs the runtime.
        let provider = self.inner.provider.clone();
        let flushed = tokio::task::spawn_blocking(move || {
            for result in provider.force_flush() {
                if let Err(e) = result {
                    ::tracing::warn!(error = %e, "Span flush failed");
                }
            }
            provider.shutdown()
        })
        .await;

        match flushed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => ::tracing::warn!(error = %e, "Span exporter shutdown failed"),
            Err(e) => ::tracing::warn!(error = %e, "Span exporter shutdown task ended abnormally"),
        }
        ::tracing::debug!(
            service = %self.inner.service,
            open_spans = self.open_spans(),
            "Observability pipeline drained"
        );
    }
}
