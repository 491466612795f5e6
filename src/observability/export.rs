//! Span export pipeline.
//!
//! # Responsibilities
//! - Build the service's `TracerProvider` with its `Resource`
//!   (`service.name`, `deployment.environment`)
//! - Export over OTLP when a collector endpoint is configured
//! - Otherwise write one structured log record per span
//!
//! # Design Decisions
//! - Spans leave request tasks through a bounded batch processor; a full
//!   queue drops spans instead of stalling the request
//! - An OTLP exporter that cannot be built falls back to the log exporter
//!   with a warning; telemetry never blocks startup

use futures_util::future::BoxFuture;
use opentelemetry::trace::{SpanId, Status};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, Config, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};

use super::keys;
use crate::config::ObservabilityConfig;

/// Resource attached to every span of `service`.
pub fn resource(service: &str, environment: &str) -> Resource {
    Resource::new([
        KeyValue::new(keys::SERVICE_NAME, service.to_string()),
        KeyValue::new(keys::DEPLOYMENT_ENVIRONMENT, environment.to_string()),
    ])
}

/// Tracer provider for `service` as configured by `observability.*`.
///
/// Must be called from within a Tokio runtime.
pub fn tracer_provider(service: &str, config: &ObservabilityConfig) -> TracerProvider {
    let trace_config = || Config::default().with_resource(resource(service, &config.environment));
    let batch = || {
        BatchConfigBuilder::default()
            .with_max_queue_size(config.span_buffer)
            .build()
    };

    if let Some(endpoint) = config.otlp_endpoint.as_deref() {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint);
        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(trace_config())
            .with_batch_config(batch())
            .install_batch(runtime::Tokio)
        {
            Ok(provider) => {
                tracing::info!(endpoint, "OTLP span exporter configured");
                return provider;
            }
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "Failed to create OTLP exporter, logging spans instead");
            }
        }
    }

    let exporter = LogSpanExporter::new(service, &config.environment);
    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
        .with_batch_config(batch())
        .build();
    TracerProvider::builder()
        .with_span_processor(processor)
        .with_config(trace_config())
        .build()
}

/// Exporter writing spans as structured log records under the
/// `span_export` target, so any log collector doubles as a span sink.
#[derive(Debug, Clone)]
pub struct LogSpanExporter {
    service: String,
    environment: String,
}

impl LogSpanExporter {
    pub fn new(service: &str, environment: &str) -> Self {
        Self {
            service: service.to_string(),
            environment: environment.to_string(),
        }
    }

    fn write(&self, span: &SpanData) {
        let attributes = span
            .attributes
            .iter()
            .map(|kv| format!("{}={}", kv.key.as_str(), kv.value))
            .collect::<Vec<_>>()
            .join(" ");
        let parent = if span.parent_span_id == SpanId::INVALID {
            String::new()
        } else {
            span.parent_span_id.to_string()
        };
        let (status, description) = match &span.status {
            Status::Error { description } => ("ERROR", description.as_ref()),
            Status::Ok => ("OK", ""),
            Status::Unset => ("UNSET", ""),
        };
        let duration = span
            .end_time
            .duration_since(span.start_time)
            .unwrap_or_default();

        tracing::info!(
            target: "span_export",
            service = %self.service,
            deployment.environment = %self.environment,
            name = %span.name,
            kind = ?span.span_kind,
            trace_id = %span.span_context.trace_id(),
            span_id = %span.span_context.span_id(),
            parent_span_id = %parent,
            status,
            status.description = description,
            duration_ms = duration.as_secs_f64() * 1000.0,
            attributes = %attributes,
            "span"
        );
    }
}

impl SpanExporter for LogSpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        for span in &batch {
            self.write(span);
        }
        Box::pin(std::future::ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{ObservabilityContext, SpanKind};

    #[test]
    fn test_resource_names_service_and_environment() {
        let resource = resource("gateway", "prod");
        assert_eq!(
            resource.get(keys::SERVICE_NAME.into()).map(|v| v.to_string()).as_deref(),
            Some("gateway")
        );
        assert_eq!(
            resource
                .get(keys::DEPLOYMENT_ENVIRONMENT.into())
                .map(|v| v.to_string())
                .as_deref(),
            Some("prod")
        );
    }

    #[test]
    fn test_log_exporter_accepts_spans() {
        let obs = ObservabilityContext::with_exporter("test", LogSpanExporter::new("test", "dev"));
        for _ in 0..3 {
            let mut span = obs.start_span("work", SpanKind::Internal, None);
            span.set_attribute(keys::HTTP_METHOD, "GET");
            span.end();
        }
        let mut failed = obs.start_span("failed", SpanKind::Internal, None);
        failed.set_error("boom");
        failed.end();
        assert_eq!(obs.open_spans(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_collector_still_builds() {
        let config = ObservabilityConfig {
            otlp_endpoint: Some("http://127.0.0.1:4317".into()),
            ..ObservabilityConfig::default()
        };
        let obs = ObservabilityContext::new("test", tracer_provider("test", &config));
        obs.start_span("work", SpanKind::Internal, None).end();
        assert_eq!(obs.started_spans(), 1);
    }
}
