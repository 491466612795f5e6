//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Process-wide monotonic counters keyed by a small tag set
//! - Mirror every increment into the `metrics` facade and an OTel instrument
//! - Expose a Prometheus-compatible scrape endpoint
//! - Push OTel metrics to the collector when one is configured
//!
//! # Metrics
//! - `gateway.requests` (counter): inbound gateway requests by outcome
//! - `geolocator.requests` (counter): inbound geolocator requests by outcome
//! - `incoming.requests` (counter): inbound distance requests by outcome
//! - `iss.requests` (counter): ISS position lookups by response status
//! - `upstream.requests` (counter): downstream calls by service and status
//! - `http.server.duration` (histogram): handler latency in seconds
//!
//! # Design Decisions
//! - Counts are also kept in a sharded in-process registry so they can be
//!   inspected without a recorder installed
//! - Tags are sorted on insert; the same tag set always maps to one series

use dashmap::DashMap;
use metrics::Label;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::{runtime, Resource};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const OTLP_PUSH_PERIOD: Duration = Duration::from_secs(10);

/// Identity of one counter series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    name: &'static str,
    tags: Vec<(&'static str, String)>,
}

/// In-process store of counter values.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    values: DashMap<CounterKey, u64>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, name: &'static str, n: u64, tags: &[(&'static str, String)]) {
        let mut tags = tags.to_vec();
        tags.sort();
        *self.values.entry(CounterKey { name, tags }).or_insert(0) += n;
    }

    /// Sum of every series of `name` whose tags include all of `tags`.
    pub fn value(&self, name: &str, tags: &[(&str, &str)]) -> u64 {
        self.values
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key.name == name
                    && tags
                        .iter()
                        .all(|(k, v)| key.tags.iter().any(|(kk, vv)| kk == k && vv == v))
            })
            .map(|entry| *entry.value())
            .sum()
    }

    /// Sum across every series of `name`.
    pub fn total(&self, name: &str) -> u64 {
        self.value(name, &[])
    }
}

/// Handle to a named counter.
#[derive(Debug, Clone)]
pub struct Counter {
    name: &'static str,
    registry: Arc<CounterRegistry>,
    instrument: opentelemetry::metrics::Counter<u64>,
}

impl Counter {
    pub(crate) fn new(
        name: &'static str,
        registry: Arc<CounterRegistry>,
        instrument: opentelemetry::metrics::Counter<u64>,
    ) -> Self {
        Self {
            name,
            registry,
            instrument,
        }
    }

    /// Increment the series identified by `tags` by `n`.
    pub fn add(&self, n: u64, tags: &[(&'static str, String)]) {
        self.registry.add(self.name, n, tags);

        let attributes: Vec<KeyValue> = tags
            .iter()
            .map(|(k, v)| KeyValue::new(*k, v.clone()))
            .collect();
        self.instrument.add(n, &attributes);

        let labels: Vec<Label> = tags
            .iter()
            .map(|(k, v)| Label::new(*k, v.clone()))
            .collect();
        metrics::counter!(self.name, labels).increment(n);
    }
}

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics exporter started");
    Ok(())
}

/// Push OTel instruments to the collector at `endpoint`.
///
/// Returns the provider to shut down on exit, or `None` when the exporter
/// could not be built; counters then stay local.
pub fn init_otlp_metrics(endpoint: &str, resource: Resource) -> Option<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    match opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(exporter)
        .with_resource(resource)
        .with_period(OTLP_PUSH_PERIOD)
        .build()
    {
        Ok(provider) => {
            global::set_meter_provider(provider.clone());
            tracing::info!(endpoint, "OTLP metrics exporter configured");
            Some(provider)
        }
        Err(e) => {
            tracing::warn!(endpoint, error = %e, "Failed to create OTLP metrics exporter");
            None
        }
    }
}

/// Record the latency of one handled request.
pub fn record_request(service: &'static str, status: u16, start: Instant) {
    metrics::histogram!(
        "http.server.duration",
        "service" => service,
        "status" => status.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}
