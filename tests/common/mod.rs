//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use iss_tracker::config::{AppConfig, ServiceRole};
use iss_tracker::lifecycle::startup::build_routes;
use iss_tracker::observability::ObservabilityContext;
use iss_tracker::HttpServer;
use opentelemetry::trace::Status;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;

/// Serve `router` on an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// URL on which nothing listens.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

/// A programmable downstream stand-in that records what it receives.
#[derive(Clone)]
pub struct MockBackend {
    pub url: String,
    calls: Arc<AtomicUsize>,
    last_headers: Arc<Mutex<Option<HeaderMap>>>,
    last_query: Arc<Mutex<Option<String>>>,
}

impl MockBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> HeaderMap {
        self.last_headers.lock().unwrap().clone().expect("no request received")
    }

    pub fn last_query(&self) -> String {
        self.last_query.lock().unwrap().clone().unwrap_or_default()
    }
}

/// Start a mock answering every `GET /` with `status` and `body`.
pub async fn start_mock_backend(status: u16, body: impl Into<String>) -> MockBackend {
    let body = body.into();
    start_programmable_backend(move || {
        let body = body.clone();
        async move { (status, body) }
    })
    .await
}

/// Start a mock answering `GET /` with `delay` before `status` and `body`.
pub async fn start_slow_backend(delay: Duration, status: u16, body: &'static str) -> MockBackend {
    start_programmable_backend(move || async move {
        tokio::time::sleep(delay).await;
        (status, body.to_string())
    })
    .await
}

/// Start a mock whose answer is computed by `f` on every request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = (u16, String)> + Send + 'static,
{
    let calls = Arc::new(AtomicUsize::new(0));
    let last_headers: Arc<Mutex<Option<HeaderMap>>> = Arc::default();
    let last_query: Arc<Mutex<Option<String>>> = Arc::default();

    let handler = {
        let calls = calls.clone();
        let last_headers = last_headers.clone();
        let last_query = last_query.clone();
        move |uri: axum::http::Uri, headers: HeaderMap| {
            let f = f.clone();
            calls.fetch_add(1, Ordering::SeqCst);
            *last_headers.lock().unwrap() = Some(headers);
            *last_query.lock().unwrap() = uri.query().map(String::from);
            async move {
                let (status, body) = f().await;
                (StatusCode::from_u16(status).unwrap(), body)
            }
        }
    };

    let url = serve(Router::new().route("/", get(handler))).await;
    MockBackend {
        url,
        calls,
        last_headers,
        last_query,
    }
}

/// A real service role running on an ephemeral port.
pub struct RunningService {
    pub url: String,
    pub obs: ObservabilityContext,
}

/// Start `role` with `config`, exporting its spans into `exporter`.
pub async fn start_service(
    role: ServiceRole,
    config: AppConfig,
    exporter: &InMemorySpanExporter,
) -> RunningService {
    let service = role.service_name();
    let obs = ObservabilityContext::with_exporter(service, exporter.clone());
    let routes = build_routes(role, &config, &obs).unwrap();
    let server = HttpServer::new(service, routes, config.timeouts.request());
    let url = serve(server.router()).await;
    RunningService { url, obs }
}

/// Every span `exporter` has received, in end order.
pub fn spans(exporter: &InMemorySpanExporter) -> Vec<SpanData> {
    exporter.get_finished_spans().unwrap()
}

pub fn spans_named(exporter: &InMemorySpanExporter, name: &str) -> Vec<SpanData> {
    spans(exporter)
        .into_iter()
        .filter(|s| s.name == name)
        .collect()
}

/// Attribute `key` of `span`, rendered as text.
pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.to_string())
}

pub fn is_error(span: &SpanData) -> bool {
    matches!(span.status, Status::Error { .. })
}

/// Open Notify style answer for a fixed position.
pub fn iss_now_body(latitude: &str, longitude: &str) -> String {
    format!(
        r#"{{"message": "success", "timestamp": 1700000000, "iss_position": {{"latitude": "{latitude}", "longitude": "{longitude}"}}}}"#
    )
}

/// Test HTTP client without connection pooling.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
