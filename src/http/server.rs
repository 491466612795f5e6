//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap a service's routes with the shared middleware stack
//!   (request ID, tracing, timeout, latency histogram)
//! - Add the `/health` endpoint
//! - Serve until the shutdown signal, then drain in-flight requests

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Extra time the timeout layer allows past the request budget. Handlers
/// answer 504 at the budget themselves; the layer only stops a handler
/// that overran it, and the hop then records the request as cancelled.
const TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// HTTP server for one service role.
pub struct HttpServer {
    service: &'static str,
    router: Router,
}

impl HttpServer {
    /// Wrap `routes` (state already attached) for `service`.
    pub fn new(service: &'static str, routes: Router, request_timeout: Duration) -> Self {
        Self {
            service,
            router: Self::build_router(service, routes, request_timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(service: &'static str, routes: Router, request_timeout: Duration) -> Router {
        routes
            .route("/health", get(move || health(service)))
            .layer(middleware::from_fn_with_state(service, record_duration))
            .layer(TimeoutLayer::new(request_timeout + TIMEOUT_GRACE))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The complete router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(service = self.service, address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.triggered().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!(service = self.service, "HTTP server stopped");
        Ok(())
    }
}

async fn health(service: &'static str) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": service,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn record_duration(
    State(service): State<&'static str>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_request(service, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let routes = Router::new().route("/", get(|| async { "hello" }));
        HttpServer::new("test-service", routes, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let response = server()
            .router()
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "test-service");
    }

    #[tokio::test]
    async fn test_request_id_generated_and_echoed() {
        let router = server().router();

        let response = router
            .clone()
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let generated = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());

        let response = router
            .oneshot(
                HttpRequest::get("/")
                    .header(X_REQUEST_ID, "caller-chosen")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), "caller-chosen");
    }

    #[tokio::test]
    async fn test_graceful_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(server().run(listener, shutdown.clone()));

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_layer_timeout_leaves_room_for_handler() {
        let routes = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                "done"
            }),
        );
        let router = HttpServer::new("test-service", routes, Duration::from_secs(1)).router();

        // Past the budget but inside the grace: the handler still answers.
        let response = router
            .oneshot(HttpRequest::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
