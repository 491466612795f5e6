//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration for the selected role
//! - Initialize logging, metrics and the OTel span export pipeline
//! - Wire the role's components and bind the listener
//! - Serve until a stop signal, then drain spans
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use axum::Router;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::loader::{ENV_GEOLOCATOR_URL, ENV_ISS_DISTANCE_URL};
use crate::config::{load_config, AppConfig, ConfigError, ServiceRole, ValidationError};
use crate::distance::{self, DistanceState, OpenNotifySource, SatelliteTracker};
use crate::gateway::{self, GatewayState};
use crate::geo::geodesic_km;
use crate::geolocator::{self, GeolocatorState, NominatimProvider};
use crate::http::{DownstreamClient, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics, resource, tracer_provider, ObservabilityContext};

/// What to start.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub role: ServiceRole,
    pub config_path: Option<PathBuf>,
    /// Overrides `listener.bind_address`.
    pub bind_address: Option<String>,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the service described by `options` and run it until shutdown.
pub async fn run(options: LaunchOptions) -> Result<(), StartupError> {
    let role = options.role;
    let mut config = load_config(options.config_path.as_deref(), role)?;
    if let Some(bind_address) = options.bind_address {
        config.listener.bind_address = bind_address;
    }

    let service = role.service_name();
    logging::init_logging(service, &config.observability);
    tracing::info!(
        service,
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let meter_provider = config.observability.otlp_endpoint.as_deref().and_then(|endpoint| {
        metrics::init_otlp_metrics(
            endpoint,
            resource(service, &config.observability.environment),
        )
    });
    let obs = ObservabilityContext::new(service, tracer_provider(service, &config.observability));

    let routes = build_routes(role, &config, &obs)?;
    let server = HttpServer::new(service, routes, config.timeouts.request());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown).await?;

    obs.shutdown().await;
    if let Some(provider) = meter_provider {
        let stopped = tokio::task::spawn_blocking(move || provider.shutdown()).await;
        if !matches!(stopped, Ok(Ok(()))) {
            tracing::warn!("OTLP metrics exporter did not shut down cleanly");
        }
    }
    tracing::info!(service, "Shutdown complete");
    Ok(())
}

/// Routes of `role`, with every component wired to `obs`.
pub fn build_routes(
    role: ServiceRole,
    config: &AppConfig,
    obs: &ObservabilityContext,
) -> Result<Router, StartupError> {
    let client = DownstreamClient::new(&config.timeouts, &config.downstream, obs)?;
    let budget = config.timeouts.request();

    let routes = match role {
        ServiceRole::Gateway => {
            let geolocator_url = required(
                config.downstream.geolocator_url.as_deref(),
                "downstream.geolocator_url",
                ENV_GEOLOCATOR_URL,
            )?;
            let distance_url = required(
                config.downstream.iss_distance_url.as_deref(),
                "downstream.iss_distance_url",
                ENV_ISS_DISTANCE_URL,
            )?;
            gateway::router(GatewayState::new(
                obs.clone(),
                client,
                geolocator_url,
                distance_url,
                budget,
            ))
        }
        ServiceRole::Geolocator => {
            let provider = NominatimProvider::new(client, config.downstream.nominatim_url.clone());
            geolocator::router(GeolocatorState::new(obs.clone(), Arc::new(provider), budget))
        }
        ServiceRole::Distance => {
            let source = OpenNotifySource::new(client, config.downstream.iss_now_url.clone());
            let tracker = SatelliteTracker::new(
                obs,
                Arc::new(source),
                config.distance.iss_failure_policy,
            );
            tracing::info!(
                policy = config.distance.iss_failure_policy.as_str(),
                "ISS position failure policy"
            );
            distance::router(DistanceState::new(
                obs.clone(),
                Arc::new(tracker),
                geodesic_km,
                budget,
            ))
        }
    };
    Ok(routes)
}

fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
    env: &'static str,
) -> Result<&'a str, StartupError> {
    value.ok_or_else(|| {
        StartupError::Config(ConfigError::Validation(vec![ValidationError::Missing {
            field,
            env,
        }]))
    })
}
