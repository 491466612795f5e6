//! Distance service against a mock position endpoint.

use iss_tracker::config::{AppConfig, ServiceRole};
use iss_tracker::distance::POSITION_SPAN;
use iss_tracker::geo::{geodesic_km, Coordinates, DistanceReport};
use iss_tracker::FailurePolicy;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;

use common::{is_error, spans_named};

mod common;

async fn distance_service(
    iss_now_url: &str,
    policy: FailurePolicy,
) -> (common::RunningService, InMemorySpanExporter) {
    let mut config = AppConfig::default();
    config.downstream.iss_now_url = iss_now_url.to_string();
    config.distance.iss_failure_policy = policy;

    let exporter = InMemorySpanExporter::default();
    let service = common::start_service(ServiceRole::Distance, config, &exporter).await;
    (service, exporter)
}

async fn measure(url: &str, query: &[(&str, &str)]) -> reqwest::Response {
    common::client().get(url).query(query).send().await.unwrap()
}

#[tokio::test]
async fn test_live_position() {
    let iss = common::start_mock_backend(200, common::iss_now_body("-12.5", "101.25")).await;
    let (svc, exporter) = distance_service(&iss.url, FailurePolicy::DegradeToSentinel).await;

    let res = measure(&svc.url, &[("latitude", "51.5073219"), ("longitude", "-0.1276474")]).await;
    assert_eq!(res.status(), 200);
    let report: DistanceReport = res.json().await.unwrap();

    let satellite = Coordinates::new(-12.5, 101.25);
    assert_eq!(report.satellite_location, satellite);
    assert_eq!(
        report.distance_km,
        geodesic_km(&Coordinates::new(51.5073219, -0.1276474), &satellite)
    );

    assert_eq!(iss.calls(), 1);
    assert!(!is_error(&spans_named(&exporter, POSITION_SPAN)[0]));
    assert_eq!(
        svc.obs.counters().value("iss.requests", &[("response.status", "200")]),
        1
    );
    assert_eq!(
        svc.obs.counters().value("incoming.requests", &[("outcome", "ok")]),
        1
    );
}

#[tokio::test]
async fn test_position_failure_degrades_to_origin() {
    let iss = common::start_mock_backend(503, "Service Unavailable").await;
    let (svc, exporter) = distance_service(&iss.url, FailurePolicy::DegradeToSentinel).await;

    let res = measure(&svc.url, &[("latitude", "10"), ("longitude", "20")]).await;
    assert_eq!(res.status(), 200);

    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["location"]["latitude"], 0.0);
    assert_eq!(json["location"]["longitude"], 0.0);
    assert!(json["distance"].as_f64().unwrap() > 0.0);

    assert!(is_error(&spans_named(&exporter, POSITION_SPAN)[0]));
    assert!(!is_error(&spans_named(&exporter, "iss-distance.request")[0]));
    assert_eq!(
        svc.obs.counters().value("iss.requests", &[("response.status", "503")]),
        1
    );
}

#[tokio::test]
async fn test_malformed_position_degrades() {
    let iss = common::start_mock_backend(200, r#"{"message": "success"}"#).await;
    let (svc, _) = distance_service(&iss.url, FailurePolicy::DegradeToSentinel).await;

    let res = measure(&svc.url, &[("latitude", "0"), ("longitude", "0")]).await;
    assert_eq!(res.status(), 200);
    let report: DistanceReport = res.json().await.unwrap();
    assert_eq!(report.satellite_location, Coordinates::UNKNOWN);
    assert_eq!(report.distance_km, 0.0);
    assert_eq!(
        svc.obs.counters().value("iss.requests", &[("response.status", "malformed")]),
        1
    );
}

#[tokio::test]
async fn test_position_failure_propagates_when_configured() {
    let iss = common::start_mock_backend(500, "boom").await;
    let (svc, _) = distance_service(&iss.url, FailurePolicy::PropagateFailure).await;

    let res = measure(&svc.url, &[("latitude", "10"), ("longitude", "20")]).await;
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn test_missing_coordinates_rejected() {
    let iss = common::start_mock_backend(200, "{}").await;
    let (svc, exporter) = distance_service(&iss.url, FailurePolicy::DegradeToSentinel).await;

    for query in [
        vec![],
        vec![("latitude", "10")],
        vec![("longitude", "20")],
        vec![("latitude", ""), ("longitude", "20")],
    ] {
        let res = measure(&svc.url, &query).await;
        assert_eq!(res.status(), 400);
        assert_eq!(res.text().await.unwrap(), "No latitude/longitude given");
    }

    assert_eq!(iss.calls(), 0);
    assert_eq!(svc.obs.counters().total("incoming.requests"), 4);
    assert!(spans_named(&exporter, "iss-distance.request")
        .iter()
        .all(is_error));
}

#[tokio::test]
async fn test_repeated_coordinates_use_first_values() {
    let iss = common::start_mock_backend(200, common::iss_now_body("0", "0")).await;
    let (svc, _) = distance_service(&iss.url, FailurePolicy::DegradeToSentinel).await;

    let res = common::client()
        .get(format!(
            "{}/?latitude=10&longitude=20&latitude=95&longitude=abc",
            svc.url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let report: DistanceReport = res.json().await.unwrap();
    assert_eq!(
        report.distance_km,
        geodesic_km(&Coordinates::new(10.0, 20.0), &Coordinates::new(0.0, 0.0))
    );
    assert_eq!(svc.obs.counters().total("incoming.requests"), 1);
}

#[tokio::test]
async fn test_invalid_coordinates_rejected() {
    let iss = common::start_mock_backend(200, "{}").await;
    let (svc, _) = distance_service(&iss.url, FailurePolicy::DegradeToSentinel).await;

    for query in [
        [("latitude", "abc"), ("longitude", "20")],
        [("latitude", "95"), ("longitude", "20")],
        [("latitude", "10"), ("longitude", "200")],
    ] {
        let res = measure(&svc.url, &query).await;
        assert_eq!(res.status(), 400);
        assert_eq!(res.text().await.unwrap(), "Invalid latitude/longitude given");
    }
    assert_eq!(iss.calls(), 0);
}

#[tokio::test]
async fn test_health() {
    let (svc, _) = distance_service(&common::closed_url().await, FailurePolicy::default()).await;

    let res = common::client()
        .get(format!("{}/health", svc.url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["service"], "iss-distance-service");
}
