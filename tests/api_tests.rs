//! End-to-end tests of the HTTP surface against a local mock of the upstream providers

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use winterready::api::AppState;
use winterready::config::{AppConfig, DeploymentEnvironment};
use winterready::web;

#[derive(Clone, Default)]
struct UpstreamCalls {
    weather: Arc<AtomicUsize>,
    avalanche: Arc<AtomicUsize>,
}

fn forecast_body() -> Value {
    json!({
        "type": "Feature",
        "properties": {
            "timeseries": [{
                "time": "2024-01-15T10:00:00Z",
                "data": {
                    "instant": {"details": {"air_temperature": -12.3, "wind_speed": 16.2}},
                    "next_1_hours": {
                        "summary": {"symbol_code": "heavysnow_night"},
                        "details": {"precipitation_amount": 6.1}
                    }
                }
            }]
        }
    })
}

fn ocean_body() -> Value {
    json!({"properties": {"timeseries": [{
        "time": "2024-01-15T10:00:00Z",
        "data": {"instant": {"details": {
            "sea_surface_wave_height": 2.4,
            "sea_water_temperature": 4.6,
            "sea_water_speed": 0.31
        }}}
    }]}})
}

fn varsom_body() -> Value {
    json!([
        {
            "DangerLevel": "3",
            "DangerLevelName": "3 Considerable",
            "ValidFrom": "2024-01-15T00:00:00",
            "ValidTo": "2024-01-15T23:59:59",
            "MainText": "Fresh wind slabs on north-facing slopes.",
            "RegionName": "Tromsø"
        },
        {"DangerLevel": "0", "RegionName": "Tromsø"}
    ])
}

fn kp_body() -> Value {
    json!([
        ["time_tag", "kp", "observed", "noaa_scale"],
        ["2020-01-01 00:00:00", "3.33", "observed", null],
        ["2020-01-01 03:00:00", "5.00", "observed", "G1"]
    ])
}

async fn spawn_upstream() -> (String, UpstreamCalls) {
    let calls = UpstreamCalls::default();
    let weather_calls = calls.weather.clone();
    let avalanche_calls = calls.avalanche.clone();

    let mock = Router::new()
        .route(
            "/locationforecast/2.0/compact",
            get(move || {
                weather_calls.fetch_add(1, Ordering::SeqCst);
                async { Json(forecast_body()) }
            }),
        )
        .route("/oceanforecast/2.0/complete", get(|| async { Json(ocean_body()) }))
        .route(
            "/nve/AvalancheWarningByCoordinates/Simple/{lon}/{lat}/{lang}/{start}/{end}",
            get(move || {
                avalanche_calls.fetch_add(1, Ordering::SeqCst);
                async { Json(varsom_body()) }
            }),
        )
        .route("/kp.json", get(|| async { Json(kp_body()) }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, mock).await.unwrap();
    });

    (format!("http://{addr}"), calls)
}

fn config_for(upstream: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.upstream.met_base_url = upstream.to_string();
    config.upstream.avalanche_base_url = format!("{upstream}/nve");
    config.upstream.aurora_url = format!("{upstream}/kp.json");
    config.upstream.road_latency_ms = 0;
    config.upstream.timeout_seconds = 2;
    config
}

fn app_for(config: &AppConfig) -> Router {
    let state = AppState::from_config(config).unwrap();
    web::app(state, &config.server)
}

async fn send(app: &Router, method: &str, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_weather_endpoint_serves_and_caches() {
    let (upstream, calls) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    let response = send(&app, "GET", "/api/weather?lat=69.6496&lon=18.956").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, s-maxage=900, stale-while-revalidate=1800"
    );
    assert!(response.headers().get("x-data-degraded").is_none());

    let body = body_json(response).await;
    assert_eq!(body["location"], "Tromsø");
    assert_eq!(body["temperature"], -12.0);
    assert_eq!(body["description"], "Heavy snow");
    assert_eq!(body["riskLevel"], "high");

    let again = send(&app, "GET", "/api/weather?lat=69.6496&lon=18.956").await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(calls.weather.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_avalanche_drops_unassessed_entries() {
    let (upstream, calls) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    let response = send(&app, "GET", "/api/avalanche?lang=en").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["dangerLevel"], 3);
    assert_eq!(warnings[0]["regionName"], "Tromsø");
    assert_eq!(calls.avalanche.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_roads_ocean_and_aurora() {
    let (upstream, _) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    let roads = send(&app, "GET", "/api/roads?region=lofoten").await;
    assert_eq!(roads.status(), StatusCode::OK);
    assert_eq!(
        roads.headers()[header::CACHE_CONTROL],
        "public, s-maxage=300, stale-while-revalidate=600"
    );
    assert!(!body_json(roads).await["conditions"].as_array().unwrap().is_empty());

    let ocean = body_json(send(&app, "GET", "/api/ocean").await).await;
    assert_eq!(ocean["waveHeight"], 2.4);
    assert_eq!(ocean["safeForBoating"], false);

    let aurora = body_json(send(&app, "GET", "/api/aurora?cloudCover=10").await).await;
    assert_eq!(aurora["kpIndex"], 5.0);
    assert_eq!(aurora["cloudCover"], 10.0);
}

#[tokio::test]
async fn test_invalid_input_is_rejected() {
    let (upstream, calls) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    let response = send(&app, "GET", "/api/weather?lat=abc&lon=10").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_coordinates");

    let response = send(&app, "GET", "/api/weather?lat=91&lon=10").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, "GET", "/api/roads?region=bergen").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "invalid_region");
    assert_eq!(
        body["error"],
        "Invalid region. Must be one of: tromso, lofoten, nordkapp, national"
    );

    let response = send(&app, "GET", "/api/aurora?cloudCover=150").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_cloud_cover");

    assert_eq!(calls.weather.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_provider_is_degraded_not_an_error() {
    let mut config = config_for("http://127.0.0.1:9");
    config.upstream.timeout_seconds = 1;
    let app = app_for(&config);

    let response = send(&app, "GET", "/api/weather").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-data-degraded"], "true");

    let body = body_json(response).await;
    assert_eq!(body["location"], "Oslo");
    assert_eq!(body["riskLevel"], "medium");
}

#[tokio::test]
async fn test_rate_limit_returns_retry_after() {
    let (upstream, _) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    for _ in 0..30 {
        let response = send(&app, "GET", "/api/destinations").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(&app, "GET", "/api/destinations").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    assert_eq!(body_json(response).await["error"], "Rate limit exceeded");

    let other_client = Request::builder()
        .uri("/api/destinations")
        .header("x-forwarded-for", "198.51.100.1, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(other_client).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_safety_for_tromso() {
    let (upstream, _) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    let response = send(&app, "GET", "/api/safety?name=Troms%C3%B8").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, s-maxage=300, stale-while-revalidate=600"
    );

    let body = body_json(response).await;
    assert_eq!(body["destination"]["name"], "Tromsø");
    // high weather (3) + considerable avalanche (2)
    assert_eq!(body["overallSafety"], "warning");
    assert_eq!(body["loading"], false);
    assert_eq!(body["showAurora"], true);
    assert_eq!(body["showOcean"], true);
    // precipitation makes the aurora estimate assume heavy cloud
    assert_eq!(body["aurora"]["cloudCover"], 80.0);
    assert!(body["degraded"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_safety_for_southern_point() {
    let (upstream, _) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    let body = body_json(send(&app, "GET", "/api/safety?lat=59.9139&lon=10.7522").await).await;
    assert_eq!(body["destination"]["name"], "Oslo");
    assert_eq!(body["showAurora"], false);
    assert_eq!(body["aurora"], Value::Null);
    assert_eq!(body["ocean"], Value::Null);
}

#[tokio::test]
async fn test_destinations_catalogue() {
    let (upstream, _) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    let response = send(&app, "GET", "/api/destinations").await;
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=86400");
    let body = body_json(response).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 8);
    assert!(names.contains(&"Nordkapp"));
}

#[tokio::test]
async fn test_cache_purge() {
    let (upstream, calls) = spawn_upstream().await;
    let app = app_for(&config_for(&upstream));

    send(&app, "GET", "/api/weather").await;
    assert_eq!(calls.weather.load(Ordering::SeqCst), 1);

    let response = send(&app, "POST", "/api/cache/purge").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "missing_tag");

    let response = send(&app, "POST", "/api/cache/purge?tag=snowfall").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, "POST", "/api/cache/purge?tag=weather").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"revalidated": true, "tag": "weather"})
    );

    send(&app, "GET", "/api/weather").await;
    assert_eq!(calls.weather.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cache_purge_forbidden_in_production() {
    let (upstream, _) = spawn_upstream().await;
    let mut config = config_for(&upstream);
    config.server.environment = DeploymentEnvironment::Production;
    let app = app_for(&config);

    let response = send(&app, "POST", "/api/cache/purge?tag=weather").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "forbidden");
}
