//! HTTP query surface: one read-only endpoint per feed plus the aggregated view

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{Json, Response};
use axum::{
    Router,
    routing::{get, post},
};
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::aggregator::SafetyAggregator;
use crate::config::{AppConfig, DeploymentEnvironment};
use crate::destinations;
use crate::error::ErrorCode;
use crate::gatekeeper::{
    Gatekeeper, InMemoryRateLimitStore, Operation, client_identity, validate_cloud_cover,
    validate_coordinates, validate_region,
};
use crate::models::{AuroraParams, AvalancheParams, Coordinates, Destination, Language};
use crate::sources::{self, SourceCaches};
use crate::telemetry::ErrorReporter;
use crate::{Result, WinterReadyError};

pub mod response;

use response::{cache_control, cached_json, source_json};

const WEATHER_DEFAULT: Coordinates = Coordinates::new(59.9139, 10.7522);
const AVALANCHE_DEFAULT: Coordinates = Coordinates::new(69.6496, 18.956);
const OCEAN_DEFAULT: Coordinates = Coordinates::new(69.67, 18.95);
const AURORA_DEFAULT: Coordinates = Coordinates::new(69.65, 18.956);
const DEFAULT_CLOUD_COVER: f64 = 50.0;
const DEFAULT_DESTINATION: &str = "Tromsø";

/// Shared state of all handlers
#[derive(Clone)]
pub struct AppState {
    pub environment: DeploymentEnvironment,
    pub gatekeeper: Gatekeeper,
    pub caches: SourceCaches,
    aggregators: Arc<DashMap<String, SafetyAggregator>>,
}

impl AppState {
    /// Wires the real providers, the in-process rate-limit store and the error reporter
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = sources::http_client(&config.upstream)?;
        let reporter = ErrorReporter::new(config, client.clone());
        let caches = SourceCaches::from_config(config, client, reporter);
        let gatekeeper = Gatekeeper::new(&config.rate_limit, Arc::new(InMemoryRateLimitStore::new()));
        Ok(Self::new(config.server.environment, gatekeeper, caches))
    }

    pub fn new(environment: DeploymentEnvironment, gatekeeper: Gatekeeper, caches: SourceCaches) -> Self {
        Self {
            environment,
            gatekeeper,
            caches,
            aggregators: Arc::new(DashMap::new()),
        }
    }

    fn admit(&self, headers: &HeaderMap, operation: Operation) -> Result<()> {
        let forwarded_for = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok());
        self.gatekeeper
            .admit(&client_identity(forwarded_for), operation)
            .map(|_| ())
    }

    /// Aggregator for a destination. Catalogue destinations keep theirs
    /// between requests; arbitrary points get a fresh one.
    pub fn aggregator_for(&self, destination: Destination, language: Language) -> SafetyAggregator {
        let is_catalogued = destinations::find(&destination.name)
            .is_some_and(|known| known.coordinates() == destination.coordinates());
        if !is_catalogued {
            return SafetyAggregator::new(destination, language, self.caches.clone());
        }

        let key = format!("{}:{}", destination.name, language.code());
        self.aggregators
            .entry(key)
            .or_insert_with(|| SafetyAggregator::new(destination, language, self.caches.clone()))
            .clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/weather", get(get_weather))
        .route("/avalanche", get(get_avalanche))
        .route("/roads", get(get_roads))
        .route("/ocean", get(get_ocean))
        .route("/aurora", get(get_aurora))
        .route("/safety", get(get_safety))
        .route("/destinations", get(get_destinations))
        .route("/cache/purge", post(purge_cache))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct PointQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegionQuery {
    pub region: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuroraQuery {
    pub cloud_cover: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SafetyQuery {
    pub name: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurgeQuery {
    pub tag: Option<String>,
}

async fn get_weather(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PointQuery>,
) -> Result<Response> {
    state.admit(&headers, Operation::Weather)?;
    let point = validate_coordinates(query.lat.as_deref(), query.lon.as_deref(), WEATHER_DEFAULT)?;
    let read = state.caches.weather.get_or_fetch(&point).await?;
    Ok(source_json(&read, cache_control::WEATHER))
}

async fn get_avalanche(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PointQuery>,
) -> Result<Response> {
    state.admit(&headers, Operation::Avalanche)?;
    let point = validate_coordinates(query.lat.as_deref(), query.lon.as_deref(), AVALANCHE_DEFAULT)?;
    let params = AvalancheParams::new(point, Language::from_query(query.lang.as_deref()));
    let read = state.caches.avalanche.get_or_fetch(&params).await?;
    Ok(source_json(&read, cache_control::AVALANCHE))
}

async fn get_roads(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RegionQuery>,
) -> Result<Response> {
    state.admit(&headers, Operation::Roads)?;
    let region = validate_region(query.region.as_deref())?;
    let read = state.caches.roads.get_or_fetch(&region).await?;
    Ok(source_json(&read, cache_control::ROADS))
}

async fn get_ocean(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PointQuery>,
) -> Result<Response> {
    state.admit(&headers, Operation::Ocean)?;
    let point = validate_coordinates(query.lat.as_deref(), query.lon.as_deref(), OCEAN_DEFAULT)?;
    let read = state.caches.ocean.get_or_fetch(&point).await?;
    Ok(source_json(&read, cache_control::OCEAN))
}

async fn get_aurora(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuroraQuery>,
) -> Result<Response> {
    state.admit(&headers, Operation::Aurora)?;
    let cloud_cover = validate_cloud_cover(query.cloud_cover.as_deref(), DEFAULT_CLOUD_COVER)?;
    let point = validate_coordinates(query.lat.as_deref(), query.lon.as_deref(), AURORA_DEFAULT)?;
    let params = AuroraParams::new(cloud_cover, point.lat);
    let read = state.caches.aurora.get_or_fetch(&params).await?;
    Ok(source_json(&read, cache_control::AURORA))
}

async fn get_safety(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SafetyQuery>,
) -> Result<Response> {
    state.admit(&headers, Operation::Safety)?;

    let name = query.name.as_deref().filter(|name| !name.is_empty());
    let known = destinations::find(name.unwrap_or(DEFAULT_DESTINATION));
    let defaults = known.as_ref().map_or(AVALANCHE_DEFAULT, Destination::coordinates);
    let point = validate_coordinates(query.lat.as_deref(), query.lon.as_deref(), defaults)?;
    let name = name.map_or_else(
        || destinations::name_near(point.lat, point.lon).to_string(),
        str::to_string,
    );

    let destination = Destination::new(name, point.lat, point.lon);
    let language = Language::from_query(query.lang.as_deref());
    let snapshot = state.aggregator_for(destination, language).load().await;
    Ok(cached_json(&snapshot, cache_control::SAFETY))
}

async fn get_destinations(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    state.admit(&headers, Operation::Destinations)?;
    Ok(cached_json(&destinations::all(), cache_control::DESTINATIONS))
}

async fn purge_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PurgeQuery>,
) -> Result<Json<Value>> {
    state.admit(&headers, Operation::CachePurge)?;

    if state.environment == DeploymentEnvironment::Production {
        return Err(WinterReadyError::forbidden(
            "Cache purge is only available in development",
        ));
    }

    let Some(tag) = query.tag.filter(|tag| !tag.is_empty()) else {
        return Err(WinterReadyError::validation(
            ErrorCode::MissingTag,
            "Missing tag parameter. Example: ?tag=aurora",
        ));
    };

    if !state.caches.purge(&tag) {
        return Err(WinterReadyError::validation(
            ErrorCode::MissingTag,
            format!("Unknown tag: {tag}"),
        ));
    }

    info!("Cache purged for tag {}", tag);
    Ok(Json(json!({ "revalidated": true, "tag": tag })))
}
