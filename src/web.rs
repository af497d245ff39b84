use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::StatusCode;
use rand::RngExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::api::{self, AppState};
use crate::config::{AppConfig, ServerConfig};
use crate::destinations;
use crate::models::Language;

const PREWARM_SPREAD_MS: u64 = 2_000;

/// The full service: API routes under `/api` behind CORS, timeout and trace layers
pub fn app(state: AppState, server: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.request_timeout_seconds),
        ))
        .layer(cors)
}

/// Starts auto-refreshing aggregators for every catalogue destination.
/// Start times are spread out so the first fetches don't hit the providers at once.
pub fn prewarm(state: &AppState) {
    for destination in destinations::all() {
        let delay = Duration::from_millis(rand::rng().random_range(0..PREWARM_SPREAD_MS));
        let aggregator = state.aggregator_for(destination, Language::default());

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let snapshot = aggregator.load().await;
            debug!(
                destination = %aggregator.destination().name,
                safety = ?snapshot.overall_safety,
                "Prewarmed destination"
            );
            aggregator.spawn_auto_refresh();
        });
    }
}

pub async fn run(config: &AppConfig) -> Result<()> {
    let state = AppState::from_config(config)?;
    if config.prewarm {
        prewarm(&state);
    }

    let app = app(state, &config.server);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Web server running at http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Web server stopped unexpectedly")
}
