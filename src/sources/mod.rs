//! Source clients for the five external feeds
//!
//! Every client implements [`Source`] and never fails towards its caller:
//! network, status and parse failures are handed to the [`ErrorReporter`] and
//! replaced by the client's static fallback, flagged as degraded.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::SwrCache;
use crate::config::{AppConfig, UpstreamConfig};
use crate::models::{
    AuroraForecast, AuroraParams, AvalancheData, AvalancheParams, Coordinates, OceanSnapshot,
    RoadData, RoadRegion, WeatherSnapshot,
};
use crate::telemetry::ErrorReporter;
use crate::{Result, WinterReadyError};

pub mod aurora;
pub mod avalanche;
pub mod ocean;
pub mod roads;
pub mod weather;

pub use aurora::AuroraSource;
pub use avalanche::AvalancheSource;
pub use ocean::OceanSource;
pub use roads::RoadSource;
pub use weather::WeatherSource;

/// A source value and whether it is the static fallback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub degraded: bool,
}

impl<T> Sourced<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    pub fn degraded(value: T) -> Self {
        Self {
            value,
            degraded: true,
        }
    }
}

/// One external feed
#[async_trait]
pub trait Source: Send + Sync {
    type Params: Clone + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    /// Short name, also the cache key prefix
    fn name(&self) -> &'static str;

    fn cache_key(&self, params: &Self::Params) -> String;

    /// Fetches and normalizes one snapshot. Infallible: failures yield the fallback.
    async fn fetch(&self, params: &Self::Params) -> Sourced<Self::Output>;
}

pub type DynSource<P, V> = Arc<dyn Source<Params = P, Output = V>>;

/// Builds the HTTP client shared by all network-backed sources
pub fn http_client(config: &UpstreamConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| WinterReadyError::config(format!("Failed to create HTTP client: {e}")))
}

/// GETs a JSON document, treating any non-success status as a failure
pub(crate) async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> anyhow::Result<T> {
    debug!("Upstream request: {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?;

    let status = response.status();
    if !status.is_success() {
        bail!(
            "API error: {} - {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        );
    }

    response
        .json::<T>()
        .await
        .with_context(|| format!("Invalid response body from {url}"))
}

/// A provider field that arrives either as a JSON number or as a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum LenientNumber {
    Number(f64),
    Text(String),
}

impl LenientNumber {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            LenientNumber::Number(n) => Some(*n),
            LenientNumber::Text(s) => s.trim().parse().ok(),
        }
        .filter(|n: &f64| n.is_finite())
    }
}

/// Every source wired into its stale-while-revalidate cache
#[derive(Clone)]
pub struct SourceCaches {
    pub weather: SwrCache<Coordinates, WeatherSnapshot>,
    pub avalanche: SwrCache<AvalancheParams, AvalancheData>,
    pub roads: SwrCache<RoadRegion, RoadData>,
    pub ocean: SwrCache<Coordinates, OceanSnapshot>,
    pub aurora: SwrCache<AuroraParams, AuroraForecast>,
}

impl SourceCaches {
    pub fn from_config(config: &AppConfig, client: Client, reporter: ErrorReporter) -> Self {
        let upstream = &config.upstream;
        let freshness = &config.freshness;
        let dedupe = freshness.dedupe_window();

        Self {
            weather: SwrCache::new(
                Arc::new(WeatherSource::new(
                    client.clone(),
                    &upstream.met_base_url,
                    reporter.clone(),
                )),
                freshness.weather.policy(dedupe),
            ),
            avalanche: SwrCache::new(
                Arc::new(AvalancheSource::new(
                    client.clone(),
                    &upstream.avalanche_base_url,
                    reporter.clone(),
                )),
                freshness.avalanche.policy(dedupe),
            ),
            roads: SwrCache::new(
                Arc::new(RoadSource::new(Duration::from_millis(upstream.road_latency_ms))),
                freshness.roads.policy(dedupe),
            ),
            ocean: SwrCache::new(
                Arc::new(OceanSource::new(
                    client.clone(),
                    &upstream.met_base_url,
                    reporter.clone(),
                )),
                freshness.ocean.policy(dedupe),
            ),
            aurora: SwrCache::new(
                Arc::new(AuroraSource::new(client, &upstream.aurora_url, reporter)),
                freshness.aurora.policy(dedupe),
            ),
        }
    }

    /// Drops cached values. `tag` is a source name (whole source) or a full
    /// cache key. Returns false when the tag names no source.
    pub fn purge(&self, tag: &str) -> bool {
        let (source, key) = match tag.split_once(':') {
            Some((source, _)) => (source, Some(tag)),
            None => (tag, None),
        };

        let purged = match source {
            "weather" => self.weather.purge(key),
            "avalanche" => self.avalanche.purge(key),
            "roads" => self.roads.purge(key),
            "ocean" => self.ocean.purge(key),
            "aurora" => self.aurora.purge(key),
            "all" if key.is_none() => {
                self.weather.purge(None);
                self.avalanche.purge(None);
                self.roads.purge(None);
                self.ocean.purge(None);
                self.aurora.purge(None);
                true
            }
            _ => return false,
        };
        debug!(tag, purged, "Cache purge");
        true
    }
}
