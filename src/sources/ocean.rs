//! met.no Oceanforecast client

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use super::{Source, Sourced, fetch_json};
use crate::models::{Coordinates, OceanSnapshot};
use crate::telemetry::ErrorReporter;

/// Boat tours run below this significant wave height
pub const SAFE_WAVE_HEIGHT_M: f64 = 2.0;

pub struct OceanSource {
    client: Client,
    base_url: String,
    reporter: ErrorReporter,
}

impl OceanSource {
    pub fn new(client: Client, base_url: &str, reporter: ErrorReporter) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            reporter,
        }
    }

    async fn try_fetch(&self, point: &Coordinates) -> Result<OceanSnapshot> {
        let url = format!(
            "{}/oceanforecast/2.0/complete?lat={}&lon={}",
            self.base_url, point.lat, point.lon
        );
        let forecast: OceanForecast = fetch_json(&self.client, &url).await?;
        let snapshot = snapshot_from_forecast(&forecast)?;
        info!("Retrieved sea state: {:.1} m waves", snapshot.wave_height);
        Ok(snapshot)
    }
}

#[async_trait]
impl Source for OceanSource {
    type Params = Coordinates;
    type Output = OceanSnapshot;

    fn name(&self) -> &'static str {
        "ocean"
    }

    fn cache_key(&self, params: &Coordinates) -> String {
        params.cache_key(self.name())
    }

    #[instrument(name = "fetch_ocean", skip(self), fields(lat = params.lat, lon = params.lon))]
    async fn fetch(&self, params: &Coordinates) -> Sourced<OceanSnapshot> {
        match self.try_fetch(params).await {
            Ok(snapshot) => Sourced::fresh(snapshot),
            Err(e) => {
                self.reporter.report("Ocean API", &e);
                Sourced::degraded(fallback())
            }
        }
    }
}

#[must_use]
pub fn fallback() -> OceanSnapshot {
    build_snapshot(0.8, 4.2, 0.15)
}

#[must_use]
pub fn describe_sea_state(wave_height: f64) -> &'static str {
    match wave_height {
        h if h < 0.5 => "Calm seas - excellent conditions",
        h if h < 1.0 => "Light waves - good conditions",
        h if h < 2.0 => "Moderate waves - acceptable conditions",
        h if h < 3.0 => "Rough seas - tours may be cancelled",
        _ => "Very rough seas - not safe for tours",
    }
}

fn build_snapshot(wave_height: f64, water_temperature: f64, current_speed: f64) -> OceanSnapshot {
    OceanSnapshot {
        wave_height: (wave_height * 10.0).round() / 10.0,
        water_temperature: (water_temperature * 10.0).round() / 10.0,
        current_speed: (current_speed * 100.0).round() / 100.0,
        safe_for_boating: wave_height < SAFE_WAVE_HEIGHT_M,
        description: describe_sea_state(wave_height).to_string(),
    }
}

pub(crate) fn snapshot_from_forecast(forecast: &OceanForecast) -> Result<OceanSnapshot> {
    let details = &forecast
        .properties
        .timeseries
        .first()
        .context("Ocean forecast contains no timeseries entries")?
        .data
        .instant
        .details;

    Ok(build_snapshot(
        details.sea_surface_wave_height.unwrap_or(0.0),
        details.sea_water_temperature.unwrap_or(4.0),
        details.sea_water_speed.unwrap_or(0.0),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct OceanForecast {
    properties: OceanProperties,
}

#[derive(Debug, Deserialize)]
struct OceanProperties {
    timeseries: Vec<OceanTimeseries>,
}

#[derive(Debug, Deserialize)]
struct OceanTimeseries {
    data: OceanData,
}

#[derive(Debug, Deserialize)]
struct OceanData {
    instant: OceanInstant,
}

#[derive(Debug, Deserialize)]
struct OceanInstant {
    details: OceanDetails,
}

#[derive(Debug, Deserialize)]
struct OceanDetails {
    sea_surface_wave_height: Option<f64>,
    sea_water_temperature: Option<f64>,
    sea_water_speed: Option<f64>,
}
