//! met.no Locationforecast client
//!
//! Reads the first timeseries entry: instantaneous temperature and wind, plus
//! the next hour's precipitation and symbol. The risk level is scored on the raw
//! values once, at fetch time.

use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{Source, Sourced, fetch_json};
use crate::destinations;
use crate::models::{Coordinates, RiskLevel, WeatherSnapshot};
use crate::telemetry::ErrorReporter;

const FALLBACK_SYMBOL: &str = "cloudy";

/// met.no Locationforecast client
pub struct WeatherSource {
    client: Client,
    base_url: String,
    reporter: ErrorReporter,
}

impl WeatherSource {
    pub fn new(client: Client, base_url: &str, reporter: ErrorReporter) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            reporter,
        }
    }

    async fn try_fetch(&self, point: &Coordinates) -> Result<WeatherSnapshot> {
        let start_time = Instant::now();
        let url = format!(
            "{}/locationforecast/2.0/compact?lat={}&lon={}",
            self.base_url, point.lat, point.lon
        );

        let forecast: LocationForecast = fetch_json(&self.client, &url).await?;
        let snapshot = snapshot_from_forecast(&forecast, point)?;

        let total_duration = start_time.elapsed();
        info!(
            "Retrieved weather for {} in {:.3}s",
            snapshot.location,
            total_duration.as_secs_f64()
        );
        if total_duration.as_secs() > 5 {
            warn!("Slow weather response: {:.3}s", total_duration.as_secs_f64());
        }

        Ok(snapshot)
    }
}

#[async_trait]
impl Source for WeatherSource {
    type Params = Coordinates;
    type Output = WeatherSnapshot;

    fn name(&self) -> &'static str {
        "weather"
    }

    fn cache_key(&self, params: &Coordinates) -> String {
        params.cache_key(self.name())
    }

    #[instrument(name = "fetch_weather", skip(self), fields(lat = params.lat, lon = params.lon))]
    async fn fetch(&self, params: &Coordinates) -> Sourced<WeatherSnapshot> {
        match self.try_fetch(params).await {
            Ok(snapshot) => Sourced::fresh(snapshot),
            Err(e) => {
                self.reporter.report("Weather API", &e);
                Sourced::degraded(fallback(params))
            }
        }
    }
}

/// Snapshot served when the provider is unavailable
#[must_use]
pub fn fallback(point: &Coordinates) -> WeatherSnapshot {
    WeatherSnapshot {
        location: destinations::name_near(point.lat, point.lon).to_string(),
        temperature: -2.0,
        wind_speed: 5.0,
        precipitation: 0.0,
        symbol_code: FALLBACK_SYMBOL.to_string(),
        description: describe_symbol(FALLBACK_SYMBOL),
        risk_level: RiskLevel::Medium,
    }
}

/// Additive score over temperature, wind, precipitation and snowy symbols
#[must_use]
pub fn assess_risk(temperature: f64, wind_speed: f64, precipitation: f64, symbol_code: &str) -> RiskLevel {
    let mut score = 0;

    if temperature < -10.0 {
        score += 3;
    } else if temperature < 0.0 {
        score += 2;
    } else if temperature < 5.0 {
        score += 1;
    }

    if wind_speed > 15.0 {
        score += 2;
    } else if wind_speed > 10.0 {
        score += 1;
    }

    if precipitation > 5.0 {
        score += 2;
    } else if precipitation > 1.0 {
        score += 1;
    }

    if symbol_code.contains("snow") || symbol_code.contains("sleet") {
        score += 2;
    }

    match score {
        s if s >= 5 => RiskLevel::High,
        s if s >= 3 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Human-readable text for a met.no symbol code; unknown codes are echoed
#[must_use]
pub fn describe_symbol(symbol_code: &str) -> String {
    let base = symbol_code
        .replace("_polartwilight", "")
        .replace("_night", "")
        .replace("_day", "");

    let description = match base.as_str() {
        "clearsky" => "Clear sky",
        "fair" => "Fair weather",
        "partlycloudy" => "Partly cloudy",
        "cloudy" => "Cloudy",
        "lightrainshowers" => "Light rain showers",
        "rainshowers" => "Rain showers",
        "heavyrainshowers" => "Heavy rain showers",
        "lightrain" => "Light rain",
        "rain" => "Rain",
        "heavyrain" => "Heavy rain",
        "lightsleet" => "Light sleet",
        "sleet" => "Sleet",
        "heavysleet" => "Heavy sleet",
        "lightsnow" => "Light snow",
        "snow" => "Snow",
        "heavysnow" => "Heavy snow",
        "fog" => "Fog",
        _ => return symbol_code.to_string(),
    };
    description.to_string()
}

pub(crate) fn snapshot_from_forecast(
    forecast: &LocationForecast,
    point: &Coordinates,
) -> Result<WeatherSnapshot> {
    let current = forecast
        .properties
        .timeseries
        .first()
        .context("Forecast contains no timeseries entries")?;

    let details = &current.data.instant.details;
    let next_hour = current.data.next_1_hours.as_ref();
    let precipitation = next_hour
        .and_then(|h| h.details.precipitation_amount)
        .unwrap_or(0.0);
    let symbol_code = next_hour
        .map_or(FALLBACK_SYMBOL, |h| h.summary.symbol_code.as_str())
        .to_string();

    Ok(WeatherSnapshot {
        location: destinations::name_near(point.lat, point.lon).to_string(),
        temperature: details.air_temperature.round(),
        wind_speed: details.wind_speed.round(),
        precipitation: (precipitation * 10.0).round() / 10.0,
        description: describe_symbol(&symbol_code),
        risk_level: assess_risk(
            details.air_temperature,
            details.wind_speed,
            precipitation,
            &symbol_code,
        ),
        symbol_code,
    })
}

/// met.no Locationforecast response structures
#[derive(Debug, Deserialize)]
pub(crate) struct LocationForecast {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    timeseries: Vec<Timeseries>,
}

#[derive(Debug, Deserialize)]
struct Timeseries {
    data: TimeseriesData,
}

#[derive(Debug, Deserialize)]
struct TimeseriesData {
    instant: InstantData,
    next_1_hours: Option<NextHour>,
}

#[derive(Debug, Deserialize)]
struct InstantData {
    details: InstantDetails,
}

#[derive(Debug, Deserialize)]
struct InstantDetails {
    air_temperature: f64,
    wind_speed: f64,
}

#[derive(Debug, Deserialize)]
struct NextHour {
    summary: NextHourSummary,
    details: NextHourDetails,
}

#[derive(Debug, Deserialize)]
struct NextHourSummary {
    symbol_code: String,
}

#[derive(Debug, Deserialize)]
struct NextHourDetails {
    precipitation_amount: Option<f64>,
}
