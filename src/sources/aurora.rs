//! NOAA planetary Kp forecast client and the aurora visibility estimate

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{LenientNumber, Source, Sourced, fetch_json};
use crate::models::{AuroraForecast, AuroraParams, AuroraRating};
use crate::telemetry::ErrorReporter;

const FALLBACK_KP: f64 = 2.0;
const MIN_PROBABILITY: f64 = 5.0;
const HEAVY_CLOUD_COVER: f64 = 80.0;

pub struct AuroraSource {
    client: Client,
    url: String,
    reporter: ErrorReporter,
}

impl AuroraSource {
    pub fn new(client: Client, url: &str, reporter: ErrorReporter) -> Self {
        Self {
            client,
            url: url.to_string(),
            reporter,
        }
    }

    async fn try_fetch(&self, params: &AuroraParams) -> Result<AuroraForecast> {
        let rows: Vec<Vec<Value>> = fetch_json(&self.client, &self.url).await?;
        let kp = peak_kp(&rows, Utc::now())?;
        info!("Retrieved Kp forecast, peak Kp {:.1}", kp);
        Ok(forecast_for(kp, params))
    }
}

#[async_trait]
impl Source for AuroraSource {
    type Params = AuroraParams;
    type Output = AuroraForecast;

    fn name(&self) -> &'static str {
        "aurora"
    }

    fn cache_key(&self, params: &AuroraParams) -> String {
        params.cache_key()
    }

    #[instrument(
        name = "fetch_aurora",
        skip(self),
        fields(cloud_cover = params.cloud_cover, latitude = params.latitude)
    )]
    async fn fetch(&self, params: &AuroraParams) -> Sourced<AuroraForecast> {
        match self.try_fetch(params).await {
            Ok(forecast) => Sourced::fresh(forecast),
            Err(e) => {
                self.reporter.report("Aurora API", &e);
                Sourced::degraded(fallback(params))
            }
        }
    }
}

/// Estimate for a quiet Kp 2 night
#[must_use]
pub fn fallback(params: &AuroraParams) -> AuroraForecast {
    forecast_for(FALLBACK_KP, params)
}

/// Builds the full forecast for a Kp value
#[must_use]
pub fn forecast_for(kp: f64, params: &AuroraParams) -> AuroraForecast {
    let kp_index = (kp * 10.0).round() / 10.0;
    let probability = probability(kp_index, params.cloud_cover, params.latitude);
    let overall_rating = rating_for(probability);

    AuroraForecast {
        kp_index,
        probability,
        cloud_cover: params.cloud_cover,
        overall_rating,
        best_time: best_viewing_time(kp_index).to_string(),
        description: describe(overall_rating, params.cloud_cover).to_string(),
    }
}

fn latitude_multiplier(latitude: f64) -> f64 {
    match latitude {
        l if l >= 66.0 => 1.0,
        l if l >= 62.0 => 0.7,
        l if l >= 58.0 => 0.4,
        _ => 0.2,
    }
}

/// Chance of seeing the aurora in percent, never below 5
#[must_use]
pub fn probability(kp: f64, cloud_cover: f64, latitude: f64) -> u8 {
    let base = match kp {
        k if k >= 5.0 => 95.0,
        k if k >= 4.0 => 85.0,
        k if k >= 3.0 => 70.0,
        k if k >= 2.0 => 50.0,
        k if k >= 1.0 => 30.0,
        _ => 10.0,
    };
    let base = (base * latitude_multiplier(latitude)).round();
    let cloud_reduction = (cloud_cover / 100.0) * base * 0.9;
    let value = (base - cloud_reduction).round().max(MIN_PROBABILITY);
    value.min(100.0) as u8
}

#[must_use]
pub fn rating_for(probability: u8) -> AuroraRating {
    match probability {
        p if p >= 70 => AuroraRating::Excellent,
        p if p >= 45 => AuroraRating::Good,
        p if p >= 25 => AuroraRating::Moderate,
        _ => AuroraRating::Poor,
    }
}

#[must_use]
pub fn best_viewing_time(kp: f64) -> &'static str {
    if kp >= 3.0 {
        "21:00 – 02:00"
    } else if kp >= 2.0 {
        "22:00 – 01:00"
    } else {
        "23:00 – 00:00"
    }
}

fn describe(rating: AuroraRating, cloud_cover: f64) -> &'static str {
    if cloud_cover > HEAVY_CLOUD_COVER {
        return "Heavy cloud cover will likely block the view. Consider indoor activities tonight.";
    }
    match rating {
        AuroraRating::Excellent => {
            "Excellent conditions for Northern Lights! Head to a dark spot away from city lights."
        }
        AuroraRating::Good => {
            "Good chance of seeing the aurora tonight. Find a location with clear northern horizon."
        }
        AuroraRating::Moderate => {
            "Moderate activity expected. Aurora may be visible during brief clearings."
        }
        AuroraRating::Poor => {
            "Low aurora activity expected. Keep an eye on the sky but don't count on it."
        }
    }
}

fn parse_time_tag(tag: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(tag, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(tag, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|time| time.and_utc())
}

fn row_kp(row: &[Value]) -> Option<f64> {
    let raw = row.get(1)?;
    serde_json::from_value::<LenientNumber>(raw.clone())
        .ok()?
        .as_f64()
}

/// Highest Kp within the next 24 hours. When the window holds nothing above
/// zero the last entry of the series is used. The first row is a header.
pub(crate) fn peak_kp(rows: &[Vec<Value>], now: DateTime<Utc>) -> Result<f64> {
    let Some((_header, entries)) = rows.split_first() else {
        bail!("Kp forecast is empty");
    };

    let horizon = now + Duration::hours(24);
    let mut best = 0.0_f64;
    for row in entries {
        let Some(time) = row.first().and_then(Value::as_str).and_then(parse_time_tag) else {
            debug!("Skipping Kp row without a valid time tag");
            continue;
        };
        if time >= now && time < horizon {
            if let Some(kp) = row_kp(row) {
                best = best.max(kp);
            }
        }
    }

    if best == 0.0 {
        if let Some(last) = entries.last() {
            best = row_kp(last).context("Latest Kp entry is not a number")?;
        }
    }
    Ok(best)
}
