//! NVE Varsom avalanche warning client

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{LenientNumber, Source, Sourced, fetch_json};
use crate::models::{AvalancheData, AvalancheParams, AvalancheWarning, DangerLevel};
use crate::telemetry::ErrorReporter;

const DEFAULT_REGION: &str = "Tromsø";
const FORECAST_DAYS: i64 = 2;

pub struct AvalancheSource {
    client: Client,
    base_url: String,
    reporter: ErrorReporter,
}

impl AvalancheSource {
    pub fn new(client: Client, base_url: &str, reporter: ErrorReporter) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            reporter,
        }
    }

    fn warnings_url(&self, params: &AvalancheParams, today: DateTime<Utc>) -> String {
        let start = today.format("%Y-%m-%d");
        let end = (today + Duration::days(FORECAST_DAYS)).format("%Y-%m-%d");
        format!(
            "{}/AvalancheWarningByCoordinates/Simple/{}/{}/{}/{}/{}",
            self.base_url,
            params.coordinates.lon,
            params.coordinates.lat,
            params.language.key(),
            start,
            end
        )
    }

    async fn try_fetch(&self, params: &AvalancheParams) -> Result<AvalancheData> {
        let url = self.warnings_url(params, Utc::now());
        let entries: Vec<VarsomEntry> = fetch_json(&self.client, &url).await?;
        let data = data_from_entries(entries);
        info!("Retrieved {} avalanche warnings", data.warnings.len());
        Ok(data)
    }
}

#[async_trait]
impl Source for AvalancheSource {
    type Params = AvalancheParams;
    type Output = AvalancheData;

    fn name(&self) -> &'static str {
        "avalanche"
    }

    fn cache_key(&self, params: &AvalancheParams) -> String {
        format!(
            "{}:{}",
            params.coordinates.cache_key(self.name()),
            params.language.code()
        )
    }

    #[instrument(
        name = "fetch_avalanche",
        skip(self),
        fields(lat = params.coordinates.lat, lon = params.coordinates.lon)
    )]
    async fn fetch(&self, params: &AvalancheParams) -> Sourced<AvalancheData> {
        match self.try_fetch(params).await {
            Ok(data) => Sourced::fresh(data),
            Err(e) => {
                self.reporter.report("Avalanche API", &e);
                Sourced::degraded(fallback())
            }
        }
    }
}

/// A single synthetic moderate warning
#[must_use]
pub fn fallback() -> AvalancheData {
    let now = Utc::now();
    AvalancheData {
        warnings: vec![AvalancheWarning {
            danger_level: DangerLevel::Moderate,
            danger_level_name: DangerLevel::Moderate.name().to_string(),
            valid_from: now.to_rfc3339(),
            valid_to: (now + Duration::days(1)).to_rfc3339(),
            main_text: "Wind slabs may form on lee slopes. Avoid steep terrain above treeline."
                .to_string(),
            region_name: DEFAULT_REGION.to_string(),
        }],
        last_updated: now,
    }
}

fn data_from_entries(entries: Vec<VarsomEntry>) -> AvalancheData {
    AvalancheData {
        warnings: entries.into_iter().filter_map(warning_from_entry).collect(),
        last_updated: Utc::now(),
    }
}

/// Maps one entry, dropping levels outside 1-5 (NVE reports 0 when not assessed)
fn warning_from_entry(entry: VarsomEntry) -> Option<AvalancheWarning> {
    let raw_level = entry.danger_level.as_ref().and_then(LenientNumber::as_f64)?;
    let danger_level = u8::try_from(raw_level as i64)
        .ok()
        .and_then(|level| DangerLevel::try_from(level).ok());

    let Some(danger_level) = danger_level else {
        debug!("Skipping avalanche entry with danger level {}", raw_level);
        return None;
    };

    Some(AvalancheWarning {
        danger_level,
        danger_level_name: entry
            .danger_level_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| danger_level.name().to_string()),
        valid_from: entry.valid_from.unwrap_or_default(),
        valid_to: entry.valid_to.unwrap_or_default(),
        main_text: entry.main_text.unwrap_or_default(),
        region_name: entry
            .region_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VarsomEntry {
    danger_level: Option<LenientNumber>,
    danger_level_name: Option<String>,
    valid_from: Option<String>,
    valid_to: Option<String>,
    main_text: Option<String>,
    region_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, Language};
    use chrono::TimeZone;

    fn parse(json: &str) -> AvalancheData {
        let entries: Vec<VarsomEntry> = serde_json::from_str(json).unwrap();
        data_from_entries(entries)
    }

    #[test]
    fn test_warnings_url_window_and_language() {
        let source = AvalancheSource::new(
            Client::new(),
            "https://api01.nve.no/hydrology/forecast/avalanche/v6.3.0/api/",
            ErrorReporter::log_only(),
        );
        let params = AvalancheParams::new(Coordinates::new(69.6496, 18.956), Language::Norwegian);
        let today = Utc.with_ymd_and_hms(2024, 12, 31, 8, 0, 0).unwrap();
        assert_eq!(
            source.warnings_url(&params, today),
            "https://api01.nve.no/hydrology/forecast/avalanche/v6.3.0/api/AvalancheWarningByCoordinates/Simple/18.956/69.6496/1/2024-12-31/2025-01-02"
        );
    }

    #[test]
    fn test_cache_key_includes_language() {
        let source = AvalancheSource::new(Client::new(), "http://nve", ErrorReporter::log_only());
        let params = AvalancheParams::new(Coordinates::new(69.6496, 18.956), Language::English);
        assert_eq!(source.cache_key(&params), "avalanche:69.6496:18.9560:en");
    }

    #[test]
    fn test_entries_map_to_warnings() {
        let data = parse(
            r#"[
                {"DangerLevel": "3", "DangerLevelName": "3 Considerable", "ValidFrom": "2024-01-15T00:00:00",
                 "ValidTo": "2024-01-15T23:59:59", "MainText": "Fresh wind slabs.", "RegionName": "Tromsø"},
                {"DangerLevel": 2, "ValidFrom": "2024-01-16T00:00:00", "RegionName": "Lyngen"}
            ]"#,
        );
        assert_eq!(data.warnings.len(), 2);
        assert_eq!(data.warnings[0].danger_level, DangerLevel::Considerable);
        assert_eq!(data.warnings[0].danger_level_name, "3 Considerable");
        assert_eq!(data.warnings[1].danger_level_name, "Moderate");
        assert_eq!(data.warnings[1].main_text, "");
        assert_eq!(data.max_danger(), Some(DangerLevel::Considerable));
    }

    #[test]
    fn test_unassessed_and_missing_levels_are_dropped() {
        let data = parse(
            r#"[
                {"DangerLevel": "0", "RegionName": "Svalbard"},
                {"DangerLevel": 6},
                {"RegionName": "Nowhere"},
                {"DangerLevel": 4}
            ]"#,
        );
        assert_eq!(data.warnings.len(), 1);
        assert_eq!(data.warnings[0].danger_level, DangerLevel::High);
        assert_eq!(data.warnings[0].region_name, "Tromsø");
    }

    #[test]
    fn test_empty_response_has_no_warnings() {
        assert!(parse("[]").warnings.is_empty());
    }

    #[test]
    fn test_fallback_is_single_moderate_warning() {
        let data = fallback();
        assert_eq!(data.warnings.len(), 1);
        assert_eq!(data.warnings[0].danger_level, DangerLevel::Moderate);
        assert_eq!(data.warnings[0].danger_level_name, "Moderate");
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades() {
        let source = AvalancheSource::new(Client::new(), "http://127.0.0.1:9", ErrorReporter::log_only());
        let params = AvalancheParams::new(Coordinates::new(69.6496, 18.956), Language::English);
        let result = source.fetch(&params).await;
        assert!(result.degraded);
        assert_eq!(result.value.warnings.len(), 1);
    }
}
