//! Weather snapshot model

use serde::{Deserialize, Serialize};

/// Three-level weather risk, derived once when the snapshot is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Current conditions at a destination
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    /// Destination name, or "Selected location" for arbitrary points
    pub location: String,
    /// Temperature in Celsius
    pub temperature: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Precipitation over the next hour in mm
    pub precipitation: f64,
    /// met.no symbol code, e.g. `heavysnow_night`
    pub symbol_code: String,
    /// Human-readable description of the symbol
    pub description: String,
    pub risk_level: RiskLevel,
}
