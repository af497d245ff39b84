//! Ocean conditions model

use serde::{Deserialize, Serialize};

/// Sea state relevant to boat tours
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OceanSnapshot {
    /// Significant wave height in meters
    pub wave_height: f64,
    /// Sea water temperature in Celsius
    pub water_temperature: f64,
    /// Sea water speed in m/s
    pub current_speed: f64,
    /// Waves below two meters
    pub safe_for_boating: bool,
    pub description: String,
}
