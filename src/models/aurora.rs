//! Aurora visibility models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuroraRating {
    Poor,
    Moderate,
    Good,
    Excellent,
}

/// Tonight's northern lights outlook
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuroraForecast {
    /// Planetary Kp index, 0-9
    pub kp_index: f64,
    /// Chance of seeing the aurora in percent
    pub probability: u8,
    /// Cloud cover in percent used for the estimate
    pub cloud_cover: f64,
    pub overall_rating: AuroraRating,
    pub best_time: String,
    pub description: String,
}

/// Inputs of the aurora estimate besides the Kp series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuroraParams {
    pub cloud_cover: f64,
    pub latitude: f64,
}

impl AuroraParams {
    #[must_use]
    pub fn new(cloud_cover: f64, latitude: f64) -> Self {
        Self {
            cloud_cover,
            latitude,
        }
    }

    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("aurora:{:.1}:{:.4}", self.cloud_cover, self.latitude)
    }
}
