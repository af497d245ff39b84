//! Destination model and the coordinate key shared by the point-based feeds

use serde::{Deserialize, Serialize};

/// A point on the map, used as the cache and fetch key of the point-based feeds
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Cache key for this point under the given source prefix, rounded to four decimals
    #[must_use]
    pub fn cache_key(&self, prefix: &str) -> String {
        let lat = (self.lat * 10_000.0).round() / 10_000.0;
        let lon = (self.lon * 10_000.0).round() / 10_000.0;
        format!("{prefix}:{lat:.4}:{lon:.4}")
    }
}

/// A travel destination. Immutable once created.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Destination {
    /// Display name, also the lookup key of the region and coastal tables
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Destination {
    /// Create a new destination
    #[must_use]
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
        }
    }

    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}
