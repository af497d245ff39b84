//! Road status models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, WinterReadyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadStatus {
    Open,
    Closed,
    /// Escorted driving behind a plow
    Convoy,
    Warning,
}

/// Fixed set of regions with their own route table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadRegion {
    Tromso,
    Lofoten,
    Nordkapp,
    #[default]
    National,
}

impl RoadRegion {
    pub const ALL: [RoadRegion; 4] = [
        RoadRegion::Tromso,
        RoadRegion::Lofoten,
        RoadRegion::Nordkapp,
        RoadRegion::National,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RoadRegion::Tromso => "tromso",
            RoadRegion::Lofoten => "lofoten",
            RoadRegion::Nordkapp => "nordkapp",
            RoadRegion::National => "national",
        }
    }
}

impl fmt::Display for RoadRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoadRegion {
    type Err = WinterReadyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoadRegion::ALL
            .into_iter()
            .find(|region| region.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = RoadRegion::ALL.iter().map(|r| r.as_str()).collect();
                WinterReadyError::validation(
                    ErrorCode::InvalidRegion,
                    format!("Invalid region. Must be one of: {}", valid.join(", ")),
                )
            })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoadCondition {
    pub id: String,
    pub route: String,
    pub status: RoadStatus,
    pub message: String,
    pub updated: DateTime<Utc>,
}

/// All routes of one region
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoadData {
    pub conditions: Vec<RoadCondition>,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_round_trips_through_str() {
        for region in RoadRegion::ALL {
            assert_eq!(region.as_str().parse::<RoadRegion>().unwrap(), region);
        }
    }

    #[test]
    fn test_unknown_region_is_validation_error() {
        let err = "atlantis".parse::<RoadRegion>().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRegion);
        assert!(err.to_string().contains("tromso, lofoten, nordkapp, national"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RoadStatus::Convoy).unwrap(), "\"convoy\"");
        assert_eq!(RoadRegion::default(), RoadRegion::National);
    }
}
