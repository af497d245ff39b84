//! Avalanche warning models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Coordinates;

/// NVE avalanche danger scale, serialized as its number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DangerLevel {
    Low = 1,
    Moderate = 2,
    Considerable = 3,
    High = 4,
    VeryHigh = 5,
}

impl DangerLevel {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DangerLevel::Low => "Low",
            DangerLevel::Moderate => "Moderate",
            DangerLevel::Considerable => "Considerable",
            DangerLevel::High => "High",
            DangerLevel::VeryHigh => "Very High",
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DangerLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DangerLevel::Low),
            2 => Ok(DangerLevel::Moderate),
            3 => Ok(DangerLevel::Considerable),
            4 => Ok(DangerLevel::High),
            5 => Ok(DangerLevel::VeryHigh),
            other => Err(format!("danger level must be 1-5, got {other}")),
        }
    }
}

impl From<DangerLevel> for u8 {
    fn from(level: DangerLevel) -> Self {
        level.value()
    }
}

/// One regional avalanche warning
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvalancheWarning {
    pub danger_level: DangerLevel,
    pub danger_level_name: String,
    /// Start of validity as reported by the provider
    pub valid_from: String,
    pub valid_to: String,
    pub main_text: String,
    pub region_name: String,
}

/// All warnings covering a destination; may be empty
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvalancheData {
    pub warnings: Vec<AvalancheWarning>,
    pub last_updated: DateTime<Utc>,
}

impl AvalancheData {
    /// Highest danger level among the warnings
    #[must_use]
    pub fn max_danger(&self) -> Option<DangerLevel> {
        self.warnings.iter().map(|w| w.danger_level).max()
    }
}

/// Warning text language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Norwegian,
}

impl Language {
    /// `no` selects Norwegian, anything else English
    #[must_use]
    pub fn from_query(lang: Option<&str>) -> Self {
        match lang {
            Some("no") => Language::Norwegian,
            _ => Language::English,
        }
    }

    /// NVE language key
    #[must_use]
    pub fn key(self) -> u8 {
        match self {
            Language::Norwegian => 1,
            Language::English => 2,
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Language::Norwegian => "no",
            Language::English => "en",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvalancheParams {
    pub coordinates: Coordinates,
    pub language: Language,
}

impl AvalancheParams {
    #[must_use]
    pub fn new(coordinates: Coordinates, language: Language) -> Self {
        Self {
            coordinates,
            language,
        }
    }
}
