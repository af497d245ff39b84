//! Risk fusion: one verdict from the weather, avalanche and road snapshots

use serde::{Deserialize, Serialize};

use crate::models::{AvalancheData, DangerLevel, RiskLevel, RoadData, RoadStatus, WeatherSnapshot};

/// Combined verdict for a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallSafety {
    Safe,
    Caution,
    Warning,
}

const WARNING_SCORE: u8 = 4;
const CAUTION_SCORE: u8 = 2;

fn weather_score(weather: &WeatherSnapshot) -> u8 {
    match weather.risk_level {
        RiskLevel::High => 3,
        RiskLevel::Medium => 1,
        RiskLevel::Low => 0,
    }
}

/// Only the most severe warning counts
fn avalanche_score(avalanche: &AvalancheData) -> u8 {
    match avalanche.max_danger() {
        Some(level) if level >= DangerLevel::High => 3,
        Some(DangerLevel::Considerable) => 2,
        Some(DangerLevel::Moderate) => 1,
        _ => 0,
    }
}

fn has_status(roads: &RoadData, wanted: &[RoadStatus]) -> bool {
    roads.conditions.iter().any(|c| wanted.contains(&c.status))
}

fn road_score(roads: &RoadData) -> u8 {
    if has_status(roads, &[RoadStatus::Closed]) {
        2
    } else if has_status(roads, &[RoadStatus::Warning, RoadStatus::Convoy]) {
        1
    } else {
        0
    }
}

/// Additive score over the three snapshots; a missing snapshot scores zero.
/// Each category contributes once, at its most severe tier.
#[must_use]
pub fn risk_score(
    weather: Option<&WeatherSnapshot>,
    avalanche: Option<&AvalancheData>,
    roads: Option<&RoadData>,
) -> u8 {
    weather.map_or(0, weather_score) + avalanche.map_or(0, avalanche_score) + roads.map_or(0, road_score)
}

#[must_use]
pub fn compute_overall_safety(
    weather: Option<&WeatherSnapshot>,
    avalanche: Option<&AvalancheData>,
    roads: Option<&RoadData>,
) -> OverallSafety {
    match risk_score(weather, avalanche, roads) {
        score if score >= WARNING_SCORE => OverallSafety::Warning,
        score if score >= CAUTION_SCORE => OverallSafety::Caution,
        _ => OverallSafety::Safe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvalancheWarning, RoadCondition};
    use chrono::Utc;
    use rstest::rstest;

    fn weather(risk_level: RiskLevel) -> WeatherSnapshot {
        WeatherSnapshot {
            location: "Tromsø".to_string(),
            temperature: -5.0,
            wind_speed: 10.0,
            precipitation: 2.0,
            symbol_code: "cloudy".to_string(),
            description: "Cloudy".to_string(),
            risk_level,
        }
    }

    fn avalanche(levels: &[DangerLevel]) -> AvalancheData {
        AvalancheData {
            warnings: levels
                .iter()
                .map(|&danger_level| AvalancheWarning {
                    danger_level,
                    danger_level_name: danger_level.name().to_string(),
                    valid_from: "2024-01-15".to_string(),
                    valid_to: "2024-01-16".to_string(),
                    main_text: "Test warning".to_string(),
                    region_name: "Tromsø".to_string(),
                })
                .collect(),
            last_updated: Utc::now(),
        }
    }

    fn roads(statuses: &[RoadStatus]) -> RoadData {
        RoadData {
            conditions: statuses
                .iter()
                .enumerate()
                .map(|(i, &status)| RoadCondition {
                    id: i.to_string(),
                    route: "E6 Test".to_string(),
                    status,
                    message: "Test message".to_string(),
                    updated: Utc::now(),
                })
                .collect(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_nothing_known_is_safe() {
        assert_eq!(compute_overall_safety(None, None, None), OverallSafety::Safe);
    }

    #[test]
    fn test_low_risk_everywhere_is_safe() {
        let result = compute_overall_safety(
            Some(&weather(RiskLevel::Low)),
            Some(&avalanche(&[DangerLevel::Low])),
            Some(&roads(&[RoadStatus::Open])),
        );
        assert_eq!(result, OverallSafety::Safe);
    }

    #[test]
    fn test_high_weather_alone_is_caution() {
        let result = compute_overall_safety(
            Some(&weather(RiskLevel::High)),
            Some(&avalanche(&[DangerLevel::Low])),
            Some(&roads(&[RoadStatus::Open])),
        );
        assert_eq!(result, OverallSafety::Caution);
    }

    #[test]
    fn test_avalanche_four_alone_and_with_closed_roads() {
        let high = avalanche(&[DangerLevel::High]);
        assert_eq!(compute_overall_safety(None, Some(&high), None), OverallSafety::Caution);
        assert_eq!(
            compute_overall_safety(None, Some(&high), Some(&roads(&[RoadStatus::Closed]))),
            OverallSafety::Warning
        );
    }

    #[test]
    fn test_road_statuses() {
        assert_eq!(
            compute_overall_safety(None, None, Some(&roads(&[RoadStatus::Closed]))),
            OverallSafety::Caution
        );
        assert_eq!(
            compute_overall_safety(
                Some(&weather(RiskLevel::Low)),
                Some(&avalanche(&[DangerLevel::Low])),
                Some(&roads(&[RoadStatus::Convoy]))
            ),
            OverallSafety::Safe
        );
    }

    #[test]
    fn test_each_category_counts_once() {
        let many = avalanche(&[DangerLevel::High, DangerLevel::VeryHigh, DangerLevel::Considerable]);
        assert_eq!(risk_score(None, Some(&many), None), 3);

        let mixed = roads(&[RoadStatus::Closed, RoadStatus::Closed, RoadStatus::Convoy, RoadStatus::Warning]);
        assert_eq!(risk_score(None, None, Some(&mixed)), 2);

        assert_eq!(risk_score(None, Some(&avalanche(&[])), Some(&roads(&[]))), 0);
    }

    #[test]
    fn test_warning_order_does_not_matter() {
        let forward = avalanche(&[DangerLevel::Moderate, DangerLevel::Considerable]);
        let reverse = avalanche(&[DangerLevel::Considerable, DangerLevel::Moderate]);
        assert_eq!(
            risk_score(None, Some(&forward), None),
            risk_score(None, Some(&reverse), None)
        );

        let forward = roads(&[RoadStatus::Open, RoadStatus::Closed]);
        let reverse = roads(&[RoadStatus::Closed, RoadStatus::Open]);
        assert_eq!(
            risk_score(None, None, Some(&forward)),
            risk_score(None, None, Some(&reverse))
        );
    }

    #[test]
    fn test_total_over_all_single_inputs() {
        let risks = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];
        let levels = [
            DangerLevel::Low,
            DangerLevel::Moderate,
            DangerLevel::Considerable,
            DangerLevel::High,
            DangerLevel::VeryHigh,
        ];
        let statuses = [RoadStatus::Open, RoadStatus::Closed, RoadStatus::Convoy, RoadStatus::Warning];

        for risk in risks {
            for level in levels {
                for status in statuses {
                    let w = weather(risk);
                    let a = avalanche(&[level]);
                    let r = roads(&[status]);
                    let score = risk_score(Some(&w), Some(&a), Some(&r));
                    assert!(score <= 8);

                    let expected = if score >= 4 {
                        OverallSafety::Warning
                    } else if score >= 2 {
                        OverallSafety::Caution
                    } else {
                        OverallSafety::Safe
                    };
                    assert_eq!(compute_overall_safety(Some(&w), Some(&a), Some(&r)), expected);
                }
            }
        }
    }

    #[rstest]
    #[case(DangerLevel::Low, 0)]
    #[case(DangerLevel::Moderate, 1)]
    #[case(DangerLevel::Considerable, 2)]
    #[case(DangerLevel::High, 3)]
    #[case(DangerLevel::VeryHigh, 3)]
    fn test_avalanche_tiers(#[case] level: DangerLevel, #[case] score: u8) {
        assert_eq!(risk_score(None, Some(&avalanche(&[level])), None), score);
    }

    #[test]
    fn test_tromso_winter_storm_scenario() {
        // 3 (high weather) + 1 (moderate avalanche) + 0 (open roads)
        let result = compute_overall_safety(
            Some(&weather(RiskLevel::High)),
            Some(&avalanche(&[DangerLevel::Moderate])),
            Some(&roads(&[RoadStatus::Open])),
        );
        assert_eq!(result, OverallSafety::Warning);
    }
}
