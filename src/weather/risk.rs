//! Wet conditions risk scoring.
//!
//! Each input is turned into a 0-100 factor, the factors are combined with
//! fixed weights (precipitation 0.6, humidity 0.25, wind 0.15) and the score
//! is bucketed into six ordinal levels.

use serde::{Deserialize, Serialize};

use super::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
    Extreme,
}

impl RiskLevel {
    /// Buckets a score; `extreme_at` is the lowest score labelled Extreme.
    pub fn bucket(score: f64, extreme_at: f64) -> Self {
        if score >= extreme_at {
            Self::Extreme
        } else if score >= 70.0 {
            Self::VeryHigh
        } else if score >= 50.0 {
            Self::High
        } else if score >= 30.0 {
            Self::Moderate
        } else if score >= 15.0 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VeryLow => "Very Low",
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
            Self::Extreme => "Extreme",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Extreme => {
                "Dangerously wet conditions with high risk of flooding and severe weather impacts."
            }
            Self::VeryHigh => {
                "Severe wet conditions likely to cause significant disruption and safety hazards."
            }
            Self::High => "Heavy precipitation expected with high likelihood of event disruption.",
            Self::Moderate => {
                "Moderate wet conditions that may affect comfort and some activities."
            }
            Self::Low => "Minor precipitation expected, minimal impact on most activities.",
            Self::VeryLow => {
                "Negligible precipitation expected, ideal conditions for outdoor activities."
            }
        }
    }

    fn recommendations(self) -> [&'static str; 5] {
        match self {
            Self::Extreme => [
                "Cancel all outdoor activities immediately",
                "Seek indoor shelter with flood protection",
                "Monitor emergency weather alerts",
                "Prepare for potential evacuation",
                "Avoid all travel if possible",
            ],
            Self::VeryHigh => [
                "Strongly recommend postponing outdoor events",
                "Waterproof shelter essential for any outdoor activity",
                "Have emergency backup plans ready",
                "Monitor weather updates frequently",
                "Avoid low-lying areas prone to flooding",
            ],
            Self::High => [
                "Consider moving activities indoors",
                "Comprehensive rain protection required",
                "Prepare contingency plans",
                "Check venue drainage capabilities",
                "Advise attendees to bring waterproof gear",
            ],
            Self::Moderate => [
                "Light rain protection recommended",
                "Covered areas advisable",
                "Monitor weather trends",
                "Have indoor backup options available",
                "Consider rescheduling sensitive activities",
            ],
            Self::Low => [
                "Umbrella or light rain gear sufficient",
                "Most outdoor activities can proceed",
                "Keep weather monitoring",
                "Prepare for possible light showers",
                "Consider covered areas for comfort",
            ],
            Self::VeryLow => [
                "Perfect weather for outdoor events",
                "No special weather precautions needed",
                "Enjoy optimal outdoor conditions",
                "Standard event planning applies",
                "Monitor for any sudden changes",
            ],
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactors {
    pub precipitation_risk: f64,
    pub humidity_contribution: f64,
    pub wind_impact: f64,
    pub overall_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WetConditionsRisk {
    pub level: RiskLevel,
    pub description: String,
    pub factors: RiskFactors,
    pub recommendations: Vec<String>,
}

const EXTREME_SCORE: f64 = 90.0;

pub fn wet_conditions_risk(precipitation: f64, humidity: f64, wind_speed: f64) -> WetConditionsRisk {
    let precipitation_risk = (precipitation * 1.2).min(100.0);
    let humidity_contribution = if humidity > 80.0 { (humidity - 80.0) * 2.0 } else { 0.0 };
    let wind_impact = if wind_speed > 20.0 { (wind_speed - 20.0) * 1.5 } else { 0.0 };

    let overall_score =
        precipitation_risk * 0.6 + humidity_contribution * 0.25 + wind_impact * 0.15;
    let level = RiskLevel::bucket(overall_score, EXTREME_SCORE);

    WetConditionsRisk {
        level,
        description: level.description().to_string(),
        factors: RiskFactors {
            precipitation_risk: precipitation_risk.round(),
            humidity_contribution: humidity_contribution.round(),
            wind_impact: wind_impact.round(),
            overall_score: overall_score.round(),
        },
        recommendations: level.recommendations().iter().map(|s| s.to_string()).collect(),
    }
}

/// Coarse three-step label shown next to the mock sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventRisk {
    Low,
    Medium,
    High,
}

pub fn event_risk(precipitation: f64, wind_speed: f64, condition: Condition) -> EventRisk {
    let idx = condition.severity_index();
    if precipitation > 70.0 || wind_speed > 15.0 || idx >= 3 {
        EventRisk::High
    } else if precipitation > 40.0 || wind_speed > 10.0 || idx >= 2 {
        EventRisk::Medium
    } else {
        EventRisk::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_calm_day_is_very_low() {
        let risk = wet_conditions_risk(5.0, 50.0, 5.0);
        assert_eq!(risk.level, RiskLevel::VeryLow);
        assert_eq!(risk.factors.precipitation_risk, 6.0);
        assert_eq!(risk.factors.humidity_contribution, 0.0);
        assert_eq!(risk.factors.wind_impact, 0.0);
        assert_eq!(risk.recommendations.len(), 5);
    }

    #[test]
    fn precipitation_factor_is_capped() {
        let risk = wet_conditions_risk(200.0, 0.0, 0.0);
        assert_eq!(risk.factors.precipitation_risk, 100.0);
        assert_eq!(risk.factors.overall_score, 60.0);
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn humidity_and_wind_only_count_above_their_floors() {
        let below = wet_conditions_risk(50.0, 80.0, 20.0);
        assert_eq!(below.factors.humidity_contribution, 0.0);
        assert_eq!(below.factors.wind_impact, 0.0);

        // 60*0.6 + 40*0.25 + 30*0.15 = 36 + 10 + 4.5
        let above = wet_conditions_risk(50.0, 100.0, 40.0);
        assert_eq!(above.factors.humidity_contribution, 40.0);
        assert_eq!(above.factors.wind_impact, 30.0);
        assert_eq!(above.factors.overall_score, 51.0);
        assert_eq!(above.level, RiskLevel::High);
    }

    #[test]
    fn bucket_boundaries_are_inclusive() {
        assert_eq!(RiskLevel::bucket(90.0, EXTREME_SCORE), RiskLevel::Extreme);
        assert_eq!(RiskLevel::bucket(89.9, EXTREME_SCORE), RiskLevel::VeryHigh);
        assert_eq!(RiskLevel::bucket(70.0, EXTREME_SCORE), RiskLevel::VeryHigh);
        assert_eq!(RiskLevel::bucket(50.0, EXTREME_SCORE), RiskLevel::High);
        assert_eq!(RiskLevel::bucket(30.0, EXTREME_SCORE), RiskLevel::Moderate);
        assert_eq!(RiskLevel::bucket(15.0, EXTREME_SCORE), RiskLevel::Low);
        assert_eq!(RiskLevel::bucket(14.99, EXTREME_SCORE), RiskLevel::VeryLow);
        assert_eq!(RiskLevel::bucket(85.0, 85.0), RiskLevel::Extreme);
    }

    #[test]
    fn levels_serialize_with_spaces() {
        assert_eq!(serde_json::to_string(&RiskLevel::VeryHigh).unwrap(), "\"Very High\"");
        assert!(RiskLevel::Extreme > RiskLevel::VeryLow);
    }

    #[test]
    fn event_risk_rules() {
        assert_eq!(event_risk(10.0, 5.0, Condition::Sunny), EventRisk::Low);
        assert_eq!(event_risk(10.0, 5.0, Condition::Cloudy), EventRisk::Medium);
        assert_eq!(event_risk(45.0, 5.0, Condition::Sunny), EventRisk::Medium);
        assert_eq!(event_risk(10.0, 16.0, Condition::Sunny), EventRisk::High);
        assert_eq!(event_risk(10.0, 5.0, Condition::Rainy), EventRisk::High);
    }
}
