use std::collections::BTreeMap;

use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;

use super::history::{self, DailyRecord, TrendAnalysis};
use super::mock::{self, WeatherData};
use super::risk::{RiskLevel, WetConditionsRisk, wet_conditions_risk};

const HISTORY_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct EventImpact {
    pub risk: RiskLevel,
    pub impact: String,
    pub considerations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SevereWeatherProbability {
    pub thunderstorm: &'static str,
    pub flooding: &'static str,
    pub wind_damage: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroclimateFactors {
    pub urban_heat_island: &'static str,
    pub elevation_effect: &'static str,
    pub coastal_influence: &'static str,
    pub topographic_shelter: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedAnalysis {
    pub wet_conditions_risk: WetConditionsRisk,
    pub event_impact_analysis: BTreeMap<&'static str, EventImpact>,
    pub severe_weather_probability: SevereWeatherProbability,
    pub microclimate_factors: MicroclimateFactors,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    #[serde(flatten)]
    pub base: WeatherData,
    pub historical_data: Vec<DailyRecord>,
    pub trend_analysis: TrendAnalysis,
    pub advanced_analysis: AdvancedAnalysis,
}

struct EventProfile {
    name: &'static str,
    threshold: f64,
    high: &'static str,
    low: &'static str,
    considerations: [&'static str; 5],
}

const EVENT_PROFILES: [EventProfile; 5] = [
    EventProfile {
        name: "parade",
        threshold: 30.0,
        high: "High - Floats and participants at risk",
        low: "Low - Suitable conditions",
        considerations: [
            "Float stability concerns in high wind",
            "Participant safety on wet surfaces",
            "Spectator comfort in rain",
            "Route drainage assessment needed",
            "Emergency vehicle access in poor conditions",
        ],
    },
    EventProfile {
        name: "concert",
        threshold: 40.0,
        high: "High - Equipment damage risk",
        low: "Low - Good conditions",
        considerations: [
            "Electrical equipment safety concerns",
            "Stage slip hazards",
            "Sound equipment water damage",
            "Artist and crew safety",
            "Audience experience degradation",
        ],
    },
    EventProfile {
        name: "sports",
        threshold: 25.0,
        high: "High - Player safety issues",
        low: "Low - Playable conditions",
        considerations: [
            "Field/play surface safety",
            "Player injury risk increase",
            "Ball handling difficulties",
            "Spectator viewing experience",
            "Match postponement likelihood",
        ],
    },
    EventProfile {
        name: "wedding",
        threshold: 20.0,
        high: "High - Ceremony disruption",
        low: "Low - Beautiful conditions",
        considerations: [
            "Ceremony location viability",
            "Photography conditions",
            "Guest comfort and experience",
            "Venue accessibility",
            "Alternative indoor options",
        ],
    },
    EventProfile {
        name: "outdoor",
        threshold: 35.0,
        high: "High - General disruption",
        low: "Low - Suitable for activities",
        considerations: [
            "General activity feasibility",
            "Attendee comfort levels",
            "Equipment and setup protection",
            "Venue accessibility",
            "Overall event success probability",
        ],
    },
];

fn event_impacts(precipitation: f64, risk: RiskLevel) -> BTreeMap<&'static str, EventImpact> {
    EVENT_PROFILES
        .iter()
        .map(|p| {
            let impact = if precipitation > p.threshold { p.high } else { p.low };
            (
                p.name,
                EventImpact {
                    risk,
                    impact: impact.to_string(),
                    considerations: p.considerations.iter().map(|s| s.to_string()).collect(),
                },
            )
        })
        .collect()
}

fn severe_weather(precipitation: f64, wind_speed: f64) -> SevereWeatherProbability {
    SevereWeatherProbability {
        thunderstorm: if precipitation > 60.0 && wind_speed > 15.0 { "High" } else { "Low" },
        flooding: if precipitation > 80.0 {
            "High"
        } else if precipitation > 50.0 {
            "Moderate"
        } else {
            "Low"
        },
        wind_damage: if wind_speed > 25.0 {
            "High"
        } else if wind_speed > 15.0 {
            "Moderate"
        } else {
            "Low"
        },
    }
}

fn microclimate(event_type: Option<&str>, humidity: f64) -> MicroclimateFactors {
    MicroclimateFactors {
        urban_heat_island: if event_type == Some("outdoor") { "Moderate" } else { "Low" },
        elevation_effect: "Minimal",
        coastal_influence: if humidity > 70.0 { "Moderate" } else { "Low" },
        topographic_shelter: "Variable - location dependent",
    }
}

/// Mock sample, 30-day history and the derived risk sections in one report.
pub fn advanced_report<R: Rng + ?Sized>(
    location: String,
    date: String,
    event_type: Option<&str>,
    today: NaiveDate,
    rng: &mut R,
) -> WeatherReport {
    let base = mock::generate(location, date, rng);
    let historical_data = history::generate_history(HISTORY_WINDOW_DAYS, today, rng);
    let trend_analysis = history::analyze_trends(&historical_data);

    let wet = wet_conditions_risk(base.precipitation, base.humidity, base.wind_speed);
    let advanced_analysis = AdvancedAnalysis {
        event_impact_analysis: event_impacts(base.precipitation, wet.level),
        severe_weather_probability: severe_weather(base.precipitation, base.wind_speed),
        microclimate_factors: microclimate(event_type, base.humidity),
        wet_conditions_risk: wet,
    };

    WeatherReport {
        base,
        historical_data,
        trend_analysis,
        advanced_analysis,
    }
}
