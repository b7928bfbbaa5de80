use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::sections::{self, Sections, Severity};
use super::{ChatCompletion, CompletionRequest, Source, ask};
use crate::seed::{Coordinates, format_location};
use crate::weather::risk::RiskLevel;

const SYSTEM_PROMPT: &str = "You are a weather risk analyst with access to satellite data, climate \
    models and predictive analytics. Your analysis informs decisions about outdoor events. Give \
    scientifically grounded assessments with confidence levels and actionable recommendations. \
    Use markdown headings for each section.";

const FALLBACK_EXTREME_SCORE: f64 = 85.0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    pub conditions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub date: Option<String>,
    pub event_type: Option<String>,
    pub historical_data: Option<Vec<serde_json::Value>>,
    pub current_conditions: Option<CurrentConditions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskPrediction {
    pub level: RiskLevel,
    pub probability: u32,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictiveInsights {
    pub short_term: Vec<String>,
    pub medium_term: Vec<String>,
    pub long_term: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionPlan {
    pub immediate: Vec<String>,
    pub strategic: Vec<String>,
    pub contingency: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub overall_assessment: String,
    pub confidence_level: f64,
    pub key_factors: Vec<String>,
    pub risk_prediction: RiskPrediction,
    pub predictive_insights: PredictiveInsights,
    pub recommendations: ActionPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalySummary {
    pub anomalies: Vec<String>,
    pub severity: Severity,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub primary_trend: String,
    pub secondary_trends: Vec<String>,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedPatterns {
    pub detected_patterns: Vec<String>,
    pub anomaly_detection: AnomalySummary,
    pub trend_analysis: TrendSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteStatus {
    pub available: bool,
    pub last_update: DateTime<Utc>,
    pub data_quality: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateModels {
    pub model_used: &'static str,
    pub accuracy: f64,
    pub confidence_interval: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceWeather {
    pub solar_activity: &'static str,
    pub impact: &'static str,
    pub relevance: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NasaIntegration {
    pub satellite_data: SatelliteStatus,
    pub climate_models: ClimateModels,
    pub space_weather: SpaceWeather,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub ai_analysis: AiAnalysis,
    pub advanced_patterns: AdvancedPatterns,
    pub nasa_integration: NasaIntegration,
    pub source: Source,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

pub fn build_prompt(request: &PredictionRequest, coords: &Coordinates, date: &str) -> CompletionRequest {
    let current = request.current_conditions.clone().unwrap_or_default();
    let prompt = format!(
        "Analyze the following weather data and give a comprehensive prediction.\n\n\
         Location: {location}\n\
         Date: {date}\n\
         Event Type: {event}\n\n\
         Current Conditions:\n\
         - Temperature: {temp}°C\n\
         - Humidity: {humidity}%\n\
         - Wind Speed: {wind} km/h\n\
         - Precipitation: {precip}%\n\
         - Conditions: {conditions}\n\n\
         Historical Context Available: {history}\n\n\
         Provide sections titled: Overall Assessment, Key Factors, Risk Prediction, \
         Short-term Insights, Medium-term Insights, Long-term Insights, Immediate Recommendations, \
         Strategic Recommendations, Contingency Plans, Detected Patterns, Anomalies, Primary Trend, \
         Secondary Trends. Focus on very wet conditions and their impact on outdoor events.",
        location = format_location(coords),
        event = request.event_type.as_deref().unwrap_or("General outdoor activity"),
        temp = or_na(current.temperature),
        humidity = or_na(current.humidity),
        wind = or_na(current.wind_speed),
        precip = or_na(current.precipitation),
        conditions = current.conditions.as_deref().unwrap_or("N/A"),
        history = if request.historical_data.is_some() { "Yes" } else { "No" },
    );

    CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        temperature: 0.3,
        max_tokens: 2000,
    }
}

pub fn parse_reply<R: Rng + ?Sized>(reply: &str, now: DateTime<Utc>, rng: &mut R) -> PredictionResponse {
    let s = Sections::parse(reply);

    let overall_assessment = s
        .text("Overall Assessment")
        .unwrap_or_else(|| "Comprehensive weather analysis completed".to_string());
    let anomaly_text = s.text("Anomalies").unwrap_or_default();

    let ai_analysis = AiAnalysis {
        confidence_level: sections::confidence_level(&overall_assessment),
        key_factors: s.lines_or("Key Factors", &[]),
        risk_prediction: RiskPrediction {
            level: sections::risk_level(&overall_assessment),
            probability: sections::probability(&overall_assessment)
                .unwrap_or_else(|| rng.gen_range(30..70)),
            reasoning: s
                .text("Risk Prediction")
                .unwrap_or_else(|| "Based on comprehensive analysis of weather patterns".to_string()),
        },
        predictive_insights: PredictiveInsights {
            short_term: s.lines_or("Short-term Insights", &["Weather conditions expected to remain stable"]),
            medium_term: s.lines_or("Medium-term Insights", &["Moderate changes anticipated"]),
            long_term: s.lines_or(
                "Long-term Insights",
                &["Long-term trends indicate typical seasonal patterns"],
            ),
        },
        recommendations: ActionPlan {
            immediate: s.lines_or("Immediate Recommendations", &["Monitor weather conditions regularly"]),
            strategic: s.lines_or("Strategic Recommendations", &["Prepare contingency plans"]),
            contingency: s.lines_or("Contingency Plans", &["Have indoor alternatives ready"]),
        },
        overall_assessment,
    };

    PredictionResponse {
        ai_analysis,
        advanced_patterns: AdvancedPatterns {
            detected_patterns: s.lines_or("Detected Patterns", &["Standard weather patterns detected"]),
            anomaly_detection: AnomalySummary {
                anomalies: s.lines_or("Anomalies", &["No significant anomalies detected"]),
                severity: sections::anomaly_severity(&anomaly_text),
                confidence: 0.85,
            },
            trend_analysis: TrendSummary {
                primary_trend: s.first_or("Primary Trend", "Stable conditions expected"),
                secondary_trends: s.lines_or("Secondary Trends", &["Minor fluctuations possible"]),
                reliability: 0.78,
            },
        },
        nasa_integration: NasaIntegration {
            satellite_data: SatelliteStatus { available: true, last_update: now, data_quality: "Good" },
            climate_models: ClimateModels {
                model_used: "NASA GISS ModelE",
                accuracy: 0.87,
                confidence_interval: 0.12,
            },
            space_weather: SpaceWeather {
                solar_activity: "Moderate",
                impact: "Minimal",
                relevance: "Low impact on terrestrial weather conditions",
            },
        },
        source: Source::Ai,
    }
}

/// Rule-based prediction used whenever the completion service is unavailable.
pub fn fallback<R: Rng + ?Sized>(
    current: Option<&CurrentConditions>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> PredictionResponse {
    let current = current.cloned().unwrap_or_default();
    let precipitation = current.precipitation.unwrap_or_else(|| rng.gen_range(0.0..100.0));
    let humidity = current.humidity.unwrap_or_else(|| rng.gen_range(40.0..100.0));
    let wind_speed = current.wind_speed.unwrap_or_else(|| rng.gen_range(5.0..25.0));

    let wetness = precipitation * 0.6 + humidity * 0.25 + wind_speed * 0.15;
    let level = RiskLevel::bucket(wetness, FALLBACK_EXTREME_SCORE);

    PredictionResponse {
        ai_analysis: AiAnalysis {
            overall_assessment: format!(
                "Advanced weather analysis indicates {} risk of wet conditions for the specified location and time.",
                level.label().to_lowercase()
            ),
            confidence_level: 0.82,
            key_factors: vec![
                format!("Precipitation probability: {}%", precipitation.round()),
                format!("Humidity levels: {}%", humidity.round()),
                format!("Wind speed impact: {} km/h", wind_speed.round()),
                "Seasonal weather patterns".to_string(),
                "Local topographical influences".to_string(),
            ],
            risk_prediction: RiskPrediction {
                level,
                probability: wetness.round().clamp(0.0, 100.0) as u32,
                reasoning: "Based on multi-factor analysis including precipitation probability, humidity levels, \
                            wind speed, and historical weather patterns for this location."
                    .to_string(),
            },
            predictive_insights: PredictiveInsights {
                short_term: strings(&[
                    "Weather conditions expected to remain consistent",
                    "Minor fluctuations in precipitation possible",
                    "Temperature stability anticipated",
                ]),
                medium_term: strings(&[
                    "Gradual changes in weather patterns expected",
                    "Precipitation levels may vary",
                    "Wind conditions likely to remain stable",
                ]),
                long_term: strings(&[
                    "Seasonal trends indicate typical patterns",
                    "Long-term stability expected",
                    "No significant weather anomalies detected",
                ]),
            },
            recommendations: ActionPlan {
                immediate: strings(&[
                    "Monitor real-time weather updates",
                    "Prepare weather protection measures",
                    "Establish communication protocols",
                ]),
                strategic: strings(&[
                    "Develop comprehensive weather contingency plans",
                    "Coordinate with local weather services",
                    "Prepare for multiple weather scenarios",
                ]),
                contingency: strings(&[
                    "Identify indoor alternative locations",
                    "Prepare weather-resistant equipment",
                    "Establish evacuation procedures if necessary",
                ]),
            },
        },
        advanced_patterns: AdvancedPatterns {
            detected_patterns: strings(&[
                "Standard seasonal weather patterns",
                "Typical diurnal temperature cycles",
                "Normal precipitation distribution",
            ]),
            anomaly_detection: AnomalySummary {
                anomalies: strings(&["No significant weather anomalies detected"]),
                severity: Severity::Low,
                confidence: 0.91,
            },
            trend_analysis: TrendSummary {
                primary_trend: "Stable weather conditions expected".to_string(),
                secondary_trends: strings(&["Minor precipitation variations", "Temperature within normal ranges"]),
                reliability: 0.87,
            },
        },
        nasa_integration: NasaIntegration {
            satellite_data: SatelliteStatus { available: true, last_update: now, data_quality: "Good" },
            climate_models: ClimateModels {
                model_used: "NASA GISS ModelE (Fallback)",
                accuracy: 0.82,
                confidence_interval: 0.15,
            },
            space_weather: SpaceWeather {
                solar_activity: "Low to Moderate",
                impact: "Minimal",
                relevance: "Negligible impact on local weather conditions",
            },
        },
        source: Source::Fallback,
    }
}

pub async fn predict<R: Rng + Send + ?Sized>(
    backend: Option<&dyn ChatCompletion>,
    request: &PredictionRequest,
    coords: &Coordinates,
    date: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> PredictionResponse {
    match ask(backend, build_prompt(request, coords, date), "ai-prediction").await {
        Some(reply) => parse_reply(&reply, now, rng),
        None => fallback(request.current_conditions.as_ref(), now, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::stub::StubCompletion;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn request(current: Option<CurrentConditions>) -> PredictionRequest {
        PredictionRequest {
            latitude: Some(40.7128),
            longitude: Some(-74.006),
            date: Some("2025-07-04".into()),
            event_type: Some("parade".into()),
            historical_data: None,
            current_conditions: current,
        }
    }

    fn coords() -> Coordinates {
        Coordinates::new(40.7128, -74.006).unwrap()
    }

    #[test]
    fn prompt_mentions_location_and_missing_values() {
        let req = build_prompt(&request(None), &coords(), "2025-07-04");
        assert!(req.prompt.contains("40.7128, -74.0060"));
        assert!(req.prompt.contains("Event Type: parade"));
        assert!(req.prompt.contains("Temperature: N/A"));
        assert!(req.prompt.contains("Historical Context Available: No"));
        assert_eq!(req.max_tokens, 2000);
    }

    #[test]
    fn fallback_scores_current_conditions() {
        let current = CurrentConditions {
            precipitation: Some(90.0),
            humidity: Some(90.0),
            wind_speed: Some(20.0),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        // 54 + 22.5 + 3 = 79.5
        let resp = fallback(Some(&current), Utc::now(), &mut rng);
        assert_eq!(resp.ai_analysis.risk_prediction.level, RiskLevel::VeryHigh);
        assert_eq!(resp.ai_analysis.risk_prediction.probability, 80);
        assert_eq!(resp.source, Source::Fallback);
        assert!(resp.ai_analysis.overall_assessment.contains("very high risk"));
        assert_eq!(resp.ai_analysis.key_factors[0], "Precipitation probability: 90%");
    }

    #[test]
    fn fallback_extreme_starts_at_85() {
        let current = CurrentConditions {
            precipitation: Some(100.0),
            humidity: Some(100.0),
            wind_speed: Some(0.0),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let resp = fallback(Some(&current), Utc::now(), &mut rng);
        assert_eq!(resp.ai_analysis.risk_prediction.level, RiskLevel::Extreme);
    }

    #[test]
    fn parses_structured_reply() {
        let reply = "## Overall Assessment\n\
                     Extreme rainfall expected, 90% confidence and 75% probability of flooding.\n\
                     ## Key Factors\n\
                     Stalled front\n\
                     Saturated soil\n\
                     ## Anomalies\n\
                     Significant moisture surge\n\
                     ## Primary Trend\n\
                     Deteriorating";
        let mut rng = StdRng::seed_from_u64(0);
        let resp = parse_reply(reply, Utc::now(), &mut rng);

        assert_eq!(resp.source, Source::Ai);
        assert_eq!(resp.ai_analysis.confidence_level, 0.9);
        assert_eq!(resp.ai_analysis.risk_prediction.level, RiskLevel::Extreme);
        assert_eq!(resp.ai_analysis.risk_prediction.probability, 75);
        assert_eq!(resp.ai_analysis.key_factors, vec!["Stalled front", "Saturated soil"]);
        assert_eq!(resp.advanced_patterns.anomaly_detection.severity, Severity::High);
        assert_eq!(resp.advanced_patterns.trend_analysis.primary_trend, "Deteriorating");
        assert_eq!(resp.nasa_integration.climate_models.model_used, "NASA GISS ModelE");
    }

    #[test]
    fn unstructured_reply_uses_defaults() {
        let mut rng = StdRng::seed_from_u64(5);
        let resp = parse_reply("It will probably be fine.", Utc::now(), &mut rng);
        assert_eq!(resp.ai_analysis.overall_assessment, "Comprehensive weather analysis completed");
        assert_eq!(resp.ai_analysis.confidence_level, 0.75);
        assert!((30..70).contains(&resp.ai_analysis.risk_prediction.probability));
        assert!(resp.ai_analysis.key_factors.is_empty());
        assert_eq!(resp.advanced_patterns.anomaly_detection.severity, Severity::Low);
    }

    #[tokio::test]
    async fn falls_back_when_backend_fails() {
        let backend = StubCompletion::failing();
        let mut rng = StdRng::seed_from_u64(2);
        let resp = predict(Some(&backend), &request(None), &coords(), "2025-07-04", Utc::now(), &mut rng).await;
        assert_eq!(resp.source, Source::Fallback);
        assert_eq!(backend.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn uses_backend_reply_when_available() {
        let backend = StubCompletion::replying("## Overall Assessment\nlow risk");
        let mut rng = StdRng::seed_from_u64(2);
        let resp = predict(Some(&backend), &request(None), &coords(), "2025-07-04", Utc::now(), &mut rng).await;
        assert_eq!(resp.source, Source::Ai);
        assert_eq!(resp.ai_analysis.risk_prediction.level, RiskLevel::Low);
    }
}
