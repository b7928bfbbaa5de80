//! Weather pattern analysis.
//!
//! The response body is the same templated analysis whether or not the
//! completion backend answers; the reply only decides the `source` tag.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::sections::Severity;
use super::{ChatCompletion, CompletionRequest, Source, ask};
use crate::seed::{Coordinates, format_location};

const SYSTEM_PROMPT: &str = "You are a machine learning weather pattern recognition system with \
    expertise in meteorological data analysis, climate modeling and predictive analytics.";

const FORECAST_HOURS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Seasonal,
    Weekly,
    Daily,
    ExtremeEvents,
    ClimateTrends,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub date: Option<String>,
    pub historical_data: Option<Vec<serde_json::Value>>,
    pub time_range: Option<TimeRange>,
    pub pattern_type: Option<PatternType>,
}

#[derive(Debug, Serialize)]
pub struct Characteristics {
    frequency: u32,
    duration: &'static str,
    intensity: &'static str,
    predictability: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageConditions {
    temperature: f64,
    precipitation: f64,
    humidity: f64,
    wind_speed: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalOccurrence {
    dates: &'static [&'static str],
    similar_events: u32,
    average_conditions: AverageConditions,
}

#[derive(Debug, Serialize)]
pub struct FuturePrediction {
    likelihood: f64,
    timeframe: &'static str,
    confidence: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedPattern {
    id: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    confidence: f64,
    description: &'static str,
    characteristics: Characteristics,
    historical_occurrence: HistoricalOccurrence,
    future_prediction: FuturePrediction,
}

const DETECTED_PATTERNS: &[DetectedPattern] = &[
    DetectedPattern {
        id: "pattern_1",
        kind: "Seasonal Rain Pattern",
        confidence: 0.82,
        description: "Regular seasonal precipitation pattern typical for this region",
        characteristics: Characteristics {
            frequency: 3,
            duration: "2-3 days",
            intensity: "Moderate to Heavy",
            predictability: 0.78,
        },
        historical_occurrence: HistoricalOccurrence {
            dates: &["2024-03-15", "2024-06-20", "2024-09-25"],
            similar_events: 47,
            average_conditions: AverageConditions {
                temperature: 18.0,
                precipitation: 65.0,
                humidity: 78.0,
                wind_speed: 12.0,
            },
        },
        future_prediction: FuturePrediction { likelihood: 0.85, timeframe: "Next 2 weeks", confidence: 0.76 },
    },
    DetectedPattern {
        id: "pattern_2",
        kind: "High Pressure System",
        confidence: 0.74,
        description: "Stable high pressure system bringing clear conditions",
        characteristics: Characteristics {
            frequency: 5,
            duration: "4-7 days",
            intensity: "Weak to Moderate",
            predictability: 0.82,
        },
        historical_occurrence: HistoricalOccurrence {
            dates: &["2024-02-10", "2024-04-18", "2024-07-22", "2024-10-15", "2024-12-08"],
            similar_events: 63,
            average_conditions: AverageConditions {
                temperature: 24.0,
                precipitation: 15.0,
                humidity: 52.0,
                wind_speed: 8.0,
            },
        },
        future_prediction: FuturePrediction { likelihood: 0.68, timeframe: "Next 7 days", confidence: 0.71 },
    },
    DetectedPattern {
        id: "pattern_3",
        kind: "Convective Activity",
        confidence: 0.67,
        description: "Afternoon convective storms typical in warm season",
        characteristics: Characteristics {
            frequency: 8,
            duration: "2-6 hours",
            intensity: "Moderate",
            predictability: 0.65,
        },
        historical_occurrence: HistoricalOccurrence {
            dates: &["2024-05-12", "2024-06-03", "2024-07-18", "2024-08-05", "2024-08-22"],
            similar_events: 89,
            average_conditions: AverageConditions {
                temperature: 28.0,
                precipitation: 45.0,
                humidity: 68.0,
                wind_speed: 15.0,
            },
        },
        future_prediction: FuturePrediction { likelihood: 0.72, timeframe: "Next 3-5 days", confidence: 0.64 },
    },
];

#[derive(Debug, Serialize)]
pub struct FeatureImportance {
    feature: &'static str,
    importance: f64,
    description: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizonConfidence {
    short_term: f64,
    medium_term: f64,
    long_term: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPerformance {
    precision: f64,
    recall: f64,
    f1_score: f64,
    rmse: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineLearningInsights {
    model_accuracy: f64,
    training_data_points: u32,
    feature_importance: Vec<FeatureImportance>,
    prediction_confidence: HorizonConfidence,
    model_performance: ModelPerformance,
}

const FEATURES: [(&str, f64, &str); 5] = [
    ("Temperature", 0.23, "Primary driver of weather pattern formation"),
    ("Humidity", 0.19, "Critical for precipitation and cloud formation"),
    ("Wind Speed", 0.15, "Influences weather system movement and intensity"),
    ("Pressure", 0.12, "Key indicator of atmospheric stability"),
    ("Precipitation History", 0.18, "Essential for pattern recurrence prediction"),
];

fn ml_insights<R: Rng + ?Sized>(rng: &mut R) -> MachineLearningInsights {
    MachineLearningInsights {
        model_accuracy: 0.87 + rng.gen_range(0.0..0.1),
        training_data_points: 15_000 + rng.gen_range(0..10_000),
        feature_importance: FEATURES
            .iter()
            .map(|&(feature, base, description)| FeatureImportance {
                feature,
                importance: base + rng.gen_range(0.0..0.1),
                description,
            })
            .collect(),
        prediction_confidence: HorizonConfidence {
            short_term: 0.85 + rng.gen_range(0.0..0.1),
            medium_term: 0.72 + rng.gen_range(0.0..0.15),
            long_term: 0.58 + rng.gen_range(0.0..0.2),
        },
        model_performance: ModelPerformance {
            precision: 0.84 + rng.gen_range(0.0..0.1),
            recall: 0.81 + rng.gen_range(0.0..0.1),
            f1_score: 0.82 + rng.gen_range(0.0..0.1),
            rmse: 0.15 + rng.gen_range(0.0..0.1),
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAssessment {
    weather_impact: &'static str,
    risk_level: &'static str,
    recommended_actions: [&'static str; 3],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub deviation: f64,
    pub statistical_significance: f64,
    pub potential_causes: [&'static str; 3],
    pub impact_assessment: ImpactAssessment,
}

fn anomalies<R: Rng + ?Sized>(rng: &mut R) -> Vec<Anomaly> {
    let mut out = Vec::new();

    if rng.gen_bool(0.4) {
        let severity = if rng.gen_bool(0.3) {
            Severity::High
        } else if rng.gen_bool(0.6) {
            Severity::Medium
        } else {
            Severity::Low
        };
        out.push(Anomaly {
            id: "anomaly_1",
            kind: "Temperature Anomaly",
            severity,
            description: "Unusual temperature deviation detected from historical averages",
            deviation: rng.gen_range(-4.0..4.0),
            statistical_significance: 0.92 + rng.gen_range(0.0..0.07),
            potential_causes: [
                "Unusual atmospheric circulation patterns",
                "Local topographical effects",
                "Climate variability factors",
            ],
            impact_assessment: ImpactAssessment {
                weather_impact: "Potential disruption to normal weather patterns",
                risk_level: if rng.gen_bool(0.4) { "Moderate" } else { "Low" },
                recommended_actions: [
                    "Monitor temperature trends closely",
                    "Review seasonal forecasts",
                    "Prepare for potential weather extremes",
                ],
            },
        });
    }

    if rng.gen_bool(0.3) {
        let severity = if rng.gen_bool(0.2) {
            Severity::Critical
        } else if rng.gen_bool(0.5) {
            Severity::High
        } else {
            Severity::Medium
        };
        out.push(Anomaly {
            id: "anomaly_2",
            kind: "Precipitation Anomaly",
            severity,
            description: "Significant deviation in precipitation patterns detected",
            deviation: rng.gen_range(-30.0..30.0),
            statistical_significance: 0.88 + rng.gen_range(0.0..0.1),
            potential_causes: [
                "Atmospheric river activity",
                "Monsoon pattern variations",
                "Climate change influences",
            ],
            impact_assessment: ImpactAssessment {
                weather_impact: "High risk of extreme precipitation events",
                risk_level: if rng.gen_bool(0.5) { "High" } else { "Moderate" },
                recommended_actions: [
                    "Implement flood monitoring systems",
                    "Review drainage infrastructure",
                    "Prepare emergency response plans",
                ],
            },
        });
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalRange {
    min: f64,
    max: f64,
    mean: f64,
    std_dev: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviationTrend {
    normal_range: NormalRange,
    current_deviation: f64,
    trend_direction: Direction,
    trend_strength: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyDetection {
    pub anomalies: Vec<Anomaly>,
    pub trend_analysis: DeviationTrend,
}

fn deviation_trend<R: Rng + ?Sized>(rng: &mut R) -> DeviationTrend {
    let directions = [Direction::Increasing, Direction::Decreasing, Direction::Stable];
    DeviationTrend {
        normal_range: NormalRange {
            min: 15.0 + rng.gen_range(0.0..5.0),
            max: 25.0 + rng.gen_range(0.0..5.0),
            mean: 20.0 + rng.gen_range(0.0..3.0),
            std_dev: 2.0 + rng.gen_range(0.0..2.0),
        },
        current_deviation: rng.gen_range(-2.0..2.0),
        trend_direction: directions[rng.gen_range(0..directions.len())],
        trend_strength: rng.gen_range(0.0..1.0),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecognition {
    pub detected_patterns: &'static [DetectedPattern],
    pub machine_learning_insights: MachineLearningInsights,
    pub anomaly_detection: AnomalyDetection,
}

#[derive(Debug, Serialize)]
pub struct FactorCorrelation {
    factor1: &'static str,
    factor2: &'static str,
    correlation: f64,
    significance: f64,
    interpretation: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultivariatePattern {
    pattern: &'static str,
    contributing_factors: [&'static str; 3],
    combined_effect: &'static str,
    confidence: f64,
}

const MULTIVARIATE_PATTERNS: &[MultivariatePattern] = &[
    MultivariatePattern {
        pattern: "Wet Season Pattern",
        contributing_factors: ["High Humidity", "Low Pressure", "Moderate Temperature"],
        combined_effect: "Increased precipitation probability and cloud formation",
        confidence: 0.83,
    },
    MultivariatePattern {
        pattern: "Clear Weather Pattern",
        contributing_factors: ["High Pressure", "Low Humidity", "Moderate Wind"],
        combined_effect: "Stable conditions with minimal precipitation",
        confidence: 0.79,
    },
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationAnalysis {
    weather_factors: Vec<FactorCorrelation>,
    multivariate_patterns: &'static [MultivariatePattern],
}

fn correlations<R: Rng + ?Sized>(rng: &mut R) -> CorrelationAnalysis {
    CorrelationAnalysis {
        weather_factors: vec![
            FactorCorrelation {
                factor1: "Temperature",
                factor2: "Humidity",
                correlation: rng.gen_range(-0.3..0.3),
                significance: 0.95,
                interpretation: "Moderate inverse relationship between temperature and humidity",
            },
            FactorCorrelation {
                factor1: "Wind Speed",
                factor2: "Precipitation",
                correlation: rng.gen_range(-0.2..0.2),
                significance: 0.87,
                interpretation: "Weak correlation between wind speed and precipitation intensity",
            },
            FactorCorrelation {
                factor1: "Pressure",
                factor2: "Cloud Cover",
                correlation: rng.gen_range(-0.4..-0.1),
                significance: 0.92,
                interpretation: "Moderate negative correlation between pressure and cloud formation",
            },
        ],
        multivariate_patterns: MULTIVARIATE_PATTERNS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub time: String,
    pub value: f64,
    pub confidence: f64,
    pub range: ValueRange,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterForecast {
    pub parameter: &'static str,
    pub forecast: Vec<ForecastPoint>,
    pub model_used: &'static str,
    pub accuracy: f64,
}

/// Hourly series around the midpoint of `[min, max]`; confidence decays
/// linearly from 0.85 and each range is the value ±20% of the span, clamped.
pub fn time_series<R: Rng + ?Sized>(
    hours: u32,
    min: f64,
    max: f64,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<ForecastPoint> {
    let span = max - min;
    let base = (min + max) / 2.0;
    (0..hours)
        .map(|i| {
            let value = base + rng.gen_range(-0.15..0.15) * span;
            ForecastPoint {
                time: (now + Duration::hours(i64::from(i))).format("%H:%M").to_string(),
                value,
                confidence: 0.85 - f64::from(i) / f64::from(hours) * 0.2,
                range: ValueRange {
                    min: (value - span * 0.2).max(min),
                    max: (value + span * 0.2).min(max),
                },
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleForecast {
    consensus: &'static str,
    uncertainty: f64,
    model_agreement: f64,
    outlier_models: [&'static str; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictiveModeling {
    pub forecasts: Vec<ParameterForecast>,
    pub ensemble_forecast: EnsembleForecast,
}

fn predictive_modeling<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> PredictiveModeling {
    let series = [
        ("Temperature", 15.0, 30.0, "LSTM Neural Network", 0.86),
        ("Precipitation", 0.0, 100.0, "Random Forest", 0.78),
        ("Humidity", 40.0, 80.0, "Gradient Boosting", 0.82),
    ];
    PredictiveModeling {
        forecasts: series
            .into_iter()
            .map(|(parameter, min, max, model_used, accuracy)| ParameterForecast {
                parameter,
                forecast: time_series(FORECAST_HOURS, min, max, now, rng),
                model_used,
                accuracy,
            })
            .collect(),
        ensemble_forecast: EnsembleForecast {
            consensus: "Moderate weather conditions expected with minor fluctuations",
            uncertainty: 0.18,
            model_agreement: 0.84,
            outlier_models: ["Linear Regression", "Naive Bayes"],
        },
    }
}

#[derive(Debug, Serialize)]
pub struct ClimateSignal {
    signal: &'static str,
    strength: f64,
    confidence: f64,
    impact: &'static str,
    timeframe: &'static str,
}

const CLIMATE_SIGNALS: &[ClimateSignal] = &[
    ClimateSignal {
        signal: "Warming Trend",
        strength: 0.76,
        confidence: 0.89,
        impact: "Gradual temperature increase affecting local weather patterns",
        timeframe: "Long-term (decadal)",
    },
    ClimateSignal {
        signal: "Precipitation Variability",
        strength: 0.62,
        confidence: 0.74,
        impact: "Increased frequency of extreme precipitation events",
        timeframe: "Medium-term (seasonal)",
    },
];

#[derive(Debug, Serialize)]
pub struct RateTrend<T> {
    trend: T,
    rate: f64,
    significance: f64,
}

#[derive(Debug, Serialize)]
pub struct ExtremeEventTrend {
    frequency: Direction,
    intensity: Direction,
    confidence: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTermTrends {
    temperature: RateTrend<&'static str>,
    precipitation: RateTrend<Direction>,
    extreme_events: ExtremeEventTrend,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateSignals {
    detected_signals: &'static [ClimateSignal],
    long_term_trends: LongTermTrends,
}

fn climate_signals<R: Rng + ?Sized>(rng: &mut R) -> ClimateSignals {
    let (trend, rate) = if rng.gen_bool(0.5) {
        (Direction::Increasing, 0.05 + rng.gen_range(0.0..0.05))
    } else {
        (Direction::Stable, 0.0)
    };
    ClimateSignals {
        detected_signals: CLIMATE_SIGNALS,
        long_term_trends: LongTermTrends {
            temperature: RateTrend { trend: "warming", rate: 0.15 + rng.gen_range(0.0..0.1), significance: 0.92 },
            precipitation: RateTrend { trend, rate, significance: 0.67 + rng.gen_range(0.0..0.2) },
            extreme_events: ExtremeEventTrend {
                frequency: Direction::Increasing,
                intensity: Direction::Increasing,
                confidence: 0.71 + rng.gen_range(0.0..0.15),
            },
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedAnalytics {
    correlation_analysis: CorrelationAnalysis,
    predictive_modeling: PredictiveModeling,
    climate_signals: ClimateSignals,
}

#[derive(Debug, Serialize)]
pub struct SatellitePatternRecognition {
    algorithms: [&'static str; 3],
    accuracy: f64,
    resolution: &'static str,
    coverage: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ClimateModel {
    name: &'static str,
    organization: &'static str,
    accuracy: f64,
    strengths: [&'static str; 2],
    limitations: [&'static str; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateModelComparison {
    models: &'static [ClimateModel],
    best_fit_model: &'static str,
    confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct Dataset {
    name: &'static str,
    source: &'static str,
    timeframe: &'static str,
    variables: &'static [&'static str],
    quality: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Finding {
    finding: &'static str,
    significance: &'static str,
    confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct ResearchData {
    datasets: &'static [Dataset],
    findings: &'static [Finding],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NasaPatternIntegration {
    satellite_pattern_recognition: SatellitePatternRecognition,
    climate_model_comparison: ClimateModelComparison,
    research_data: ResearchData,
}

static NASA_INTEGRATION: NasaPatternIntegration = NasaPatternIntegration {
    satellite_pattern_recognition: SatellitePatternRecognition {
        algorithms: ["Convolutional Neural Networks", "Random Forest", "Support Vector Machines"],
        accuracy: 0.91,
        resolution: "1km",
        coverage: "Global",
    },
    climate_model_comparison: ClimateModelComparison {
        models: &[
            ClimateModel {
                name: "GISS ModelE",
                organization: "NASA GISS",
                accuracy: 0.87,
                strengths: ["Long-term climate simulation", "Greenhouse gas modeling"],
                limitations: ["Regional resolution", "Short-term weather prediction"],
            },
            ClimateModel {
                name: "GEOS-5",
                organization: "NASA GSFC",
                accuracy: 0.89,
                strengths: ["Atmospheric chemistry", "Data assimilation"],
                limitations: ["Computational intensity", "Real-time processing"],
            },
            ClimateModel {
                name: "NOAA GFS",
                organization: "NOAA",
                accuracy: 0.85,
                strengths: ["Operational forecasting", "Global coverage"],
                limitations: ["Regional detail", "Extreme event prediction"],
            },
        ],
        best_fit_model: "GEOS-5",
        confidence: 0.89,
    },
    research_data: ResearchData {
        datasets: &[
            Dataset {
                name: "MODIS Land Surface Temperature",
                source: "NASA Terra/Aqua",
                timeframe: "2000-present",
                variables: &["LST", "Emissivity", "Quality Flags"],
                quality: "Excellent",
            },
            Dataset {
                name: "TRMM/GPM Precipitation",
                source: "NASA/JAXA",
                timeframe: "1998-present",
                variables: &["Precipitation Rate", "Precipitation Type", "Cloud Properties"],
                quality: "Good",
            },
            Dataset {
                name: "AIRS Atmospheric Profile",
                source: "NASA Aqua",
                timeframe: "2002-present",
                variables: &["Temperature", "Humidity", "Ozone", "Trace Gases"],
                quality: "Excellent",
            },
        ],
        findings: &[
            Finding {
                finding: "Detectable warming trend in regional surface temperatures",
                significance: "Statistically significant at 95% confidence level",
                confidence: 0.94,
            },
            Finding {
                finding: "Increased frequency of extreme precipitation events",
                significance: "Consistent with climate change predictions",
                confidence: 0.82,
            },
            Finding {
                finding: "Changes in seasonal weather patterns",
                significance: "Impact on agricultural and water resource planning",
                confidence: 0.76,
            },
        ],
    },
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternResponse {
    pub pattern_recognition: PatternRecognition,
    pub advanced_analytics: AdvancedAnalytics,
    pub nasa_integration: &'static NasaPatternIntegration,
    pub source: Source,
}

pub fn build_prompt(request: &PatternRequest, coords: &Coordinates, date: &str) -> CompletionRequest {
    let pattern = request
        .pattern_type
        .and_then(|p| serde_json::to_value(p).ok())
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "comprehensive".to_string());
    let range = request
        .time_range
        .as_ref()
        .map_or_else(|| "Not specified".to_string(), |r| format!("{} to {}", r.start, r.end));

    let prompt = format!(
        "Analyze the following weather data and identify patterns, anomalies and predictive insights.\n\n\
         Location: {}\nDate: {}\nPattern Type: {}\nTime Range: {}\nHistorical Data Available: {}\n\n\
         Cover pattern classification, anomaly detection, correlations between weather factors, \
         forecasting and long-term climate signals, with a focus on very wet conditions.",
        format_location(coords),
        date,
        pattern,
        range,
        if request.historical_data.is_some() { "Yes" } else { "No" },
    );

    CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        temperature: 0.2,
        max_tokens: 2500,
    }
}

pub fn analysis<R: Rng + ?Sized>(source: Source, now: DateTime<Utc>, rng: &mut R) -> PatternResponse {
    PatternResponse {
        pattern_recognition: PatternRecognition {
            detected_patterns: DETECTED_PATTERNS,
            machine_learning_insights: ml_insights(rng),
            anomaly_detection: AnomalyDetection { anomalies: anomalies(rng), trend_analysis: deviation_trend(rng) },
        },
        advanced_analytics: AdvancedAnalytics {
            correlation_analysis: correlations(rng),
            predictive_modeling: predictive_modeling(now, rng),
            climate_signals: climate_signals(rng),
        },
        nasa_integration: &NASA_INTEGRATION,
        source,
    }
}

pub async fn analyze<R: Rng + Send + ?Sized>(
    backend: Option<&dyn ChatCompletion>,
    request: &PatternRequest,
    coords: &Coordinates,
    date: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> PatternResponse {
    let source = match ask(backend, build_prompt(request, coords, date), "weather-patterns").await {
        Some(_) => Source::Ai,
        None => Source::Fallback,
    };
    analysis(source, now, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::stub::StubCompletion;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn forecast_confidence_decays_and_ranges_are_clamped() {
        let now = Utc.with_ymd_and_hms(2025, 7, 4, 22, 30, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let series = time_series(24, 0.0, 100.0, now, &mut rng);

        assert_eq!(series.len(), 24);
        assert_eq!(series[0].time, "22:30");
        assert_eq!(series[2].time, "00:30");
        assert_eq!(series[0].confidence, 0.85);
        assert!((series[12].confidence - 0.75).abs() < 1e-9);
        for p in &series {
            assert!((35.0..=65.0).contains(&p.value));
            assert!(p.range.min >= 0.0 && p.range.max <= 100.0);
            assert!(p.range.min <= p.value && p.value <= p.range.max);
        }
    }

    #[test]
    fn anomaly_ids_and_draw_rates() {
        let mut rng = StdRng::seed_from_u64(9);
        let runs = 2000;
        let (mut temp, mut precip) = (0, 0);
        for _ in 0..runs {
            for a in anomalies(&mut rng) {
                match a.id {
                    "anomaly_1" => temp += 1,
                    "anomaly_2" => precip += 1,
                    other => panic!("unexpected id {other}"),
                }
            }
        }
        let temp_rate = f64::from(temp) / f64::from(runs);
        let precip_rate = f64::from(precip) / f64::from(runs);
        assert!((0.35..0.45).contains(&temp_rate), "{temp_rate}");
        assert!((0.25..0.35).contains(&precip_rate), "{precip_rate}");
    }

    #[test]
    fn response_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let resp = analysis(Source::Fallback, Utc::now(), &mut rng);
        let json = serde_json::to_value(&resp).unwrap();

        let patterns = json["patternRecognition"]["detectedPatterns"].as_array().unwrap();
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[0]["type"], "Seasonal Rain Pattern");
        assert_eq!(json["advancedAnalytics"]["predictiveModeling"]["forecasts"].as_array().unwrap().len(), 3);
        assert_eq!(json["advancedAnalytics"]["correlationAnalysis"]["weatherFactors"].as_array().unwrap().len(), 3);
        assert_eq!(json["nasaIntegration"]["climateModelComparison"]["bestFitModel"], "GEOS-5");
        assert_eq!(json["advancedAnalytics"]["climateSignals"]["longTermTrends"]["temperature"]["trend"], "warming");
        assert_eq!(json["source"], "fallback");
    }

    #[test]
    fn prompt_names_pattern_type_and_range() {
        let request = PatternRequest {
            latitude: Some(1.0),
            longitude: Some(2.0),
            date: Some("2025-07-04".into()),
            historical_data: None,
            time_range: Some(TimeRange { start: "2025-01-01".into(), end: "2025-06-30".into() }),
            pattern_type: Some(PatternType::ExtremeEvents),
        };
        let coords = Coordinates::new(1.0, 2.0).unwrap();
        let req = build_prompt(&request, &coords, "2025-07-04");
        assert!(req.prompt.contains("Pattern Type: extreme_events"));
        assert!(req.prompt.contains("Time Range: 2025-01-01 to 2025-06-30"));
        assert_eq!((req.temperature, req.max_tokens), (0.2, 2500));
    }

    #[tokio::test]
    async fn reply_only_sets_source() {
        let request: PatternRequest =
            serde_json::from_str(r#"{"latitude":1,"longitude":2,"date":"2025-07-04"}"#).unwrap();
        let coords = Coordinates::new(1.0, 2.0).unwrap();
        let backend = StubCompletion::replying("## Patterns\nsomething");
        let mut rng = StdRng::seed_from_u64(3);

        let resp = analyze(Some(&backend), &request, &coords, "2025-07-04", Utc::now(), &mut rng).await;
        assert_eq!(resp.source, Source::Ai);

        let resp = analyze(None, &request, &coords, "2025-07-04", Utc::now(), &mut rng).await;
        assert_eq!(resp.source, Source::Fallback);
    }
}
