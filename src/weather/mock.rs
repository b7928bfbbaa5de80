use rand::Rng;
use serde::Serialize;

use super::risk::{EventRisk, event_risk};
use super::{Condition, Reading};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyForecast {
    pub time: String,
    pub temperature: f64,
    pub precipitation: f64,
    pub conditions: Condition,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub weather_advisory: String,
    pub optimal_timing: String,
    pub backup_plans: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelNote {
    pub level: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub precipitation_risk: LevelNote,
    pub wind_impact: LevelNote,
    pub temperature_comfort: LevelNote,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    pub location: String,
    pub date: String,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub conditions: Condition,
    pub risk_level: EventRisk,
    pub hourly_forecast: Vec<HourlyForecast>,
    pub recommendations: Recommendations,
    pub risk_analysis: RiskAnalysis,
}

impl WeatherData {
    pub fn reading(&self) -> Reading {
        Reading {
            temperature: self.temperature,
            humidity: self.humidity,
            wind_speed: self.wind_speed,
            precipitation: self.precipitation,
        }
    }
}

pub fn generate<R: Rng + ?Sized>(location: String, date: String, rng: &mut R) -> WeatherData {
    let reading = Reading::random(rng);
    let conditions = Condition::random(rng);
    let hourly_forecast = hourly_forecast(&reading, rng);
    build(location, date, reading, conditions, hourly_forecast)
}

/// Assembles the derived fields around an already drawn reading.
fn build(
    location: String,
    date: String,
    reading: Reading,
    conditions: Condition,
    hourly_forecast: Vec<HourlyForecast>,
) -> WeatherData {
    WeatherData {
        location,
        date,
        temperature: reading.temperature,
        humidity: reading.humidity,
        wind_speed: reading.wind_speed,
        precipitation: reading.precipitation,
        conditions,
        risk_level: event_risk(reading.precipitation, reading.wind_speed, conditions),
        hourly_forecast,
        recommendations: recommendations(reading.precipitation),
        risk_analysis: risk_analysis(&reading),
    }
}

pub fn hourly_forecast<R: Rng + ?Sized>(base: &Reading, rng: &mut R) -> Vec<HourlyForecast> {
    (0..24)
        .map(|hour| HourlyForecast {
            time: format!("{hour}:00"),
            temperature: base.temperature + f64::from(rng.gen_range(-5..5)),
            precipitation: (base.precipitation + f64::from(rng.gen_range(-20..20))).max(0.0),
            conditions: Condition::random(rng),
        })
        .collect()
}

pub fn recommendations(precipitation: f64) -> Recommendations {
    let wet = precipitation > 50.0;
    Recommendations {
        weather_advisory: if wet {
            "High chance of precipitation. Consider indoor venue or weather protection."
        } else {
            "Generally favorable conditions expected."
        }
        .to_string(),
        optimal_timing: if wet {
            "Best window: 14:00-17:00 for lower precipitation probability."
        } else {
            "All day suitable for outdoor activities."
        }
        .to_string(),
        backup_plans: if precipitation > 30.0 {
            "Prepare covered areas and have indoor alternatives ready."
        } else {
            "Standard contingency plans recommended."
        }
        .to_string(),
    }
}

pub fn risk_analysis(reading: &Reading) -> RiskAnalysis {
    let p = reading.precipitation;
    let w = reading.wind_speed;
    let t = reading.temperature;

    let precipitation_level = if p > 70.0 {
        "Very High"
    } else if p > 40.0 {
        "High"
    } else if p > 20.0 {
        "Moderate"
    } else {
        "Low"
    };
    let wind_level = if w > 15.0 {
        "High"
    } else if w > 10.0 {
        "Moderate"
    } else {
        "Low"
    };
    let (comfort, comfort_note) = if t < 15.0 {
        ("Cool", "Cool temperatures may require additional clothing or heating.")
    } else if t > 25.0 {
        ("Warm", "Warm conditions, ensure adequate hydration and shade.")
    } else {
        ("Comfortable", "Comfortable temperature range for most activities.")
    };

    RiskAnalysis {
        precipitation_risk: LevelNote {
            level: precipitation_level.to_string(),
            description: if p > 50.0 {
                "High probability of rain affecting outdoor activities."
            } else {
                "Minimal precipitation expected."
            }
            .to_string(),
        },
        wind_impact: LevelNote {
            level: wind_level.to_string(),
            description: if w > 15.0 {
                "Strong winds may affect lightweight structures and comfort."
            } else {
                "Wind conditions should not significantly impact activities."
            }
            .to_string(),
        },
        temperature_comfort: LevelNote {
            level: comfort.to_string(),
            description: comfort_note.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generated_fields_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let data = generate("0.0000, 0.0000".into(), "2025-01-01".into(), &mut rng);
            assert!((10.0..40.0).contains(&data.temperature));
            assert!((40.0..100.0).contains(&data.humidity));
            assert!((5.0..25.0).contains(&data.wind_speed));
            assert!((0.0..100.0).contains(&data.precipitation));
            assert_eq!(data.hourly_forecast.len(), 24);
            assert!(data.hourly_forecast.iter().all(|h| h.precipitation >= 0.0));
        }
    }

    #[test]
    fn hourly_labels_run_midnight_to_23() {
        let mut rng = StdRng::seed_from_u64(1);
        let data = generate("x".into(), "2025-01-01".into(), &mut rng);
        assert_eq!(data.hourly_forecast[0].time, "0:00");
        assert_eq!(data.hourly_forecast[23].time, "23:00");
    }

    #[test]
    fn recommendation_thresholds() {
        let wet = recommendations(51.0);
        assert!(wet.weather_advisory.starts_with("High chance"));
        assert!(wet.backup_plans.starts_with("Prepare covered"));

        let damp = recommendations(40.0);
        assert!(damp.weather_advisory.starts_with("Generally"));
        assert!(damp.backup_plans.starts_with("Prepare covered"));

        let dry = recommendations(30.0);
        assert!(dry.backup_plans.starts_with("Standard"));
    }

    #[test]
    fn risk_analysis_levels() {
        let reading = Reading { temperature: 14.0, humidity: 60.0, wind_speed: 12.0, precipitation: 71.0 };
        let analysis = risk_analysis(&reading);
        assert_eq!(analysis.precipitation_risk.level, "Very High");
        assert_eq!(analysis.wind_impact.level, "Moderate");
        assert_eq!(analysis.temperature_comfort.level, "Cool");

        let reading = Reading { temperature: 26.0, humidity: 60.0, wind_speed: 16.0, precipitation: 21.0 };
        let analysis = risk_analysis(&reading);
        assert_eq!(analysis.precipitation_risk.level, "Moderate");
        assert_eq!(analysis.wind_impact.level, "High");
        assert_eq!(analysis.temperature_comfort.level, "Warm");
    }
}
