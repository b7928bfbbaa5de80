use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use itertools::Itertools;
use rand::Rng;
use serde::Serialize;

use super::Condition;

pub const MAX_HISTORY_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub temperature: f64,
    pub precipitation: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub conditions: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureTrend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayPattern {
    pub avg_temp: f64,
    pub avg_precipitation: f64,
    pub condition_frequency: BTreeMap<Condition, usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub temperature_trend: TemperatureTrend,
    pub precipitation_trend: PrecipitationTrend,
    pub average_temperature: f64,
    pub average_precipitation: f64,
    pub extreme_weather_days: usize,
    pub most_common_condition: String,
    pub weekly_patterns: BTreeMap<String, WeekdayPattern>,
}

/// Daily records from `today - days` up to and including `today`.
pub fn generate_history<R: Rng + ?Sized>(days: u32, today: NaiveDate, rng: &mut R) -> Vec<DailyRecord> {
    (0..=days)
        .rev()
        .map(|i| {
            let x = f64::from(i);
            let weekly_cycle = 20.0 + (x / 7.0).sin() * 10.0;
            let monthly_trend = (x / 30.0).sin() * 5.0;
            let temp_noise = (rng.gen_range(0.0..1.0) - 0.5) * 10.0;
            let precip_noise = (rng.gen_range(0.0..1.0) - 0.5) * 40.0;

            DailyRecord {
                date: today - Duration::days(i64::from(i)),
                temperature: (weekly_cycle + monthly_trend + temp_noise).round(),
                precipitation: (30.0 + (x / 5.0).sin() * 20.0 + precip_noise).round().max(0.0),
                humidity: (50.0 + rng.gen_range(0.0..30.0_f64)).round(),
                wind_speed: (5.0 + rng.gen_range(0.0..15.0_f64)).round(),
                conditions: Condition::random(rng),
            }
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Splits off the last week and the week before it.
fn comparison_windows(data: &[DailyRecord]) -> (&[DailyRecord], &[DailyRecord]) {
    let len = data.len();
    let recent = &data[len.saturating_sub(7)..];
    let earlier = &data[len.saturating_sub(14)..len.saturating_sub(7)];
    (recent, earlier)
}

fn is_extreme(d: &DailyRecord) -> bool {
    d.temperature > 30.0 || d.temperature < 5.0 || d.precipitation > 70.0 || d.wind_speed > 20.0
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

pub fn analyze_trends(data: &[DailyRecord]) -> TrendAnalysis {
    let (recent, earlier) = comparison_windows(data);

    let temperature_trend = match (
        mean(recent.iter().map(|d| d.temperature)),
        mean(earlier.iter().map(|d| d.temperature)),
    ) {
        (Some(r), Some(e)) if r > e + 2.0 => TemperatureTrend::Rising,
        (Some(r), Some(e)) if r < e - 2.0 => TemperatureTrend::Falling,
        _ => TemperatureTrend::Stable,
    };

    let precipitation_trend = match (
        mean(recent.iter().map(|d| d.precipitation)),
        mean(earlier.iter().map(|d| d.precipitation)),
    ) {
        (Some(r), Some(e)) if r > e + 10.0 => PrecipitationTrend::Increasing,
        (Some(r), Some(e)) if r < e - 10.0 => PrecipitationTrend::Decreasing,
        _ => PrecipitationTrend::Stable,
    };

    let counts: HashMap<Condition, usize> = data.iter().map(|d| d.conditions).counts();
    let top = counts.values().copied().max().unwrap_or(0);
    // Ties go to the condition seen first.
    let most_common_condition = data
        .iter()
        .map(|d| d.conditions)
        .find(|c| counts.get(c) == Some(&top))
        .map_or_else(|| "Unknown".to_string(), |c| c.label().to_string());

    let weekly_patterns = data
        .iter()
        .into_group_map_by(|d| d.date.weekday())
        .into_iter()
        .map(|(day, records)| {
            let pattern = WeekdayPattern {
                avg_temp: mean(records.iter().map(|d| d.temperature)).unwrap_or(0.0).round(),
                avg_precipitation: mean(records.iter().map(|d| d.precipitation))
                    .unwrap_or(0.0)
                    .round(),
                condition_frequency: records.iter().map(|d| d.conditions).counts().into_iter().collect(),
            };
            (weekday_name(day).to_string(), pattern)
        })
        .collect();

    TrendAnalysis {
        temperature_trend,
        precipitation_trend,
        average_temperature: mean(data.iter().map(|d| d.temperature)).unwrap_or(0.0).round(),
        average_precipitation: mean(data.iter().map(|d| d.precipitation)).unwrap_or(0.0).round(),
        extreme_weather_days: data.iter().filter(|d| is_extreme(d)).count(),
        most_common_condition,
        weekly_patterns,
    }
}
