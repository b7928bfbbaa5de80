//! Heuristics that turn a free-form completion into typed fields.
//!
//! Replies are split into sections on markdown headings, then individual
//! values are pulled out of section text with keyword and number matching.
//! Keyword checks are case-insensitive; every extractor has a default so a
//! reply with missing sections still produces a complete response.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::weather::risk::RiskLevel;

lazy_static! {
    static ref CONFIDENCE: Regex = Regex::new(r"(?i)(\d+)%?\s*confidence").unwrap();
    static ref PROBABILITY: Regex = Regex::new(r"(?i)(\d+)%?\s*probability").unwrap();
    static ref PERCENTAGE: Regex = Regex::new(r"(\d+)%").unwrap();
    static ref ALTITUDE: Regex = Regex::new(r"(?i)(\d+)m").unwrap();
    static ref NUMBER: Regex = Regex::new(r"(\d+(?:\.\d+)?)").unwrap();
}

const CLOUD_TYPES: [&str; 6] = ["Cumulus", "Stratus", "Cirrus", "Cumulonimbus", "Altocumulus", "Altostratus"];
const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

#[derive(Debug, Default)]
pub struct Sections {
    inner: HashMap<String, Vec<String>>,
}

impl Sections {
    /// A line containing `**` or `#` opens a section named by the line with
    /// those markers stripped. Text before the first heading is dropped.
    pub fn parse(text: &str) -> Self {
        let mut inner: HashMap<String, Vec<String>> = HashMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            if line.contains("**") || line.contains('#') {
                let title = line.replace(['#', '*'], "").trim().to_string();
                inner.insert(title.clone(), Vec::new());
                current = Some(title);
            } else if let Some(title) = &current {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    inner.entry(title.clone()).or_default().push(trimmed.to_string());
                }
            }
        }
        Self { inner }
    }

    pub fn lines(&self, title: &str) -> Option<&[String]> {
        self.inner.get(title).map(Vec::as_slice)
    }

    /// Section lines joined with spaces.
    pub fn text(&self, title: &str) -> Option<String> {
        self.lines(title).map(|l| l.join(" "))
    }

    pub fn lines_or(&self, title: &str, default: &[&str]) -> Vec<String> {
        match self.lines(title) {
            Some(lines) => lines.to_vec(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn first_or(&self, title: &str, default: &str) -> String {
        self.lines(title)
            .and_then(|l| l.first())
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

fn capture_u32(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

pub fn confidence_level(text: &str) -> f64 {
    if let Some(n) = capture_u32(&CONFIDENCE, text) {
        return (f64::from(n) / 100.0).min(1.0);
    }
    let lower = text.to_lowercase();
    if lower.contains("high confidence") {
        0.85
    } else if lower.contains("moderate confidence") {
        0.65
    } else if lower.contains("low confidence") {
        0.45
    } else {
        0.75
    }
}

pub fn risk_level(text: &str) -> RiskLevel {
    let lower = text.to_lowercase();
    if lower.contains("extreme") {
        RiskLevel::Extreme
    } else if lower.contains("very high") {
        RiskLevel::VeryHigh
    } else if lower.contains("high") {
        RiskLevel::High
    } else if lower.contains("moderate") {
        RiskLevel::Moderate
    } else if lower.contains("low") {
        RiskLevel::Low
    } else {
        RiskLevel::VeryLow
    }
}

/// Stated probability in percent, capped at 100.
pub fn probability(text: &str) -> Option<u32> {
    capture_u32(&PROBABILITY, text).map(|n| n.min(100))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

pub fn anomaly_severity(text: &str) -> Severity {
    let lower = text.to_lowercase();
    if lower.contains("significant") || lower.contains("severe") {
        Severity::High
    } else if lower.contains("moderate") || lower.contains("notable") {
        Severity::Medium
    } else {
        Severity::Low
    }
}

pub fn percentage(text: &str) -> f64 {
    capture_u32(&PERCENTAGE, text).map_or(50.0, f64::from)
}

pub fn density(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("very dense") {
        "Very Dense"
    } else if lower.contains("dense") {
        "Dense"
    } else if lower.contains("moderate") {
        "Moderate"
    } else {
        "Sparse"
    }
}

pub fn cloud_types(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    CLOUD_TYPES
        .iter()
        .filter(|t| lower.contains(&t.to_lowercase()))
        .map(|t| t.to_string())
        .collect()
}

pub fn altitude(text: &str) -> f64 {
    capture_u32(&ALTITUDE, text).map_or(3000.0, f64::from)
}

pub fn intensity(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("extreme") {
        "Extreme"
    } else if lower.contains("heavy") {
        "Heavy"
    } else if lower.contains("moderate") {
        "Moderate"
    } else if lower.contains("light") {
        "Light"
    } else {
        "None"
    }
}

pub fn precipitation_type(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("snow") {
        "Snow"
    } else if lower.contains("sleet") {
        "Sleet"
    } else if lower.contains("hail") {
        "Hail"
    } else if lower.contains("mixed") {
        "Mixed"
    } else {
        "Rain"
    }
}

pub fn number(text: &str) -> f64 {
    NUMBER
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// First compass point (in N, NE, E, ... order) contained anywhere in the text.
pub fn direction(text: &str) -> &'static str {
    DIRECTIONS.iter().find(|d| text.contains(*d)).copied().unwrap_or("N")
}

pub fn mentions_storm(text: &str) -> bool {
    text.to_lowercase().contains("storm")
}
