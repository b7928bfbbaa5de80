pub mod analysis;
pub mod history;
pub mod mock;
pub mod risk;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    Sunny,
    #[serde(rename = "Partly Cloudy")]
    PartlyCloudy,
    Cloudy,
    Rainy,
    Thunderstorm,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::Sunny,
        Condition::PartlyCloudy,
        Condition::Cloudy,
        Condition::Rainy,
        Condition::Thunderstorm,
    ];

    /// Ordinal used by the event-risk rule (Cloudy = 2, Rainy = 3, ...).
    pub fn severity_index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sunny => "Sunny",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Rainy => "Rainy",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The four numeric fields alerts and risk scoring care about. Missing
/// fields deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
}

impl Reading {
    /// Draws a reading from the same ranges as the mock generator.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            temperature: f64::from(rng.gen_range(10..40)),
            humidity: f64::from(rng.gen_range(40..100)),
            wind_speed: f64::from(rng.gen_range(5..25)),
            precipitation: f64::from(rng.gen_range(0..100)),
        }
    }
}
