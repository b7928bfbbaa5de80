use chrono::{Datelike, NaiveDate};
use h3o::{LatLng, Resolution};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ~5 km² cells: neighbours share the same mock weather for a given day.
const SEED_RESOLUTION: Resolution = Resolution::Seven;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ApiError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ApiError::Validation(format!(
                "Coordinates out of range: {latitude}, {longitude}"
            )));
        }
        // Also rejects NaN / infinities.
        LatLng::new(latitude, longitude)
            .map_err(|e| ApiError::Validation(format!("Invalid coordinates: {e}")))?;
        Ok(Self { latitude, longitude })
    }

    /// Builds coordinates from the optional fields of a request body.
    pub fn from_request(latitude: Option<f64>, longitude: Option<f64>) -> Result<Self, ApiError> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon),
            _ => Err(ApiError::missing_location_fields()),
        }
    }

    pub fn cell_key(&self) -> u64 {
        // Validated in `new`, so the fallback is unreachable in practice.
        LatLng::new(self.latitude, self.longitude)
            .map(|ll| u64::from(ll.to_cell(SEED_RESOLUTION)))
            .unwrap_or_default()
    }
}

/// `"lat, lon"` with four decimals, the label used across all responses.
pub fn format_location(coords: &Coordinates) -> String {
    format!("{:.4}, {:.4}", coords.latitude, coords.longitude)
}

/// Deterministic generator for one neighbourhood on one day.
pub fn request_rng(coords: &Coordinates, date: NaiveDate) -> StdRng {
    let day = u64::from(date.num_days_from_ce().unsigned_abs());
    let seed = coords.cell_key() ^ day.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    StdRng::seed_from_u64(seed)
}

/// Parses a `YYYY-MM-DD` request date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    // Accept full ISO timestamps from clients that send `toISOString()`.
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}
