//! Place search backed by Nominatim, with a built-in list of well-known
//! cities for when the upstream is disabled or unreachable.

use std::time::Duration;

use geo::{HaversineDistance, Point};
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::seed::Coordinates;

const RESULT_LIMIT: usize = 5;
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder returned unparsable coordinates for place {0}")]
    BadCoordinates(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeSource {
    Upstream,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub city: String,
    pub state: String,
    pub country: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub id: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub locations: Vec<Place>,
    pub source: GeocodeSource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestPlace {
    pub location: Place,
    pub distance_km: f64,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: u64,
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

impl TryFrom<NominatimPlace> for Place {
    type Error = GeocodeError;

    fn try_from(p: NominatimPlace) -> Result<Self, Self::Error> {
        let latitude = p.lat.parse().map_err(|_| GeocodeError::BadCoordinates(p.place_id))?;
        let longitude = p.lon.parse().map_err(|_| GeocodeError::BadCoordinates(p.place_id))?;
        let a = p.address;
        Ok(Place {
            id: p.place_id,
            name: p.display_name,
            latitude,
            longitude,
            address: Address {
                city: a.city.or(a.town).or(a.village).unwrap_or_default(),
                state: a.state.unwrap_or_default(),
                country: a.country.unwrap_or_default(),
                country_code: a.country_code.unwrap_or_default(),
            },
        })
    }
}

struct KnownCity {
    city: &'static str,
    state: &'static str,
    country: &'static str,
    country_code: &'static str,
    latitude: f64,
    longitude: f64,
}

const fn us(city: &'static str, state: &'static str, latitude: f64, longitude: f64) -> KnownCity {
    KnownCity { city, state, country: "USA", country_code: "US", latitude, longitude }
}

const fn intl(
    city: &'static str,
    country: &'static str,
    country_code: &'static str,
    latitude: f64,
    longitude: f64,
) -> KnownCity {
    KnownCity { city, state: "", country, country_code, latitude, longitude }
}

const KNOWN_CITIES: [KnownCity; 29] = [
    us("New York", "NY", 40.7128, -74.0060),
    us("Los Angeles", "CA", 34.0522, -118.2437),
    us("Chicago", "IL", 41.8781, -87.6298),
    us("Houston", "TX", 29.7604, -95.3698),
    us("Phoenix", "AZ", 33.4484, -112.0740),
    us("Philadelphia", "PA", 39.9526, -75.1652),
    us("San Antonio", "TX", 29.4241, -98.4936),
    us("San Diego", "CA", 32.7157, -117.1611),
    us("Dallas", "TX", 32.7767, -96.7970),
    us("San Jose", "CA", 37.3382, -121.8863),
    us("Austin", "TX", 30.2672, -97.7431),
    us("Jacksonville", "FL", 30.3322, -81.6557),
    us("Fort Worth", "TX", 32.7555, -97.3308),
    us("Columbus", "OH", 39.9612, -82.9988),
    us("Charlotte", "NC", 35.2271, -80.8431),
    us("San Francisco", "CA", 37.7749, -122.4194),
    us("Indianapolis", "IN", 39.7684, -86.1581),
    us("Seattle", "WA", 47.6062, -122.3321),
    us("Denver", "CO", 39.7392, -104.9903),
    intl("London", "UK", "GB", 51.5074, -0.1278),
    intl("Paris", "France", "FR", 48.8566, 2.3522),
    intl("Tokyo", "Japan", "JP", 35.6762, 139.6503),
    intl("Sydney", "Australia", "AU", -33.8688, 151.2093),
    intl("Toronto", "Canada", "CA", 43.6532, -79.3832),
    intl("Berlin", "Germany", "DE", 52.5200, 13.4050),
    intl("Rome", "Italy", "IT", 41.9028, 12.4964),
    intl("Madrid", "Spain", "ES", 40.4168, -3.7038),
    intl("Amsterdam", "Netherlands", "NL", 52.3676, 4.9041),
    intl("Vienna", "Austria", "AT", 48.2082, 16.3738),
];

impl KnownCity {
    fn to_place(&self, id: u64) -> Place {
        let name = if self.state.is_empty() {
            format!("{}, {}", self.city, self.country)
        } else {
            format!("{}, {}, {}", self.city, self.state, self.country)
        };
        Place {
            id,
            name,
            latitude: self.latitude,
            longitude: self.longitude,
            address: Address {
                city: self.city.to_string(),
                state: self.state.to_string(),
                country: self.country.to_string(),
                country_code: self.country_code.to_string(),
            },
        }
    }
}

type CityPoint = GeomWithData<[f64; 2], usize>;

/// Built-in city list with an R-tree over `[lon, lat]` for nearest lookups.
pub struct Gazetteer {
    tree: RTree<CityPoint>,
}

impl Gazetteer {
    pub fn new() -> Self {
        let points = KNOWN_CITIES
            .iter()
            .enumerate()
            .map(|(i, c)| CityPoint::new([c.longitude, c.latitude], i))
            .collect();
        Self { tree: RTree::bulk_load(points) }
    }

    /// Case-insensitive substring match on city or country, capped at five.
    pub fn search(&self, query: &str) -> Vec<Place> {
        let needle = query.trim().to_lowercase();
        KNOWN_CITIES
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.city.to_lowercase().contains(&needle) || c.country.to_lowercase().contains(&needle)
            })
            .take(RESULT_LIMIT)
            .map(|(i, c)| c.to_place(i as u64 + 1))
            .collect()
    }

    pub fn nearest(&self, coords: &Coordinates) -> Option<NearestPlace> {
        let hit = self.tree.nearest_neighbor(&[coords.longitude, coords.latitude])?;
        let city = &KNOWN_CITIES[hit.data];
        let from = Point::new(coords.longitude, coords.latitude);
        let to = Point::new(city.longitude, city.latitude);
        Some(NearestPlace {
            location: city.to_place(hit.data as u64 + 1),
            distance_km: from.haversine_distance(&to) / 1000.0,
        })
    }
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Geocoder {
    http: reqwest::Client,
    url: String,
    enabled: bool,
    gazetteer: Gazetteer,
}

impl Geocoder {
    pub fn new(config: &Config) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .user_agent(config.geocoder_user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            url: config.geocoder_url.clone(),
            enabled: config.geocoder_enabled,
            gazetteer: Gazetteer::new(),
        })
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    async fn upstream(&self, query: &str) -> Result<Vec<Place>, GeocodeError> {
        let limit = RESULT_LIMIT.to_string();
        let places: Vec<NominatimPlace> = self
            .http
            .get(&self.url)
            .query(&[("format", "json"), ("q", query), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        places.into_iter().map(Place::try_from).collect()
    }

    /// Forward search; never fails, the built-in list answers when the upstream can't.
    pub async fn search(&self, query: &str) -> SearchResponse {
        if self.enabled {
            match self.upstream(query).await {
                Ok(locations) => {
                    debug!(query, results = locations.len(), "geocoder answered");
                    return SearchResponse { locations, source: GeocodeSource::Upstream };
                }
                Err(err) => warn!(query, error = %err, "geocoder failed, searching known cities"),
            }
        }
        SearchResponse { locations: self.gazetteer.search(query), source: GeocodeSource::Fallback }
    }
}
