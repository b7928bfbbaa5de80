use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::ai::chat::{self, ChatRequest, ChatResponse};
use crate::ai::patterns::{self, PatternRequest, PatternResponse};
use crate::ai::prediction::{self, PredictionRequest, PredictionResponse};
use crate::ai::satellite::{self, ImageryRequest, ImageryResponse};
use crate::ai::ChatCompletion;
use crate::config::Config;
use crate::demo;
use crate::error::ApiError;
use crate::geocode::{Geocoder, NearestPlace, SearchResponse};
use crate::realtime::{self, Subscriptions};
use crate::seed::{Coordinates, format_location, parse_date, request_rng};
use crate::store::{
    Alert, AlertInput, AlertPatch, DEMO_USER_ID, LocationInput, Profile, ProfileUpdate, SavedLocation,
    Store, UserExport, UserStats,
};
use crate::weather::Reading;
use crate::weather::analysis::{WeatherReport, advanced_report};
use crate::weather::history::{DailyRecord, MAX_HISTORY_DAYS, TrendAnalysis, analyze_trends, generate_history};

// Shared state for every handler
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub ai: Option<Arc<dyn ChatCompletion>>,
    pub geocoder: Geocoder,
    pub subscriptions: Subscriptions,
}

impl AppState {
    fn ai(&self) -> Option<&dyn ChatCompletion> {
        self.ai.as_deref()
    }
}

type Shared = State<Arc<AppState>>;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/weather", post(weather))
        .route("/api/weather/history", post(weather_history))
        .route("/api/weather/ai-prediction", post(ai_prediction))
        .route("/api/weather/patterns", post(weather_patterns))
        .route("/api/satellite/imagery", post(satellite_imagery))
        .route("/api/geocode", get(geocode))
        .route("/api/geocode/reverse", get(reverse_geocode))
        .route("/api/user/profile", get(get_profile).put(update_profile))
        .route("/api/user/stats", get(user_stats))
        .route("/api/user/export", get(export_user))
        .route("/api/user/import", post(import_user))
        .route("/api/user/locations", get(list_locations).post(add_location))
        .route("/api/user/locations/default", get(default_location))
        .route("/api/user/locations/:id", put(update_location).delete(delete_location))
        .route("/api/user/alerts", get(list_alerts).post(create_alert))
        .route("/api/user/alerts/check", post(check_alerts))
        .route("/api/user/alerts/:id", put(update_alert).delete(delete_alert))
        .route("/api/chat", post(chat_message))
        .route("/api/data", get(demo::data))
        .route("/api/data/csv", get(demo::data_csv))
        .route("/ws", get(websocket))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRequest {
    latitude: Option<f64>,
    longitude: Option<f64>,
    date: Option<String>,
    event_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    latitude: Option<f64>,
    longitude: Option<f64>,
    days: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    historical_data: Vec<DailyRecord>,
    trend_analysis: TrendAnalysis,
    location: String,
    period: String,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertListQuery {
    #[serde(default)]
    all: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    triggered_alerts: Vec<Alert>,
}

/// Latitude, longitude and date are all required; a blank date counts as missing.
fn located_day(
    latitude: Option<f64>,
    longitude: Option<f64>,
    date: Option<&str>,
) -> Result<(Coordinates, NaiveDate), ApiError> {
    let date = date.map(str::trim).filter(|d| !d.is_empty());
    let (Some(latitude), Some(longitude), Some(date)) = (latitude, longitude, date) else {
        return Err(ApiError::missing_location_fields());
    };
    Ok((Coordinates::new(latitude, longitude)?, parse_date(date)?))
}

// --- Weather ---

async fn weather(body: Result<Json<WeatherRequest>, JsonRejection>) -> Result<Json<WeatherReport>, ApiError> {
    let Json(req) = body?;
    let (coords, day) = located_day(req.latitude, req.longitude, req.date.as_deref())?;
    let mut rng = request_rng(&coords, day);

    let report = advanced_report(
        format_location(&coords),
        day.to_string(),
        req.event_type.as_deref(),
        Utc::now().date_naive(),
        &mut rng,
    );
    Ok(Json(report))
}

async fn weather_history(
    body: Result<Json<HistoryRequest>, JsonRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Json(req) = body?;
    let (Some(latitude), Some(longitude), Some(days)) = (req.latitude, req.longitude, req.days.filter(|&d| d > 0))
    else {
        return Err(ApiError::Validation("Latitude, longitude, and days are required".into()));
    };
    if days > MAX_HISTORY_DAYS {
        return Err(ApiError::Validation(format!(
            "Maximum {MAX_HISTORY_DAYS} days of historical data allowed"
        )));
    }
    let coords = Coordinates::new(latitude, longitude)?;
    let today = Utc::now().date_naive();
    let mut rng = request_rng(&coords, today);

    let historical_data = generate_history(days, today, &mut rng);
    let trend_analysis = analyze_trends(&historical_data);
    Ok(Json(HistoryResponse {
        historical_data,
        trend_analysis,
        location: format_location(&coords),
        period: format!("{days} days"),
    }))
}

async fn ai_prediction(
    State(state): Shared,
    body: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(req) = body?;
    let (coords, day) = located_day(req.latitude, req.longitude, req.date.as_deref())?;
    let mut rng = request_rng(&coords, day);
    let resp = prediction::predict(state.ai(), &req, &coords, &day.to_string(), Utc::now(), &mut rng).await;
    Ok(Json(resp))
}

async fn weather_patterns(
    State(state): Shared,
    body: Result<Json<PatternRequest>, JsonRejection>,
) -> Result<Json<PatternResponse>, ApiError> {
    let Json(req) = body?;
    let (coords, day) = located_day(req.latitude, req.longitude, req.date.as_deref())?;
    let mut rng = request_rng(&coords, day);
    let resp = patterns::analyze(state.ai(), &req, &coords, &day.to_string(), Utc::now(), &mut rng).await;
    Ok(Json(resp))
}

async fn satellite_imagery(
    State(state): Shared,
    body: Result<Json<ImageryRequest>, JsonRejection>,
) -> Result<Json<ImageryResponse>, ApiError> {
    let Json(req) = body?;
    let (coords, day) = located_day(req.latitude, req.longitude, req.date.as_deref())?;
    let mut rng = request_rng(&coords, day);
    let resp = satellite::analyze(state.ai(), &req, &coords, &day.to_string(), Utc::now(), &mut rng).await;
    Ok(Json(resp))
}

// --- Geocoding ---

async fn geocode(
    State(state): Shared,
    query: Result<Query<GeocodeQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(query) = query?;
    let q = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::Validation("Query parameter is required".into()))?;
    Ok(Json(state.geocoder.search(q).await))
}

async fn reverse_geocode(
    State(state): Shared,
    query: Result<Query<ReverseQuery>, QueryRejection>,
) -> Result<Json<NearestPlace>, ApiError> {
    let Query(query) = query?;
    let (Some(lat), Some(lon)) = (query.lat, query.lon) else {
        return Err(ApiError::Validation("lat and lon are required".into()));
    };
    let coords = Coordinates::new(lat, lon)?;
    state
        .geocoder
        .gazetteer()
        .nearest(&coords)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No known place nearby".into()))
}

// --- User profile ---

async fn get_profile(State(state): Shared) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.store.profile(DEMO_USER_ID).await?))
}

async fn update_profile(
    State(state): Shared,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(update) = body?;
    Ok(Json(state.store.update_profile(DEMO_USER_ID, &update).await?))
}

async fn user_stats(State(state): Shared) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(state.store.stats(DEMO_USER_ID).await?))
}

async fn export_user(State(state): Shared) -> Json<UserExport> {
    Json(state.store.export(DEMO_USER_ID).await)
}

async fn import_user(
    State(state): Shared,
    body: Result<Json<UserExport>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(bundle) = body?;
    Ok(Json(state.store.import(DEMO_USER_ID, bundle).await?))
}

// --- Saved locations ---

async fn list_locations(State(state): Shared) -> Json<Vec<SavedLocation>> {
    Json(state.store.locations(DEMO_USER_ID).await)
}

async fn default_location(State(state): Shared) -> Result<Json<SavedLocation>, ApiError> {
    state
        .store
        .default_location(DEMO_USER_ID)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No saved locations".into()))
}

async fn add_location(
    State(state): Shared,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Result<Json<SavedLocation>, ApiError> {
    let Json(input) = body?;
    Coordinates::new(input.latitude, input.longitude)?;
    Ok(Json(state.store.add_location(DEMO_USER_ID, input).await?))
}

async fn update_location(
    State(state): Shared,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<LocationInput>, JsonRejection>,
) -> Result<Json<SavedLocation>, ApiError> {
    let Path(id) = id?;
    let Json(input) = body?;
    Coordinates::new(input.latitude, input.longitude)?;
    Ok(Json(state.store.update_location(DEMO_USER_ID, id, input).await?))
}

async fn delete_location(
    State(state): Shared,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.store.delete_location(DEMO_USER_ID, id).await?;
    Ok(Json(json!({ "success": true })))
}

// --- Alerts ---

/// Active alerts with their locations; `?all=true` lists inactive ones too.
async fn list_alerts(
    State(state): Shared,
    query: Result<Query<AlertListQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let alerts = if query.all {
        json!(state.store.all_alerts(DEMO_USER_ID).await)
    } else {
        json!(state.store.active_alerts(DEMO_USER_ID).await)
    };
    Ok(Json(json!({ "alerts": alerts })))
}

async fn create_alert(
    State(state): Shared,
    body: Result<Json<AlertInput>, JsonRejection>,
) -> Result<Json<Alert>, ApiError> {
    let Json(input) = body?;
    Ok(Json(state.store.create_alert(DEMO_USER_ID, input).await?))
}

async fn update_alert(
    State(state): Shared,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AlertPatch>, JsonRejection>,
) -> Result<Json<Alert>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = body?;
    Ok(Json(state.store.update_alert(DEMO_USER_ID, id, patch).await?))
}

async fn delete_alert(
    State(state): Shared,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.store.delete_alert(DEMO_USER_ID, id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn check_alerts(
    State(state): Shared,
    body: Result<Json<Reading>, JsonRejection>,
) -> Result<Json<CheckResponse>, ApiError> {
    let Json(sample) = body?;
    let triggered_alerts = state.store.check_alert_conditions(DEMO_USER_ID, &sample).await?;
    Ok(Json(CheckResponse { triggered_alerts }))
}

// --- Chat and realtime ---

async fn chat_message(
    State(state): Shared,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = body?;
    let text = req
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Message text is required".into()))?;
    let mut rng = StdRng::from_entropy();
    Ok(Json(chat::reply(state.ai(), text, &mut rng).await))
}

async fn websocket(State(state): Shared, ws: WebSocketUpgrade) -> Response {
    let subscriptions = state.subscriptions.clone();
    let interval = state.config.monitor_interval;
    ws.on_upgrade(move |socket| realtime::serve_socket(socket, subscriptions, interval))
}
