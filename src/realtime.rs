//! Websocket weather monitor.
//!
//! Frames are JSON objects `{"event": "...", "data": {...}}` in both
//! directions. Each connection owns a `Session`; subscriptions are shared so
//! a monitor tick can see the alert threshold its client registered.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::weather::Reading;

const MIN_MONITOR_INTERVAL: Duration = Duration::from_millis(1000);
const ALERT_ID_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub type Subscriptions = Arc<RwLock<HashMap<Uuid, Subscription>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub user_id: String,
    #[serde(default)]
    pub locations: Vec<String>,
    pub alert_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl AlertLevel {
    fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Extreme => "extreme",
        }
    }

    fn for_precipitation(precipitation: f64) -> Self {
        if precipitation > 80.0 {
            Self::Extreme
        } else if precipitation > 60.0 {
            Self::High
        } else {
            Self::Medium
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    SubscribeWeather(Subscription),
    RequestWeatherAlert {
        location: String,
        #[serde(default)]
        threshold: Option<f64>,
    },
    MonitorWeather {
        location: String,
        /// Milliseconds.
        #[serde(default)]
        interval: Option<u64>,
    },
    TestAlert {
        severity: AlertLevel,
    },
    Message {
        text: String,
        #[serde(default, rename = "senderId")]
        sender_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLine {
    pub text: String,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub features: [&'static str; 5],
    pub instructions: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveAlert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: AlertLevel,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherUpdate {
    pub location: String,
    #[serde(flatten)]
    pub reading: Reading,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Message(ChatLine),
    SystemInfo(SystemInfo),
    SubscriptionConfirmed {
        message: &'static str,
        subscription: Subscription,
    },
    WeatherAlert(LiveAlert),
    WeatherUpdate(WeatherUpdate),
}

/// Nine random base-36 characters.
pub fn alert_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ALERT_ID_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

/// Requested period, or the configured default, never below one second.
pub fn monitor_period(requested_ms: Option<u64>, default: Duration) -> Duration {
    requested_ms
        .filter(|&ms| ms > 0)
        .map_or(default, Duration::from_millis)
        .max(MIN_MONITOR_INTERVAL)
}

fn system_line(text: String) -> ServerEvent {
    ServerEvent::Message(ChatLine { text, sender_id: "system".into(), timestamp: Utc::now() })
}

struct Monitor {
    location: String,
    interval: Interval,
}

pub struct Session {
    id: Uuid,
    subscriptions: Subscriptions,
    default_interval: Duration,
    monitor: Option<Monitor>,
}

impl Session {
    pub fn new(subscriptions: Subscriptions, default_interval: Duration) -> Self {
        Self { id: Uuid::new_v4(), subscriptions, default_interval, monitor: None }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn greeting(&self) -> Vec<ServerEvent> {
        vec![
            system_line("Welcome to NASA Weather Alert System!".to_string()),
            ServerEvent::SystemInfo(SystemInfo {
                features: [
                    "Real-time weather monitoring",
                    "Customizable alert thresholds",
                    "Location-based alerts",
                    "Severity-based notifications",
                    "Weather data visualization",
                ],
                instructions: "Subscribe to weather alerts using \"subscribe-weather\" event",
            }),
        ]
    }

    /// Unknown or malformed frames are logged and produce no reply.
    pub async fn handle_frame<R: Rng + ?Sized>(&mut self, text: &str, rng: &mut R) -> Vec<ServerEvent> {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(event, rng).await,
            Err(err) => {
                warn!(connection = %self.id, error = %err, "ignoring unrecognised frame");
                Vec::new()
            }
        }
    }

    pub async fn handle<R: Rng + ?Sized>(&mut self, event: ClientEvent, rng: &mut R) -> Vec<ServerEvent> {
        match event {
            ClientEvent::SubscribeWeather(subscription) => {
                info!(connection = %self.id, user_id = %subscription.user_id, "subscribed to weather alerts");
                self.subscriptions.write().await.insert(self.id, subscription.clone());
                vec![ServerEvent::SubscriptionConfirmed {
                    message: "Successfully subscribed to weather alerts",
                    subscription,
                }]
            }
            ClientEvent::RequestWeatherAlert { location, threshold } => {
                debug!(connection = %self.id, %location, ?threshold, "weather alert requested");
                let severity = if rng.gen_bool(0.3) {
                    AlertLevel::High
                } else if rng.gen_bool(0.6) {
                    AlertLevel::Medium
                } else {
                    AlertLevel::Low
                };
                vec![ServerEvent::WeatherAlert(LiveAlert {
                    id: alert_id(rng),
                    title: "Weather Alert".into(),
                    description: format!("Weather conditions detected for {location}"),
                    severity,
                    location,
                    timestamp: Utc::now(),
                })]
            }
            ClientEvent::MonitorWeather { location, interval } => {
                let period = monitor_period(interval, self.default_interval);
                info!(connection = %self.id, %location, period_ms = period.as_millis() as u64, "monitoring started");
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.monitor = Some(Monitor { location, interval });
                Vec::new()
            }
            ClientEvent::TestAlert { severity } => vec![ServerEvent::WeatherAlert(LiveAlert {
                id: alert_id(rng),
                title: "Test Weather Alert".into(),
                description: format!("This is a test {} severity alert", severity.label()),
                severity,
                location: "Test Location".into(),
                timestamp: Utc::now(),
            })],
            ClientEvent::Message { text, .. } => vec![system_line(format!("Echo: {text}"))],
        }
    }

    /// Resolves on the next monitor tick; pending forever while not monitoring.
    pub async fn next_tick(&mut self) -> String {
        match self.monitor.as_mut() {
            Some(m) => {
                m.interval.tick().await;
                m.location.clone()
            }
            None => std::future::pending().await,
        }
    }

    /// A fresh reading, preceded by a precipitation alert when it reaches the
    /// subscribed threshold.
    pub async fn weather_update<R: Rng + ?Sized>(&self, location: &str, rng: &mut R) -> Vec<ServerEvent> {
        let reading = Reading::random(rng);
        let now = Utc::now();
        let mut out = Vec::with_capacity(2);

        let threshold = self.subscriptions.read().await.get(&self.id).map(|s| s.alert_threshold);
        if let Some(threshold) = threshold.filter(|&t| reading.precipitation >= t) {
            out.push(ServerEvent::WeatherAlert(LiveAlert {
                id: alert_id(rng),
                title: "Precipitation Alert".into(),
                description: format!(
                    "Precipitation levels ({}%) exceed your threshold ({}%)",
                    reading.precipitation, threshold
                ),
                severity: AlertLevel::for_precipitation(reading.precipitation),
                location: location.to_string(),
                timestamp: now,
            }));
        }
        out.push(ServerEvent::WeatherUpdate(WeatherUpdate { location: location.to_string(), reading, timestamp: now }));
        out
    }

    pub async fn close(&mut self) {
        self.monitor = None;
        self.subscriptions.write().await.remove(&self.id);
        info!(connection = %self.id, "client disconnected");
    }
}

enum Step {
    Frame(Option<Result<Message, axum::Error>>),
    Tick(String),
}

async fn send(socket: &mut WebSocket, events: Vec<ServerEvent>) -> Result<(), axum::Error> {
    for event in events {
        match serde_json::to_string(&event) {
            Ok(text) => socket.send(Message::Text(text)).await?,
            Err(err) => warn!(error = %err, "failed to encode server event"),
        }
    }
    Ok(())
}

/// Drives one upgraded connection until the client goes away.
pub async fn serve_socket(mut socket: WebSocket, subscriptions: Subscriptions, default_interval: Duration) {
    let mut session = Session::new(subscriptions, default_interval);
    let mut rng = StdRng::from_entropy();
    info!(connection = %session.id(), "client connected");

    let mut outgoing = session.greeting();
    loop {
        if let Err(err) = send(&mut socket, outgoing).await {
            debug!(connection = %session.id(), error = %err, "send failed");
            break;
        }

        let step = tokio::select! {
            frame = socket.recv() => Step::Frame(frame),
            location = session.next_tick() => Step::Tick(location),
        };

        outgoing = match step {
            Step::Frame(Some(Ok(Message::Text(text)))) => session.handle_frame(&text, &mut rng).await,
            Step::Frame(Some(Ok(Message::Close(_)))) | Step::Frame(None) => break,
            Step::Frame(Some(Ok(_))) => Vec::new(),
            Step::Frame(Some(Err(err))) => {
                warn!(connection = %session.id(), error = %err, "websocket error");
                break;
            }
            Step::Tick(location) => session.weather_update(&location, &mut rng).await,
        };
    }

    session.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Subscriptions, Session) {
        let subs: Subscriptions = Arc::default();
        let session = Session::new(subs.clone(), Duration::from_secs(30));
        (subs, session)
    }

    fn wire(event: &ServerEvent) -> serde_json::Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn alert_ids_are_nine_base36_chars() {
        let mut rng = StdRng::seed_from_u64(1);
        let id = alert_id(&mut rng);
        assert_eq!(id.len(), 9);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn monitor_period_defaults_and_clamps() {
        let default = Duration::from_secs(30);
        assert_eq!(monitor_period(None, default), default);
        assert_eq!(monitor_period(Some(0), default), default);
        assert_eq!(monitor_period(Some(50), default), Duration::from_millis(1000));
        assert_eq!(monitor_period(Some(5000), default), Duration::from_secs(5));
        assert_eq!(monitor_period(None, Duration::from_millis(10)), Duration::from_millis(1000));
    }

    #[test]
    fn greeting_is_welcome_then_system_info() {
        let (_, session) = session();
        let events: Vec<_> = session.greeting().iter().map(wire).collect();
        assert_eq!(events[0]["event"], "message");
        assert_eq!(events[0]["data"]["senderId"], "system");
        assert_eq!(events[1]["event"], "system-info");
        assert_eq!(events[1]["data"]["features"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn subscribe_registers_and_close_removes() {
        let (subs, mut session) = session();
        let mut rng = StdRng::seed_from_u64(2);
        let frame = r#"{"event":"subscribe-weather","data":{"userId":"u1","locations":["Cairo"],"alertThreshold":40}}"#;

        let out = session.handle_frame(frame, &mut rng).await;
        let json = wire(&out[0]);
        assert_eq!(json["event"], "subscription-confirmed");
        assert_eq!(json["data"]["subscription"]["alertThreshold"], 40.0);
        assert_eq!(subs.read().await[&session.id()].user_id, "u1");

        session.close().await;
        assert!(subs.read().await.is_empty());
    }

    #[tokio::test]
    async fn echo_and_test_alert() {
        let (_, mut session) = session();
        let mut rng = StdRng::seed_from_u64(3);

        let out = session.handle_frame(r#"{"event":"message","data":{"text":"hi","senderId":"me"}}"#, &mut rng).await;
        assert_eq!(wire(&out[0])["data"]["text"], "Echo: hi");

        let out = session.handle_frame(r#"{"event":"test-alert","data":{"severity":"extreme"}}"#, &mut rng).await;
        let json = wire(&out[0]);
        assert_eq!(json["event"], "weather-alert");
        assert_eq!(json["data"]["severity"], "extreme");
        assert_eq!(json["data"]["description"], "This is a test extreme severity alert");
    }

    #[tokio::test]
    async fn malformed_frames_are_ignored() {
        let (_, mut session) = session();
        let mut rng = StdRng::seed_from_u64(4);
        assert!(session.handle_frame("not json", &mut rng).await.is_empty());
        assert!(session.handle_frame(r#"{"event":"launch-rocket","data":{}}"#, &mut rng).await.is_empty());
    }

    #[tokio::test]
    async fn requested_alert_severity_is_never_extreme() {
        let (_, mut session) = session();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let event = ClientEvent::RequestWeatherAlert { location: "Giza".into(), threshold: Some(10.0) };
            match &session.handle(event, &mut rng).await[0] {
                ServerEvent::WeatherAlert(alert) => {
                    assert_ne!(alert.severity, AlertLevel::Extreme);
                    assert_eq!(alert.description, "Weather conditions detected for Giza");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn updates_alert_only_at_or_above_threshold() {
        let (subs, session) = session();
        let mut rng = StdRng::seed_from_u64(6);

        // No subscription: never an alert.
        for _ in 0..20 {
            let out = session.weather_update("Cairo", &mut rng).await;
            assert_eq!(out.len(), 1);
            assert_eq!(wire(&out[0])["event"], "weather-update");
        }

        subs.write().await.insert(
            session.id(),
            Subscription { user_id: "u".into(), locations: vec![], alert_threshold: 0.0 },
        );
        let out = session.weather_update("Cairo", &mut rng).await;
        assert_eq!(out.len(), 2);
        let alert = wire(&out[0]);
        let update = wire(&out[1]);
        assert_eq!(alert["data"]["title"], "Precipitation Alert");
        let p = update["data"]["precipitation"].as_f64().unwrap();
        let expected = AlertLevel::for_precipitation(p).label();
        assert_eq!(alert["data"]["severity"], expected);
        assert!(update["data"]["windSpeed"].is_number());
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_ticks_after_each_interval() {
        let (_, mut session) = session();
        let mut rng = StdRng::seed_from_u64(7);
        let wait = |ms| Duration::from_millis(ms);

        assert!(tokio::time::timeout(wait(3_600_000), session.next_tick()).await.is_err());

        let frame = r#"{"event":"monitor-weather","data":{"location":"Cairo","interval":1000}}"#;
        assert!(session.handle_frame(frame, &mut rng).await.is_empty());
        assert!(tokio::time::timeout(wait(999), session.next_tick()).await.is_err());
        assert_eq!(tokio::time::timeout(wait(2), session.next_tick()).await.unwrap(), "Cairo");
        assert!(tokio::time::timeout(wait(998), session.next_tick()).await.is_err());
        assert_eq!(tokio::time::timeout(wait(2), session.next_tick()).await.unwrap(), "Cairo");

        let frame = r#"{"event":"monitor-weather","data":{"location":"Giza","interval":2000}}"#;
        session.handle_frame(frame, &mut rng).await;
        assert!(tokio::time::timeout(wait(1999), session.next_tick()).await.is_err());
        let location = tokio::time::timeout(wait(2), session.next_tick()).await.unwrap();
        assert_eq!(location, "Giza");

        let out = session.weather_update(&location, &mut rng).await;
        let update = wire(out.last().unwrap());
        assert_eq!(update["event"], "weather-update");
        assert_eq!(update["data"]["location"], "Giza");

        session.close().await;
        assert!(tokio::time::timeout(wait(3_600_000), session.next_tick()).await.is_err());
    }
}
