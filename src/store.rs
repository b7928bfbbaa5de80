//! Profile, saved locations and weather alerts, persisted as one JSON file.
//!
//! The whole dataset lives in memory behind a `RwLock`. Mutations run on a
//! copy that is written through a temp file and a rename, and replaces the
//! in-memory dataset only once it is on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::weather::Reading;

pub const DEMO_USER_ID: &str = "demo-user-id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown location: {0}")]
    UnknownLocation(String),
    #[error("Alert not found")]
    AlertNotFound(String),
    #[error("Location not found")]
    LocationNotFound(String),
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub preferred_units: String,
    pub theme: String,
    pub language: String,
    pub timezone: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub alert_threshold: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            preferred_units: "metric".into(),
            theme: "auto".into(),
            language: "en".into(),
            timezone: "UTC".into(),
            email_notifications: true,
            push_notifications: false,
            alert_threshold: 50,
        }
    }
}

/// Body of `PUT /api/user/profile`; only the fields present are changed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub preferred_units: Option<String>,
    pub theme: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub alert_threshold: Option<u32>,
}

impl Preferences {
    fn merge(&mut self, update: &ProfileUpdate) {
        if let Some(v) = &update.preferred_units {
            self.preferred_units = v.clone();
        }
        if let Some(v) = &update.theme {
            self.theme = v.clone();
        }
        if let Some(v) = &update.language {
            self.language = v.clone();
        }
        if let Some(v) = &update.timezone {
            self.timezone = v.clone();
        }
        if let Some(v) = update.email_notifications {
            self.email_notifications = v;
        }
        if let Some(v) = update.push_notifications {
            self.push_notifications = v;
        }
        if let Some(v) = update.alert_threshold {
            self.alert_threshold = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub profile: Preferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    fn demo(now: DateTime<Utc>) -> Self {
        Self {
            id: DEMO_USER_ID.to_string(),
            email: "demo@example.com".into(),
            name: "Demo User".into(),
            profile: Preferences::default(),
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLocation {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub state: String,
    pub country: String,
    pub country_code: String,
    pub nickname: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInput {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    pub nickname: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Temperature,
    Precipitation,
    Wind,
    Humidity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    #[default]
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub user_id: String,
    pub location_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub alert_type: AlertType,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub event_date: Option<NaiveDate>,
    pub notification_methods: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl Alert {
    /// Strict comparison of the watched field against the threshold.
    pub fn is_triggered_by(&self, sample: &Reading) -> bool {
        let value = match self.alert_type {
            AlertType::Temperature => sample.temperature,
            AlertType::Precipitation => sample.precipitation,
            AlertType::Wind => sample.wind_speed,
            AlertType::Humidity => sample.humidity,
        };
        match self.condition {
            AlertCondition::Above => value > self.threshold,
            AlertCondition::Below => value < self.threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertInput {
    pub location_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub alert_type: AlertType,
    pub condition: AlertCondition,
    pub threshold: f64,
    #[serde(default)]
    pub severity: AlertSeverity,
    pub event_date: Option<NaiveDate>,
    pub notification_methods: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPatch {
    pub location_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub alert_type: Option<AlertType>,
    pub condition: Option<AlertCondition>,
    pub threshold: Option<f64>,
    pub severity: Option<AlertSeverity>,
    pub event_date: Option<NaiveDate>,
    pub notification_methods: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertWithLocation {
    #[serde(flatten)]
    pub alert: Alert,
    pub location: Option<SavedLocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub locations: Vec<SavedLocation>,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_alerts: usize,
    pub active_alerts: usize,
    pub total_locations: usize,
    pub member_since: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExport {
    pub user: User,
    pub locations: Vec<SavedLocation>,
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Dataset {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    locations: Vec<SavedLocation>,
    #[serde(default)]
    alerts: Vec<Alert>,
}

impl Dataset {
    fn user_mut(&mut self, user_id: &str, now: DateTime<Utc>) -> &mut User {
        let idx = match self.users.iter().position(|u| u.id == user_id) {
            Some(idx) => idx,
            None => {
                let mut user = User::demo(now);
                user.id = user_id.to_string();
                self.users.push(user);
                self.users.len() - 1
            }
        };
        &mut self.users[idx]
    }

    fn profile_of(&mut self, user_id: &str, now: DateTime<Utc>) -> Profile {
        Profile {
            user: self.user_mut(user_id, now).clone(),
            locations: self.locations_of(user_id),
            alerts: self.alerts_of(user_id, true),
        }
    }

    fn touch(&mut self, user_id: &str, now: DateTime<Utc>) {
        self.user_mut(user_id, now).updated_at = now;
    }

    /// Default location first, then insertion order.
    fn locations_of(&self, user_id: &str) -> Vec<SavedLocation> {
        let mut out: Vec<_> = self.locations.iter().filter(|l| l.user_id == user_id).cloned().collect();
        out.sort_by_key(|l| !l.is_default);
        out
    }

    /// Newest first; ties keep the most recently inserted first.
    fn alerts_of(&self, user_id: &str, active_only: bool) -> Vec<Alert> {
        let mut out: Vec<_> = self
            .alerts
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id && (!active_only || a.is_active))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    fn location(&self, user_id: &str, id: Uuid) -> Option<&SavedLocation> {
        self.locations.iter().find(|l| l.id == id && l.user_id == user_id)
    }

    fn check_location(&self, user_id: &str, id: Option<Uuid>) -> Result<(), StoreError> {
        match id {
            Some(id) if self.location(user_id, id).is_none() => Err(StoreError::UnknownLocation(id.to_string())),
            _ => Ok(()),
        }
    }

    fn clear_defaults(&mut self, user_id: &str) {
        self.locations
            .iter_mut()
            .filter(|l| l.user_id == user_id)
            .for_each(|l| l.is_default = false);
    }
}

pub struct Store {
    path: PathBuf,
    data: RwLock<Dataset>,
}

impl Store {
    /// Loads the store; a missing file starts an empty one.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no store file yet, starting empty");
                Dataset::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data: RwLock::new(data) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &Dataset) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "store saved");
        Ok(())
    }

    /// Applies `change` to a copy of the dataset and swaps it in only once the
    /// copy is on disk; a failed write leaves memory and file untouched.
    async fn commit<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Dataset) -> Result<T, StoreError>,
    {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *data = next;
        Ok(out)
    }

    /// Profile with locations and active alerts; creates the user on first read
    /// and stamps the login time.
    pub async fn profile(&self, user_id: &str) -> Result<Profile, StoreError> {
        let now = Utc::now();
        self.commit(|data| {
            data.user_mut(user_id, now).last_login = Some(now);
            Ok(data.profile_of(user_id, now))
        })
        .await
    }

    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, StoreError> {
        let now = Utc::now();
        self.commit(|data| {
            let user = data.user_mut(user_id, now);
            if let Some(name) = &update.name {
                user.name = name.clone();
            }
            user.profile.merge(update);
            user.updated_at = now;
            Ok(data.profile_of(user_id, now))
        })
        .await
    }

    pub async fn locations(&self, user_id: &str) -> Vec<SavedLocation> {
        self.data.read().await.locations_of(user_id)
    }

    /// The flagged default, else the first saved location.
    pub async fn default_location(&self, user_id: &str) -> Option<SavedLocation> {
        self.data.read().await.locations_of(user_id).into_iter().next()
    }

    pub async fn add_location(&self, user_id: &str, input: LocationInput) -> Result<SavedLocation, StoreError> {
        let now = Utc::now();
        self.commit(|data| {
            if input.is_default {
                data.clear_defaults(user_id);
            }
            let location = SavedLocation {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                name: input.name,
                address: input.address,
                latitude: input.latitude,
                longitude: input.longitude,
                city: input.city,
                state: input.state,
                country: input.country,
                country_code: input.country_code,
                nickname: input.nickname,
                is_default: input.is_default,
                created_at: now,
                updated_at: now,
            };
            data.locations.push(location.clone());
            data.touch(user_id, now);
            Ok(location)
        })
        .await
    }

    pub async fn update_location(
        &self,
        user_id: &str,
        id: Uuid,
        input: LocationInput,
    ) -> Result<SavedLocation, StoreError> {
        let now = Utc::now();
        self.commit(|data| {
            if data.location(user_id, id).is_none() {
                return Err(StoreError::LocationNotFound(id.to_string()));
            }
            if input.is_default {
                data.clear_defaults(user_id);
            }
            let Some(location) = data.locations.iter_mut().find(|l| l.id == id) else {
                return Err(StoreError::LocationNotFound(id.to_string()));
            };
            location.name = input.name;
            location.address = input.address;
            location.latitude = input.latitude;
            location.longitude = input.longitude;
            location.city = input.city;
            location.state = input.state;
            location.country = input.country;
            location.country_code = input.country_code;
            location.nickname = input.nickname;
            location.is_default = input.is_default;
            location.updated_at = now;
            let updated = location.clone();
            data.touch(user_id, now);
            Ok(updated)
        })
        .await
    }

    /// Removes a location; alerts pointing at it keep existing without one.
    pub async fn delete_location(&self, user_id: &str, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        self.commit(|data| {
            if data.location(user_id, id).is_none() {
                return Err(StoreError::LocationNotFound(id.to_string()));
            }
            data.locations.retain(|l| l.id != id);
            data.alerts
                .iter_mut()
                .filter(|a| a.location_id == Some(id))
                .for_each(|a| a.location_id = None);
            data.touch(user_id, now);
            Ok(())
        })
        .await
    }

    pub async fn active_alerts(&self, user_id: &str) -> Vec<AlertWithLocation> {
        let data = self.data.read().await;
        data.alerts_of(user_id, true)
            .into_iter()
            .map(|alert| {
                let location = alert.location_id.and_then(|id| data.location(user_id, id)).cloned();
                AlertWithLocation { alert, location }
            })
            .collect()
    }

    pub async fn all_alerts(&self, user_id: &str) -> Vec<Alert> {
        self.data.read().await.alerts_of(user_id, false)
    }

    pub async fn create_alert(&self, user_id: &str, input: AlertInput) -> Result<Alert, StoreError> {
        let now = Utc::now();
        self.commit(|data| {
            data.check_location(user_id, input.location_id)?;
            let alert = Alert {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                location_id: input.location_id,
                title: input.title,
                description: input.description,
                alert_type: input.alert_type,
                condition: input.condition,
                threshold: input.threshold,
                severity: input.severity,
                event_date: input.event_date,
                notification_methods: input.notification_methods.unwrap_or_else(|| vec!["email".to_string()]),
                is_active: input.is_active.unwrap_or(true),
                created_at: now,
                updated_at: now,
                last_triggered: None,
            };
            data.alerts.push(alert.clone());
            data.touch(user_id, now);
            Ok(alert)
        })
        .await
    }

    pub async fn update_alert(&self, user_id: &str, id: Uuid, patch: AlertPatch) -> Result<Alert, StoreError> {
        let now = Utc::now();
        self.commit(|data| {
            data.check_location(user_id, patch.location_id)?;
            let Some(alert) = data.alerts.iter_mut().find(|a| a.id == id && a.user_id == user_id) else {
                return Err(StoreError::AlertNotFound(id.to_string()));
            };
            if patch.location_id.is_some() {
                alert.location_id = patch.location_id;
            }
            if let Some(v) = patch.title {
                alert.title = v;
            }
            if let Some(v) = patch.description {
                alert.description = v;
            }
            if let Some(v) = patch.alert_type {
                alert.alert_type = v;
            }
            if let Some(v) = patch.condition {
                alert.condition = v;
            }
            if let Some(v) = patch.threshold {
                alert.threshold = v;
            }
            if let Some(v) = patch.severity {
                alert.severity = v;
            }
            if patch.event_date.is_some() {
                alert.event_date = patch.event_date;
            }
            if let Some(v) = patch.notification_methods {
                alert.notification_methods = v;
            }
            if let Some(v) = patch.is_active {
                alert.is_active = v;
            }
            alert.updated_at = now;
            let updated = alert.clone();
            data.touch(user_id, now);
            Ok(updated)
        })
        .await
    }

    pub async fn delete_alert(&self, user_id: &str, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        self.commit(|data| {
            let before = data.alerts.len();
            data.alerts.retain(|a| !(a.id == id && a.user_id == user_id));
            if data.alerts.len() == before {
                return Err(StoreError::AlertNotFound(id.to_string()));
            }
            data.touch(user_id, now);
            Ok(())
        })
        .await
    }

    /// Active alerts tripped by `sample`; each one gets `lastTriggered` stamped.
    pub async fn check_alert_conditions(&self, user_id: &str, sample: &Reading) -> Result<Vec<Alert>, StoreError> {
        let now = Utc::now();
        let tripped = self
            .data
            .read()
            .await
            .alerts
            .iter()
            .any(|a| a.user_id == user_id && a.is_active && a.is_triggered_by(sample));
        if !tripped {
            return Ok(Vec::new());
        }

        let triggered = self
            .commit(|data| {
                let mut triggered = Vec::new();
                for alert in data.alerts.iter_mut().filter(|a| a.user_id == user_id && a.is_active) {
                    if alert.is_triggered_by(sample) {
                        alert.last_triggered = Some(now);
                        triggered.push(alert.clone());
                    }
                }
                data.touch(user_id, now);
                Ok(triggered)
            })
            .await?;
        info!(user_id, count = triggered.len(), "weather alerts triggered");
        Ok(triggered)
    }

    pub async fn stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let now = Utc::now();
        let known = self.data.read().await.users.iter().any(|u| u.id == user_id);
        if !known {
            self.commit(|data| {
                data.user_mut(user_id, now);
                Ok(())
            })
            .await?;
        }

        let data = self.data.read().await;
        let alerts = data.alerts_of(user_id, false);
        let user = data.users.iter().find(|u| u.id == user_id);
        Ok(UserStats {
            total_alerts: alerts.len(),
            active_alerts: alerts.iter().filter(|a| a.is_active).count(),
            total_locations: data.locations.iter().filter(|l| l.user_id == user_id).count(),
            member_since: user.map_or(now, |u| u.created_at),
            last_login: user.and_then(|u| u.last_login),
        })
    }

    pub async fn export(&self, user_id: &str) -> UserExport {
        let now = Utc::now();
        let data = self.data.read().await;
        let user = data
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .unwrap_or_else(|| User { id: user_id.to_string(), ..User::demo(now) });
        UserExport {
            user,
            locations: data.locations_of(user_id),
            alerts: data.alerts_of(user_id, false),
            exported_at: Some(now),
        }
    }

    /// Replaces everything the user owns with the bundle, re-keyed to `user_id`.
    ///
    /// The bundle is normalised first: duplicate or foreign ids are dropped,
    /// only the first default location keeps its flag, and alerts lose any
    /// `locationId` the bundle doesn't carry.
    pub async fn import(&self, user_id: &str, bundle: UserExport) -> Result<Profile, StoreError> {
        let now = Utc::now();
        let profile = self
            .commit(|data| {
                let UserExport { mut user, locations, alerts, .. } = bundle;
                user.id = user_id.to_string();
                user.updated_at = now;

                data.users.retain(|u| u.id != user_id);
                data.locations.retain(|l| l.user_id != user_id);
                data.alerts.retain(|a| a.user_id != user_id);

                let mut seen: HashSet<Uuid> = data
                    .locations
                    .iter()
                    .map(|l| l.id)
                    .chain(data.alerts.iter().map(|a| a.id))
                    .collect();

                let mut has_default = false;
                let locations: Vec<_> = locations
                    .into_iter()
                    .filter(|l| seen.insert(l.id))
                    .map(|mut l| {
                        l.user_id = user_id.to_string();
                        l.is_default = l.is_default && !has_default;
                        has_default |= l.is_default;
                        l
                    })
                    .collect();
                let location_ids: HashSet<Uuid> = locations.iter().map(|l| l.id).collect();

                let alerts: Vec<_> = alerts
                    .into_iter()
                    .filter(|a| seen.insert(a.id))
                    .map(|mut a| {
                        a.user_id = user_id.to_string();
                        a.location_id = a.location_id.filter(|id| location_ids.contains(id));
                        a
                    })
                    .collect();

                data.users.push(user);
                data.locations.extend(locations);
                data.alerts.extend(alerts);
                Ok(data.profile_of(user_id, now))
            })
            .await?;

        info!(user_id, locations = profile.locations.len(), alerts = profile.alerts.len(), "user data imported");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("data/store.json")).await.unwrap();
        (dir, store)
    }

    fn place(name: &str, is_default: bool) -> LocationInput {
        LocationInput {
            name: name.into(),
            address: String::new(),
            latitude: 40.0,
            longitude: -74.0,
            city: name.into(),
            state: String::new(),
            country: "USA".into(),
            country_code: "US".into(),
            nickname: None,
            is_default,
        }
    }

    fn alert(alert_type: AlertType, condition: AlertCondition, threshold: f64) -> AlertInput {
        AlertInput {
            location_id: None,
            title: "Rain watch".into(),
            description: String::new(),
            alert_type,
            condition,
            threshold,
            severity: AlertSeverity::High,
            event_date: None,
            notification_methods: None,
            is_active: None,
        }
    }

    #[tokio::test]
    async fn demo_user_created_on_first_read() {
        let (_dir, store) = store().await;
        let profile = store.profile(DEMO_USER_ID).await.unwrap();
        assert_eq!(profile.user.email, "demo@example.com");
        assert_eq!(profile.user.profile, Preferences::default());
        assert!(profile.user.last_login.is_some());
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn profile_update_merges_given_fields() {
        let (_dir, store) = store().await;
        let update = ProfileUpdate { name: Some("Ada".into()), theme: Some("dark".into()), ..Default::default() };
        let profile = store.update_profile(DEMO_USER_ID, &update).await.unwrap();
        assert_eq!(profile.user.name, "Ada");
        assert_eq!(profile.user.profile.theme, "dark");
        assert_eq!(profile.user.profile.preferred_units, "metric");
        assert_eq!(profile.user.profile.alert_threshold, 50);
    }

    #[tokio::test]
    async fn single_default_location() {
        let (_dir, store) = store().await;
        assert!(store.default_location(DEMO_USER_ID).await.is_none());

        let first = store.add_location(DEMO_USER_ID, place("Austin", false)).await.unwrap();
        assert_eq!(store.default_location(DEMO_USER_ID).await.unwrap().id, first.id);

        let a = store.add_location(DEMO_USER_ID, place("Denver", true)).await.unwrap();
        let b = store.add_location(DEMO_USER_ID, place("Seattle", true)).await.unwrap();

        let list = store.locations(DEMO_USER_ID).await;
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].id, b.id);
        assert_eq!(list.iter().filter(|l| l.is_default).count(), 1);

        store.update_location(DEMO_USER_ID, a.id, place("Denver", true)).await.unwrap();
        assert_eq!(store.default_location(DEMO_USER_ID).await.unwrap().id, a.id);
    }

    #[tokio::test]
    async fn missing_location_is_not_found() {
        let (_dir, store) = store().await;
        let err = store.delete_location(DEMO_USER_ID, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::LocationNotFound(_)));
    }

    #[tokio::test]
    async fn alerts_need_known_location_and_ownership() {
        let (_dir, store) = store().await;
        let mut input = alert(AlertType::Precipitation, AlertCondition::Above, 60.0);
        input.location_id = Some(Uuid::new_v4());
        let err = store.create_alert(DEMO_USER_ID, input).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownLocation(_)));

        let mine = store
            .create_alert(DEMO_USER_ID, alert(AlertType::Wind, AlertCondition::Above, 20.0))
            .await
            .unwrap();
        let err = store.delete_alert("someone-else", mine.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Alert not found");
        let err = store.update_alert("someone-else", mine.id, AlertPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlertNotFound(_)));

        store.delete_alert(DEMO_USER_ID, mine.id).await.unwrap();
        assert!(store.all_alerts(DEMO_USER_ID).await.is_empty());
    }

    #[tokio::test]
    async fn active_alerts_are_newest_first_with_location() {
        let (_dir, store) = store().await;
        let loc = store.add_location(DEMO_USER_ID, place("Chicago", true)).await.unwrap();

        let mut first = alert(AlertType::Humidity, AlertCondition::Above, 90.0);
        first.location_id = Some(loc.id);
        let first = store.create_alert(DEMO_USER_ID, first).await.unwrap();
        let second = store
            .create_alert(DEMO_USER_ID, alert(AlertType::Temperature, AlertCondition::Below, 0.0))
            .await
            .unwrap();
        let patch = AlertPatch { is_active: Some(false), ..Default::default() };
        let third = store
            .create_alert(DEMO_USER_ID, alert(AlertType::Wind, AlertCondition::Above, 30.0))
            .await
            .unwrap();
        store.update_alert(DEMO_USER_ID, third.id, patch).await.unwrap();

        let active = store.active_alerts(DEMO_USER_ID).await;
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].alert.id, second.id);
        assert_eq!(active[1].alert.id, first.id);
        assert_eq!(active[1].location.as_ref().unwrap().city, "Chicago");
        assert_eq!(store.all_alerts(DEMO_USER_ID).await.len(), 3);

        store.delete_location(DEMO_USER_ID, loc.id).await.unwrap();
        let active = store.active_alerts(DEMO_USER_ID).await;
        assert!(active.iter().all(|a| a.location.is_none() && a.alert.location_id.is_none()));
    }

    #[tokio::test]
    async fn alert_conditions_are_strict() {
        let (_dir, store) = store().await;
        store
            .create_alert(DEMO_USER_ID, alert(AlertType::Precipitation, AlertCondition::Above, 60.0))
            .await
            .unwrap();
        store
            .create_alert(DEMO_USER_ID, alert(AlertType::Temperature, AlertCondition::Below, 10.0))
            .await
            .unwrap();

        let at_threshold = Reading { temperature: 10.0, humidity: 50.0, wind_speed: 5.0, precipitation: 60.0 };
        assert!(store.check_alert_conditions(DEMO_USER_ID, &at_threshold).await.unwrap().is_empty());

        let wet = Reading { precipitation: 61.0, ..at_threshold };
        let hit = store.check_alert_conditions(DEMO_USER_ID, &wet).await.unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].alert_type, AlertType::Precipitation);
        assert!(hit[0].last_triggered.is_some());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let (dir, store) = store().await;
        store.add_location(DEMO_USER_ID, place("Paris", false)).await.unwrap();
        drop(store);

        let reopened = Store::open(dir.path().join("data/store.json")).await.unwrap();
        assert_eq!(reopened.locations(DEMO_USER_ID).await[0].name, "Paris");
        assert!(!dir.path().join("data/store.json.tmp").exists());
    }

    #[tokio::test]
    async fn stats_count_everything() {
        let (_dir, store) = store().await;
        store.add_location(DEMO_USER_ID, place("Rome", false)).await.unwrap();
        let a = store
            .create_alert(DEMO_USER_ID, alert(AlertType::Wind, AlertCondition::Above, 10.0))
            .await
            .unwrap();
        store.create_alert(DEMO_USER_ID, alert(AlertType::Wind, AlertCondition::Above, 20.0)).await.unwrap();
        store
            .update_alert(DEMO_USER_ID, a.id, AlertPatch { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();

        let stats = store.stats(DEMO_USER_ID).await.unwrap();
        assert_eq!((stats.total_alerts, stats.active_alerts, stats.total_locations), (2, 1, 1));
    }

    #[tokio::test]
    async fn export_then_import_replaces_data() {
        let (_dir, source) = store().await;
        source.add_location(DEMO_USER_ID, place("Tokyo", true)).await.unwrap();
        source
            .create_alert(DEMO_USER_ID, alert(AlertType::Humidity, AlertCondition::Above, 80.0))
            .await
            .unwrap();
        let bundle = source.export(DEMO_USER_ID).await;
        assert!(bundle.exported_at.is_some());

        let (_dir2, target) = store().await;
        target.add_location(DEMO_USER_ID, place("Vienna", false)).await.unwrap();
        let profile = target.import(DEMO_USER_ID, bundle).await.unwrap();

        assert_eq!(profile.locations.len(), 1);
        assert_eq!(profile.locations[0].name, "Tokyo");
        assert_eq!(profile.alerts.len(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_data_unchanged() {
        let (dir, store) = store().await;
        let paris = store.add_location(DEMO_USER_ID, place("Paris", false)).await.unwrap();
        std::fs::create_dir_all(dir.path().join("data/store.json.tmp")).unwrap();

        assert!(matches!(
            store.add_location(DEMO_USER_ID, place("Rome", true)).await,
            Err(StoreError::Io(_))
        ));
        assert!(store.create_alert(DEMO_USER_ID, alert(AlertType::Wind, AlertCondition::Above, 10.0)).await.is_err());
        assert!(store.delete_location(DEMO_USER_ID, paris.id).await.is_err());

        let list = store.locations(DEMO_USER_ID).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, paris.id);
        assert!(store.all_alerts(DEMO_USER_ID).await.is_empty());

        let reopened = Store::open(dir.path().join("data/store.json")).await.unwrap();
        assert_eq!(reopened.locations(DEMO_USER_ID).await.len(), 1);
    }

    #[tokio::test]
    async fn import_normalises_bundle() {
        let (_dir, source) = store().await;
        let home = source.add_location(DEMO_USER_ID, place("Lima", true)).await.unwrap();
        source
            .create_alert(DEMO_USER_ID, alert(AlertType::Temperature, AlertCondition::Below, 0.0))
            .await
            .unwrap();
        let mut bundle = source.export(DEMO_USER_ID).await;

        let mut second = home.clone();
        second.id = Uuid::new_v4();
        second.name = "Quito".into();
        bundle.locations.push(second.clone());
        bundle.locations.push(home.clone());

        let mut stray = bundle.alerts[0].clone();
        stray.id = Uuid::new_v4();
        stray.location_id = Some(Uuid::new_v4());
        bundle.alerts.push(stray.clone());
        bundle.alerts.push(stray.clone());

        let (_dir2, target) = store().await;
        let profile = target.import("someone-else", bundle).await.unwrap();

        assert_eq!(profile.user.id, "someone-else");
        assert_eq!(profile.locations.len(), 2);
        assert_eq!(profile.locations.iter().filter(|l| l.is_default).count(), 1);
        assert_eq!(target.default_location("someone-else").await.unwrap().id, home.id);

        let alerts = target.all_alerts("someone-else").await;
        assert_eq!(alerts.len(), 2);
        let imported = alerts.iter().find(|a| a.id == stray.id).unwrap();
        assert_eq!(imported.location_id, None);
        assert!(alerts.iter().all(|a| a.user_id == "someone-else"));
    }
}
