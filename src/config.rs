use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_USER_AGENT: &str = "NASA-Space-Apps-Weather-App/1.0";
const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_path: PathBuf,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub geocoder_enabled: bool,
    pub ai: Option<AiConfig>,
    pub monitor_interval: Duration,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host: IpAddr = parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;

        let data_path = lookup("DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/store.json"));

        let ai = match (non_empty(&lookup, "AI_BASE_URL"), non_empty(&lookup, "AI_API_KEY")) {
            (Some(base_url), Some(api_key)) => Some(AiConfig {
                base_url,
                api_key,
                model: non_empty(&lookup, "AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
                timeout: Duration::from_secs(parse_or(&lookup, "AI_TIMEOUT_SECS", 30)?),
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            data_path,
            geocoder_url: non_empty(&lookup, "GEOCODER_URL")
                .unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string()),
            geocoder_user_agent: non_empty(&lookup, "GEOCODER_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            geocoder_enabled: parse_or(&lookup, "GEOCODER_ENABLED", true)?,
            ai,
            monitor_interval: Duration::from_millis(parse_or(&lookup, "MONITOR_INTERVAL_MS", 30_000)?),
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup, key) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.data_path, PathBuf::from("data/store.json"));
        assert!(config.geocoder_enabled);
        assert!(config.ai.is_none());
        assert_eq!(config.monitor_interval, Duration::from_secs(30));
    }

    #[test]
    fn ai_needs_both_url_and_key() {
        let config = config_from(&[("AI_BASE_URL", "http://localhost:8080/v1")]).unwrap();
        assert!(config.ai.is_none());

        let config = config_from(&[
            ("AI_BASE_URL", "http://localhost:8080/v1"),
            ("AI_API_KEY", "sk-test"),
            ("AI_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        let ai = config.ai.unwrap();
        assert_eq!(ai.model, DEFAULT_AI_MODEL);
        assert_eq!(ai.timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
        assert!(config_from(&[("GEOCODER_ENABLED", "maybe")]).is_err());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("PORT", "  "), ("HOST", "127.0.0.1")]).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
    }
}
