mod ai;
mod api;
mod config;
mod demo;
mod error;
mod geocode;
mod realtime;
mod seed;
mod store;
mod weather;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::ai::{ChatCompletion, HttpChatClient};
use crate::api::AppState;
use crate::config::Config;
use crate::geocode::Geocoder;
use crate::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Configuration (.env, then the process environment)
    let config = Config::from_env()?;

    // 2. Persistent user data
    let store = Store::open(config.data_path.clone()).await?;

    // 3. Optional completion backend; without one every AI route uses its fallback
    let ai: Option<Arc<dyn ChatCompletion>> = match &config.ai {
        Some(ai_config) => Some(Arc::new(HttpChatClient::new(ai_config)?)),
        None => None,
    };

    let geocoder = Geocoder::new(&config)?;
    let bind_addr = config.bind_addr;

    info!(
        store = %store.path().display(),
        ai = ai.is_some(),
        geocoder = config.geocoder_enabled,
        "state ready"
    );

    let shared_state = Arc::new(AppState {
        config,
        store,
        ai,
        geocoder,
        subscriptions: Arc::default(),
    });

    let app = api::router(shared_state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
