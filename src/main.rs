// Main entry point - Dependency injection, poll loops and view server
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::application::alert_service::AlertService;
use crate::application::key_value_store::KeyValueStore;
use crate::application::monitor_service::MonitorService;
use crate::application::polling::Poller;
use crate::application::settings_service::SettingsService;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::device_client::HttpDeviceClient;
use crate::infrastructure::file_store::FileStore;
use crate::presentation::app_state::AppState;
use crate::presentation::router::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Create collaborators (infrastructure layer)
    let device = Arc::new(HttpDeviceClient::new(&config.device));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.storage.dir).await?);

    // Create services (application layer), restoring persisted state once
    let monitor = MonitorService::restore(config.monitor()?, store.as_ref(), Utc::now()).await;
    let monitor = Arc::new(Mutex::new(monitor));
    let alerts = AlertService::new(device.clone(), config.retention()?);
    let settings = SettingsService::load(store.clone(), config.default_settings()).await;

    // Start periodic tasks
    let poller = Poller::new(device, monitor.clone(), alerts.clone(), store);
    poller.spawn_sensor_loop(settings.subscribe());
    poller.spawn_alert_loop(config.alert_interval());
    poller.spawn_maintenance_loop(config.maintenance_interval());

    // Build router (presentation layer)
    let state = Arc::new(AppState {
        monitor,
        alerts,
        settings,
    });

    let addr: SocketAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.http.bind))?;
    tracing::info!("Starting wearable-monitor on {}, polling {}", addr, config.device.base_url);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state)).await?;

    Ok(())
}
