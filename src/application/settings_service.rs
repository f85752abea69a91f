// Settings service - Persisted refresh interval broadcast to the poll loop
use crate::application::key_value_store::{KeyValueStore, SETTINGS_KEY};
use crate::domain::settings::Settings;
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn KeyValueStore>,
    tx: Arc<watch::Sender<Settings>>,
}

impl SettingsService {
    /// Load persisted settings, falling back to `default`.
    pub async fn load(store: Arc<dyn KeyValueStore>, default: Settings) -> Self {
        let blob = store.get(SETTINGS_KEY).await.unwrap_or_else(|e| {
            tracing::warn!("Could not read persisted settings: {:#}", e);
            None
        });
        let settings = Settings::from_blob(blob.as_deref(), default);
        tracing::info!("Sensor refresh interval {}ms", settings.refresh_interval_ms);

        let (tx, _rx) = watch::channel(settings);
        Self {
            store,
            tx: Arc::new(tx),
        }
    }

    pub fn current(&self) -> Settings {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// Clamp, persist, then publish. Subscribers only see settings that
    /// were written successfully.
    pub async fn update(&self, refresh_interval_ms: u64) -> anyhow::Result<Settings> {
        let settings = Settings::new(refresh_interval_ms);
        let blob = serde_json::to_string(&settings).context("Failed to encode settings")?;
        self.store
            .put(SETTINGS_KEY, &blob)
            .await
            .context("Failed to write settings")?;
        self.tx.send_replace(settings);
        Ok(settings)
    }
}
