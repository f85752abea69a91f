// User-adjustable settings persisted alongside history
use serde::{Deserialize, Serialize};

pub const MIN_REFRESH_INTERVAL_MS: u64 = 1000;
pub const MAX_REFRESH_INTERVAL_MS: u64 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "refreshIntervalMs")]
    pub refresh_interval_ms: u64,
}

impl Settings {
    pub fn new(refresh_interval_ms: u64) -> Self {
        Self {
            refresh_interval_ms: refresh_interval_ms
                .clamp(MIN_REFRESH_INTERVAL_MS, MAX_REFRESH_INTERVAL_MS),
        }
    }

    /// Parse a persisted blob, falling back to `default` when it is missing
    /// or unreadable.
    pub fn from_blob(blob: Option<&str>, default: Settings) -> Self {
        match blob.map(serde_json::from_str::<Settings>) {
            Some(Ok(settings)) => Self::new(settings.refresh_interval_ms),
            Some(Err(e)) => {
                tracing::warn!("Ignoring unreadable settings blob: {}", e);
                default
            }
            None => default,
        }
    }
}
