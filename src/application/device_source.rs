// Collaborator traits for the wearable's telemetry and alert endpoints
use crate::domain::alert::Alert;
use crate::domain::sample::SensorSample;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("device returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed payload: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Pull the latest telemetry snapshot
    async fn fetch_sample(&self) -> Result<SensorSample, SourceError>;
}

#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Every alert the device currently reports, acknowledged or not
    async fn fetch_alerts(&self) -> Result<Vec<Alert>, SourceError>;

    /// Acknowledge all active alerts of one type
    async fn acknowledge(&self, kind: &str) -> Result<(), SourceError>;
}
