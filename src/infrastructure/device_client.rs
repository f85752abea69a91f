// HTTP client for the wearable's telemetry and alert endpoints
use crate::application::device_source::{AlertSource, SourceError, TelemetrySource};
use crate::domain::alert::Alert;
use crate::domain::sample::SensorSample;
use crate::infrastructure::config::{endpoint, DeviceSettings};
use crate::infrastructure::wire::{AckRequest, AlertRecord, TelemetryPayload};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    client: reqwest::Client,
    telemetry_url: String,
    alerts_url: String,
    ack_url: String,
}

impl HttpDeviceClient {
    pub fn new(settings: &DeviceSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            telemetry_url: endpoint(&settings.base_url, &settings.telemetry_path),
            alerts_url: endpoint(&settings.base_url, &settings.alerts_path),
            ack_url: endpoint(&settings.base_url, &settings.ack_path),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TelemetrySource for HttpDeviceClient {
    async fn fetch_sample(&self) -> Result<SensorSample, SourceError> {
        let payload: TelemetryPayload = self.get_json(&self.telemetry_url).await?;
        Ok(payload.into_sample(Utc::now()))
    }
}

#[async_trait]
impl AlertSource for HttpDeviceClient {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>, SourceError> {
        let records: Vec<AlertRecord> = self.get_json(&self.alerts_url).await?;
        tracing::debug!("Fetched {} alert records", records.len());
        Ok(records.into_iter().filter_map(AlertRecord::into_alert).collect())
    }

    async fn acknowledge(&self, kind: &str) -> Result<(), SourceError> {
        let response = self
            .client
            .post(&self.ack_url)
            .json(&AckRequest { kind })
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_built_from_settings() {
        let client = HttpDeviceClient::new(&DeviceSettings {
            base_url: "http://10.0.0.75:5000/".to_string(),
            ..DeviceSettings::default()
        });
        assert_eq!(client.telemetry_url, "http://10.0.0.75:5000/data");
        assert_eq!(client.alerts_url, "http://10.0.0.75:5000/alerts");
        assert_eq!(client.ack_url, "http://10.0.0.75:5000/alerts/ack");
    }

    #[tokio::test]
    async fn test_unreachable_device_is_transport_error() {
        let client = HttpDeviceClient::new(&DeviceSettings {
            base_url: "http://127.0.0.1:1".to_string(),
            ..DeviceSettings::default()
        });
        let err = client.fetch_alerts().await.unwrap_err();
        assert!(matches!(err, SourceError::Transport(_)));
    }
}
