// Alert service - Fetch, reconcile and acknowledge device alerts
use crate::application::device_source::{AlertSource, SourceError};
use crate::domain::alert::{emergency_message, Alert, AlertAggregator, AlertGroup};
use crate::domain::retention::RetentionPolicy;
use crate::domain::sample::GeoFix;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlerts {
    pub groups: Vec<AlertGroup>,
    pub alarm: bool,
}

/// The aggregator lock is never held across a request, so overlapping
/// polls apply their snapshots in the order responses arrive.
#[derive(Clone)]
pub struct AlertService {
    source: Arc<dyn AlertSource>,
    aggregator: Arc<Mutex<AlertAggregator>>,
}

impl AlertService {
    pub fn new(source: Arc<dyn AlertSource>, retention: RetentionPolicy) -> Self {
        Self {
            source,
            aggregator: Arc::new(Mutex::new(AlertAggregator::new(retention))),
        }
    }

    /// Fetch the full alert list and replace local state with it. On
    /// failure local state is left as it was.
    pub async fn poll(&self) -> Result<Vec<Alert>, SourceError> {
        let alerts = self.source.fetch_alerts().await?;
        let new_alarms = self.aggregator.lock().await.reconcile(alerts);

        for alarm in &new_alarms {
            tracing::warn!(
                "ALARM: {} raised at {}{}",
                alarm.kind,
                alarm.timestamp,
                alarm
                    .coordinates
                    .map(|c| format!(" ({}, {})", c.lat, c.lon))
                    .unwrap_or_default()
            );
        }
        Ok(new_alarms)
    }

    /// Acknowledge every active alert of `kind`, then refresh. Only the
    /// acknowledge request decides the result; a failed refresh is left to
    /// the next alert tick.
    pub async fn acknowledge(&self, kind: &str) -> Result<(), SourceError> {
        self.source.acknowledge(kind).await?;
        tracing::info!("Acknowledged {} alerts", kind);
        self.refresh().await;
        Ok(())
    }

    /// One acknowledge request per distinct unacknowledged type. Returns
    /// how many types were cleared.
    pub async fn clear_all(&self) -> Result<usize, SourceError> {
        let kinds = self.aggregator.lock().await.unacknowledged_types();
        if kinds.is_empty() {
            return Ok(0);
        }

        futures::future::try_join_all(kinds.iter().map(|kind| self.source.acknowledge(kind)))
            .await?;
        tracing::info!("Cleared alerts of types {:?}", kinds);
        self.refresh().await;
        Ok(kinds.len())
    }

    async fn refresh(&self) {
        if let Err(e) = self.poll().await {
            tracing::warn!("Alert refresh after acknowledge failed: {}", e);
        }
    }

    pub async fn active(&self, now: DateTime<Utc>) -> ActiveAlerts {
        let aggregator = self.aggregator.lock().await;
        ActiveAlerts {
            groups: aggregator.groups(now),
            alarm: aggregator.has_active_alarm(),
        }
    }

    pub async fn history(&self, window: TimeDelta, now: DateTime<Utc>) -> Vec<Alert> {
        self.aggregator.lock().await.history(window, now)
    }

    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        self.aggregator.lock().await.prune(now)
    }

    pub async fn emergency_message(&self, last_fix: Option<GeoFix>) -> String {
        let aggregator = self.aggregator.lock().await;
        emergency_message(aggregator.newest_active_alarm(), last_fix)
    }
}
