// Alert domain models and aggregation
use super::retention::RetentionPolicy;
use super::sample::GeoFix;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const FALL: &str = "FALL";
pub const WATER: &str = "WATER";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub coordinates: Option<Coordinates>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(kind: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: kind.into(),
            timestamp,
            started_at: None,
            coordinates: None,
            acknowledged: false,
        }
    }

    /// FALL and WATER alerts sound the alarm and show a running timer.
    pub fn is_alarm(&self) -> bool {
        self.kind == FALL || self.kind == WATER
    }

    /// Seconds since the event started, recomputed on every read.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.is_alarm() {
            return None;
        }
        self.started_at
            .map(|started| (now - started).num_seconds().max(0))
    }
}

pub fn group_title(kind: &str) -> String {
    if kind == FALL {
        "Fall detected".to_string()
    } else {
        format!("{} unsafe", kind)
    }
}

/// Text a caregiver can paste when calling emergency services. Alert
/// coordinates win over the last known GPS fix.
pub fn emergency_message(alarm: Option<&Alert>, last_fix: Option<GeoFix>) -> String {
    let coordinates = alarm
        .and_then(|a| a.coordinates)
        .or(last_fix.map(|fix| Coordinates { lat: fix.lat, lon: fix.lon }));
    let location = match coordinates {
        Some(c) => format!("{},{}", c.lat, c.lon),
        None => "location unavailable".to_string(),
    };

    match alarm {
        Some(alert) => format!("Emergency: {} at {}", alert.kind, location),
        None => format!("Emergency! Please call your local emergency number. Location: {}", location),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlert {
    #[serde(flatten)]
    pub alert: Alert,
    pub elapsed_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertGroup {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub alerts: Vec<ActiveAlert>,
}

/// One device event: alert type plus raise time.
type EventKey = (String, DateTime<Utc>);

/// Holds the latest alert snapshot from the device plus a retained history
/// of every alert seen. Each fetch fully replaces the snapshot.
#[derive(Debug, Clone)]
pub struct AlertAggregator {
    current: Vec<Alert>,
    history: BTreeMap<EventKey, Alert>,
    latest_alarm: Option<DateTime<Utc>>,
    retention: RetentionPolicy,
}

impl AlertAggregator {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            current: Vec::new(),
            history: BTreeMap::new(),
            latest_alarm: None,
            retention,
        }
    }

    /// Replace the snapshot and fold it into history. Returns alarms newer
    /// than any alarm seen before.
    pub fn reconcile(&mut self, alerts: Vec<Alert>) -> Vec<Alert> {
        let new_alarms: Vec<Alert> = alerts
            .iter()
            .filter(|a| a.is_alarm() && !a.acknowledged)
            .filter(|a| self.latest_alarm.is_none_or(|seen| a.timestamp > seen))
            .cloned()
            .collect();

        if let Some(newest) = new_alarms.iter().map(|a| a.timestamp).max() {
            self.latest_alarm = Some(newest);
        }

        for alert in &alerts {
            self.history
                .insert((alert.kind.clone(), alert.timestamp), alert.clone());
        }

        self.current = alerts;
        new_alarms
    }

    /// Unacknowledged alerts grouped by type, ordered by type name.
    pub fn groups(&self, now: DateTime<Utc>) -> Vec<AlertGroup> {
        let mut by_kind: BTreeMap<&str, Vec<ActiveAlert>> = BTreeMap::new();
        for alert in self.current.iter().filter(|a| !a.acknowledged) {
            by_kind.entry(alert.kind.as_str()).or_default().push(ActiveAlert {
                alert: alert.clone(),
                elapsed_seconds: alert.elapsed_seconds(now),
            });
        }

        by_kind
            .into_iter()
            .map(|(kind, alerts)| AlertGroup {
                kind: kind.to_string(),
                title: group_title(kind),
                alerts,
            })
            .collect()
    }

    /// Distinct types that still have an unacknowledged alert.
    pub fn unacknowledged_types(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .current
            .iter()
            .filter(|a| !a.acknowledged)
            .map(|a| a.kind.clone())
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// All retained alerts inside the trailing window, newest first.
    pub fn history(&self, window: TimeDelta, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .history
            .values()
            .filter(|a| now - a.timestamp <= window)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts
    }

    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.history.len();
        let retention = self.retention;
        self.history
            .retain(|(_, timestamp), _| !retention.is_expired(*timestamp, now));
        before - self.history.len()
    }

    pub fn has_active_alarm(&self) -> bool {
        self.newest_active_alarm().is_some()
    }

    pub fn newest_active_alarm(&self) -> Option<&Alert> {
        self.current
            .iter()
            .filter(|a| a.is_alarm() && !a.acknowledged)
            .max_by_key(|a| a.timestamp)
    }

    pub fn current(&self) -> &[Alert] {
        &self.current
    }
}
