// Bounded per-metric time-series history
use super::retention::RetentionPolicy;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Hr,
    Breathing,
    Temperature,
    Co,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Hr, Metric::Breathing, Metric::Temperature, Metric::Co];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "hr" => Some(Metric::Hr),
            "breathing" => Some(Metric::Breathing),
            "temperature" | "temp" => Some(Metric::Temperature),
            "co" => Some(Metric::Co),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl HistoryPoint {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value }
    }
}

/// Persisted shape of the history blob.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryBlob {
    #[serde(rename = "historyData")]
    history_data: BTreeMap<Metric, Vec<HistoryPoint>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub retention: RetentionPolicy,
    pub persist_throttle: TimeDelta,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            retention: RetentionPolicy::default(),
            persist_throttle: TimeDelta::seconds(15),
        }
    }
}

/// Sole owner of every metric series. Capacity eviction happens on append,
/// age pruning only when `prune` is called.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    series: BTreeMap<Metric, VecDeque<HistoryPoint>>,
    config: HistoryConfig,
    last_persisted: Option<DateTime<Utc>>,
}

impl HistoryStore {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            series: BTreeMap::new(),
            config,
            last_persisted: None,
        }
    }

    /// Rebuild from a persisted blob, then prune. An unreadable blob yields
    /// an empty store.
    pub fn restore(config: HistoryConfig, blob: Option<&str>, now: DateTime<Utc>) -> Self {
        let mut store = Self::new(config);
        let Some(blob) = blob else {
            return store;
        };

        match serde_json::from_str::<HistoryBlob>(blob) {
            Ok(parsed) => {
                for (metric, points) in parsed.history_data {
                    for point in points {
                        store.append(metric, point);
                    }
                }
                let dropped = store.prune(now);
                tracing::debug!("Restored history, pruned {} expired points", dropped);
            }
            Err(e) => {
                tracing::warn!("Discarding unreadable history blob: {}", e);
            }
        }
        store
    }

    /// Push a point, evicting the oldest beyond capacity. Points older than
    /// the series tail are dropped so every series stays time-ordered.
    pub fn append(&mut self, metric: Metric, point: HistoryPoint) -> bool {
        let series = self.series.entry(metric).or_default();
        if series.back().is_some_and(|last| point.time < last.time) {
            tracing::debug!("Dropping out-of-order {:?} point at {}", metric, point.time);
            return false;
        }

        series.push_back(point);
        while series.len() > self.config.capacity {
            series.pop_front();
        }
        true
    }

    /// Drop every point outside the retention window. Returns how many went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let retention = self.config.retention;
        let mut dropped = 0;
        for series in self.series.values_mut() {
            let before = series.len();
            series.retain(|p| !retention.is_expired(p.time, now));
            dropped += before - series.len();
        }
        dropped
    }

    pub fn series(&self, metric: Metric) -> Vec<HistoryPoint> {
        self.series
            .get(&metric)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, metric: Metric) -> usize {
        self.series.get(&metric).map(VecDeque::len).unwrap_or(0)
    }

    /// True when the throttle interval has passed since the last write.
    pub fn should_persist(&self, now: DateTime<Utc>) -> bool {
        self.last_persisted
            .is_none_or(|last| now - last >= self.config.persist_throttle)
    }

    pub fn mark_persisted(&mut self, now: DateTime<Utc>) {
        self.last_persisted = Some(now);
    }

    pub fn to_blob(&self) -> serde_json::Result<String> {
        let blob = HistoryBlob {
            history_data: self
                .series
                .iter()
                .map(|(metric, points)| (*metric, points.iter().copied().collect::<Vec<_>>()))
                .collect(),
        };
        serde_json::to_string(&blob)
    }
}
