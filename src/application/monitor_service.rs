// Monitor service - Sensor pipeline from raw sample to graded vitals and history
use crate::application::key_value_store::{KeyValueStore, HISTORY_KEY};
use crate::domain::activity::{ActivityClassifier, ActivityLabel, ActivityStabilizer};
use crate::domain::co_guard::{CoGuard, CoGuardConfig};
use crate::domain::history::{HistoryConfig, HistoryPoint, HistoryStore, Metric};
use crate::domain::sample::{GeoFix, SensorSample};
use crate::domain::thresholds::{SafeRange, SafeRanges, SeverityTier};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub required_confirmations: u32,
    pub co: CoGuardConfig,
    pub history: HistoryConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            required_confirmations: 3,
            co: CoGuardConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

/// A vital with its tier. `None` value means the device did not report it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VitalReading {
    pub value: Option<f64>,
    pub tier: Option<SeverityTier>,
    pub range: SafeRange,
}

impl VitalReading {
    fn grade(value: Option<f64>, range: SafeRange) -> Self {
        Self {
            value,
            tier: value.map(|v| range.classify(v)),
            range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoReading {
    pub ppm: Option<f64>,
    pub tier: Option<SeverityTier>,
}

/// Read-only view of one processed tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub activity: ActivityLabel,
    pub candidate: ActivityLabel,
    pub hr: VitalReading,
    pub breathing: VitalReading,
    pub temperature: VitalReading,
    pub co: CoReading,
    pub water_submerged: bool,
    pub location: Option<GeoFix>,
    pub sample_time: DateTime<Utc>,
}

pub struct MonitorService {
    classifier: ActivityClassifier,
    stabilizer: ActivityStabilizer,
    co_guard: CoGuard,
    history: HistoryStore,
    last_fix: Option<GeoFix>,
    latest: Option<MonitorSnapshot>,
}

impl MonitorService {
    pub fn new(config: MonitorConfig, now: DateTime<Utc>) -> Self {
        Self::with_history(config, HistoryStore::new(config.history), now)
    }

    fn with_history(config: MonitorConfig, history: HistoryStore, now: DateTime<Utc>) -> Self {
        Self {
            classifier: ActivityClassifier::new(),
            stabilizer: ActivityStabilizer::new(config.required_confirmations, now),
            co_guard: CoGuard::new(config.co),
            history,
            last_fix: None,
            latest: None,
        }
    }

    /// Build the service with history restored from `store`. A failed read
    /// or unreadable blob starts with empty history.
    pub async fn restore(
        config: MonitorConfig,
        store: &dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> Self {
        let blob = match store.get(HISTORY_KEY).await {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!("Could not read persisted history: {:#}", e);
                None
            }
        };
        let history = HistoryStore::restore(config.history, blob.as_deref(), now);
        Self::with_history(config, history, now)
    }

    /// Run one sample through classification, stabilization, grading and
    /// history. Replaces the previous snapshot wholesale.
    pub fn ingest(&mut self, sample: SensorSample, now: DateTime<Utc>) -> MonitorSnapshot {
        let candidate = self.classifier.classify(&sample);
        let activity = self.stabilizer.observe(candidate, now);
        let ranges = SafeRanges::for_activity(activity);

        let co = CoReading {
            ppm: sample.co_ppm,
            tier: sample.co_ppm.map(|ppm| self.co_guard.observe(ppm, now)),
        };

        let readings = [
            (Metric::Hr, sample.hr),
            (Metric::Breathing, sample.breathing),
            (Metric::Temperature, sample.temperature),
            (Metric::Co, sample.co_ppm),
        ];
        for (metric, value) in readings {
            if let Some(value) = value {
                self.history
                    .append(metric, HistoryPoint::new(sample.timestamp, value));
            }
        }

        if sample.gps.is_some() {
            self.last_fix = sample.gps;
        }

        let snapshot = MonitorSnapshot {
            activity,
            candidate,
            hr: VitalReading::grade(sample.hr, ranges.hr),
            breathing: VitalReading::grade(sample.breathing, ranges.breathing),
            temperature: VitalReading::grade(sample.temperature, ranges.temperature),
            co,
            water_submerged: sample.water_submerged,
            location: self.last_fix,
            sample_time: sample.timestamp,
        };
        self.latest = Some(snapshot.clone());
        snapshot
    }

    /// Encoded history once the throttle interval has passed, else `None`.
    /// The caller writes it and then calls `mark_persisted`.
    pub fn pending_blob(&self, now: DateTime<Utc>) -> anyhow::Result<Option<String>> {
        if !self.history.should_persist(now) {
            return Ok(None);
        }
        let blob = self.history.to_blob().context("Failed to encode history")?;
        Ok(Some(blob))
    }

    pub fn mark_persisted(&mut self, now: DateTime<Utc>) {
        self.history.mark_persisted(now);
    }

    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        self.history.prune(now)
    }

    pub fn snapshot(&self) -> Option<MonitorSnapshot> {
        self.latest.clone()
    }

    pub fn history(&self, metric: Metric) -> Vec<HistoryPoint> {
        self.history.series(metric)
    }

    pub fn last_fix(&self) -> Option<GeoFix> {
        self.last_fix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::MemoryStore;
    use crate::domain::sample::{Vec3, GRAVITY};
    use chrono::TimeDelta;

    fn resting_sample(time: DateTime<Utc>, hr: f64) -> SensorSample {
        SensorSample {
            hr: Some(hr),
            breathing: Some(14.0),
            temperature: Some(98.4),
            accel: Some(Vec3::new(0.0, 0.0, GRAVITY)),
            co_ppm: Some(2.0),
            ..SensorSample::at(time)
        }
    }

    #[test]
    fn test_ingest_grades_against_confirmed_activity() {
        let t0 = Utc::now();
        let mut service = MonitorService::new(MonitorConfig::default(), t0);

        let mut snapshot = service.ingest(resting_sample(t0, 103.0), t0);
        // Still unknown, graded against resting ranges
        assert_eq!(snapshot.activity, ActivityLabel::Unknown);
        assert_eq!(snapshot.candidate, ActivityLabel::Resting);
        assert_eq!(snapshot.hr.tier, Some(SeverityTier::Warning));

        for i in 1..3 {
            let t = t0 + TimeDelta::seconds(i);
            snapshot = service.ingest(resting_sample(t, 72.0), t);
        }
        assert_eq!(snapshot.activity, ActivityLabel::Resting);
        assert_eq!(snapshot.hr.tier, Some(SeverityTier::Safe));
        assert_eq!(snapshot.co.tier, Some(SeverityTier::Safe));
        assert_eq!(service.history(Metric::Hr).len(), 3);
    }

    #[test]
    fn test_missing_fields_do_not_block_others() {
        let t0 = Utc::now();
        let mut service = MonitorService::new(MonitorConfig::default(), t0);
        let sample = SensorSample {
            temperature: Some(98.6),
            ..SensorSample::at(t0)
        };

        let snapshot = service.ingest(sample, t0);
        assert_eq!(snapshot.hr.value, None);
        assert_eq!(snapshot.hr.tier, None);
        assert_eq!(snapshot.co.tier, None);
        assert_eq!(snapshot.temperature.tier, Some(SeverityTier::Safe));
        assert!(service.history(Metric::Hr).is_empty());
        assert_eq!(service.history(Metric::Temperature).len(), 1);
    }

    #[test]
    fn test_last_fix_survives_samples_without_gps() {
        let t0 = Utc::now();
        let mut service = MonitorService::new(MonitorConfig::default(), t0);
        let fix = GeoFix { lat: 37.4, lon: -122.0, accuracy: Some(5.0) };
        service.ingest(SensorSample { gps: Some(fix), ..SensorSample::at(t0) }, t0);
        let snapshot = service.ingest(SensorSample::at(t0), t0);
        assert_eq!(snapshot.location, Some(fix));
    }

    #[test]
    fn test_pending_blob_is_throttled() {
        let t0 = Utc::now();
        let mut service = MonitorService::new(MonitorConfig::default(), t0);
        service.ingest(resting_sample(t0, 70.0), t0);

        assert!(service.pending_blob(t0).unwrap().is_some());
        service.mark_persisted(t0);
        assert!(service.pending_blob(t0 + TimeDelta::seconds(5)).unwrap().is_none());
        assert!(service.pending_blob(t0 + TimeDelta::seconds(15)).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persist_then_restore_round_trip() {
        let t0 = Utc::now();
        let store = MemoryStore::default();
        let mut service = MonitorService::new(MonitorConfig::default(), t0);
        for i in 0..20 {
            let t = t0 + TimeDelta::seconds(i);
            service.ingest(resting_sample(t, 60.0 + i as f64), t);
        }
        let blob = service.pending_blob(t0).unwrap().unwrap();
        store.put(HISTORY_KEY, &blob).await.unwrap();

        let restored = MonitorService::restore(MonitorConfig::default(), &store, t0).await;
        assert_eq!(restored.history(Metric::Hr), service.history(Metric::Hr));
        assert_eq!(restored.history(Metric::Co), service.history(Metric::Co));
    }

    #[tokio::test]
    async fn test_restore_with_corrupt_blob_starts_empty() {
        let t0 = Utc::now();
        let store = MemoryStore::with(HISTORY_KEY, "{\"historyData\": 12");
        let service = MonitorService::restore(MonitorConfig::default(), &store, t0).await;
        assert!(service.history(Metric::Hr).is_empty());
        assert!(service.snapshot().is_none());
    }
}
