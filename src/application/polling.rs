// Periodic tasks - Sensor poll, alert poll and retention maintenance
use crate::application::alert_service::AlertService;
use crate::application::device_source::TelemetrySource;
use crate::application::key_value_store::{KeyValueStore, HISTORY_KEY};
use crate::application::monitor_service::{MonitorService, MonitorSnapshot};
use crate::domain::settings::Settings;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Every tick spawns its own fetch, so a slow response never delays the
/// next poll. Results are applied under the owner's lock as they arrive.
#[derive(Clone)]
pub struct Poller {
    telemetry: Arc<dyn TelemetrySource>,
    monitor: Arc<Mutex<MonitorService>>,
    alerts: AlertService,
    store: Arc<dyn KeyValueStore>,
}

impl Poller {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        monitor: Arc<Mutex<MonitorService>>,
        alerts: AlertService,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            telemetry,
            monitor,
            alerts,
            store,
        }
    }

    /// Fetch and ingest one sample. A failed fetch skips the tick and keeps
    /// prior state.
    pub async fn sensor_tick(&self) -> Option<MonitorSnapshot> {
        let sample = match self.telemetry.fetch_sample().await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!("Skipping sensor tick: {}", e);
                return None;
            }
        };

        let now = Utc::now();
        let snapshot = self.monitor.lock().await.ingest(sample, now);
        self.persist_history(now).await;
        Some(snapshot)
    }

    pub async fn alert_tick(&self) {
        if let Err(e) = self.alerts.poll().await {
            tracing::warn!("Skipping alert tick: {}", e);
        }
    }

    pub async fn maintenance_tick(&self) {
        self.maintain(Utc::now()).await;
    }

    /// Prune both histories, then write metric history if the throttle
    /// allows. Covers samples that arrived inside the last throttle window
    /// when the device has since gone quiet.
    pub async fn maintain(&self, now: DateTime<Utc>) {
        let points = self.monitor.lock().await.prune(now);
        let alerts = self.alerts.prune(now).await;
        if points > 0 || alerts > 0 {
            tracing::info!("Retention pruned {} points and {} alerts", points, alerts);
        }
        self.persist_history(now).await;
    }

    async fn persist_history(&self, now: DateTime<Utc>) {
        match self.write_history(now).await {
            Ok(true) => tracing::debug!("History persisted"),
            Ok(false) => {}
            Err(e) => tracing::warn!("History not persisted: {:#}", e),
        }
    }

    /// The monitor lock is released during the write. The throttle clock
    /// only advances once the write has landed.
    async fn write_history(&self, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let blob = {
            let monitor = self.monitor.lock().await;
            monitor.pending_blob(now)?
        };
        let Some(blob) = blob else {
            return Ok(false);
        };

        self.store
            .put(HISTORY_KEY, &blob)
            .await
            .context("Failed to write history")?;
        self.monitor.lock().await.mark_persisted(now);
        Ok(true)
    }

    /// Period is re-read from `settings` every cycle.
    pub fn spawn_sensor_loop(&self, settings: watch::Receiver<Settings>) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move {
            loop {
                let period = settings.borrow().refresh_interval_ms;
                tokio::time::sleep(Duration::from_millis(period)).await;

                let tick = poller.clone();
                tokio::spawn(async move {
                    tick.sensor_tick().await;
                });
            }
        })
    }

    pub fn spawn_alert_loop(&self, period: Duration) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let tick = poller.clone();
                tokio::spawn(async move {
                    tick.alert_tick().await;
                });
            }
        })
    }

    pub fn spawn_maintenance_loop(&self, period: Duration) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                poller.maintenance_tick().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::monitor_service::MonitorConfig;
    use crate::application::testing::{FakeDevice, MemoryStore};
    use crate::domain::alert::Alert;
    use crate::domain::history::Metric;
    use crate::domain::retention::RetentionPolicy;
    use crate::domain::sample::SensorSample;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn poller(device: &Arc<FakeDevice>, store: &Arc<MemoryStore>) -> Poller {
        let monitor = MonitorService::new(MonitorConfig::default(), Utc::now());
        Poller::new(
            device.clone(),
            Arc::new(Mutex::new(monitor)),
            AlertService::new(device.clone(), RetentionPolicy::default()),
            store.clone(),
        )
    }

    fn hr_sample(time: DateTime<Utc>, hr: f64) -> SensorSample {
        SensorSample {
            hr: Some(hr),
            ..SensorSample::at(time)
        }
    }

    /// Records whether the monitor lock was free while a write ran.
    struct LockCheckingStore {
        monitor: Arc<Mutex<MonitorService>>,
        unlocked_during_write: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for LockCheckingStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        async fn put(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            let free = self.monitor.try_lock().is_ok();
            self.unlocked_during_write.store(free, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sensor_tick_ingests_and_persists() {
        let device = Arc::new(FakeDevice::default());
        let store = Arc::new(MemoryStore::default());
        let poller = poller(&device, &store);
        *device.sample.lock().unwrap() = Some(SensorSample {
            hr: Some(70.0),
            ..SensorSample::at(Utc::now())
        });

        let snapshot = poller.sensor_tick().await.unwrap();
        assert_eq!(snapshot.hr.value, Some(70.0));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(poller.monitor.lock().await.history(Metric::Hr).len(), 1);
    }

    #[tokio::test]
    async fn test_sensor_tick_survives_fetch_failure() {
        let device = Arc::new(FakeDevice::default());
        let store = Arc::new(MemoryStore::default());
        let poller = poller(&device, &store);

        assert!(poller.sensor_tick().await.is_none());
        assert!(poller.monitor.lock().await.snapshot().is_none());
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_alert_tick_swallows_transport_errors() {
        let device = Arc::new(FakeDevice::with_alerts(vec![Alert::new("HR", Utc::now())]));
        let store = Arc::new(MemoryStore::default());
        let poller = poller(&device, &store);

        poller.alert_tick().await;
        device.fail_fetch.store(true, Ordering::SeqCst);
        poller.alert_tick().await;
        assert_eq!(poller.alerts.active(Utc::now()).await.groups.len(), 1);
    }

    #[tokio::test]
    async fn test_maintenance_writes_throttled_samples() {
        let device = Arc::new(FakeDevice::default());
        let store = Arc::new(MemoryStore::default());
        let poller = poller(&device, &store);
        let t0 = Utc::now();

        *device.sample.lock().unwrap() = Some(hr_sample(t0, 70.0));
        poller.sensor_tick().await.unwrap();
        *device.sample.lock().unwrap() = Some(hr_sample(t0 + TimeDelta::seconds(1), 71.0));
        poller.sensor_tick().await.unwrap();
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);

        // Device goes quiet; maintenance flushes once the throttle has passed
        *device.sample.lock().unwrap() = None;
        poller.maintain(Utc::now() + TimeDelta::seconds(16)).await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        assert!(store.blob(HISTORY_KEY).unwrap().contains("71.0"));
    }

    #[tokio::test]
    async fn test_maintenance_skips_write_inside_throttle() {
        let device = Arc::new(FakeDevice::default());
        let store = Arc::new(MemoryStore::default());
        let poller = poller(&device, &store);

        *device.sample.lock().unwrap() = Some(hr_sample(Utc::now(), 70.0));
        poller.sensor_tick().await.unwrap();
        poller.maintenance_tick().await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_write_retries_next_tick() {
        let device = Arc::new(FakeDevice::default());
        let store = Arc::new(MemoryStore::default());
        let poller = poller(&device, &store);
        let t0 = Utc::now();

        store.fail_writes.store(true, Ordering::SeqCst);
        *device.sample.lock().unwrap() = Some(hr_sample(t0, 70.0));
        poller.sensor_tick().await.unwrap();
        assert!(store.blob(HISTORY_KEY).is_none());

        store.fail_writes.store(false, Ordering::SeqCst);
        *device.sample.lock().unwrap() = Some(hr_sample(t0 + TimeDelta::seconds(1), 71.0));
        poller.sensor_tick().await.unwrap();
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_write_runs_without_monitor_lock() {
        let device = Arc::new(FakeDevice::default());
        let monitor = Arc::new(Mutex::new(MonitorService::new(MonitorConfig::default(), Utc::now())));
        let store = Arc::new(LockCheckingStore {
            monitor: monitor.clone(),
            unlocked_during_write: AtomicBool::new(false),
        });
        let poller = Poller::new(
            device.clone(),
            monitor,
            AlertService::new(device.clone(), RetentionPolicy::default()),
            store.clone(),
        );

        *device.sample.lock().unwrap() = Some(hr_sample(Utc::now(), 70.0));
        poller.sensor_tick().await.unwrap();
        assert!(store.unlocked_during_write.load(Ordering::SeqCst));
    }
}
