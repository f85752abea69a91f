// In-memory collaborators for service tests
use crate::application::device_source::{AlertSource, SourceError, TelemetrySource};
use crate::application::key_value_store::KeyValueStore;
use crate::domain::alert::Alert;
use crate::domain::sample::SensorSample;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
    pub writes: AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn with(key: &str, value: &str) -> Self {
        let store = Self::default();
        store.blobs.lock().unwrap().insert(key.to_string(), value.to_string());
        store
    }

    pub fn blob(&self, key: &str) -> Option<String> {
        self.blobs.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.blob(key))
    }

    async fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.blobs.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Device double: acknowledging a type flips every alert of that type.
#[derive(Default)]
pub struct FakeDevice {
    pub alerts: Mutex<Vec<Alert>>,
    pub sample: Mutex<Option<SensorSample>>,
    pub acks: Mutex<Vec<String>>,
    pub fail_fetch: AtomicBool,
    pub fail_ack: AtomicBool,
}

impl FakeDevice {
    pub fn with_alerts(alerts: Vec<Alert>) -> Self {
        let device = Self::default();
        *device.alerts.lock().unwrap() = alerts;
        device
    }
}

#[async_trait]
impl AlertSource for FakeDevice {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>, SourceError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SourceError::Transport("connection refused".to_string()));
        }
        Ok(self.alerts.lock().unwrap().clone())
    }

    async fn acknowledge(&self, kind: &str) -> Result<(), SourceError> {
        if self.fail_ack.load(Ordering::SeqCst) {
            return Err(SourceError::Status {
                status: 500,
                body: "ack failed".to_string(),
            });
        }
        self.acks.lock().unwrap().push(kind.to_string());
        for alert in self.alerts.lock().unwrap().iter_mut() {
            if alert.kind == kind {
                alert.acknowledged = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetrySource for FakeDevice {
    async fn fetch_sample(&self) -> Result<SensorSample, SourceError> {
        self.sample
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SourceError::Decode("no sample".to_string()))
    }
}
