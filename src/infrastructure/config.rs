use crate::application::monitor_service::MonitorConfig;
use crate::domain::co_guard::CoGuardConfig;
use crate::domain::history::HistoryConfig;
use crate::domain::retention::RetentionPolicy;
use crate::domain::settings::Settings;
use anyhow::Context;
use chrono::TimeDelta;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub activity: ActivitySettings,
    #[serde(default)]
    pub co: CoSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceSettings {
    pub base_url: String,
    pub telemetry_path: String,
    pub alerts_path: String,
    pub ack_path: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            telemetry_path: "/data".to_string(),
            alerts_path: "/alerts".to_string(),
            ack_path: "/alerts/ack".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingSettings {
    pub sensor_interval_ms: u64,
    pub alert_interval_ms: u64,
    pub maintenance_interval_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            sensor_interval_ms: 2000,
            alert_interval_ms: 3000,
            maintenance_interval_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActivitySettings {
    pub required_confirmations: u32,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            required_confirmations: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CoSettings {
    pub cooldown_secs: i64,
    pub refresh_cooldown_on_suppressed: bool,
}

impl Default for CoSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            refresh_cooldown_on_suppressed: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistorySettings {
    pub capacity: usize,
    pub retention_days: i64,
    pub persist_throttle_secs: i64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            retention_days: 30,
            persist_throttle_secs: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpSettings {
    pub bind: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl AppConfig {
    pub fn retention(&self) -> anyhow::Result<RetentionPolicy> {
        let window = span("history.retention_days", self.history.retention_days, TimeDelta::try_days)?;
        Ok(RetentionPolicy::new(window))
    }

    pub fn monitor(&self) -> anyhow::Result<MonitorConfig> {
        Ok(MonitorConfig {
            required_confirmations: self.activity.required_confirmations,
            co: CoGuardConfig {
                cooldown: span("co.cooldown_secs", self.co.cooldown_secs, TimeDelta::try_seconds)?,
                refresh_on_suppressed: self.co.refresh_cooldown_on_suppressed,
            },
            history: HistoryConfig {
                capacity: self.history.capacity,
                retention: self.retention()?,
                persist_throttle: span(
                    "history.persist_throttle_secs",
                    self.history.persist_throttle_secs,
                    TimeDelta::try_seconds,
                )?,
            },
        })
    }

    pub fn default_settings(&self) -> Settings {
        Settings::new(self.polling.sensor_interval_ms)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_millis(self.polling.alert_interval_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.polling.maintenance_interval_secs)
    }
}

/// Non-negative count of `unit`s that fits in a `TimeDelta`.
fn span(name: &str, value: i64, unit: fn(i64) -> Option<TimeDelta>) -> anyhow::Result<TimeDelta> {
    if value < 0 {
        anyhow::bail!("{} must not be negative, got {}", name, value);
    }
    unit(value).with_context(|| format!("{} is out of range: {}", name, value))
}

/// `config/monitor.toml` if present, overridden by `MONITOR__SECTION__KEY`
/// environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/monitor").required(false))
        .add_source(
            config::Environment::with_prefix("MONITOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = settings.try_deserialize()?;
    app.monitor().context("Invalid monitor configuration")?;
    Ok(app)
}

/// Join a base URL and a path without doubling or dropping the slash
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        assert_eq!(endpoint("http://10.0.0.75:5000/", "/alerts/ack"), "http://10.0.0.75:5000/alerts/ack");
        assert_eq!(endpoint("http://10.0.0.75:5000", "data"), "http://10.0.0.75:5000/data");
    }

    #[test]
    fn test_defaults_deserialize_from_partial_source() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                "[device]\nbase_url = \"http://watch.local\"\n[co]\nrefresh_cooldown_on_suppressed = false\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.device.base_url, "http://watch.local");
        assert_eq!(config.device.alerts_path, "/alerts");
        assert_eq!(config.polling.alert_interval_ms, 3000);

        let monitor = config.monitor().unwrap();
        assert!(!monitor.co.refresh_on_suppressed);
        assert_eq!(monitor.co.cooldown, TimeDelta::minutes(5));
        assert_eq!(monitor.history.capacity, 1000);
        assert_eq!(config.retention().unwrap().window, TimeDelta::days(30));
    }

    #[test]
    fn test_out_of_range_durations_are_errors() {
        let mut config = AppConfig::default();
        config.history.retention_days = i64::MAX;
        let err = config.monitor().unwrap_err();
        assert!(err.to_string().contains("history.retention_days"));
        assert!(config.retention().is_err());

        let mut config = AppConfig::default();
        config.co.cooldown_secs = -1;
        assert!(config.monitor().unwrap_err().to_string().contains("co.cooldown_secs"));

        let mut config = AppConfig::default();
        config.history.persist_throttle_secs = i64::MAX;
        assert!(config.monitor().is_err());
    }
}
