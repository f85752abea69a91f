// Application state for HTTP handlers
use crate::application::alert_service::AlertService;
use crate::application::monitor_service::MonitorService;
use crate::application::settings_service::SettingsService;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Mutex<MonitorService>>,
    pub alerts: AlertService,
    pub settings: SettingsService,
}
