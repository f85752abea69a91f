// Application layer - Use cases and collaborator traits
pub mod alert_service;
pub mod device_source;
pub mod key_value_store;
pub mod monitor_service;
pub mod polling;
pub mod settings_service;

#[cfg(test)]
pub mod testing;
