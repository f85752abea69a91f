// Sensor sample domain model
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Standard gravity in m/s², the resting accelerometer magnitude.
pub const GRAVITY: f64 = 9.81;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoFix {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: Option<f64>,
}

/// One polling cycle's normalized telemetry. Vitals the device did not
/// report are `None` and render as unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub hr: Option<f64>,
    pub breathing: Option<f64>,
    pub temperature: Option<f64>,
    pub accel: Option<Vec3>,
    #[allow(dead_code)]
    pub gyro: Option<Vec3>,
    pub water_submerged: bool,
    pub co_ppm: Option<f64>,
    pub gps: Option<GeoFix>,
    pub timestamp: DateTime<Utc>,
}

impl SensorSample {
    /// An empty sample at `timestamp`; fill in fields with struct update syntax.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            hr: None,
            breathing: None,
            temperature: None,
            accel: None,
            gyro: None,
            water_submerged: false,
            co_ppm: None,
            gps: None,
            timestamp,
        }
    }

    /// Acceleration magnitude above the resting gravity baseline.
    /// A missing accelerometer reads as no movement.
    pub fn movement(&self) -> f64 {
        self.accel
            .map(|a| a.magnitude() - GRAVITY)
            .unwrap_or(0.0)
    }
}
