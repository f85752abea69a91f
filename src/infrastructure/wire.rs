// Device JSON payloads and their mapping to domain types
use crate::domain::alert::{Alert, Coordinates};
use crate::domain::sample::{GeoFix, SensorSample, Vec3};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Epoch values above this are milliseconds rather than seconds.
const EPOCH_MILLIS_CUTOFF: f64 = 1e11;

/// Timestamps arrive as RFC 3339 text or epoch numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTime {
    Epoch(f64),
    Text(String),
}

impl WireTime {
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            WireTime::Epoch(value) => epoch_to_utc(*value),
            WireTime::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| text.trim().parse::<f64>().ok().and_then(epoch_to_utc)),
        }
    }
}

fn epoch_to_utc(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() > EPOCH_MILLIS_CUTOFF {
        value
    } else {
        value * 1000.0
    };
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

// Nested components are optional so a null axis or coordinate only drops
// its own object, never the whole payload.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireVec3 {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

impl WireVec3 {
    /// All three axes or nothing.
    fn to_vec3(self) -> Option<Vec3> {
        Some(Vec3::new(self.x?, self.y?, self.z?))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireGps {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl WireGps {
    fn to_fix(self) -> Option<GeoFix> {
        Some(GeoFix {
            lat: self.lat?,
            lon: self.lon?,
            accuracy: self.accuracy,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default)]
    pub hr: Option<f64>,
    #[serde(default)]
    pub breathing: Option<f64>,
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub accel: Option<WireVec3>,
    #[serde(default)]
    pub gyro: Option<WireVec3>,
    #[serde(default)]
    pub water_submerged: Option<bool>,
    #[serde(default)]
    pub co_ppm: Option<f64>,
    #[serde(default)]
    pub gps: Option<WireGps>,
    #[serde(default)]
    pub timestamp: Option<WireTime>,
}

impl TelemetryPayload {
    /// A missing or unparseable timestamp becomes `fetched_at`.
    pub fn into_sample(self, fetched_at: DateTime<Utc>) -> SensorSample {
        let timestamp = self
            .timestamp
            .as_ref()
            .and_then(WireTime::to_utc)
            .unwrap_or(fetched_at);

        SensorSample {
            hr: self.hr,
            breathing: self.breathing,
            temperature: self.temp,
            accel: self.accel.and_then(WireVec3::to_vec3),
            gyro: self.gyro.and_then(WireVec3::to_vec3),
            water_submerged: self.water_submerged.unwrap_or(false),
            co_ppm: self.co_ppm,
            gps: self.gps.and_then(WireGps::to_fix),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireCoords {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl WireCoords {
    fn to_coordinates(self) -> Option<Coordinates> {
        Some(Coordinates {
            lat: self.lat?,
            lon: self.lon?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: WireTime,
    #[serde(default)]
    pub started_at: Option<WireTime>,
    #[serde(default)]
    pub coords: Option<WireCoords>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl AlertRecord {
    /// Records whose timestamp cannot be read are dropped.
    pub fn into_alert(self) -> Option<Alert> {
        let Some(timestamp) = self.timestamp.to_utc() else {
            tracing::debug!("Dropping {} alert with unreadable timestamp", self.kind);
            return None;
        };

        Some(Alert {
            kind: self.kind,
            timestamp,
            started_at: self.started_at.as_ref().and_then(WireTime::to_utc),
            coordinates: self.coords.and_then(WireCoords::to_coordinates),
            acknowledged: self.acknowledged,
        })
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AckRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
}
