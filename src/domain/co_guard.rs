// Carbon monoxide spike guard
use super::thresholds::SeverityTier;
use chrono::{DateTime, TimeDelta, Utc};

pub const CO_DANGER_PPM: f64 = 50.0;
pub const CO_WARNING_PPM: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoGuardConfig {
    pub cooldown: TimeDelta,
    /// When set, a warning-level reading suppressed by the cooldown still
    /// restarts the cooldown clock. When clear, only readings that surface a
    /// tier restart it.
    pub refresh_on_suppressed: bool,
}

impl Default for CoGuardConfig {
    fn default() -> Self {
        Self {
            cooldown: TimeDelta::minutes(5),
            refresh_on_suppressed: true,
        }
    }
}

/// Maps raw CO readings to a tier, suppressing repeat warnings inside the
/// cooldown window. Danger readings are never suppressed.
#[derive(Debug, Clone)]
pub struct CoGuard {
    config: CoGuardConfig,
    last_spike: Option<DateTime<Utc>>,
}

impl CoGuard {
    pub fn new(config: CoGuardConfig) -> Self {
        Self {
            config,
            last_spike: None,
        }
    }

    pub fn last_spike(&self) -> Option<DateTime<Utc>> {
        self.last_spike
    }

    pub fn observe(&mut self, ppm: f64, now: DateTime<Utc>) -> SeverityTier {
        if ppm > CO_DANGER_PPM {
            self.last_spike = Some(now);
            return SeverityTier::Danger;
        }

        if ppm > CO_WARNING_PPM {
            let cooled_down = self
                .last_spike
                .map(|spike| now - spike > self.config.cooldown)
                .unwrap_or(true);

            if cooled_down {
                self.last_spike = Some(now);
                return SeverityTier::Warning;
            }

            if self.config.refresh_on_suppressed {
                self.last_spike = Some(now);
            }
            return SeverityTier::Safe;
        }

        SeverityTier::Safe
    }
}
