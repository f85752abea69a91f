// Retention window shared by metric history and alert history
use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPolicy {
    pub window: TimeDelta,
}

impl RetentionPolicy {
    pub fn new(window: TimeDelta) -> Self {
        Self { window }
    }

    pub fn days(days: i64) -> Self {
        Self::new(TimeDelta::days(days))
    }

    /// True once `time` is strictly more than the window behind `now`.
    pub fn is_expired(&self, time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - time > self.window
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::days(30)
    }
}
