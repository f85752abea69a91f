// Activity-conditioned safe ranges and severity tiers
use super::activity::ActivityLabel;
use serde::Serialize;

/// Grace band beyond a safe range before a reading is dangerous.
/// Shared by every vital regardless of unit.
pub const DANGER_MARGIN: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Safe,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafeRange {
    pub min: f64,
    pub max: f64,
}

impl SafeRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Strict comparisons: a value exactly on an edge stays in the milder tier.
    pub fn classify(&self, value: f64) -> SeverityTier {
        if value < self.min - DANGER_MARGIN || value > self.max + DANGER_MARGIN {
            SeverityTier::Danger
        } else if value < self.min || value > self.max {
            SeverityTier::Warning
        } else {
            SeverityTier::Safe
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafeRanges {
    pub hr: SafeRange,
    pub breathing: SafeRange,
    pub temperature: SafeRange,
}

impl SafeRanges {
    const fn new(hr: (f64, f64), breathing: (f64, f64), temperature: (f64, f64)) -> Self {
        Self {
            hr: SafeRange::new(hr.0, hr.1),
            breathing: SafeRange::new(breathing.0, breathing.1),
            temperature: SafeRange::new(temperature.0, temperature.1),
        }
    }

    /// Ranges for the confirmed activity. Activities without their own
    /// table entry use the resting ranges. Temperature is in °F.
    pub fn for_activity(activity: ActivityLabel) -> Self {
        match activity {
            ActivityLabel::Sleeping => SLEEPING,
            ActivityLabel::Napping => NAPPING,
            ActivityLabel::Walking => WALKING,
            ActivityLabel::Exercising => EXERCISING,
            ActivityLabel::Running => RUNNING,
            ActivityLabel::Showering => SHOWERING,
            ActivityLabel::Eating => EATING,
            ActivityLabel::Driving => DRIVING,
            ActivityLabel::Resting | ActivityLabel::Unknown => RESTING,
        }
    }
}

const RESTING: SafeRanges = SafeRanges::new((60.0, 100.0), (12.0, 20.0), (97.0, 99.5));
const SLEEPING: SafeRanges = SafeRanges::new((40.0, 70.0), (8.0, 16.0), (96.5, 99.0));
const NAPPING: SafeRanges = SafeRanges::new((45.0, 75.0), (10.0, 16.0), (96.5, 99.0));
const WALKING: SafeRanges = SafeRanges::new((70.0, 120.0), (14.0, 24.0), (97.0, 100.0));
const EXERCISING: SafeRanges = SafeRanges::new((90.0, 160.0), (18.0, 35.0), (98.0, 101.5));
const RUNNING: SafeRanges = SafeRanges::new((120.0, 180.0), (25.0, 45.0), (98.5, 102.0));
const SHOWERING: SafeRanges = SafeRanges::new((60.0, 110.0), (12.0, 22.0), (97.0, 100.5));
const EATING: SafeRanges = SafeRanges::new((60.0, 105.0), (12.0, 20.0), (97.0, 99.5));
const DRIVING: SafeRanges = SafeRanges::new((60.0, 100.0), (12.0, 20.0), (97.0, 99.5));
