// Activity classification and stabilization
use super::sample::SensorSample;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLabel {
    Sleeping,
    Resting,
    Walking,
    Exercising,
    Running,
    Showering,
    Eating,
    Driving,
    Napping,
    Unknown,
}

impl ActivityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Sleeping => "sleeping",
            ActivityLabel::Resting => "resting",
            ActivityLabel::Walking => "walking",
            ActivityLabel::Exercising => "exercising",
            ActivityLabel::Running => "running",
            ActivityLabel::Showering => "showering",
            ActivityLabel::Eating => "eating",
            ActivityLabel::Driving => "driving",
            ActivityLabel::Napping => "napping",
            ActivityLabel::Unknown => "unknown",
        }
    }

    /// Minimum time this activity holds before a confirmed change away from
    /// it is accepted. `Unknown` is always replaceable.
    pub fn min_duration(&self) -> TimeDelta {
        match self {
            ActivityLabel::Unknown => TimeDelta::zero(),
            ActivityLabel::Sleeping => TimeDelta::minutes(30),
            ActivityLabel::Napping => TimeDelta::minutes(10),
            ActivityLabel::Eating => TimeDelta::minutes(10),
            ActivityLabel::Driving => TimeDelta::minutes(10),
            ActivityLabel::Exercising => TimeDelta::minutes(3),
            ActivityLabel::Running => TimeDelta::minutes(2),
            ActivityLabel::Walking => TimeDelta::minutes(1),
            _ => DEFAULT_MIN_DURATION,
        }
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_MIN_DURATION: TimeDelta = TimeDelta::minutes(5);

// Movement bands, m/s² above gravity
const MOVEMENT_HIGH: f64 = 3.0;
const MOVEMENT_MODERATE: f64 = 1.5;
const MOVEMENT_LOW: f64 = 0.5;
const MOVEMENT_MINIMAL: f64 = 0.2;

/// Inputs every classification rule reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub movement: f64,
    pub hr: f64,
    pub breathing: f64,
}

impl Features {
    /// Missing vitals read as zero so they never satisfy a threshold.
    pub fn from_sample(sample: &SensorSample) -> Self {
        Self {
            movement: sample.movement(),
            hr: sample.hr.unwrap_or(0.0),
            breathing: sample.breathing.unwrap_or(0.0),
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&Features) -> bool,
    pub label: ActivityLabel,
}

/// Evaluated top to bottom; the first matching rule wins.
pub const RULES: &[Rule] = &[
    Rule {
        name: "high movement, very high heart rate",
        matches: |f| f.movement > MOVEMENT_HIGH && f.hr > 110.0,
        label: ActivityLabel::Running,
    },
    Rule {
        name: "high movement, elevated heart rate",
        matches: |f| f.movement > MOVEMENT_HIGH && f.hr > 90.0,
        label: ActivityLabel::Exercising,
    },
    Rule {
        name: "high movement",
        matches: |f| f.movement > MOVEMENT_HIGH,
        label: ActivityLabel::Walking,
    },
    Rule {
        name: "moderate movement with exertion",
        matches: |f| f.movement > MOVEMENT_MODERATE && f.hr > 75.0 && f.breathing > 18.0,
        label: ActivityLabel::Exercising,
    },
    Rule {
        name: "low movement",
        matches: |f| f.movement > MOVEMENT_LOW,
        label: ActivityLabel::Walking,
    },
    Rule {
        name: "very high heart rate at rest",
        matches: |f| f.hr > 110.0,
        label: ActivityLabel::Exercising,
    },
    Rule {
        name: "exertion with minimal movement",
        matches: |f| f.hr > 85.0 && f.breathing > 18.0 && f.movement > MOVEMENT_MINIMAL,
        label: ActivityLabel::Exercising,
    },
    Rule {
        name: "exertion while still",
        matches: |f| f.hr > 85.0 && f.breathing > 18.0,
        label: ActivityLabel::Showering,
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityClassifier;

impl ActivityClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Candidate label for one sample. Never returns `Unknown`.
    pub fn classify(&self, sample: &SensorSample) -> ActivityLabel {
        let features = Features::from_sample(sample);
        match RULES.iter().find(|rule| (rule.matches)(&features)) {
            Some(rule) => {
                tracing::trace!("Rule '{}' matched {:?}", rule.name, features);
                rule.label
            }
            None => ActivityLabel::Resting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivityState {
    pub confirmed: ActivityLabel,
    pub pending_candidate: ActivityLabel,
    pub confirmation_count: u32,
    pub last_change_time: DateTime<Utc>,
}

/// Debounces the per-tick candidate stream. A change needs
/// `required_confirmations` differing candidates AND the current activity's
/// minimum dwell time to have passed.
#[derive(Debug, Clone)]
pub struct ActivityStabilizer {
    state: ActivityState,
    required_confirmations: u32,
}

impl ActivityStabilizer {
    pub fn new(required_confirmations: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            state: ActivityState {
                confirmed: ActivityLabel::Unknown,
                pending_candidate: ActivityLabel::Unknown,
                confirmation_count: 0,
                last_change_time: started_at,
            },
            required_confirmations,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn confirmed(&self) -> ActivityLabel {
        self.state.confirmed
    }

    /// Feed one candidate and return the confirmed activity afterwards.
    pub fn observe(&mut self, candidate: ActivityLabel, now: DateTime<Utc>) -> ActivityLabel {
        let state = &mut self.state;
        state.pending_candidate = candidate;

        if candidate == state.confirmed {
            state.confirmation_count = 0;
            return state.confirmed;
        }

        state.confirmation_count += 1;
        if state.confirmation_count < self.required_confirmations {
            return state.confirmed;
        }

        let elapsed = now - state.last_change_time;
        if elapsed < state.confirmed.min_duration() {
            tracing::debug!(
                "Holding {} against {}: dwell {}s not reached",
                state.confirmed,
                candidate,
                elapsed.num_seconds()
            );
            state.confirmation_count = 0;
            return state.confirmed;
        }

        tracing::info!("Activity changed: {} -> {}", state.confirmed, candidate);
        state.confirmed = candidate;
        state.last_change_time = now;
        state.confirmation_count = 0;
        state.confirmed
    }
}
