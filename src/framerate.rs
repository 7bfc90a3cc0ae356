//! Capture cadence

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Time unit a frame rate is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateUnit {
    #[default]
    Second,
    Minute,
    Hour,
}

impl RateUnit {
    /// Get the next unit in the cycle
    pub fn next(self) -> Self {
        match self {
            RateUnit::Second => RateUnit::Minute,
            RateUnit::Minute => RateUnit::Hour,
            RateUnit::Hour => RateUnit::Second,
        }
    }

    pub fn length(self) -> Duration {
        match self {
            RateUnit::Second => Duration::from_secs(1),
            RateUnit::Minute => Duration::from_secs(60),
            RateUnit::Hour => Duration::from_secs(60 * 60),
        }
    }

    fn name(self) -> &'static str {
        match self {
            RateUnit::Second => "second",
            RateUnit::Minute => "minute",
            RateUnit::Hour => "hour",
        }
    }
}

/// Frames captured per [`RateUnit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub value: i32,
    pub unit: RateUnit,
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::per_second(5)
    }
}

impl FrameRate {
    pub fn new(value: i32, unit: RateUnit) -> Self {
        Self { value, unit }
    }

    pub fn per_second(value: i32) -> Self {
        Self::new(value, RateUnit::Second)
    }

    /// Wait between two captures; zero or negative rates are treated as one
    pub fn duration(&self) -> Duration {
        let frames = self.value.max(1) as u32;
        self.unit.length() / frames
    }

    pub fn increment_by(&mut self, step: i32) {
        self.value = self.value.saturating_add(step);
    }

    pub fn decrement_by(&mut self, step: i32) {
        self.value = self.value.saturating_sub(step);
    }

    pub fn clamp(&mut self, min: i32, max: i32) {
        self.value = self.value.clamp(min, max);
    }

    pub fn next_unit(&mut self) {
        self.unit = self.unit.next();
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} frames per {}", self.value, self.unit.name())
    }
}
