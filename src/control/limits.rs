//! # Servo Limits and Joystick Thresholds
//!
//! The configuration model read by every tick.
//!
//! ## Direction Detection
//!
//! Each axis has an increase band and a decrease threshold on the raw reading:
//!
//! | Reading | Outcome |
//! |---------|---------|
//! | `low_band < r <= high_band` | Step up, clamped at `angle_max` |
//! | `r < min_threshold` | Step down, clamped at `angle_min` |
//! | anything else | Hold |
//!
//! The gaps (`min_threshold..=low_band` and above `high_band`) are dead zones.
//!
//! ## Validation
//!
//! Nothing here validates. `angle_min <= angle_init <= angle_max`, `step > 0`
//! and `low_band < high_band` are caller obligations; contradictory values
//! produce whatever the arithmetic produces. Strict checks only run when a
//! configuration file is loaded (see [`crate::config::Config::validate`]).

use serde::Deserialize;

/// Default lower servo bound in degrees.
pub const DEFAULT_ANGLE_MIN: i32 = 0;
/// Default upper servo bound in degrees.
pub const DEFAULT_ANGLE_MAX: i32 = 180;
/// Default center position in degrees.
pub const DEFAULT_ANGLE_INIT: i32 = 90;
/// Default per-tick step in degrees.
pub const DEFAULT_STEP: i32 = 5;

/// Default lower edge (exclusive) of the increase band.
pub const DEFAULT_LOW_BAND: i32 = 760;
/// Default upper edge (inclusive) of the increase band.
pub const DEFAULT_HIGH_BAND: i32 = 780;
/// Default decrease trigger.
pub const DEFAULT_MIN_THRESHOLD: i32 = 250;

/// Servo angle bounds and step size, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ServoLimits {
    #[serde(default = "default_angle_min")]
    pub angle_min: i32,

    #[serde(default = "default_angle_max")]
    pub angle_max: i32,

    #[serde(default = "default_angle_init")]
    pub angle_init: i32,

    #[serde(default = "default_step")]
    pub step: i32,
}

fn default_angle_min() -> i32 { DEFAULT_ANGLE_MIN }
fn default_angle_max() -> i32 { DEFAULT_ANGLE_MAX }
fn default_angle_init() -> i32 { DEFAULT_ANGLE_INIT }
fn default_step() -> i32 { DEFAULT_STEP }

impl Default for ServoLimits {
    fn default() -> Self {
        Self {
            angle_min: DEFAULT_ANGLE_MIN,
            angle_max: DEFAULT_ANGLE_MAX,
            angle_init: DEFAULT_ANGLE_INIT,
            step: DEFAULT_STEP,
        }
    }
}

impl ServoLimits {
    #[must_use]
    pub fn new(angle_min: i32, angle_max: i32, angle_init: i32, step: i32) -> Self {
        Self {
            angle_min,
            angle_max,
            angle_init,
            step,
        }
    }

    /// Applies one step in the given direction, clamping at the bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use joystick_servo::control::limits::{Direction, ServoLimits};
    ///
    /// let limits = ServoLimits::new(0, 180, 90, 15);
    /// assert_eq!(limits.step_angle(90, Direction::Increase), 105);
    /// assert_eq!(limits.step_angle(175, Direction::Increase), 180);
    /// assert_eq!(limits.step_angle(10, Direction::Decrease), 0);
    /// assert_eq!(limits.step_angle(42, Direction::Hold), 42);
    /// ```
    #[must_use]
    pub fn step_angle(&self, angle: i32, direction: Direction) -> i32 {
        match direction {
            Direction::Increase => angle.saturating_add(self.step).min(self.angle_max),
            Direction::Decrease => angle.saturating_sub(self.step).max(self.angle_min),
            Direction::Hold => angle,
        }
    }
}

/// Threshold bands for one joystick axis, on the raw 0-1023 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AxisThresholds {
    /// Exclusive lower edge of the increase band.
    #[serde(default = "default_low_band")]
    pub low_band: i32,

    /// Inclusive upper edge of the increase band.
    #[serde(default = "default_high_band")]
    pub high_band: i32,

    /// Readings strictly below this decrease the angle.
    #[serde(default = "default_min_threshold")]
    pub min_threshold: i32,
}

fn default_low_band() -> i32 { DEFAULT_LOW_BAND }
fn default_high_band() -> i32 { DEFAULT_HIGH_BAND }
fn default_min_threshold() -> i32 { DEFAULT_MIN_THRESHOLD }

impl Default for AxisThresholds {
    fn default() -> Self {
        Self {
            low_band: DEFAULT_LOW_BAND,
            high_band: DEFAULT_HIGH_BAND,
            min_threshold: DEFAULT_MIN_THRESHOLD,
        }
    }
}

impl AxisThresholds {
    #[must_use]
    pub fn new(low_band: i32, high_band: i32, min_threshold: i32) -> Self {
        Self {
            low_band,
            high_band,
            min_threshold,
        }
    }

    /// Classifies a raw reading.
    ///
    /// The increase band is checked first, so with overlapping (misconfigured)
    /// thresholds a reading in both ranges steps up.
    ///
    /// # Examples
    ///
    /// ```
    /// use joystick_servo::control::limits::{AxisThresholds, Direction};
    ///
    /// let t = AxisThresholds::new(760, 780, 250);
    /// assert_eq!(t.classify(770), Direction::Increase);
    /// assert_eq!(t.classify(780), Direction::Increase);
    /// assert_eq!(t.classify(760), Direction::Hold);
    /// assert_eq!(t.classify(1023), Direction::Hold);
    /// assert_eq!(t.classify(200), Direction::Decrease);
    /// ```
    #[must_use]
    pub fn classify(&self, reading: i32) -> Direction {
        if reading > self.low_band && reading <= self.high_band {
            Direction::Increase
        } else if reading < self.min_threshold {
            Direction::Decrease
        } else {
            Direction::Hold
        }
    }
}

/// Threshold bands for both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub x: AxisThresholds,

    #[serde(default)]
    pub y: AxisThresholds,
}

/// Outcome of threshold evaluation for one axis on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
    Hold,
}
