//! # Configuration Module
//!
//! Loads and validates the TOML configuration for the joystick-servo binary.
//!
//! Every section and every field is optional; a missing value takes the
//! default listed below. An empty file is a valid configuration.
//!
//! | Section | Fields |
//! |---------|--------|
//! | `[pins]` | `joystick_x`, `joystick_y`, `button`, `servo_x`, `servo_y` |
//! | `[limits]` | `angle_min`, `angle_max`, `angle_init`, `step` |
//! | `[thresholds.x]`, `[thresholds.y]` | `low_band`, `high_band`, `min_threshold` |
//! | `[timing]` | `action_gate_ms`, `idle_delay_ms`, `settle_delay_ms` |
//! | `[button]` | `pressed_level`, `pull` |
//! | `[debug]` | `enabled`, `sink`, `jsonl_dir`, `jsonl_file` |
//! | `[events]` | `angle_change` |
//! | `[joystick]` | `device_path` |
//! | `[servo]` | `port`, `baud_rate`, `pulse_min_us`, `pulse_max_us` |
//!
//! The control core accepts any values handed to it at runtime. Range checks
//! happen here, once, when a file is loaded.

use serde::de::Error;
use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::control::events::AngleChangePolicy;
use crate::control::limits::{AxisThresholds, ServoLimits, Thresholds};
use crate::control::{ButtonConfig, Timing};
use crate::devices::maestro::{
    PulseRange, DEFAULT_BAUD_RATE, DEFAULT_PULSE_MAX_US, DEFAULT_PULSE_MIN_US, MAX_CHANNEL,
};
use crate::error::{JoystickServoError, Result};
use crate::hal::{Level, Pin, Pins, Pull};

/// Narrowest pulse width the Maestro accepts, in microseconds.
const PULSE_FLOOR_US: u16 = 250;

/// Widest pulse width the Maestro accepts, in microseconds.
const PULSE_CEILING_US: u16 = 2750;

/// Highest evdev absolute axis code (`ABS_MAX`).
const MAX_AXIS_CODE: u16 = 0x3F;

/// Highest evdev key code (`KEY_MAX`).
const MAX_KEY_CODE: u16 = 0x2FF;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub pins: PinConfig,

    #[serde(default)]
    pub limits: ServoLimits,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub button: ButtonSection,

    #[serde(default)]
    pub debug: DebugConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub joystick: JoystickConfig,

    #[serde(default)]
    pub servo: ServoConfig,
}

/// Pin assignment.
///
/// Joystick pins are evdev codes (`ABS_X` = 0, `ABS_Y` = 1, `BTN_SOUTH` = 304);
/// servo pins are Maestro channels.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    #[serde(default = "default_joystick_x")]
    pub joystick_x: u16,

    #[serde(default = "default_joystick_y")]
    pub joystick_y: u16,

    #[serde(default = "default_button")]
    pub button: u16,

    #[serde(default = "default_servo_x")]
    pub servo_x: u16,

    #[serde(default = "default_servo_y")]
    pub servo_y: u16,
}

/// Loop timing, in milliseconds.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    #[serde(default = "default_action_gate_ms")]
    pub action_gate_ms: u64,

    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// Button polarity.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ButtonSection {
    #[serde(default = "default_pressed_level")]
    pub pressed_level: Level,

    #[serde(default = "default_pull")]
    pub pull: Pull,
}

/// Where debug output goes.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebugSinkKind {
    /// Structured log events through `tracing`.
    #[default]
    Log,
    /// One JSON object per line in a file.
    Jsonl,
}

/// Debug output configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub sink: DebugSinkKind,

    #[serde(default = "default_jsonl_dir")]
    pub jsonl_dir: String,

    #[serde(default = "default_jsonl_file")]
    pub jsonl_file: String,
}

/// Event dispatch configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventsConfig {
    #[serde(default)]
    pub angle_change: AngleChangePolicy,
}

/// Joystick device configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct JoystickConfig {
    /// Empty means auto-detect.
    #[serde(default)]
    pub device_path: String,
}

/// Servo controller configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServoConfig {
    /// Empty means try the default ports.
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_pulse_min_us")]
    pub pulse_min_us: u16,

    #[serde(default = "default_pulse_max_us")]
    pub pulse_max_us: u16,
}

// Default value functions
fn default_joystick_x() -> u16 { 0 }
fn default_joystick_y() -> u16 { 1 }
fn default_button() -> u16 { 304 }
fn default_servo_x() -> u16 { 0 }
fn default_servo_y() -> u16 { 1 }

fn default_action_gate_ms() -> u64 { 100 }
fn default_idle_delay_ms() -> u64 { 20 }
fn default_settle_delay_ms() -> u64 { 500 }

fn default_pressed_level() -> Level { Level::Low }
fn default_pull() -> Pull { Pull::Up }

fn default_jsonl_dir() -> String { "./logs".to_string() }
fn default_jsonl_file() -> String { "debug.jsonl".to_string() }

fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }
fn default_pulse_min_us() -> u16 { DEFAULT_PULSE_MIN_US }
fn default_pulse_max_us() -> u16 { DEFAULT_PULSE_MAX_US }

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            joystick_x: default_joystick_x(),
            joystick_y: default_joystick_y(),
            button: default_button(),
            servo_x: default_servo_x(),
            servo_y: default_servo_y(),
        }
    }
}

impl PinConfig {
    #[must_use]
    pub fn to_pins(&self) -> Pins {
        Pins {
            joystick_x: Pin(self.joystick_x),
            joystick_y: Pin(self.joystick_y),
            button: Pin(self.button),
            servo_x: Pin(self.servo_x),
            servo_y: Pin(self.servo_y),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            action_gate_ms: default_action_gate_ms(),
            idle_delay_ms: default_idle_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn to_timing(&self) -> Timing {
        Timing {
            action_gate: Duration::from_millis(self.action_gate_ms),
            idle_delay: Duration::from_millis(self.idle_delay_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

impl Default for ButtonSection {
    fn default() -> Self {
        Self {
            pressed_level: default_pressed_level(),
            pull: default_pull(),
        }
    }
}

impl ButtonSection {
    #[must_use]
    pub fn to_button_config(&self) -> ButtonConfig {
        ButtonConfig {
            pressed_level: self.pressed_level,
            pull: self.pull,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sink: DebugSinkKind::default(),
            jsonl_dir: default_jsonl_dir(),
            jsonl_file: default_jsonl_file(),
        }
    }
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            pulse_min_us: default_pulse_min_us(),
            pulse_max_us: default_pulse_max_us(),
        }
    }
}

impl ServoConfig {
    #[must_use]
    pub fn pulse_range(&self) -> PulseRange {
        PulseRange {
            min_us: self.pulse_min_us,
            max_us: self.pulse_max_us,
        }
    }
}

fn invalid(message: impl Display) -> JoystickServoError {
    JoystickServoError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joystick_servo::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate pin assignment
        let pins = &self.pins;
        for (name, code) in [("joystick_x", pins.joystick_x), ("joystick_y", pins.joystick_y)] {
            if code > MAX_AXIS_CODE {
                return Err(invalid(format!("{} must be an axis code between 0 and {}", name, MAX_AXIS_CODE)));
            }
        }

        if pins.button > MAX_KEY_CODE {
            return Err(invalid(format!("button must be a key code between 0 and {}", MAX_KEY_CODE)));
        }

        for (name, channel) in [("servo_x", pins.servo_x), ("servo_y", pins.servo_y)] {
            if channel > MAX_CHANNEL {
                return Err(invalid(format!("{} must be a channel between 0 and {}", name, MAX_CHANNEL)));
            }
        }

        let limits = &self.limits;

        if limits.angle_min < 0 || limits.angle_max > 180 {
            return Err(invalid("angle_min and angle_max must be within 0 and 180"));
        }

        if limits.angle_min > limits.angle_max {
            return Err(invalid("angle_min must not exceed angle_max"));
        }

        if limits.angle_init < limits.angle_min || limits.angle_init > limits.angle_max {
            return Err(invalid("angle_init must be within angle_min and angle_max"));
        }

        if limits.step <= 0 {
            return Err(invalid("step must be greater than 0"));
        }

        for (name, axis) in [("x", &self.thresholds.x), ("y", &self.thresholds.y)] {
            validate_axis_thresholds(name, axis)?;
        }

        // Validate timing fields
        if self.timing.action_gate_ms > 60000 {
            return Err(invalid("action_gate_ms must be at most 60000"));
        }

        if self.timing.idle_delay_ms == 0 || self.timing.idle_delay_ms > 10000 {
            return Err(invalid("idle_delay_ms must be between 1 and 10000"));
        }

        if self.timing.settle_delay_ms > 10000 {
            return Err(invalid("settle_delay_ms must be at most 10000"));
        }

        // Validate pulse range
        let servo = &self.servo;
        if servo.pulse_min_us < PULSE_FLOOR_US || servo.pulse_max_us > PULSE_CEILING_US {
            return Err(invalid(format!(
                "pulse widths must be between {} and {} us",
                PULSE_FLOOR_US, PULSE_CEILING_US
            )));
        }

        if servo.pulse_min_us >= servo.pulse_max_us {
            return Err(invalid("pulse_min_us must be less than pulse_max_us"));
        }

        if servo.baud_rate == 0 {
            return Err(invalid("baud_rate must be greater than 0"));
        }

        // Validate debug output
        if self.debug.sink == DebugSinkKind::Jsonl {
            if self.debug.jsonl_dir.is_empty() {
                return Err(invalid("debug jsonl_dir cannot be empty for the jsonl sink"));
            }

            if self.debug.jsonl_file.is_empty() {
                return Err(invalid("debug jsonl_file cannot be empty for the jsonl sink"));
            }
        }

        Ok(())
    }
}

fn validate_axis_thresholds(name: &str, axis: &AxisThresholds) -> Result<()> {
    if !(0..=1023).contains(&axis.low_band)
        || !(0..=1023).contains(&axis.high_band)
        || !(0..=1023).contains(&axis.min_threshold)
    {
        return Err(invalid(format!("{} thresholds must be within 0 and 1023", name)));
    }

    if axis.low_band >= axis.high_band {
        return Err(invalid(format!("{} low_band must be less than high_band", name)));
    }

    if axis.min_threshold > axis.low_band {
        return Err(invalid(format!("{} min_threshold must not exceed low_band", name)));
    }

    Ok(())
}
