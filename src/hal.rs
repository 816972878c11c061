//! # Hardware Abstraction
//!
//! Narrow capability traits the control loop consumes. The core never touches
//! a device directly; concrete backends live in [`crate::devices`] and tests
//! substitute mocks.
//!
//! All calls are synchronous and expected to return promptly. None of them
//! report errors: a backend that fails logs and carries on.

use serde::Deserialize;

/// A hardware channel identifier.
///
/// What the number means is backend-specific: an evdev axis/key code for the
/// joystick backend, a servo channel for the Maestro backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Pin(pub u16);

/// Two-valued digital line level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Numeric form used in debug output (0 or 1).
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

/// Pull resistor applied to a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pull {
    Up,
    Down,
    Floating,
}

/// Analog input channel (raw samples on a 0-1023 scale).
#[cfg_attr(test, mockall::automock)]
pub trait AnalogInput {
    /// Read one raw sample. Must not block.
    fn read(&mut self, pin: Pin) -> i32;
}

/// Digital input channel.
#[cfg_attr(test, mockall::automock)]
pub trait DigitalInput {
    /// Apply a pull resistor. Called once during initialization.
    fn set_pull(&mut self, pin: Pin, pull: Pull);

    /// Read the current line level. Must not block.
    fn read(&mut self, pin: Pin) -> Level;
}

/// Servo output channel.
#[cfg_attr(test, mockall::automock)]
pub trait ServoOutput {
    /// Command a servo to an angle in degrees (expected 0-180).
    fn write(&mut self, pin: Pin, angle: i32);
}

/// Best-effort debug output.
#[cfg_attr(test, mockall::automock)]
pub trait DebugSink {
    fn write_line(&mut self, text: &str);

    fn write_value(&mut self, label: &str, value: i32);
}

impl<T: DebugSink + ?Sized> DebugSink for Box<T> {
    fn write_line(&mut self, text: &str) {
        (**self).write_line(text);
    }

    fn write_value(&mut self, label: &str, value: i32) {
        (**self).write_value(label, value);
    }
}

/// Pin assignment passed to initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pins {
    pub joystick_x: Pin,
    pub joystick_y: Pin,
    pub button: Pin,
    pub servo_x: Pin,
    pub servo_y: Pin,
}
