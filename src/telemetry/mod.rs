//! # Telemetry Module
//!
//! Debug emission gated by a single run-time flag.
//!
//! When enabled:
//! - Raw readings are emitted every tick
//! - One line per axis is emitted whenever a servo is written
//! - Button presses and initialization emit one line each
//!
//! Turning the flag on or off always emits a confirmation line, in both
//! directions.

pub mod sinks;

use crate::control::axis::Axis;
use crate::control::context::Readings;
use crate::hal::{DebugSink, Level};

/// Label for the raw X reading.
pub const LABEL_JOY_X: &str = "joyX";
/// Label for the raw Y reading.
pub const LABEL_JOY_Y: &str = "joyY";
/// Label for the raw button level.
pub const LABEL_BUTTON: &str = "btn";

/// Flag-gated front end for a [`DebugSink`].
#[derive(Debug)]
pub struct Telemetry<K> {
    sink: K,
    enabled: bool,
}

impl<K: DebugSink> Telemetry<K> {
    #[must_use]
    pub fn new(sink: K, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the flag and confirms the change on the sink.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.enabled = true;
            self.sink.write_line("debug on");
        } else {
            self.sink.write_line("debug off");
            self.enabled = false;
        }
    }

    /// Emits the three raw inputs of a tick.
    pub fn raw_readings(&mut self, readings: &Readings, button_level: Level) {
        if !self.enabled {
            return;
        }
        self.sink.write_value(LABEL_JOY_X, readings.x);
        self.sink.write_value(LABEL_JOY_Y, readings.y);
        self.sink.write_value(LABEL_BUTTON, button_level.as_i32());
    }

    /// Emits one servo write.
    pub fn actuation(&mut self, axis: Axis, angle: i32) {
        if !self.enabled {
            return;
        }
        let label = match axis {
            Axis::X => "servoX",
            Axis::Y => "servoY",
        };
        self.sink.write_value(label, angle);
    }

    pub fn button_pressed(&mut self) {
        if self.enabled {
            self.sink.write_line("button pressed");
        }
    }

    pub fn initialized(&mut self, angle_init: i32) {
        if self.enabled {
            self.sink.write_line("servo joystick initialized");
            self.sink.write_value("init", angle_init);
        }
    }

    pub fn into_sink(self) -> K {
        self.sink
    }
}
