//! # Axis State
//!
//! Current and last-commanded angle for the X and Y servos.

use std::fmt;

/// One of the two independent control dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Both axes, in actuation order.
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("X"),
            Axis::Y => f.write_str("Y"),
        }
    }
}

/// Commanded position of one servo.
///
/// `last_commanded` tracks what was physically written and is only used to
/// suppress redundant writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisState {
    pub current: i32,
    pub last_commanded: i32,
}

impl AxisState {
    #[must_use]
    pub fn new(angle: i32) -> Self {
        Self {
            current: angle,
            last_commanded: angle,
        }
    }

    /// Whether the next actuation pass will write this axis.
    #[must_use]
    pub fn needs_write(&self) -> bool {
        self.current != self.last_commanded
    }

    /// Records `current` as written.
    pub fn commit(&mut self) {
        self.last_commanded = self.current;
    }
}

/// Both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axes {
    pub x: AxisState,
    pub y: AxisState,
}

impl Axes {
    /// Both axes at `angle`, already committed.
    #[must_use]
    pub fn centered(angle: i32) -> Self {
        Self {
            x: AxisState::new(angle),
            y: AxisState::new(angle),
        }
    }

    #[must_use]
    pub fn get(&self, axis: Axis) -> &AxisState {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    pub fn get_mut(&mut self, axis: Axis) -> &mut AxisState {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    /// Sets both current angles without touching what was last written.
    pub fn set_current(&mut self, x: i32, y: i32) {
        self.x.current = x;
        self.y.current = y;
    }

    /// Current angles as an `(x, y)` pair.
    #[must_use]
    pub fn current(&self) -> (i32, i32) {
        (self.x.current, self.y.current)
    }
}
