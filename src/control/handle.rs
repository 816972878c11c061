//! # Control Handle
//!
//! Lets other tasks reach a running [`ServoController`](super::controller::ServoController).
//!
//! The controller task is the only writer of its state. A handle queues
//! commands that the loop applies at the start of its next tick, and reads the
//! current angles from a `watch` channel the loop publishes to.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn demo(handle: joystick_servo::control::handle::ControlHandle) -> joystick_servo::error::Result<()> {
//! use joystick_servo::control::axis::Axis;
//!
//! handle.set_debug(true)?;
//! handle.set_angles(170, 10)?;
//! handle.reset_to_initial()?;
//! println!("X is at {}", handle.angle(Axis::X));
//! # Ok(())
//! # }
//! ```

use std::fmt;

use tokio::sync::{mpsc, watch};

use super::axis::Axis;
use super::context::ControlContext;
use crate::error::{JoystickServoError, Result};
use crate::hal::Pins;

/// A change to the control context, run on the control task.
pub type ContextUpdate = Box<dyn FnOnce(&mut ControlContext) + Send + 'static>;

/// A request applied by the control loop at the start of a tick.
pub enum Command {
    /// Reconfigure; servos follow on the next actuation pass.
    Update(ContextUpdate),
    /// Change target angles, then actuate immediately.
    Move(ContextUpdate),
    SetDebug(bool),
    Reinitialize(Pins),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Update(_) => f.write_str("Update(..)"),
            Command::Move(_) => f.write_str("Move(..)"),
            Command::SetDebug(enabled) => f.debug_tuple("SetDebug").field(enabled).finish(),
            Command::Reinitialize(pins) => f.debug_tuple("Reinitialize").field(pins).finish(),
        }
    }
}

/// Cloneable handle to a controller.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::UnboundedSender<Command>,
    angles: watch::Receiver<(i32, i32)>,
}

impl ControlHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        angles: watch::Receiver<(i32, i32)>,
    ) -> Self {
        Self { commands, angles }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| JoystickServoError::ControllerStopped)
    }

    fn update<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut ControlContext) + Send + 'static,
    {
        self.send(Command::Update(Box::new(update)))
    }

    fn move_to<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut ControlContext) + Send + 'static,
    {
        self.send(Command::Move(Box::new(update)))
    }

    pub fn set_limits(&self, min: i32, max: i32, init: i32, step: i32) -> Result<()> {
        self.update(move |ctx| ctx.set_limits(min, max, init, step))
    }

    pub fn set_thresholds(
        &self,
        x_low_band: i32,
        x_high_band: i32,
        x_min: i32,
        y_low_band: i32,
        y_high_band: i32,
        y_min: i32,
    ) -> Result<()> {
        self.update(move |ctx| {
            ctx.set_thresholds(x_low_band, x_high_band, x_min, y_low_band, y_high_band, y_min)
        })
    }

    pub fn set_debug(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetDebug(enabled))
    }

    /// Registers the button handler. It will run on the control task.
    pub fn on_button_pressed<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(&mut ControlContext) + Send + 'static,
    {
        self.update(move |ctx| ctx.on_button_pressed(Box::new(handler)))
    }

    /// Registers the angle-change handler. It will run on the control task.
    pub fn on_angle_changed<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(i32, i32) + Send + 'static,
    {
        self.update(move |ctx| ctx.on_angle_changed(Box::new(handler)))
    }

    pub fn set_angles(&self, x: i32, y: i32) -> Result<()> {
        self.move_to(move |ctx| ctx.set_angles(x, y))
    }

    pub fn reset_to_initial(&self) -> Result<()> {
        self.move_to(ControlContext::reset_to_initial)
    }

    /// Re-runs initialization on the control task.
    pub fn reinitialize(&self, pins: Pins) -> Result<()> {
        self.send(Command::Reinitialize(pins))
    }

    /// Last angle published by the control loop.
    #[must_use]
    pub fn angle(&self, axis: Axis) -> i32 {
        let (x, y) = *self.angles.borrow();
        match axis {
            Axis::X => x,
            Axis::Y => y,
        }
    }

    /// Waits until the published angles change.
    pub async fn changed(&mut self) -> Result<(i32, i32)> {
        self.angles
            .changed()
            .await
            .map_err(|_| JoystickServoError::ControllerStopped)?;
        Ok(*self.angles.borrow_and_update())
    }
}
