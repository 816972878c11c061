//! # Control Context
//!
//! All state the control loop owns: limits, thresholds, axis positions, the
//! action timestamp and the handler slots. Exactly one task holds the context
//! and everything else reaches it through that task.

use tokio::time::Instant;
use tracing::{debug, trace};

use super::axis::{Axes, Axis};
use super::events::{AngleChangeHandler, AngleChangePolicy, ButtonHandler, EventHandlers};
use super::limits::{AxisThresholds, ServoLimits, Thresholds};

/// Raw readings sampled at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readings {
    pub x: i32,
    pub y: i32,
    pub button_pressed: bool,
}

/// Configuration, axis state and handlers for one joystick and two servos.
#[derive(Debug)]
pub struct ControlContext {
    limits: ServoLimits,
    thresholds: Thresholds,
    pub(crate) axes: Axes,
    pub(crate) last_action: Instant,
    pub(crate) handlers: EventHandlers,
    pub(crate) angle_change_policy: AngleChangePolicy,
}

impl ControlContext {
    /// Creates a context with both axes committed at `limits.angle_init`.
    #[must_use]
    pub fn new(limits: ServoLimits, thresholds: Thresholds) -> Self {
        Self {
            limits,
            thresholds,
            axes: Axes::centered(limits.angle_init),
            last_action: Instant::now(),
            handlers: EventHandlers::default(),
            angle_change_policy: AngleChangePolicy::default(),
        }
    }

    #[must_use]
    pub fn limits(&self) -> &ServoLimits {
        &self.limits
    }

    #[must_use]
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    #[must_use]
    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    #[must_use]
    pub fn angle_change_policy(&self) -> AngleChangePolicy {
        self.angle_change_policy
    }

    pub fn set_angle_change_policy(&mut self, policy: AngleChangePolicy) {
        self.angle_change_policy = policy;
    }

    /// Overwrites all four limit fields and re-centers both axes to `init`.
    ///
    /// The servos follow on the next actuation pass. No validation: `min > max`
    /// or an `init` outside the bounds is a caller error.
    pub fn set_limits(&mut self, min: i32, max: i32, init: i32, step: i32) {
        self.limits = ServoLimits::new(min, max, init, step);
        self.axes.set_current(init, init);
        debug!("Limits set: min={} max={} init={} step={}", min, max, init, step);
    }

    /// Overwrites all six threshold fields at once.
    #[allow(clippy::too_many_arguments)]
    pub fn set_thresholds(
        &mut self,
        x_low_band: i32,
        x_high_band: i32,
        x_min: i32,
        y_low_band: i32,
        y_high_band: i32,
        y_min: i32,
    ) {
        self.thresholds = Thresholds {
            x: AxisThresholds::new(x_low_band, x_high_band, x_min),
            y: AxisThresholds::new(y_low_band, y_high_band, y_min),
        };
        debug!("Thresholds set: {:?}", self.thresholds);
    }

    /// Sets both target angles. Values are taken as given, without clamping.
    pub fn set_angles(&mut self, x: i32, y: i32) {
        self.axes.set_current(x, y);
    }

    /// Sets both target angles back to `angle_init`.
    pub fn reset_to_initial(&mut self) {
        let init = self.limits.angle_init;
        self.axes.set_current(init, init);
    }

    /// Current (not necessarily written) angle of an axis.
    #[must_use]
    pub fn angle(&self, axis: Axis) -> i32 {
        self.axes.get(axis).current
    }

    /// Registers the button handler, replacing any previous one.
    ///
    /// The handler runs on the control task; time spent in it is added to the
    /// tick period.
    pub fn on_button_pressed(&mut self, handler: ButtonHandler) {
        self.handlers.set_button(handler);
    }

    /// Registers the angle-change handler, replacing any previous one.
    ///
    /// Whether it ever runs depends on the [`AngleChangePolicy`].
    pub fn on_angle_changed(&mut self, handler: AngleChangeHandler) {
        self.handlers.set_angle_change(handler);
    }

    /// Applies threshold evaluation to both axes.
    ///
    /// Returns `true` if either current angle changed.
    pub fn apply_readings(&mut self, readings: &Readings) -> bool {
        let mut changed = false;

        for (axis, reading) in [(Axis::X, readings.x), (Axis::Y, readings.y)] {
            let thresholds = match axis {
                Axis::X => self.thresholds.x,
                Axis::Y => self.thresholds.y,
            };
            let direction = thresholds.classify(reading);
            let state = self.axes.get_mut(axis);
            let next = self.limits.step_angle(state.current, direction);

            if next != state.current {
                trace!("Axis {} {:?}: {} -> {}", axis, direction, state.current, next);
                state.current = next;
                changed = true;
            }
        }

        changed
    }

    /// Handles a pressed button: runs the handler, or re-centers both axes when
    /// none is registered.
    ///
    /// Returns `true` if a user handler ran.
    pub fn press_button(&mut self) -> bool {
        match self.handlers.button.take() {
            Some(mut handler) => {
                handler(self);
                // A handler that registered a replacement keeps the new one.
                if self.handlers.button.is_none() {
                    self.handlers.button = Some(handler);
                }
                true
            }
            None => {
                self.reset_to_initial();
                false
            }
        }
    }
}
