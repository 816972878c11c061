//! # Servo Controller
//!
//! The control loop: samples the joystick, decides, actuates, dispatches.
//!
//! ## Tick
//!
//! 1. Read both analog axes and the button
//! 2. Emit raw readings (debug only)
//! 3. Stop here unless more than `action_gate` has passed since the last action
//! 4. Step each axis by its thresholds; handle a pressed button
//! 5. If anything happened, record the action time and run an actuation pass
//!
//! [`ServoController::run`] repeats this forever with `idle_delay` between
//! ticks, draining [`ControlHandle`](super::handle::ControlHandle) commands
//! before each one.
//!
//! ## Latency
//!
//! Everything, including user handlers, runs on the one task that calls
//! `run`. A handler that takes 50ms adds 50ms to that tick.

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, trace};

use super::axis::Axis;
use super::context::{ControlContext, Readings};
use super::events::{AngleChangeHandler, AngleChangePolicy, ButtonHandler};
use super::handle::{Command, ControlHandle};
use super::limits::{ServoLimits, Thresholds};
use crate::config::Config;
use crate::hal::{AnalogInput, DebugSink, DigitalInput, Level, Pins, Pull, ServoOutput};
use crate::telemetry::Telemetry;

/// Minimum time between two accepted actions.
pub const DEFAULT_ACTION_GATE: Duration = Duration::from_millis(100);

/// Pause at the end of every tick.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(20);

/// Pause between the two initial servo writes.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub action_gate: Duration,
    pub idle_delay: Duration,
    pub settle_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            action_gate: DEFAULT_ACTION_GATE,
            idle_delay: DEFAULT_IDLE_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// How the button line reads when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonConfig {
    pub pressed_level: Level,
    pub pull: Pull,
}

impl Default for ButtonConfig {
    /// Pulled-up, active-low.
    fn default() -> Self {
        Self {
            pressed_level: Level::Low,
            pull: Pull::Up,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// `None` when the controller has not been initialized.
    pub readings: Option<Readings>,
    /// The action gate had elapsed and the decision phase ran.
    pub passed_gate: bool,
    /// The button read pressed during the decision phase.
    pub button_fired: bool,
    /// An axis moved or the button fired; an actuation pass ran.
    pub acted: bool,
    /// Number of servo writes issued.
    pub writes: usize,
}

/// Joystick-to-servo control loop over a set of hardware backends.
pub struct ServoController<A, D, S, K> {
    ctx: ControlContext,
    analog: A,
    digital: D,
    servo: S,
    telemetry: Telemetry<K>,
    pins: Option<Pins>,
    timing: Timing,
    button: ButtonConfig,
    command_tx: mpsc::UnboundedSender<Command>,
    commands: mpsc::UnboundedReceiver<Command>,
    angles: watch::Sender<(i32, i32)>,
}

impl<A, D, S, K> std::fmt::Debug for ServoController<A, D, S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServoController")
            .field("ctx", &self.ctx)
            .field("pins", &self.pins)
            .field("timing", &self.timing)
            .field("button", &self.button)
            .finish_non_exhaustive()
    }
}

impl<A, D, S, K> ServoController<A, D, S, K>
where
    A: AnalogInput,
    D: DigitalInput,
    S: ServoOutput,
    K: DebugSink,
{
    /// Creates a controller with default limits, thresholds and timing.
    ///
    /// Nothing is read or written until [`initialize`](Self::initialize).
    pub fn new(analog: A, digital: D, servo: S, sink: K) -> Self {
        let ctx = ControlContext::new(ServoLimits::default(), Thresholds::default());
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (angles, _) = watch::channel(ctx.axes().current());

        Self {
            ctx,
            analog,
            digital,
            servo,
            telemetry: Telemetry::new(sink, false),
            pins: None,
            timing: Timing::default(),
            button: ButtonConfig::default(),
            command_tx,
            commands,
            angles,
        }
    }

    /// Creates a controller configured from a loaded [`Config`].
    pub fn from_config(config: &Config, analog: A, digital: D, servo: S, sink: K) -> Self {
        let mut controller = Self::new(analog, digital, servo, sink)
            .with_timing(config.timing.to_timing())
            .with_button(config.button.to_button_config())
            .with_angle_change_policy(config.events.angle_change)
            .with_debug(config.debug.enabled);

        let l = config.limits;
        controller.set_limits(l.angle_min, l.angle_max, l.angle_init, l.step);

        let t = config.thresholds;
        controller.set_thresholds(
            t.x.low_band,
            t.x.high_band,
            t.x.min_threshold,
            t.y.low_band,
            t.y.high_band,
            t.y.min_threshold,
        );

        controller
    }

    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_button(mut self, button: ButtonConfig) -> Self {
        self.button = button;
        self
    }

    #[must_use]
    pub fn with_angle_change_policy(mut self, policy: AngleChangePolicy) -> Self {
        self.ctx.set_angle_change_policy(policy);
        self
    }

    /// Sets the debug flag without emitting a confirmation line.
    #[must_use]
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.telemetry = Telemetry::new(self.telemetry.into_sink(), enabled);
        self
    }

    /// Handle for driving this controller from other tasks.
    #[must_use]
    pub fn handle(&self) -> ControlHandle {
        ControlHandle::new(self.command_tx.clone(), self.angles.subscribe())
    }

    #[must_use]
    pub fn context(&self) -> &ControlContext {
        &self.ctx
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry<K> {
        &self.telemetry
    }

    #[must_use]
    pub fn pins(&self) -> Option<Pins> {
        self.pins
    }

    #[must_use]
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Time of the last accepted action (or of initialization).
    #[must_use]
    pub fn last_action(&self) -> Instant {
        self.ctx.last_action
    }

    /// Sets up the pins and moves both servos to `angle_init`.
    ///
    /// Writes servo X, waits `settle_delay`, writes servo Y. Calling it again
    /// resets both axes and the action timestamp the same way; handlers and
    /// configuration are kept.
    pub async fn initialize(&mut self, pins: Pins) {
        let init = self.ctx.limits().angle_init;

        self.pins = Some(pins);
        self.digital.set_pull(pins.button, self.button.pull);

        self.ctx.set_angles(init, init);
        self.servo.write(pins.servo_x, init);
        self.ctx.axes.x.commit();

        sleep(self.timing.settle_delay).await;

        self.servo.write(pins.servo_y, init);
        self.ctx.axes.y.commit();

        self.ctx.last_action = Instant::now();
        self.telemetry.initialized(init);
        self.publish_angles();

        info!("Servo joystick initialized at {} degrees ({:?})", init, pins);
    }

    /// Overwrites the servo limits and re-centers both axes to `init`.
    ///
    /// The servos move on the next actuation pass, not immediately.
    pub fn set_limits(&mut self, min: i32, max: i32, init: i32, step: i32) {
        self.ctx.set_limits(min, max, init, step);
        self.publish_angles();
    }

    /// Overwrites all six joystick thresholds.
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
        self.ctx
            .set_thresholds(x_low_band, x_high_band, x_min, y_low_band, y_high_band, y_min);
    }

    /// Turns debug output on or off, confirming on the sink either way.
    pub fn set_debug(&mut self, enabled: bool) {
        self.telemetry.set_enabled(enabled);
    }

    /// Registers the button handler, replacing any previous one.
    ///
    /// Runs on the control task on every gated tick while the button is held.
    pub fn on_button_pressed(&mut self, handler: ButtonHandler) {
        self.ctx.on_button_pressed(handler);
    }

    /// Registers the angle-change handler, replacing any previous one.
    pub fn on_angle_changed(&mut self, handler: AngleChangeHandler) {
        self.ctx.on_angle_changed(handler);
    }

    /// Moves both servos now. Angles are not clamped.
    pub fn set_angles(&mut self, x: i32, y: i32) -> usize {
        self.ctx.set_angles(x, y);
        self.actuate()
    }

    /// Moves both servos back to `angle_init` now.
    pub fn reset_to_initial(&mut self) -> usize {
        self.ctx.reset_to_initial();
        self.actuate()
    }

    /// Current angle of an axis.
    #[must_use]
    pub fn angle(&self, axis: Axis) -> i32 {
        self.ctx.angle(axis)
    }

    /// Runs one tick at time `now`.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let Some(pins) = self.pins else {
            trace!("Tick before initialization, skipping");
            return TickReport::default();
        };

        let x = self.analog.read(pins.joystick_x);
        let y = self.analog.read(pins.joystick_y);
        let level = self.digital.read(pins.button);
        let readings = Readings {
            x,
            y,
            button_pressed: level == self.button.pressed_level,
        };

        self.telemetry.raw_readings(&readings, level);

        let mut report = TickReport {
            readings: Some(readings),
            ..TickReport::default()
        };

        if now.saturating_duration_since(self.ctx.last_action) <= self.timing.action_gate {
            return report;
        }
        report.passed_gate = true;

        let changed = self.ctx.apply_readings(&readings);

        if readings.button_pressed {
            self.telemetry.button_pressed();
            let handled = self.ctx.press_button();
            debug!("Button pressed ({})", if handled { "handler" } else { "reset" });
            report.button_fired = true;
        }

        if changed || report.button_fired {
            self.ctx.last_action = now;
            report.acted = true;
            report.writes = self.actuate();
        }

        report
    }

    /// Writes every axis whose angle differs from what was last written, then
    /// dispatches the angle-change handler per policy.
    ///
    /// Returns the number of writes. Before initialization nothing is written.
    pub fn actuate(&mut self) -> usize {
        let Some(pins) = self.pins else {
            self.publish_angles();
            return 0;
        };

        let mut writes = 0;
        for axis in Axis::ALL {
            let pin = match axis {
                Axis::X => pins.servo_x,
                Axis::Y => pins.servo_y,
            };
            let state = self.ctx.axes.get_mut(axis);
            if state.needs_write() {
                let angle = state.current;
                self.servo.write(pin, angle);
                state.commit();
                self.telemetry.actuation(axis, angle);
                debug!("Servo {} -> {}", axis, angle);
                writes += 1;
            }
        }

        // Both axes are committed at this point.
        let axes = self.ctx.axes;
        let pending = axes.x.needs_write() || axes.y.needs_write();
        if self.ctx.angle_change_policy.should_fire(pending, writes > 0) {
            let (x, y) = axes.current();
            self.ctx.handlers.dispatch_angle_change(x, y);
        }

        self.publish_angles();
        writes
    }

    /// Drains pending handle commands, ticks once, then idles.
    pub async fn run_once(&mut self) -> TickReport {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command).await;
        }

        let report = self.tick(Instant::now());
        sleep(self.timing.idle_delay).await;
        report
    }

    /// Runs the control loop forever.
    pub async fn run(&mut self) -> ! {
        info!(
            "Control loop running (gate {:?}, idle {:?})",
            self.timing.action_gate, self.timing.idle_delay
        );
        loop {
            self.run_once().await;
        }
    }

    async fn apply(&mut self, command: Command) {
        debug!("Command: {:?}", command);
        match command {
            Command::Update(update) => {
                update(&mut self.ctx);
                self.publish_angles();
            }
            Command::Move(update) => {
                update(&mut self.ctx);
                self.actuate();
            }
            Command::SetDebug(enabled) => self.set_debug(enabled),
            Command::Reinitialize(pins) => self.initialize(pins).await,
        }
    }

    fn publish_angles(&self) {
        let current = self.ctx.axes().current();
        self.angles.send_if_modified(|angles| {
            if *angles == current {
                false
            } else {
                *angles = current;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mocks::{FakeButton, RecordingServo, RecordingSink, ScriptedJoystick};
    use crate::hal::Pin;
    use std::sync::{Arc, Mutex};

    const JOY_X: Pin = Pin(0);
    const JOY_Y: Pin = Pin(1);
    const BUTTON: Pin = Pin(2);
    const SERVO_X: Pin = Pin(10);
    const SERVO_Y: Pin = Pin(11);

    type TestController = ServoController<ScriptedJoystick, FakeButton, RecordingServo, RecordingSink>;

    struct Rig {
        joystick: ScriptedJoystick,
        button: FakeButton,
        servo: RecordingServo,
        sink: RecordingSink,
        controller: TestController,
    }

    fn pins() -> Pins {
        Pins {
            joystick_x: JOY_X,
            joystick_y: JOY_Y,
            button: BUTTON,
            servo_x: SERVO_X,
            servo_y: SERVO_Y,
        }
    }

    fn after_gate(controller: &TestController) -> Instant {
        controller.last_action() + DEFAULT_ACTION_GATE + Duration::from_millis(1)
    }

    /// Scenario setup: 0..180, init 90, step 15, bands (760, 780], min 250.
    async fn rig() -> Rig {
        let joystick = ScriptedJoystick::new();
        let button = FakeButton::new();
        let servo = RecordingServo::new();
        let sink = RecordingSink::new();
        joystick.hold(JOY_X, 512);
        joystick.hold(JOY_Y, 512);

        let mut controller = ServoController::new(
            joystick.clone(),
            button.clone(),
            servo.clone(),
            sink.clone(),
        );
        controller.set_limits(0, 180, 90, 15);
        controller.set_thresholds(760, 780, 250, 760, 780, 250);
        controller.initialize(pins()).await;

        servo.clear();
        sink.clear();

        Rig {
            joystick,
            button,
            servo,
            sink,
            controller,
        }
    }

    // ==================== Initialization Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_initialize_writes_both_servos_with_settle_delay() {
        let button = FakeButton::new();
        let servo = RecordingServo::new();
        let mut controller = ServoController::new(
            ScriptedJoystick::new(),
            button.clone(),
            servo.clone(),
            RecordingSink::new(),
        );

        let start = Instant::now();
        controller.initialize(pins()).await;

        assert_eq!(servo.writes(), vec![(SERVO_X, 90), (SERVO_Y, 90)]);
        assert!(Instant::now() - start >= DEFAULT_SETTLE_DELAY);
        assert_eq!(*button.pulls.lock().unwrap(), vec![(BUTTON, Pull::Up)]);
        assert_eq!(controller.last_action(), Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinitialize_resets_derived_state() {
        let mut rig = rig().await;
        rig.controller.set_angles(170, 10);
        rig.servo.clear();

        rig.controller.initialize(pins()).await;

        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 90), (SERVO_Y, 90)]);
        assert_eq!(rig.controller.angle(Axis::X), 90);
        assert_eq!(rig.controller.angle(Axis::Y), 90);
        assert!(!rig.controller.context().axes().x.needs_write());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_emits_debug_line_when_enabled() {
        let sink = RecordingSink::new();
        let mut controller = ServoController::new(
            ScriptedJoystick::new(),
            FakeButton::new(),
            RecordingServo::new(),
            sink.clone(),
        )
        .with_debug(true);

        controller.initialize(pins()).await;

        assert_eq!(sink.lines(), vec!["servo joystick initialized", "init=90"]);
    }

    #[test]
    fn test_tick_before_initialize_does_nothing() {
        let servo = RecordingServo::new();
        let mut controller = ServoController::new(
            ScriptedJoystick::new(),
            FakeButton::new(),
            servo.clone(),
            RecordingSink::new(),
        );

        let report = controller.tick(Instant::now() + Duration::from_secs(5));
        assert_eq!(report, TickReport::default());
        assert!(servo.writes().is_empty());
    }

    #[test]
    fn test_initialize_with_blocking_runtime() {
        let servo = RecordingServo::new();
        let mut controller = ServoController::new(
            ScriptedJoystick::new(),
            FakeButton::new(),
            servo.clone(),
            RecordingSink::new(),
        )
        .with_timing(Timing {
            settle_delay: Duration::ZERO,
            ..Timing::default()
        });

        tokio_test::block_on(controller.initialize(pins()));
        assert_eq!(servo.writes().len(), 2);
    }

    // ==================== Decision Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_scenario_stepping_sequence() {
        let mut rig = rig().await;
        rig.joystick.push(JOY_X, &[770, 770, 200]);

        let mut angles = Vec::new();
        for _ in 0..3 {
            let now = after_gate(&rig.controller);
            let report = rig.controller.tick(now);
            assert!(report.acted);
            angles.push(rig.controller.angle(Axis::X));
        }

        assert_eq!(angles, vec![105, 120, 105]);
        assert_eq!(rig.servo.writes_to(SERVO_X), vec![105, 120, 105]);
        assert!(rig.servo.writes_to(SERVO_Y).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_blocks_until_strictly_elapsed() {
        let mut rig = rig().await;
        rig.joystick.hold(JOY_X, 770);

        let at_gate = rig.controller.last_action() + DEFAULT_ACTION_GATE;
        let report = rig.controller.tick(at_gate);
        assert!(report.readings.is_some());
        assert!(!report.passed_gate);
        assert!(rig.servo.writes().is_empty());

        let report = rig.controller.tick(at_gate + Duration::from_millis(1));
        assert!(report.passed_gate);
        assert_eq!(report.writes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_restarts_only_on_action() {
        let mut rig = rig().await;
        let start = rig.controller.last_action();

        // Dead-zone tick passes the gate but does not act
        let report = rig.controller.tick(after_gate(&rig.controller));
        assert!(report.passed_gate);
        assert!(!report.acted);
        assert_eq!(rig.controller.last_action(), start);

        // So the very next tick may act without waiting again
        rig.joystick.hold(JOY_X, 770);
        let now = start + Duration::from_millis(150);
        let report = rig.controller.tick(now);
        assert!(report.acted);
        assert_eq!(rig.controller.last_action(), now);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clamped_axis_is_not_rewritten() {
        let mut rig = rig().await;
        rig.controller.set_angles(180, 90);
        rig.servo.clear();
        rig.joystick.hold(JOY_X, 770);

        let report = rig.controller.tick(after_gate(&rig.controller));

        assert!(!report.acted);
        assert_eq!(rig.controller.angle(Axis::X), 180);
        assert!(rig.servo.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_angles_stay_within_limits() {
        let mut rig = rig().await;
        rig.joystick.hold(JOY_X, 770);
        rig.joystick.hold(JOY_Y, 0);

        for _ in 0..30 {
            let now = after_gate(&rig.controller);
            rig.controller.tick(now);
            let x = rig.controller.angle(Axis::X);
            let y = rig.controller.angle(Axis::Y);
            assert!((0..=180).contains(&x));
            assert!((0..=180).contains(&y));
        }

        assert_eq!(rig.controller.angle(Axis::X), 180);
        assert_eq!(rig.controller.angle(Axis::Y), 0);
        // 90 -> 180 and 90 -> 0 in steps of 15: six writes each
        assert_eq!(rig.servo.writes_to(SERVO_X).len(), 6);
        assert_eq!(rig.servo.writes_to(SERVO_Y).len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_limits_applies_on_next_actuation_pass() {
        let mut rig = rig().await;
        rig.controller.set_limits(0, 180, 45, 5);

        assert_eq!(rig.controller.angle(Axis::X), 45);
        assert!(rig.servo.writes().is_empty());

        rig.joystick.hold(JOY_X, 770);
        rig.controller.tick(after_gate(&rig.controller));

        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 50), (SERVO_Y, 45)]);
    }

    // ==================== Button Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_held_button_resets_on_every_gated_tick() {
        let mut rig = rig().await;
        rig.controller.set_angles(150, 20);
        rig.servo.clear();
        rig.button.set(Level::Low);

        let report = rig.controller.tick(after_gate(&rig.controller));
        assert!(report.button_fired);
        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 90), (SERVO_Y, 90)]);

        // Still held: fires again, nothing left to write
        let before = rig.controller.last_action();
        let report = rig.controller.tick(after_gate(&rig.controller));
        assert!(report.button_fired);
        assert!(report.acted);
        assert_eq!(report.writes, 0);
        assert!(rig.controller.last_action() > before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_ignored_inside_gate() {
        let mut rig = rig().await;
        rig.controller.set_angles(150, 20);
        rig.button.set(Level::Low);

        let report = rig.controller.tick(rig.controller.last_action());
        assert!(!report.button_fired);
        assert_eq!(rig.controller.angle(Axis::X), 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_handler_replaces_default() {
        let mut rig = rig().await;
        rig.controller.on_button_pressed(Box::new(|ctx| ctx.set_angles(0, 180)));
        rig.button.set(Level::Low);

        rig.controller.tick(after_gate(&rig.controller));

        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 0), (SERVO_Y, 180)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_high_button_config() {
        let joystick = ScriptedJoystick::new();
        let button = FakeButton::new();
        let servo = RecordingServo::new();
        let mut controller = ServoController::new(joystick, button.clone(), servo.clone(), RecordingSink::new())
            .with_button(ButtonConfig {
                pressed_level: Level::High,
                pull: Pull::Down,
            });
        controller.initialize(pins()).await;
        controller.set_angles(10, 10);

        button.set(Level::High);
        let report = controller.tick(controller.last_action() + Duration::from_millis(101));

        assert!(report.button_fired);
        assert_eq!(controller.angle(Axis::X), 90);
        assert_eq!(*button.pulls.lock().unwrap(), vec![(BUTTON, Pull::Down)]);
    }

    // ==================== Actuation Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_reset_after_manual_angles() {
        let mut rig = rig().await;

        assert_eq!(rig.controller.set_angles(170, 10), 2);
        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 170), (SERVO_Y, 10)]);
        rig.servo.clear();

        assert_eq!(rig.controller.reset_to_initial(), 2);
        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 90), (SERVO_Y, 90)]);
        assert_eq!(rig.controller.angle(Axis::X), 90);
        assert_eq!(rig.controller.angle(Axis::Y), 90);

        // Already there
        assert_eq!(rig.controller.reset_to_initial(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_angles_write_once() {
        let mut rig = rig().await;
        rig.controller.set_angles(120, 90);
        rig.controller.set_angles(120, 90);

        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 120)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_literal_policy_never_fires_angle_change() {
        let mut rig = rig().await;
        let calls = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::clone(&calls);
        rig.controller
            .on_angle_changed(Box::new(move |x, y| c.lock().unwrap().push((x, y))));

        rig.joystick.hold(JOY_X, 770);
        rig.controller.tick(after_gate(&rig.controller));
        rig.controller.set_angles(30, 40);

        assert_eq!(rig.servo.writes().len(), 3);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_change_policy_fires_after_writes() {
        let mut rig = rig().await;
        rig.controller = rig.controller.with_angle_change_policy(AngleChangePolicy::OnChange);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::clone(&calls);
        rig.controller
            .on_angle_changed(Box::new(move |x, y| c.lock().unwrap().push((x, y))));

        rig.joystick.hold(JOY_X, 770);
        rig.controller.tick(after_gate(&rig.controller));
        // No write, no call
        rig.controller.set_angles(105, 90);

        assert_eq!(*calls.lock().unwrap(), vec![(105, 90)]);
    }

    // ==================== Telemetry Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_debug_emits_readings_every_tick() {
        let mut rig = rig().await;
        rig.controller.set_debug(true);
        rig.joystick.hold(JOY_X, 770);

        // Inside the gate: readings only
        rig.controller.tick(rig.controller.last_action());
        // Past the gate: readings plus the actuation line
        rig.controller.tick(after_gate(&rig.controller));

        assert_eq!(
            rig.sink.lines(),
            vec![
                "debug on",
                "joyX=770",
                "joyY=512",
                "btn=1",
                "joyX=770",
                "joyY=512",
                "btn=1",
                "servoX=105",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_button_line() {
        let mut rig = rig().await;
        rig.controller.set_debug(true);
        rig.button.set(Level::Low);
        rig.controller.set_angles(100, 90);
        rig.sink.clear();

        rig.controller.tick(after_gate(&rig.controller));

        let lines = rig.sink.lines();
        assert!(lines.contains(&"btn=0".to_string()));
        assert!(lines.contains(&"button pressed".to_string()));
        assert!(lines.contains(&"servoX=90".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_off_is_silent() {
        let mut rig = rig().await;
        rig.controller.set_debug(true);
        rig.controller.set_debug(false);
        rig.sink.clear();
        rig.joystick.hold(JOY_X, 770);

        rig.controller.tick(after_gate(&rig.controller));

        assert!(rig.sink.lines().is_empty());
        assert_eq!(rig.servo.writes().len(), 1);
    }

    // ==================== Loop and Handle Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_run_once_applies_handle_commands() {
        let mut rig = rig().await;
        let handle = rig.controller.handle();

        handle.set_angles(170, 10).unwrap();
        handle.set_debug(true).unwrap();
        rig.controller.run_once().await;

        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 170), (SERVO_Y, 10)]);
        assert_eq!(handle.angle(Axis::X), 170);
        assert_eq!(handle.angle(Axis::Y), 10);
        assert!(rig.controller.telemetry().is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_updates_defer_the_write() {
        let mut rig = rig().await;
        let handle = rig.controller.handle();
        let fired = Arc::new(Mutex::new(0));
        let counter = fired.clone();

        handle.set_limits(0, 180, 45, 15).unwrap();
        handle
            .on_button_pressed(move |_ctx| *counter.lock().unwrap() += 1)
            .unwrap();
        rig.controller.run_once().await;

        assert!(rig.servo.writes().is_empty());
        assert_eq!(handle.angle(Axis::X), 45);

        rig.button.set(Level::Low);
        let report = rig.controller.tick(after_gate(&rig.controller));

        assert!(report.button_fired);
        assert_eq!(*fired.lock().unwrap(), 1);
        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 45), (SERVO_Y, 45)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_idles_after_tick() {
        let mut rig = rig().await;
        let start = Instant::now();

        rig.controller.run_once().await;

        assert!(Instant::now() - start >= DEFAULT_IDLE_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reinitialize() {
        let mut rig = rig().await;
        let handle = rig.controller.handle();
        rig.controller.set_angles(20, 20);
        rig.servo.clear();

        handle.reinitialize(pins()).unwrap();
        rig.controller.run_once().await;

        assert_eq!(rig.servo.writes(), vec![(SERVO_X, 90), (SERVO_Y, 90)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drives_servos_in_background() {
        let rig = rig().await;
        let mut controller = rig.controller;
        let mut handle = controller.handle();
        rig.joystick.hold(JOY_X, 770);

        tokio::spawn(async move { controller.run().await });

        let (x, y) = handle.changed().await.unwrap();
        assert_eq!((x, y), (105, 90));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.angle(Axis::X), 180);
        assert_eq!(rig.servo.writes_to(SERVO_X).last(), Some(&180));
    }

    // ==================== Config Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_from_config_applies_sections() {
        let config = Config::from_toml(
            r#"
[limits]
angle_init = 45
step = 10

[thresholds.x]
min_threshold = 100

[timing]
action_gate_ms = 300
settle_delay_ms = 0

[button]
pressed_level = "high"
pull = "down"

[debug]
enabled = true

[events]
angle_change = "on_change"
"#,
        )
        .unwrap();

        let button = FakeButton::new();
        let servo = RecordingServo::new();
        let mut controller = ServoController::from_config(
            &config,
            ScriptedJoystick::new(),
            button.clone(),
            servo.clone(),
            RecordingSink::new(),
        );

        assert_eq!(controller.context().limits(), &ServoLimits::new(0, 180, 45, 10));
        assert_eq!(controller.context().thresholds().x.min_threshold, 100);
        assert_eq!(controller.timing().action_gate, Duration::from_millis(300));
        assert_eq!(controller.context().angle_change_policy(), AngleChangePolicy::OnChange);
        assert!(controller.telemetry().is_enabled());

        controller.initialize(pins()).await;
        assert_eq!(servo.writes(), vec![(SERVO_X, 45), (SERVO_Y, 45)]);
        assert_eq!(*button.pulls.lock().unwrap(), vec![(BUTTON, Pull::Down)]);
    }
}
