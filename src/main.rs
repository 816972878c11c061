//! # Joystick Servo
//!
//! Drive a pan/tilt pair of servos from a gamepad stick.
//!
//! Reads the stick and a button from a Linux input device and commands two
//! servos on a Pololu Maestro. Pushing an axis into its band steps the servo
//! up, pulling it low steps it down, and the button re-centers both.

use anyhow::{Context, Result};
use tracing::{info, warn};

use joystick_servo::config::{Config, DebugConfig, DebugSinkKind};
use joystick_servo::control::ServoController;
use joystick_servo::devices::{GamepadInput, MaestroServo};
use joystick_servo::hal::DebugSink;
use joystick_servo::telemetry::sinks::{JsonLinesSink, TracingSink};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for Joystick Servo
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (first argument, or `config/default.toml`)
///    - Open the joystick and the servo controller
///    - Center both servos
///
/// 2. **Main Loop**
///    - Run the control loop until Ctrl+C
///
/// # Errors
///
/// Returns error if:
/// - Configuration cannot be loaded or is invalid
/// - No joystick or servo controller can be opened
/// - The JSONL debug file cannot be created
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO joystick_servo: Joystick Servo v0.1.0 starting...
/// INFO joystick_servo::devices::gamepad: Using joystick at: /dev/input/event4
/// INFO joystick_servo::devices::maestro: Successfully opened Maestro at /dev/ttyACM0
/// INFO joystick_servo::control::controller: Servo joystick initialized at 90 degrees (...)
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("Joystick Servo v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = config_path(std::env::args().skip(1));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    info!("Loaded configuration from {}", config_path);

    // Joystick axes and button come from the same device
    let analog = if config.joystick.device_path.is_empty() {
        GamepadInput::open()?
    } else {
        GamepadInput::open_path(&config.joystick.device_path)?
    };
    let digital = analog.reopen()?;
    if let Some(name) = analog.name() {
        info!("Joystick: {}", name);
    }

    let pulse = config.servo.pulse_range();
    let servo = if config.servo.port.is_empty() {
        MaestroServo::open(config.servo.baud_rate, pulse)?
    } else {
        MaestroServo::open_with_paths(&[config.servo.port.as_str()], config.servo.baud_rate, pulse)?
    };

    let sink = debug_sink(&config.debug)?;

    let mut controller = ServoController::from_config(&config, analog, digital, servo, sink);
    controller.initialize(config.pins.to_pins()).await;

    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = controller.run() => {}

        // Handle Ctrl+C for graceful shutdown
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}

/// Picks the configuration path from the command-line arguments
fn config_path<I: Iterator<Item = String>>(mut args: I) -> String {
    args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Builds the debug sink selected in the configuration
fn debug_sink(config: &DebugConfig) -> joystick_servo::error::Result<Box<dyn DebugSink>> {
    match config.sink {
        DebugSinkKind::Log => Ok(Box::new(TracingSink)),
        DebugSinkKind::Jsonl => {
            info!("Debug output: {}/{}", config.jsonl_dir, config.jsonl_file);
            let sink = JsonLinesSink::open(&config.jsonl_dir, &config.jsonl_file)?;
            Ok(Box::new(sink))
        }
    }
}
