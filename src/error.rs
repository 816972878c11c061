//! # Error Types
//!
//! Custom error types for Joystick Servo using `thiserror`.
//!
//! The control core itself never fails; these errors come from the edges
//! (configuration files, device handles and the command channel).

use thiserror::Error;

/// Main error type for Joystick Servo
#[derive(Debug, Error)]
pub enum JoystickServoError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No serial device could be opened
    #[error("No servo controller found (tried: {0})")]
    SerialPortNotFound(String),

    /// Joystick device errors
    #[error("Joystick error: {0}")]
    Joystick(String),

    /// No joystick device could be opened
    #[error("No joystick with X/Y axes found")]
    JoystickNotFound,

    /// Debug output file could not be opened
    #[error("Debug output error: {0}")]
    DebugOutput(String),

    /// The control loop is no longer receiving commands
    #[error("Control loop has stopped")]
    ControllerStopped,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Joystick Servo
pub type Result<T> = std::result::Result<T, JoystickServoError>;
