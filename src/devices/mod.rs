//! # Devices Module
//!
//! Linux backends for the hardware traits in [`crate::hal`].
//!
//! This module handles:
//! - Joystick axes and button via evdev ([`gamepad`])
//! - Servo output via a Pololu Maestro over USB serial ([`maestro`])

pub mod gamepad;
pub mod maestro;

pub use gamepad::GamepadInput;
pub use maestro::{MaestroServo, PulseRange};
