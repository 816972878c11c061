//! # Joystick Servo Library
//!
//! Drive two servos from an analog joystick and a push-button.
//!
//! The core is a gated control loop that steps each servo up or down when its
//! joystick axis crosses configured thresholds, re-centers on a button press,
//! and only writes to hardware when an angle actually changed. Hardware is
//! reached through the traits in [`hal`]; [`devices`] provides Linux backends
//! (evdev joystick, Maestro serial servo controller).

pub mod config;
pub mod control;
pub mod devices;
pub mod error;
pub mod hal;
pub mod telemetry;
