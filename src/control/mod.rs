//! # Control Module
//!
//! The joystick-to-servo control core.
//!
//! This module handles:
//! - Servo limits and joystick threshold bands
//! - Per-axis angle state and redundant-write suppression
//! - The gated, cooperative control loop
//! - Button and angle-change handler dispatch
//! - A command handle for reaching the loop from other tasks

pub mod axis;
pub mod context;
pub mod controller;
pub mod events;
pub mod handle;
pub mod limits;

pub use axis::Axis;
pub use controller::{ButtonConfig, ServoController, TickReport, Timing};
pub use handle::ControlHandle;
