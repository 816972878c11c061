//! # Maestro Servo Output
//!
//! Drives servos through a Pololu Maestro USB servo controller using its
//! compact serial protocol.
//!
//! ## Set Target Command
//!
//! | Byte | Value |
//! |------|-------|
//! | 0 | `0x84` |
//! | 1 | Channel number |
//! | 2 | Target bits 0-6 |
//! | 3 | Target bits 7-13 |
//!
//! The target is a pulse width in quarter-microseconds. Angles map linearly
//! from 0-180 degrees onto `pulse_min_us..=pulse_max_us`.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{JoystickServoError, Result};
use crate::hal::{Pin, ServoOutput};

/// Compact protocol "Set Target" command byte.
pub const CMD_SET_TARGET: u8 = 0x84;

/// Default Maestro command port baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Highest channel number the compact protocol can address.
pub const MAX_CHANNEL: u16 = 0x7F;

/// Largest angle a servo accepts.
pub const SERVO_ANGLE_MAX: i32 = 180;

/// Default Maestro device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // Maestro command port (USB CDC)
    "/dev/ttyUSB0", // USB-to-serial adapters on the TTL port
];

const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

/// Default pulse width at 0 degrees.
pub const DEFAULT_PULSE_MIN_US: u16 = 500;

/// Default pulse width at 180 degrees.
pub const DEFAULT_PULSE_MAX_US: u16 = 2500;

/// Pulse width range corresponding to 0 and 180 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRange {
    pub min_us: u16,
    pub max_us: u16,
}

impl Default for PulseRange {
    fn default() -> Self {
        Self {
            min_us: DEFAULT_PULSE_MIN_US,
            max_us: DEFAULT_PULSE_MAX_US,
        }
    }
}

impl PulseRange {
    /// Converts an angle to a Maestro target (quarter-microseconds).
    ///
    /// Angles outside 0-180 are clamped.
    ///
    /// # Examples
    ///
    /// ```
    /// use joystick_servo::devices::maestro::PulseRange;
    ///
    /// let range = PulseRange::default();
    /// assert_eq!(range.target_for(0), 2000);
    /// assert_eq!(range.target_for(90), 6000);
    /// assert_eq!(range.target_for(180), 10000);
    /// ```
    #[must_use]
    pub fn target_for(&self, angle: i32) -> u16 {
        let angle = angle.clamp(0, SERVO_ANGLE_MAX) as u32;
        let min = u32::from(self.min_us);
        let max = u32::from(self.max_us.max(self.min_us));
        let pulse_us = min + ((max - min) * angle + (SERVO_ANGLE_MAX as u32 / 2)) / SERVO_ANGLE_MAX as u32;

        (pulse_us * 4).min(0x3FFF) as u16
    }
}

/// Encodes a compact-protocol Set Target command.
#[must_use]
pub fn encode_set_target(channel: u8, target: u16) -> [u8; 4] {
    [
        CMD_SET_TARGET,
        channel & 0x7F,
        (target & 0x7F) as u8,
        ((target >> 7) & 0x7F) as u8,
    ]
}

/// Servo output over a Maestro command port.
///
/// [`Pin`] values are Maestro channel numbers. Write failures are logged and
/// dropped; the control loop never sees them.
pub struct MaestroServo<W = Box<dyn tokio_serial::SerialPort>> {
    port: W,
    device_path: String,
    pulse: PulseRange,
}

impl<W> fmt::Debug for MaestroServo<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaestroServo")
            .field("device_path", &self.device_path)
            .field("pulse", &self.pulse)
            .finish_non_exhaustive()
    }
}

impl MaestroServo {
    /// Opens the first Maestro found at a default path.
    pub fn open(baud_rate: u32, pulse: PulseRange) -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate, pulse)
    }

    /// Opens the first path in `paths` that succeeds.
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, pulse: PulseRange) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Successfully opened Maestro at {}", path);
                    return Ok(Self::new(port, path.to_string(), pulse));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(JoystickServoError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn tokio_serial::SerialPort>> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|e| JoystickServoError::Serial(format!("Failed to open {}: {}", path, e)))
    }
}

impl<W: Write> MaestroServo<W> {
    pub fn new(port: W, device_path: String, pulse: PulseRange) -> Self {
        Self {
            port,
            device_path,
            pulse,
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn into_inner(self) -> W {
        self.port
    }

    fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }
}

impl<W: Write> ServoOutput for MaestroServo<W> {
    fn write(&mut self, pin: Pin, angle: i32) {
        if pin.0 > MAX_CHANNEL {
            warn!("Servo channel {} out of range", pin.0);
            return;
        }
        let channel = pin.0 as u8;

        let target = self.pulse.target_for(angle);
        let frame = encode_set_target(channel, target);

        match self.send(&frame) {
            Ok(()) => debug!("Channel {} -> {} deg (target {})", channel, angle, target),
            Err(e) => warn!("Failed to write servo channel {}: {}", channel, e),
        }
    }
}
