//! # Gamepad Joystick Input
//!
//! Reads a stick and a button from a Linux input device via evdev, presenting
//! them as the analog and digital channels the control loop expects.
//!
//! ## Channels
//!
//! | Trait | [`Pin`] meaning | Value |
//! |-------|-----------------|-------|
//! | [`AnalogInput`] | evdev absolute axis code (`ABS_X` = 0, `ABS_Y` = 1, ...) | rescaled to 0-1023 |
//! | [`DigitalInput`] | evdev key code (`BTN_SOUTH` = 304, ...) | `Low` while held |
//!
//! Buttons are reported as a pulled-up, active-low line: held reads
//! [`Level::Low`], released reads [`Level::High`]. Pull configuration has no
//! effect on an evdev device.
//!
//! Reads query the kernel's current state (`EVIOCGABS`/`EVIOCGKEY`), so they
//! never block waiting for events.

use std::collections::HashMap;
use std::path::Path;

use evdev::{AbsoluteAxisType, Device, Key};
use tracing::{debug, info, warn};

use crate::error::{JoystickServoError, Result};
use crate::hal::{AnalogInput, DigitalInput, Level, Pin, Pull};

/// Top of the raw analog scale.
pub const RAW_MAX: i32 = 1023;

/// Reported for an axis that has never been read successfully.
pub const RAW_CENTER: i32 = 512;

/// Rescales `value` from `min..=max` onto `0..=RAW_MAX`, rounding to nearest.
///
/// # Examples
///
/// ```
/// use joystick_servo::devices::gamepad::scale_to_raw;
///
/// assert_eq!(scale_to_raw(0, 0, 255), 0);
/// assert_eq!(scale_to_raw(255, 0, 255), 1023);
/// assert_eq!(scale_to_raw(0, -32768, 32767), 512);
/// ```
#[must_use]
pub fn scale_to_raw(value: i32, min: i32, max: i32) -> i32 {
    if max <= min {
        return RAW_CENTER;
    }

    let span = i64::from(max) - i64::from(min);
    let offset = i64::from(value.clamp(min, max)) - i64::from(min);
    ((offset * i64::from(RAW_MAX) + span / 2) / span) as i32
}

/// A Linux input device used as joystick and button.
pub struct GamepadInput {
    device: Device,
    device_path: String,
    last_readings: HashMap<Pin, i32>,
}

impl std::fmt::Debug for GamepadInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GamepadInput")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl GamepadInput {
    /// Opens the first `/dev/input/event*` device that has both X and Y axes.
    ///
    /// # Errors
    ///
    /// - `Joystick`: `/dev/input` cannot be listed
    /// - `JoystickNotFound`: no device with a stick was found
    pub fn open() -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(JoystickServoError::Joystick(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| JoystickServoError::Joystick(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| JoystickServoError::Joystick(format!("Failed to read directory entry: {}", e)))?;

        // Sort entries for deterministic device selection
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event = path
                .file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false);
            if !is_event {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    debug!(
                        "Found input device: {} ({})",
                        path.display(),
                        device.name().unwrap_or("unnamed")
                    );

                    if has_stick(&device) {
                        let device_path = path.to_string_lossy().to_string();
                        info!("Using joystick at: {}", device_path);
                        return Ok(Self::from_device(device, device_path));
                    }
                }
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(JoystickServoError::JoystickNotFound)
    }

    /// Opens a specific device path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::open(path).map_err(|e| {
            JoystickServoError::Joystick(format!("Failed to open {}: {}", path.display(), e))
        })?;

        if !has_stick(&device) {
            return Err(JoystickServoError::Joystick(format!(
                "{} has no X/Y axes",
                path.display()
            )));
        }

        info!("Using joystick at: {}", path.display());
        Ok(Self::from_device(device, path.to_string_lossy().to_string()))
    }

    /// Opens the same device a second time.
    ///
    /// The control loop takes the analog and digital channels as separate
    /// owners; both can be served by one physical device this way.
    pub fn reopen(&self) -> Result<Self> {
        Self::open_path(&self.device_path)
    }

    fn from_device(device: Device, device_path: String) -> Self {
        Self {
            device,
            device_path,
            last_readings: HashMap::new(),
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }

    fn last_reading(&self, pin: Pin) -> i32 {
        self.last_readings.get(&pin).copied().unwrap_or(RAW_CENTER)
    }
}

fn has_stick(device: &Device) -> bool {
    device.supported_absolute_axes().map_or(false, |axes| {
        axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y)
    })
}

impl AnalogInput for GamepadInput {
    fn read(&mut self, pin: Pin) -> i32 {
        let state = match self.device.get_abs_state() {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to read axes from {}: {}", self.device_path, e);
                return self.last_reading(pin);
            }
        };

        match state.get(usize::from(pin.0)) {
            Some(info) => {
                let value = scale_to_raw(info.value, info.minimum, info.maximum);
                self.last_readings.insert(pin, value);
                value
            }
            None => {
                warn!("Axis code {} out of range", pin.0);
                RAW_CENTER
            }
        }
    }
}

impl DigitalInput for GamepadInput {
    fn set_pull(&mut self, pin: Pin, pull: Pull) {
        debug!("Ignoring {:?} pull on key {} (evdev device)", pull, pin.0);
    }

    fn read(&mut self, pin: Pin) -> Level {
        match self.device.get_key_state() {
            Ok(keys) if keys.contains(Key::new(pin.0)) => Level::Low,
            Ok(_) => Level::High,
            Err(e) => {
                warn!("Failed to read keys from {}: {}", self.device_path, e);
                Level::High
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_full_range() {
        assert_eq!(scale_to_raw(0, 0, 255), 0);
        assert_eq!(scale_to_raw(255, 0, 255), RAW_MAX);
    }

    #[test]
    fn test_scale_center() {
        // 128/255 of 1023, rounded
        assert_eq!(scale_to_raw(128, 0, 255), 514);
        assert_eq!(scale_to_raw(0, -32768, 32767), 512);
    }

    #[test]
    fn test_scale_clamps() {
        assert_eq!(scale_to_raw(-10, 0, 255), 0);
        assert_eq!(scale_to_raw(300, 0, 255), RAW_MAX);
    }

    #[test]
    fn test_scale_degenerate_range() {
        assert_eq!(scale_to_raw(7, 5, 5), RAW_CENTER);
        assert_eq!(scale_to_raw(7, 9, 5), RAW_CENTER);
    }

    #[test]
    fn test_scale_wide_range_does_not_overflow() {
        assert_eq!(scale_to_raw(i32::MAX, i32::MIN, i32::MAX), RAW_MAX);
        assert_eq!(scale_to_raw(i32::MIN, i32::MIN, i32::MAX), 0);
    }

    #[test]
    fn test_open_missing_path() {
        match GamepadInput::open_path("/dev/input/nonexistent_event_device") {
            Err(JoystickServoError::Joystick(msg)) => assert!(msg.contains("Failed to open")),
            other => panic!("Expected Joystick error, got: {:?}", other),
        }
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_read_with_real_hardware() {
        let mut joystick = GamepadInput::open().expect("Joystick not found");
        let x = AnalogInput::read(&mut joystick, Pin(AbsoluteAxisType::ABS_X.0));
        let y = AnalogInput::read(&mut joystick, Pin(AbsoluteAxisType::ABS_Y.0));
        let button = DigitalInput::read(&mut joystick, Pin(Key::BTN_SOUTH.code()));

        assert!((0..=RAW_MAX).contains(&x));
        assert!((0..=RAW_MAX).contains(&y));
        println!("x={} y={} button={:?}", x, y, button);
    }
}
