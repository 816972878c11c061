//! # Debug Sinks
//!
//! Concrete [`DebugSink`] implementations:
//!
//! - [`TracingSink`]: forwards every emission to `tracing` under the
//!   `joystick_servo::debug` target
//! - [`JsonLinesSink`]: writes one JSON object per emission (JSONL), each
//!   stamped with an RFC 3339 timestamp
//!
//! ## JSONL Format
//!
//! ```text
//! {"ts":"2026-10-19T10:00:00.000+00:00","line":"debug on"}
//! {"ts":"2026-10-19T10:00:00.020+00:00","label":"joyX","value":770}
//! ```

use std::io::Write;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::error::{JoystickServoError, Result};
use crate::hal::DebugSink;

/// Emits debug output as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn write_line(&mut self, text: &str) {
        info!(target: "joystick_servo::debug", "{}", text);
    }

    fn write_value(&mut self, label: &str, value: i32) {
        info!(target: "joystick_servo::debug", "{}: {}", label, value);
    }
}

/// Writes debug output as JSON lines.
///
/// Write failures are logged and otherwise ignored; debug output is
/// best-effort.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl JsonLinesSink<RollingFileAppender> {
    /// Opens (or appends to) `dir/file_name`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// `DebugOutput` if the directory or file cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P, file_name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let writer = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(dir)
            .map_err(|e| {
                JoystickServoError::DebugOutput(format!(
                    "Failed to open {}/{}: {}",
                    dir.display(),
                    file_name,
                    e
                ))
            })?;

        Ok(Self::new(writer))
    }
}

impl<W: Write> JsonLinesSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, record: serde_json::Value) {
        let result = serde_json::to_writer(&mut self.writer, &record)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush());

        if let Err(e) = result {
            warn!("Failed to write debug record: {}", e);
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false)
}

impl<W: Write> DebugSink for JsonLinesSink<W> {
    fn write_line(&mut self, text: &str) {
        self.emit(json!({ "ts": timestamp(), "line": text }));
    }

    fn write_value(&mut self, label: &str, value: i32) {
        self.emit(json!({ "ts": timestamp(), "label": label, "value": value }));
    }
}
