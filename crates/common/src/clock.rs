//! Recording clock and timestamp helpers.
//!
//! Output files are named from the wall clock at recording start; the
//! monotonic side measures how long the encoder actually ran.

use std::time::Instant;

use chrono::{DateTime, Local};

/// Clock anchored to the moment a recording started.
#[derive(Debug, Clone)]
pub struct RecordingClock {
    epoch: Instant,
    epoch_wall: DateTime<Local>,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: Local::now(),
        }
    }

    /// Seconds elapsed since recording start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> DateTime<Local> {
        self.epoch_wall
    }

    /// File-name-safe stamp of the start time, millisecond resolution.
    pub fn file_stamp(&self) -> String {
        file_stamp(&self.epoch_wall)
    }
}

/// Format a timestamp as `YYYYmmdd-HHMMSS-mmm`.
pub fn file_stamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d-%H%M%S-%3f").to_string()
}
