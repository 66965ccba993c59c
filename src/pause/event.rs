//! Pause event data structure

use serde::{Deserialize, Serialize};

use crate::error::{PauseSyncError, Result};

/// Scale applied to a timestamp before rounding it into a [`TimestampKey`].
///
/// 10 gives one-decimal (100 ms) resolution.
pub const KEY_SCALE: f64 = 10.0;

/// Quantized timestamp used to remember which pause points already fired
pub type TimestampKey = i64;

/// A single recorded pause
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauseEvent {
    /// Media position in seconds where playback stopped
    pub timestamp: f64,

    /// Real-time seconds playback stayed stopped
    pub duration: f64,
}

impl PauseEvent {
    pub fn new(timestamp: f64, duration: f64) -> Self {
        Self {
            timestamp,
            duration,
        }
    }

    /// A well-formed event has a finite `timestamp >= 0` and a finite `duration > 0`
    pub fn is_well_formed(&self) -> bool {
        self.timestamp.is_finite()
            && self.timestamp >= 0.0
            && self.duration.is_finite()
            && self.duration > 0.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_well_formed() {
            Ok(())
        } else {
            Err(PauseSyncError::MalformedEvent {
                timestamp: self.timestamp,
                duration: self.duration,
            })
        }
    }

    pub fn key(&self) -> TimestampKey {
        timestamp_key(self.timestamp)
    }
}

/// Quantize a media timestamp into its dedupe key
pub fn timestamp_key(timestamp: f64) -> TimestampKey {
    (timestamp * KEY_SCALE).round() as TimestampKey
}

/// Media timestamp (seconds) represented by a dedupe key
pub fn key_seconds(key: TimestampKey) -> f64 {
    key as f64 / KEY_SCALE
}
