//! Error taxonomy for the pause capture/replay core

use thiserror::Error;

/// Errors raised by the core.
///
/// Everything except [`PauseSyncError::PlayerDetached`] is an expected input
/// problem: the caller reports it and carries on with unchanged state.
#[derive(Debug, Error)]
pub enum PauseSyncError {
    /// Negative/non-finite timestamp or non-positive/non-finite duration
    #[error("invalid pause event (timestamp {timestamp}, duration {duration})")]
    MalformedEvent { timestamp: f64, duration: f64 },

    /// Pause map payload that does not parse as a list of pause events
    #[error("invalid pause map: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Sync mode requested before any video was loaded
    #[error("please load a video before enabling sync mode")]
    NoSource,

    /// Sync mode requested with an empty pause map
    #[error("no pause events to sync; record or import pause events first")]
    NoEvents,

    /// Seek target that is not a finite number of seconds
    #[error("invalid seek position: {0}")]
    InvalidSeek(f64),

    /// The media player was used before a source was attached
    #[error("media player is not attached to a source")]
    PlayerDetached,
}

impl PauseSyncError {
    /// Whether this error is a programming error that should stop the engine
    pub fn is_fatal(&self) -> bool {
        matches!(self, PauseSyncError::PlayerDetached)
    }
}

pub type Result<T> = std::result::Result<T, PauseSyncError>;
