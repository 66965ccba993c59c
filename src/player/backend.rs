//! Media player abstraction consumed by the engine

use crate::error::Result;

/// Notifications raised by a media player
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// Playback started or resumed
    Play,
    /// Playback stopped
    Pause,
    /// Periodic position report while media is loaded
    Progress { played_seconds: f64 },
    /// Position jumped; query the player for the new position
    Seek,
    /// Media length became known
    Duration(f64),
    /// Playback reached the end of the media
    Ended,
}

/// Trait for media player backends.
///
/// Calls on a player with no loaded source fail with
/// [`PauseSyncError::PlayerDetached`](crate::error::PauseSyncError::PlayerDetached).
pub trait MediaPlayer: Send {
    /// Attach a new media source and rewind to the start (paused)
    fn load(&mut self, source: &str) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Jump to `seconds` on the media timeline
    fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Current media position in seconds
    fn current_time(&self) -> Result<f64>;
}
