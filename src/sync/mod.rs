//! Playback engine - coordinates recording, sync playback and the player

mod engine;
mod mode;
mod player;

pub use engine::{create_engine_channels, PlaybackEngine};
pub use mode::{Mode, ModeChange, ModeState};
pub use player::{ActiveSyncPause, SyncPlayer, SyncTiming};

use tokio::sync::oneshot;

use crate::pause::{PauseEvent, PauseEventList};

/// User interaction with the player itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transport {
    Play,
    Pause,
    /// Play if stopped, pause if playing, as last reported by the player
    TogglePlay,
    Seek(f64),
}

/// Commands that can be sent to the playback engine
#[derive(Debug)]
pub enum EngineCommand {
    /// Attach a new media source; both modes switch off
    LoadSource(String),
    /// Turn recording on/off, optionally discarding the existing pause map
    SetRecording { enabled: bool, discard_existing: bool },
    /// Turn sync playback on/off
    SetSync(bool),
    /// Toggle the longer minimum pause used for demonstrations
    SetDemoMode(bool),
    /// Replace the pause map with caller-provided events
    ImportEvents(Vec<PauseEvent>),
    /// Replace the pause map from a JSON payload
    ImportJson(String),
    /// Remove all pause events
    ClearEvents,
    /// Re-arm all pause points and play from the start
    Restart,
    /// Both modes off and an empty pause map
    ResetAll,
    /// Forward a user play/pause/seek to the player
    Transport(Transport),
    /// Reply with a copy of the current pause map
    Snapshot(oneshot::Sender<PauseEventList>),
    /// Stop the engine
    Shutdown,
}

/// Status updates from the playback engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    /// Neither recording nor syncing
    Idle,
    /// Recording mode active
    Recording,
    /// Sync playback active
    Syncing,
    /// A media source was attached
    SourceLoaded { source: String },
    /// Media length reported by the player
    MediaLength { seconds: f64 },
    /// Recorder closed a pause/resume cycle and the event was stored
    PauseRecorded(PauseEvent),
    /// The pause map changed
    EventsUpdated { count: usize },
    /// Sync playback paused at a recorded point
    SyncPaused { event: PauseEvent, effective_secs: f64 },
    /// Seconds until sync playback resumes
    Countdown { remaining_secs: f64 },
    /// Sync playback resumed after a recorded pause
    SyncResumed { timestamp: f64 },
    /// Demo mode switched
    DemoMode(bool),
    /// Media reached its end
    Ended,
    /// A request or input was rejected; state is unchanged
    Rejected(String),
}

impl From<Mode> for EngineStatus {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Idle => EngineStatus::Idle,
            Mode::Recording => EngineStatus::Recording,
            Mode::Syncing => EngineStatus::Syncing,
        }
    }
}
