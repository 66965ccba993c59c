//! Mode arbitration between recording and sync playback

use crate::error::{PauseSyncError, Result};

/// Operating mode of a playback session. Recording and sync never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Recording,
    Syncing,
}

/// Mode change produced by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
}

impl ModeChange {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    pub fn entered(&self, mode: Mode) -> bool {
        self.from != mode && self.to == mode
    }

    pub fn left(&self, mode: Mode) -> bool {
        self.from == mode && self.to != mode
    }
}

/// Tracks the current mode and the loaded media source
#[derive(Debug, Default)]
pub struct ModeState {
    mode: Mode,
    source: Option<String>,
}

impl ModeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_recording(&self) -> bool {
        self.mode == Mode::Recording
    }

    pub fn is_syncing(&self) -> bool {
        self.mode == Mode::Syncing
    }

    fn switch(&mut self, to: Mode) -> ModeChange {
        let change = ModeChange {
            from: self.mode,
            to,
        };
        self.mode = to;
        change
    }

    /// Record a new media source. Both modes switch off.
    pub fn load_source(&mut self, source: impl Into<String>) -> ModeChange {
        self.source = Some(source.into());
        self.switch(Mode::Idle)
    }

    /// Turn recording on (leaving sync) or off
    pub fn request_recording(&mut self, enabled: bool) -> ModeChange {
        match (enabled, self.mode) {
            (true, _) => self.switch(Mode::Recording),
            (false, Mode::Recording) => self.switch(Mode::Idle),
            (false, mode) => self.switch(mode),
        }
    }

    /// Turn sync playback on (leaving recording) or off.
    ///
    /// Enabling requires a loaded source and at least one pause event; a
    /// rejected request leaves the mode unchanged.
    pub fn request_sync(&mut self, enabled: bool, event_count: usize) -> Result<ModeChange> {
        if !enabled {
            return Ok(match self.mode {
                Mode::Syncing => self.switch(Mode::Idle),
                mode => self.switch(mode),
            });
        }

        if self.source.is_none() {
            return Err(PauseSyncError::NoSource);
        }
        if event_count == 0 {
            return Err(PauseSyncError::NoEvents);
        }
        Ok(self.switch(Mode::Syncing))
    }

    /// Switch both modes off
    pub fn reset(&mut self) -> ModeChange {
        self.switch(Mode::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_requires_source_and_events() {
        let mut modes = ModeState::new();
        assert!(matches!(
            modes.request_sync(true, 3),
            Err(PauseSyncError::NoSource)
        ));

        modes.load_source("clip.mp4");
        assert!(matches!(
            modes.request_sync(true, 0),
            Err(PauseSyncError::NoEvents)
        ));
        assert_eq!(modes.mode(), Mode::Idle);

        let change = modes.request_sync(true, 1).unwrap();
        assert!(change.entered(Mode::Syncing));
        assert!(modes.is_syncing());
    }

    #[test]
    fn test_modes_are_mutually_exclusive() {
        let mut modes = ModeState::new();
        modes.load_source("clip.mp4");

        modes.request_recording(true);
        assert!(modes.is_recording());

        let change = modes.request_sync(true, 2).unwrap();
        assert!(change.left(Mode::Recording));
        assert!(modes.is_syncing() && !modes.is_recording());

        let change = modes.request_recording(true);
        assert!(change.left(Mode::Syncing));
        assert!(modes.is_recording() && !modes.is_syncing());
    }

    #[test]
    fn test_rejected_sync_keeps_recording() {
        let mut modes = ModeState::new();
        modes.load_source("clip.mp4");
        modes.request_recording(true);

        assert!(modes.request_sync(true, 0).is_err());
        assert!(modes.is_recording());
    }

    #[test]
    fn test_disabling_other_mode_is_noop() {
        let mut modes = ModeState::new();
        modes.load_source("clip.mp4");
        modes.request_recording(true);

        assert!(modes.request_sync(false, 0).unwrap().is_noop());
        assert!(modes.is_recording());

        assert!(modes.request_recording(false).left(Mode::Recording));
        assert_eq!(modes.mode(), Mode::Idle);
    }

    #[test]
    fn test_loading_source_resets_mode() {
        let mut modes = ModeState::new();
        modes.load_source("a.mp4");
        modes.request_sync(true, 1).unwrap();

        let change = modes.load_source("b.mp4");
        assert!(change.left(Mode::Syncing));
        assert_eq!(modes.source(), Some("b.mp4"));
        assert_eq!(modes.mode(), Mode::Idle);
    }
}
