//! Event recorder: turns user pause/resume cycles into pause events

use tokio::time::Instant;
use tracing::debug;

use crate::pause::PauseEvent;
use crate::session::SyncGuardReader;

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RecorderState {
    #[default]
    Playing,
    /// Playback stopped at `timestamp` (media seconds) at wall-clock `paused_at`
    Paused { timestamp: f64, paused_at: Instant },
}

/// Captures pause events while recording mode is on and sync mode is off.
///
/// A cycle interrupted by [`EventRecorder::reset`] (mode switch, source
/// change) is dropped without emitting anything.
#[derive(Debug)]
pub struct EventRecorder {
    state: RecorderState,
    recording: bool,
    sync_active: bool,
    guard: SyncGuardReader,
}

impl EventRecorder {
    pub fn new(guard: SyncGuardReader) -> Self {
        Self {
            state: RecorderState::Playing,
            recording: false,
            sync_active: false,
            guard,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Whether a pause is open and waiting for the matching resume
    pub fn has_pending_pause(&self) -> bool {
        matches!(self.state, RecorderState::Paused { .. })
    }

    fn accepts_input(&self) -> bool {
        self.recording && !self.sync_active && !self.guard.is_raised()
    }

    /// Turn recording mode on or off. Turning it off discards a pending pause.
    pub fn set_recording(&mut self, recording: bool) {
        if !recording {
            self.reset();
        }
        self.recording = recording;
    }

    /// Tell the recorder whether sync mode is engaged.
    /// Engaging sync discards a pending pause.
    pub fn set_sync_active(&mut self, sync_active: bool) {
        if sync_active {
            self.reset();
        }
        self.sync_active = sync_active;
    }

    /// Discard any pending pause without emitting it
    pub fn reset(&mut self) {
        if let RecorderState::Paused { timestamp, .. } = self.state {
            debug!("Dropping unfinished pause at {:.2}s", timestamp);
        }
        self.state = RecorderState::Playing;
    }

    /// Player paused at `media_time`.
    ///
    /// Returns true if a new pause is now being tracked.
    pub fn on_pause(&mut self, media_time: f64, now: Instant) -> bool {
        if !self.accepts_input() {
            return false;
        }

        self.state = RecorderState::Paused {
            timestamp: media_time,
            paused_at: now,
        };
        true
    }

    /// Player resumed. Closes the pending pause, if any.
    pub fn on_play(&mut self, now: Instant) -> Option<PauseEvent> {
        let RecorderState::Paused {
            timestamp,
            paused_at,
        } = self.state
        else {
            return None;
        };

        if !self.accepts_input() {
            return None;
        }

        self.state = RecorderState::Playing;
        let duration = now.saturating_duration_since(paused_at).as_secs_f64();
        Some(PauseEvent::new(timestamp, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::sync_guard;
    use std::time::Duration;

    fn recording_recorder() -> (crate::session::SyncGuard, EventRecorder) {
        let (guard, reader) = sync_guard();
        let mut recorder = EventRecorder::new(reader);
        recorder.set_recording(true);
        (guard, recorder)
    }

    #[test]
    fn test_pause_resume_round_trip() {
        let (_guard, mut recorder) = recording_recorder();
        let start = Instant::now();

        assert!(recorder.on_pause(12.0, start));
        let event = recorder.on_play(start + Duration::from_millis(1500));

        assert_eq!(event, Some(PauseEvent::new(12.0, 1.5)));
        assert_eq!(recorder.state(), RecorderState::Playing);
        assert_eq!(recorder.on_play(start + Duration::from_secs(3)), None);
    }

    #[test]
    fn test_interrupted_pause_is_dropped() {
        let (_guard, mut recorder) = recording_recorder();
        let start = Instant::now();

        recorder.on_pause(5.0, start);
        recorder.set_recording(false);
        recorder.set_recording(true);

        assert_eq!(recorder.on_play(start + Duration::from_secs(2)), None);
    }

    #[test]
    fn test_sync_engaging_drops_pending_pause() {
        let (_guard, mut recorder) = recording_recorder();
        let start = Instant::now();

        recorder.on_pause(5.0, start);
        recorder.set_sync_active(true);
        assert!(!recorder.has_pending_pause());
        recorder.set_sync_active(false);

        assert_eq!(recorder.on_play(start + Duration::from_secs(2)), None);
    }

    #[test]
    fn test_ignores_pauses_when_not_recording() {
        let (guard, reader) = sync_guard();
        let mut recorder = EventRecorder::new(reader);
        let start = Instant::now();

        assert!(!recorder.on_pause(3.0, start));
        assert_eq!(recorder.on_play(start + Duration::from_secs(1)), None);
        drop(guard);
    }

    #[test]
    fn test_ignores_pauses_while_guard_raised() {
        let (guard, mut recorder) = recording_recorder();
        let start = Instant::now();

        guard.raise();
        assert!(!recorder.on_pause(8.0, start));
        guard.lower();
        assert_eq!(recorder.on_play(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_repeated_pause_keeps_latest_position() {
        let (_guard, mut recorder) = recording_recorder();
        let start = Instant::now();

        recorder.on_pause(4.0, start);
        recorder.on_pause(4.5, start + Duration::from_secs(1));
        let event = recorder.on_play(start + Duration::from_secs(3)).unwrap();

        assert_eq!(event.timestamp, 4.5);
        assert_eq!(event.duration, 2.0);
    }
}
