//! Sync player: reproduces recorded pauses during playback
//!
//! Pure state machine. The engine feeds it progress and seek notifications
//! and owns the actual timers; the only clock it knows about is the `now`
//! passed into each call.

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::pause::{key_seconds, timestamp_key, PauseEvent, PauseEventList, TimestampKey};
use crate::session::{SyncGuard, SyncGuardReader};

/// Longest hold a single sync pause can produce
pub const MAX_SYNC_HOLD: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Timing knobs for pause detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncTiming {
    /// Minimum spacing between examined progress notifications
    pub debounce: Duration,
    /// Media seconds after a pause point during which it may still fire
    pub arrival_window_secs: f64,
    /// Seeks re-arm fired pause points within this many media seconds
    pub seek_rearm_radius_secs: f64,
    /// Pause length floor
    pub min_pause_secs: f64,
    /// Pause length floor in demo mode
    pub demo_min_pause_secs: f64,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncTiming {
    fn from(config: &SyncConfig) -> Self {
        Self {
            debounce: config.debounce(),
            arrival_window_secs: config.arrival_window_secs,
            seek_rearm_radius_secs: config.seek_rearm_radius_secs,
            min_pause_secs: config.min_pause_secs,
            demo_min_pause_secs: config.demo_min_pause_secs,
        }
    }
}

impl SyncTiming {
    /// How long a recorded pause is held during sync playback
    pub fn effective_pause_secs(&self, duration: f64, demo_mode: bool) -> f64 {
        let floor = if demo_mode {
            self.demo_min_pause_secs
        } else {
            self.min_pause_secs
        };
        duration.max(floor)
    }

    /// Hold length as a timer duration, saturating at [`MAX_SYNC_HOLD`]
    pub fn effective_hold(&self, duration: f64, demo_mode: bool) -> Duration {
        Duration::try_from_secs_f64(self.effective_pause_secs(duration, demo_mode))
            .map(|hold| hold.min(MAX_SYNC_HOLD))
            .unwrap_or(MAX_SYNC_HOLD)
    }
}

/// A programmatic pause in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSyncPause {
    /// The pause point that fired
    pub event: PauseEvent,
    /// Hold length after applying the floor
    pub effective: Duration,
    /// When playback must resume
    pub deadline: Instant,
}

impl ActiveSyncPause {
    /// Seconds left before resuming, rounded to one decimal and never negative
    pub fn remaining_secs(&self, now: Instant) -> f64 {
        let remaining = self.deadline.saturating_duration_since(now).as_secs_f64();
        (remaining * 10.0).round() / 10.0
    }
}

/// Drives automatic pause/resume cycles for one pause map
#[derive(Debug)]
pub struct SyncPlayer {
    timing: SyncTiming,
    demo_mode: bool,
    processed: HashSet<TimestampKey>,
    last_check: Option<Instant>,
    active: Option<ActiveSyncPause>,
    guard: SyncGuard,
}

impl SyncPlayer {
    pub fn new(timing: SyncTiming, guard: SyncGuard) -> Self {
        Self {
            timing,
            demo_mode: false,
            processed: HashSet::new(),
            last_check: None,
            active: None,
            guard,
        }
    }

    pub fn timing(&self) -> &SyncTiming {
        &self.timing
    }

    /// Read-only view of the guard for the recorder
    pub fn guard_reader(&self) -> SyncGuardReader {
        self.guard.reader()
    }

    pub fn demo_mode(&self) -> bool {
        self.demo_mode
    }

    pub fn set_demo_mode(&mut self, demo_mode: bool) {
        self.demo_mode = demo_mode;
    }

    pub fn active_pause(&self) -> Option<&ActiveSyncPause> {
        self.active.as_ref()
    }

    pub fn is_pausing(&self) -> bool {
        self.active.is_some()
    }

    /// When the active pause ends, if there is one
    pub fn resume_deadline(&self) -> Option<Instant> {
        self.active.map(|pause| pause.deadline)
    }

    /// Countdown value for display, derived from the resume deadline
    pub fn remaining_secs(&self, now: Instant) -> Option<f64> {
        self.active.map(|pause| pause.remaining_secs(now))
    }

    pub fn is_processed(&self, timestamp: f64) -> bool {
        self.processed.contains(&timestamp_key(timestamp))
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Start a fresh run: forget fired pause points and drop any active pause
    pub fn begin_run(&mut self) {
        self.cancel();
        self.processed.clear();
        self.last_check = None;
    }

    /// Drop the active pause (if any) and lower the guard.
    ///
    /// After this returns the previous deadline is gone, so no resume can be
    /// issued for it.
    pub fn cancel(&mut self) {
        if let Some(pause) = self.active.take() {
            debug!("Cancelled sync pause at {:.2}s", pause.event.timestamp);
        }
        self.guard.lower();
    }

    /// Examine a progress notification at media position `media_time`.
    ///
    /// Returns the pause that just started, if this notification reached an
    /// unfired pause point. The caller must stop the player and resume it at
    /// [`ActiveSyncPause::deadline`] via [`SyncPlayer::complete_pause`].
    pub fn on_progress(
        &mut self,
        media_time: f64,
        events: &PauseEventList,
        now: Instant,
    ) -> Option<ActiveSyncPause> {
        if let Some(last) = self.last_check {
            if now.saturating_duration_since(last) < self.timing.debounce {
                return None;
            }
        }
        self.last_check = Some(now);

        // Never stack two pauses.
        if self.active.is_some() || self.guard.is_raised() {
            return None;
        }

        let event = self.next_due(media_time, events)?;
        self.processed.insert(event.key());

        let effective = self.timing.effective_hold(event.duration, self.demo_mode);
        let deadline = now
            .checked_add(effective)
            .unwrap_or_else(|| now + MAX_SYNC_HOLD);
        let pause = ActiveSyncPause {
            event,
            effective,
            deadline,
        };

        self.guard.raise();
        self.active = Some(pause);
        info!(
            "Sync pause at {:.2}s (media {:.2}s) for {:.1}s",
            event.timestamp,
            media_time,
            effective.as_secs_f64()
        );
        Some(pause)
    }

    /// First unfired event whose pause point `media_time` has just passed
    fn next_due(&self, media_time: f64, events: &PauseEventList) -> Option<PauseEvent> {
        events
            .iter()
            .find(|event| {
                media_time >= event.timestamp
                    && media_time - event.timestamp < self.timing.arrival_window_secs
                    && !self.processed.contains(&event.key())
            })
            .copied()
    }

    /// Finish the active pause: lower the guard and hand back the pause so
    /// the caller can resume playback.
    pub fn complete_pause(&mut self) -> Option<ActiveSyncPause> {
        let pause = self.active.take()?;
        self.guard.lower();
        Some(pause)
    }

    /// The user moved the playhead to `position`.
    ///
    /// Re-arms fired pause points within the re-arm radius of the new
    /// position, in either direction. A forward seek past a point and back
    /// within the radius can therefore fire it twice.
    pub fn on_seek(&mut self, position: f64) {
        if !position.is_finite() {
            return;
        }

        let radius = self.timing.seek_rearm_radius_secs;
        let before = self.processed.len();
        self.processed
            .retain(|key| (key_seconds(*key) - position).abs() > radius);

        let rearmed = before - self.processed.len();
        if rearmed > 0 {
            debug!("Seek to {:.2}s re-armed {} pause point(s)", position, rearmed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::sync_guard;

    fn sync_player() -> (SyncPlayer, SyncGuardReader) {
        let (guard, reader) = sync_guard();
        (SyncPlayer::new(SyncTiming::default(), guard), reader)
    }

    fn events(points: &[(f64, f64)]) -> PauseEventList {
        PauseEventList::from_events(
            points
                .iter()
                .map(|&(timestamp, duration)| PauseEvent::new(timestamp, duration))
                .collect(),
        )
        .unwrap()
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    /// Feed a monotonically increasing stream, completing each pause right
    /// away; returns the timestamps that fired.
    fn replay_stream(player: &mut SyncPlayer, list: &PauseEventList, positions: &[f64]) -> Vec<f64> {
        let start = Instant::now();
        let mut fired = Vec::new();
        for (index, position) in positions.iter().enumerate() {
            let now = start + ms(200 * index as u64);
            if let Some(pause) = player.on_progress(*position, list, now) {
                fired.push(pause.event.timestamp);
                player.complete_pause();
            }
        }
        fired
    }

    #[test]
    fn test_effective_duration_floor() {
        let timing = SyncTiming::default();
        assert_eq!(timing.effective_pause_secs(0.1, false), 0.3);
        assert_eq!(timing.effective_pause_secs(0.1, true), 2.0);
        assert_eq!(timing.effective_pause_secs(5.0, false), 5.0);
        assert_eq!(timing.effective_pause_secs(5.0, true), 5.0);
    }

    #[test]
    fn test_fires_within_arrival_window_and_raises_guard() {
        let (mut player, reader) = sync_player();
        let list = events(&[(10.0, 1.5)]);
        let now = Instant::now();

        let pause = player.on_progress(10.1, &list, now).unwrap();
        assert_eq!(pause.event, PauseEvent::new(10.0, 1.5));
        assert_eq!(pause.effective, ms(1500));
        assert_eq!(pause.deadline, now + ms(1500));
        assert!(reader.is_raised());
        assert!(player.is_processed(10.0));

        let done = player.complete_pause().unwrap();
        assert_eq!(done.event.timestamp, 10.0);
        assert!(!reader.is_raised());
        assert!(!player.is_pausing());
    }

    #[test]
    fn test_never_fires_before_or_late() {
        let (mut player, _reader) = sync_player();
        let list = events(&[(10.0, 1.0)]);
        let start = Instant::now();

        assert!(player.on_progress(9.95, &list, start).is_none());
        assert!(player.on_progress(10.25, &list, start + ms(200)).is_none());
        assert!(!player.is_processed(10.0));
    }

    #[test]
    fn test_each_event_fires_once_per_run() {
        let (mut player, _reader) = sync_player();
        let list = events(&[(1.0, 0.5), (2.0, 0.5), (2.0, 0.7), (5.5, 1.0)]);
        let positions: Vec<f64> = (0..40).map(|step| step as f64 * 0.15).collect();

        let fired = replay_stream(&mut player, &list, &positions);
        // The duplicate 2.0 shares a key with the first one.
        assert_eq!(fired, vec![1.0, 2.0, 5.5]);

        let again = replay_stream(&mut player, &list, &positions);
        assert!(again.is_empty());
    }

    #[test]
    fn test_begin_run_rearms_everything() {
        let (mut player, reader) = sync_player();
        let list = events(&[(1.0, 3.0)]);
        let now = Instant::now();

        player.on_progress(1.05, &list, now).unwrap();
        player.begin_run();
        assert!(!reader.is_raised());
        assert!(player.resume_deadline().is_none());
        assert_eq!(player.processed_count(), 0);

        assert!(player.on_progress(1.05, &list, now).is_some());
    }

    #[test]
    fn test_no_stacking_while_pausing() {
        let (mut player, _reader) = sync_player();
        let list = events(&[(3.0, 2.0), (3.1, 2.0)]);
        let start = Instant::now();

        assert!(player.on_progress(3.05, &list, start).is_some());
        assert!(player.on_progress(3.15, &list, start + ms(200)).is_none());
        assert!(!player.is_processed(3.1));
    }

    #[test]
    fn test_debounce_skips_scan() {
        let (mut player, _reader) = sync_player();
        let list = events(&[(4.0, 1.0)]);
        let start = Instant::now();

        assert!(player.on_progress(3.9, &list, start).is_none());
        assert!(player.on_progress(4.05, &list, start + ms(10)).is_none());
        assert!(!player.is_processed(4.0));

        assert!(player.on_progress(4.1, &list, start + ms(60)).is_some());
    }

    #[test]
    fn test_seek_rearm_window() {
        let (mut player, _reader) = sync_player();
        let list = events(&[(10.0, 1.0)]);
        player.on_progress(10.0, &list, Instant::now()).unwrap();
        player.complete_pause();

        player.on_seek(50.0);
        assert!(player.is_processed(10.0));

        player.on_seek(8.0);
        assert!(!player.is_processed(10.0));
    }

    #[test]
    fn test_forward_seek_near_point_rearms_it() {
        let (mut player, _reader) = sync_player();
        let list = events(&[(10.0, 1.0)]);
        let start = Instant::now();
        player.on_progress(10.0, &list, start).unwrap();
        player.complete_pause();

        player.on_seek(14.0);
        assert!(player.on_progress(10.1, &list, start + ms(500)).is_some());
    }

    #[test]
    fn test_countdown_derived_from_deadline() {
        let (mut player, _reader) = sync_player();
        player.set_demo_mode(true);
        let list = events(&[(2.0, 0.1)]);
        let start = Instant::now();

        let pause = player.on_progress(2.0, &list, start).unwrap();
        assert_eq!(pause.effective, ms(2000));
        assert_eq!(player.remaining_secs(start), Some(2.0));
        assert_eq!(player.remaining_secs(start + ms(340)), Some(1.7));
        assert_eq!(player.remaining_secs(start + ms(2500)), Some(0.0));

        player.cancel();
        assert_eq!(player.remaining_secs(start), None);
    }

    #[test]
    fn test_huge_recorded_duration_is_capped() {
        let (mut player, reader) = sync_player();
        let mut list = PauseEventList::new();
        list.import_json(r#"[{"timestamp": 1.0, "duration": 1e20}]"#)
            .unwrap();
        let now = Instant::now();

        let pause = player.on_progress(1.05, &list, now).unwrap();
        assert_eq!(pause.effective, MAX_SYNC_HOLD);
        assert_eq!(pause.deadline, now + MAX_SYNC_HOLD);
        assert!(reader.is_raised());

        let timing = SyncTiming::default();
        assert_eq!(timing.effective_hold(1e18, false), MAX_SYNC_HOLD);
        assert_eq!(timing.effective_hold(f64::MAX, true), MAX_SYNC_HOLD);
        assert_eq!(timing.effective_hold(1.5, false), ms(1500));
    }

    #[test]
    fn test_non_finite_seek_keeps_fired_points() {
        let (mut player, _reader) = sync_player();
        let list = events(&[(10.0, 1.0)]);
        player.on_progress(10.0, &list, Instant::now()).unwrap();
        player.complete_pause();

        player.on_seek(f64::NAN);
        player.on_seek(f64::INFINITY);
        assert!(player.is_processed(10.0));
    }

    #[test]
    fn test_pause_point_at_zero_fires_at_start() {
        let (mut player, _reader) = sync_player();
        let list = events(&[(0.0, 0.5)]);
        assert!(player.on_progress(0.0, &list, Instant::now()).is_some());
        assert_eq!(player.active_pause().unwrap().effective, ms(500));
    }
}
