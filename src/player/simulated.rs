//! Simulated media player driven by the tokio clock
//!
//! Models a media element of fixed length: the position advances in real
//! time while playing and progress notifications are emitted at a fixed
//! cadence. Used by the CLI shell and for exercising the engine without a
//! real decoder.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::{MediaPlayer, PlayerEvent};
use crate::error::{PauseSyncError, Result};

#[derive(Debug)]
struct Timeline {
    source: Option<String>,
    length: f64,
    /// Position when playback last started or stopped
    position: f64,
    /// Wall-clock start of the current playing stretch
    anchor: Option<Instant>,
}

impl Timeline {
    fn position_at(&self, now: Instant) -> f64 {
        match self.anchor {
            Some(anchor) => {
                let elapsed = now.saturating_duration_since(anchor).as_secs_f64();
                (self.position + elapsed).min(self.length)
            }
            None => self.position,
        }
    }

    fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    /// Freeze the position at `now`
    fn stop(&mut self, now: Instant) {
        self.position = self.position_at(now);
        self.anchor = None;
    }
}

/// In-process stand-in for a browser/desktop media element
pub struct SimulatedPlayer {
    timeline: Arc<Mutex<Timeline>>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    progress_interval: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl SimulatedPlayer {
    /// Create a player for media of `length_secs`, reporting progress every
    /// `progress_interval` while playing.
    pub fn new(
        length_secs: f64,
        progress_interval: Duration,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Self {
        Self {
            timeline: Arc::new(Mutex::new(Timeline {
                source: None,
                length: length_secs.max(0.0),
                position: 0.0,
                anchor: None,
            })),
            events,
            progress_interval,
            ticker: None,
        }
    }

    /// Whether the media is currently playing
    pub fn is_playing(&self) -> bool {
        lock(&self.timeline).is_playing()
    }

    fn attached(&self) -> Result<MutexGuard<'_, Timeline>> {
        let timeline = lock(&self.timeline);
        if timeline.source.is_none() {
            return Err(PauseSyncError::PlayerDetached);
        }
        Ok(timeline)
    }

    fn emit(&self, event: PlayerEvent) {
        // The engine going away is the only way this fails.
        let _ = self.events.send(event);
    }

    fn spawn_ticker(&mut self) {
        if self.ticker.is_some() {
            return;
        }

        let timeline = self.timeline.clone();
        let events = self.events.clone();
        let period = self.progress_interval;

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let (played_seconds, ended) = {
                    let mut timeline = lock(&timeline);
                    if timeline.source.is_none() || !timeline.is_playing() {
                        continue;
                    }
                    let now = Instant::now();
                    let position = timeline.position_at(now);
                    let ended = position >= timeline.length;
                    if ended {
                        timeline.stop(now);
                    }
                    (position, ended)
                };

                if events.send(PlayerEvent::Progress { played_seconds }).is_err() {
                    break;
                }

                if ended {
                    debug!("Simulated media reached the end at {:.2}s", played_seconds);
                    let _ = events.send(PlayerEvent::Pause);
                    if events.send(PlayerEvent::Ended).is_err() {
                        break;
                    }
                }
            }
        }));
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn load(&mut self, source: &str) -> Result<()> {
        let length = {
            let mut timeline = lock(&self.timeline);
            timeline.source = Some(source.to_string());
            timeline.position = 0.0;
            timeline.anchor = None;
            timeline.length
        };

        info!("Simulated player loaded {} ({:.1}s)", source, length);
        self.spawn_ticker();
        self.emit(PlayerEvent::Duration(length));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let started = {
            let mut timeline = self.attached()?;
            if timeline.is_playing() {
                false
            } else {
                timeline.anchor = Some(Instant::now());
                true
            }
        };

        if started {
            self.emit(PlayerEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let stopped = {
            let mut timeline = self.attached()?;
            if timeline.is_playing() {
                timeline.stop(Instant::now());
                true
            } else {
                false
            }
        };

        if stopped {
            self.emit(PlayerEvent::Pause);
        }
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        {
            let mut timeline = self.attached()?;
            if !seconds.is_finite() {
                return Err(PauseSyncError::InvalidSeek(seconds));
            }
            timeline.position = seconds.clamp(0.0, timeline.length);
            if timeline.is_playing() {
                timeline.anchor = Some(Instant::now());
            }
        }

        self.emit(PlayerEvent::Seek);
        Ok(())
    }

    fn current_time(&self) -> Result<f64> {
        Ok(self.attached()?.position_at(Instant::now()))
    }
}

impl Drop for SimulatedPlayer {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

fn lock(timeline: &Mutex<Timeline>) -> MutexGuard<'_, Timeline> {
    timeline
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
