//! Playback engine
//!
//! Owns the media player, the pause map, the recorder and the sync player,
//! and serializes everything that can touch them (commands, player
//! notifications, the resume deadline and the countdown tick) onto a single
//! task. The sync guard is the only mutual exclusion between a sync pause in
//! progress and the recorder.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{PauseSyncError, Result};
use crate::pause::{PauseEvent, PauseEventList};
use crate::player::{MediaPlayer, PlayerEvent};
use crate::recorder::EventRecorder;
use crate::session::sync_guard;

use super::mode::{Mode, ModeChange, ModeState};
use super::player::{SyncPlayer, SyncTiming};
use super::{EngineCommand, EngineStatus, Transport};

/// Single-task event loop hosting one playback session
pub struct PlaybackEngine {
    /// Identifies this session in logs
    session_id: String,
    /// Media player being driven
    player: Box<dyn MediaPlayer>,
    /// The pause map (Pause Event Store)
    events: PauseEventList,
    /// Captures user pauses in recording mode
    recorder: EventRecorder,
    /// Reproduces pauses in sync mode
    sync: SyncPlayer,
    /// Recording/sync arbitration and the loaded source
    modes: ModeState,
    /// Last play state reported by the player
    playing: bool,
    /// Countdown display refresh period
    countdown_tick: Duration,
    /// Command receiver
    cmd_rx: mpsc::Receiver<EngineCommand>,
    /// Player notification receiver
    player_rx: mpsc::UnboundedReceiver<PlayerEvent>,
    /// Status broadcaster
    status_tx: broadcast::Sender<EngineStatus>,
    /// Teardown signal
    shutdown: CancellationToken,
}

impl PlaybackEngine {
    /// Create a new engine around `player`, whose notifications arrive on `player_rx`
    pub fn new(
        config: &Config,
        player: Box<dyn MediaPlayer>,
        player_rx: mpsc::UnboundedReceiver<PlayerEvent>,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        status_tx: broadcast::Sender<EngineStatus>,
    ) -> Self {
        let (guard, guard_reader) = sync_guard();
        let mut sync = SyncPlayer::new(SyncTiming::from(&config.sync), guard);
        sync.set_demo_mode(config.sync.demo_mode);

        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            player,
            events: PauseEventList::new(),
            recorder: EventRecorder::new(guard_reader),
            sync,
            modes: ModeState::new(),
            playing: false,
            countdown_tick: config.sync.countdown_tick(),
            cmd_rx,
            player_rx,
            status_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start with an existing pause map
    pub fn with_events(mut self, events: PauseEventList) -> Self {
        self.events = events;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Token that stops the engine when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the engine until shutdown; returns the final pause map.
    ///
    /// Only fatal errors (driving a detached player) end the loop with an
    /// error. Anything else is reported as [`EngineStatus::Rejected`] and the
    /// loop carries on.
    pub async fn run(mut self) -> Result<PauseEventList> {
        info!(
            "Playback engine starting for session: {} ({} pause events)",
            self.session_id,
            self.events.len()
        );
        self.broadcast(EngineStatus::from(self.modes.mode()));

        // Countdown display ticker, present only while a sync pause is active
        let mut countdown: Option<Interval> = None;

        loop {
            match (self.sync.is_pausing(), countdown.is_some()) {
                (true, false) => {
                    let start = Instant::now() + self.countdown_tick;
                    countdown = Some(tokio::time::interval_at(start, self.countdown_tick));
                }
                (false, true) => countdown = None,
                _ => {}
            }

            // Re-read every iteration so a cancelled pause can never resume.
            let resume_at = self.sync.resume_deadline();

            let outcome = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }

                // Handle commands
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::Shutdown) => {
                            info!("Shutdown command received");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            info!("Command channel closed");
                            break;
                        }
                    }
                }

                // Handle player notifications
                Some(event) = self.player_rx.recv() => self.handle_player_event(event),

                // Resume after a sync pause
                _ = async {
                    match resume_at {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => self.finish_sync_pause(),

                // Countdown display
                _ = async {
                    match countdown.as_mut() {
                        Some(ticker) => {
                            ticker.tick().await;
                        }
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some(remaining_secs) = self.sync.remaining_secs(Instant::now()) {
                        self.broadcast(EngineStatus::Countdown { remaining_secs });
                    }
                    Ok(())
                }
            };

            if let Err(err) = outcome {
                if err.is_fatal() {
                    error!("Playback engine stopping: {}", err);
                    self.teardown();
                    return Err(err);
                }
                self.reject(err);
            }
        }

        self.teardown();
        Ok(self.events)
    }

    fn teardown(&mut self) {
        self.sync.cancel();
        self.recorder.reset();
        info!("Playback engine stopped (session {})", self.session_id);
    }

    fn broadcast(&self, status: EngineStatus) {
        // No subscribers is fine.
        let _ = self.status_tx.send(status);
    }

    fn reject(&self, err: PauseSyncError) {
        warn!("Rejected: {}", err);
        self.broadcast(EngineStatus::Rejected(err.to_string()));
    }

    fn handle_command(&mut self, cmd: EngineCommand) -> Result<()> {
        match cmd {
            EngineCommand::LoadSource(source) => self.load_source(source)?,
            EngineCommand::SetRecording {
                enabled,
                discard_existing,
            } => {
                if enabled && discard_existing && !self.events.is_empty() {
                    info!("Discarding {} pause events for new recording", self.events.len());
                    self.events.clear();
                    self.broadcast(EngineStatus::EventsUpdated { count: 0 });
                }
                let change = self.modes.request_recording(enabled);
                self.apply_mode_change(change)?;
            }
            EngineCommand::SetSync(enabled) => {
                let change = self.modes.request_sync(enabled, self.events.len())?;
                self.apply_mode_change(change)?;
            }
            EngineCommand::SetDemoMode(enabled) => {
                info!("Demo mode {}", if enabled { "on" } else { "off" });
                self.sync.set_demo_mode(enabled);
                self.broadcast(EngineStatus::DemoMode(enabled));
            }
            EngineCommand::ImportEvents(events) => {
                self.events.replace(events)?;
                self.after_import()?;
            }
            EngineCommand::ImportJson(payload) => {
                self.events.import_json(&payload)?;
                self.after_import()?;
            }
            EngineCommand::ClearEvents => {
                self.events.clear();
                self.broadcast(EngineStatus::EventsUpdated { count: 0 });
                if self.modes.is_syncing() {
                    let change = self.modes.request_sync(false, 0)?;
                    self.apply_mode_change(change)?;
                }
            }
            EngineCommand::Restart => {
                if self.modes.source().is_none() {
                    return Err(PauseSyncError::NoSource);
                }
                info!("Restarting playback from the beginning");
                self.restart_from_zero()?;
            }
            EngineCommand::ResetAll => {
                let change = self.modes.reset();
                self.apply_mode_change(change)?;
                self.events.clear();
                self.broadcast(EngineStatus::EventsUpdated { count: 0 });
            }
            EngineCommand::Transport(transport) => self.transport(transport)?,
            EngineCommand::Snapshot(reply) => {
                let _ = reply.send(self.events.clone());
            }
            EngineCommand::Shutdown => {}
        }
        Ok(())
    }

    fn load_source(&mut self, source: String) -> Result<()> {
        info!("Loading source: {}", source);
        self.player.load(&source)?;
        self.playing = false;

        let change = self.modes.load_source(source.clone());
        self.apply_mode_change(change)?;
        self.recorder.reset();
        self.sync.begin_run();

        self.broadcast(EngineStatus::SourceLoaded { source });
        Ok(())
    }

    fn after_import(&mut self) -> Result<()> {
        info!("Pause map replaced ({} events)", self.events.len());
        self.broadcast(EngineStatus::EventsUpdated {
            count: self.events.len(),
        });

        if self.modes.is_syncing() {
            if self.events.is_empty() {
                let change = self.modes.request_sync(false, 0)?;
                self.apply_mode_change(change)?;
            } else {
                self.restart_from_zero()?;
            }
        }
        Ok(())
    }

    fn apply_mode_change(&mut self, change: ModeChange) -> Result<()> {
        if change.is_noop() {
            return Ok(());
        }

        if change.left(Mode::Syncing) {
            self.sync.cancel();
            self.recorder.set_sync_active(false);
        }
        if change.left(Mode::Recording) {
            self.recorder.set_recording(false);
        }
        if change.entered(Mode::Recording) {
            self.recorder.set_recording(true);
        }

        info!("Mode {:?} -> {:?}", change.from, change.to);
        self.broadcast(EngineStatus::from(change.to));

        if change.entered(Mode::Syncing) {
            self.recorder.set_sync_active(true);
            self.restart_from_zero()?;
        }
        Ok(())
    }

    /// Fresh sync run: forget fired points, rewind and play
    fn restart_from_zero(&mut self) -> Result<()> {
        self.sync.begin_run();
        self.player.seek(0.0)?;
        self.player.play()
    }

    fn transport(&mut self, transport: Transport) -> Result<()> {
        if self.modes.source().is_none() {
            return Err(PauseSyncError::NoSource);
        }

        match transport {
            Transport::Play => self.player.play(),
            Transport::Pause => self.player.pause(),
            Transport::TogglePlay if self.playing => self.player.pause(),
            Transport::TogglePlay => self.player.play(),
            Transport::Seek(seconds) if !seconds.is_finite() => {
                Err(PauseSyncError::InvalidSeek(seconds))
            }
            Transport::Seek(seconds) => self.player.seek(seconds),
        }
    }

    fn handle_player_event(&mut self, event: PlayerEvent) -> Result<()> {
        match event {
            PlayerEvent::Play => {
                self.playing = true;
                if let Some(event) = self.recorder.on_play(Instant::now()) {
                    self.store_recorded(event)?;
                }
            }
            PlayerEvent::Pause => {
                self.playing = false;
                if self.recorder.is_recording() {
                    let media_time = self.player.current_time()?;
                    if self.recorder.on_pause(media_time, Instant::now()) {
                        debug!("Recording pause at {:.2}s", media_time);
                    }
                }
            }
            PlayerEvent::Progress { played_seconds } => {
                if self.modes.is_syncing() && self.playing && !self.events.is_empty() {
                    let started =
                        self.sync
                            .on_progress(played_seconds, &self.events, Instant::now());
                    if let Some(pause) = started {
                        self.player.pause()?;
                        self.broadcast(EngineStatus::SyncPaused {
                            event: pause.event,
                            effective_secs: pause.effective.as_secs_f64(),
                        });
                    }
                }
            }
            PlayerEvent::Seek => {
                let position = self.player.current_time()?;
                self.sync.on_seek(position);
            }
            PlayerEvent::Duration(seconds) => {
                debug!("Media length: {:.2}s", seconds);
                self.broadcast(EngineStatus::MediaLength { seconds });
            }
            PlayerEvent::Ended => {
                self.playing = false;
                info!("Playback reached the end");
                self.broadcast(EngineStatus::Ended);
            }
        }
        Ok(())
    }

    fn store_recorded(&mut self, event: PauseEvent) -> Result<()> {
        self.events.insert(event)?;
        info!(
            "Recorded pause at {:.2}s for {:.2}s",
            event.timestamp, event.duration
        );
        self.broadcast(EngineStatus::PauseRecorded(event));
        self.broadcast(EngineStatus::EventsUpdated {
            count: self.events.len(),
        });
        Ok(())
    }

    fn finish_sync_pause(&mut self) -> Result<()> {
        let Some(pause) = self.sync.complete_pause() else {
            return Ok(());
        };

        if self.modes.is_syncing() {
            self.player.play()?;
        }
        self.broadcast(EngineStatus::SyncResumed {
            timestamp: pause.event.timestamp,
        });
        Ok(())
    }
}

/// Create command and status channels for an engine
pub fn create_engine_channels() -> (
    mpsc::Sender<EngineCommand>,
    mpsc::Receiver<EngineCommand>,
    broadcast::Sender<EngineStatus>,
    broadcast::Receiver<EngineStatus>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    // Countdown ticks are chatty; leave room for slow subscribers.
    let (status_tx, status_rx) = broadcast::channel(64);
    (cmd_tx, cmd_rx, status_tx, status_rx)
}
