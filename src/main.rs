//! pausesync CLI
//!
//! Replays a pause map over a simulated player, records a new one from
//! keyboard input, or validates an existing file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pausesync::config::Config;
use pausesync::logging::{get_log_dir, init_logging};
use pausesync::pause::PauseEventList;
use pausesync::player::SimulatedPlayer;
use pausesync::sync::{create_engine_channels, EngineCommand, EngineStatus, PlaybackEngine, Transport};

#[derive(Parser)]
#[command(name = "pausesync", version, about = "Record and replay media pause maps")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play simulated media, pausing wherever the map says
    Replay {
        /// Pause map (JSON array of {timestamp, duration})
        map: PathBuf,
        /// Hold every pause for at least the demo minimum
        #[arg(long)]
        demo: bool,
        /// Simulated media length in seconds
        #[arg(long)]
        length: Option<f64>,
    },
    /// Record a pause map from stdin: `p` play/pause, `s <secs>` seek, `q` quit
    Record {
        /// Where to save the map
        #[arg(long)]
        out: Option<PathBuf>,
        /// Simulated media length in seconds
        #[arg(long)]
        length: Option<f64>,
        /// Add to the events already in the output file
        #[arg(long)]
        keep: bool,
    },
    /// Validate a pause map and print it normalized
    Check {
        map: PathBuf,
        /// Keep only the first event per timestamp
        #[arg(long)]
        dedup: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _log_guard = init_logging()?;
    info!("pausesync {} starting, logs in {:?}", env!("CARGO_PKG_VERSION"), get_log_dir().ok());

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded from {:?}", config.config_path().ok());

    match cli.command {
        Command::Check { map, dedup } => check(&map, dedup),
        Command::Replay { map, demo, length } => {
            if let Some(length) = length {
                config.player.media_length_secs = length;
            }
            let events = PauseEventList::load(&map)?;
            ensure_replayable(&events, &map)?;
            info!("Loaded {} pause events from {:?}", events.len(), map);

            let source = format!("simulated://{}", map.display());
            let mut commands = vec![EngineCommand::LoadSource(source)];
            if demo {
                commands.push(EngineCommand::SetDemoMode(true));
            }
            commands.push(EngineCommand::SetSync(true));

            run_session(&config, events, commands, false)?;
            Ok(())
        }
        Command::Record { out, length, keep } => {
            if let Some(length) = length {
                config.player.media_length_secs = length;
            }
            let out = match out {
                Some(path) => path,
                None => config.pause_map_path()?,
            };

            let existing = if keep && out.exists() {
                PauseEventList::load(&out)?
            } else {
                PauseEventList::new()
            };

            let commands = vec![
                EngineCommand::LoadSource("simulated://recording".to_string()),
                EngineCommand::SetRecording {
                    enabled: true,
                    discard_existing: !keep,
                },
            ];

            let events = run_session(&config, existing, commands, true)?;
            events.save(&out)?;
            info!("Saved {} pause events to {:?}", events.len(), out);
            Ok(())
        }
    }
}

/// Sync playback refuses an empty map, so there is nothing to replay
fn ensure_replayable(events: &PauseEventList, map: &Path) -> Result<()> {
    if events.is_empty() {
        anyhow::bail!("No pause events in {:?}; record or import some first", map);
    }
    Ok(())
}

fn check(map: &Path, dedup: bool) -> Result<()> {
    let mut events = PauseEventList::load(map)?;
    if dedup {
        let removed = events.dedup_timestamps();
        if removed > 0 {
            warn!("Removed {} duplicate timestamp(s)", removed);
        }
    }

    println!("{}", events.to_json_pretty()?);
    info!(
        "{} pause events, {:.1}s of pauses in total",
        events.len(),
        events.total_pause_secs()
    );
    Ok(())
}

/// Run one engine session over a simulated player until it stops
fn run_session(
    config: &Config,
    events: PauseEventList,
    startup: Vec<EngineCommand>,
    interactive: bool,
) -> Result<PauseEventList> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let (cmd_tx, cmd_rx, status_tx, status_rx) = create_engine_channels();

    let (player_tx, player_rx) = mpsc::unbounded_channel();
    let player = SimulatedPlayer::new(
        config.player.media_length_secs,
        config.player.progress_interval(),
        player_tx,
    );
    let engine = PlaybackEngine::new(config, Box::new(player), player_rx, cmd_rx, status_tx)
        .with_events(events);
    let shutdown = engine.shutdown_token();

    // Ctrl+C tears the engine down; pending pauses are dropped, not resumed.
    let ctrl_c_token = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        ctrl_c_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    if interactive {
        spawn_stdin_reader(cmd_tx.clone(), shutdown.clone());
    }

    runtime.block_on(async move {
        tokio::spawn(report_status(status_rx, shutdown.clone(), !interactive));

        let engine_handle = tokio::spawn(engine.run());

        for cmd in startup {
            if cmd_tx.send(cmd).await.is_err() {
                break;
            }
        }

        let events = match engine_handle.await {
            Ok(result) => result?,
            Err(e) => {
                error!("Playback engine task failed: {}", e);
                anyhow::bail!("Playback engine task failed: {}", e);
            }
        };
        Ok(events)
    })
}

/// Log engine status updates; optionally stop the session when media ends
async fn report_status(
    mut status_rx: broadcast::Receiver<EngineStatus>,
    shutdown: CancellationToken,
    stop_at_end: bool,
) {
    loop {
        let status = tokio::select! {
            _ = shutdown.cancelled() => break,
            status = status_rx.recv() => status,
        };

        match status {
            Ok(EngineStatus::SyncPaused {
                event,
                effective_secs,
            }) => info!(
                "Paused at {:.2}s, resuming in {:.1}s",
                event.timestamp, effective_secs
            ),
            Ok(EngineStatus::Countdown { remaining_secs }) => {
                info!("Resuming in {:.1}s", remaining_secs)
            }
            Ok(EngineStatus::SyncResumed { timestamp }) => {
                info!("Resumed after pause at {:.2}s", timestamp)
            }
            Ok(EngineStatus::PauseRecorded(event)) => info!(
                "Recorded {:.2}s pause at {:.2}s",
                event.duration, event.timestamp
            ),
            Ok(EngineStatus::Rejected(reason)) => warn!("{}", reason),
            Ok(EngineStatus::Ended) => {
                info!("End of media");
                if stop_at_end {
                    shutdown.cancel();
                    break;
                }
            }
            Ok(other) => info!("{:?}", other),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Status reporter skipped {} updates", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// One line of interactive input
enum StdinInput {
    Command(EngineCommand),
    Quit,
    Skip,
}

fn parse_input(line: &str) -> StdinInput {
    let mut parts = line.split_whitespace();

    match (parts.next(), parts.next()) {
        (Some("p"), _) => StdinInput::Command(EngineCommand::Transport(Transport::TogglePlay)),
        (Some("s"), Some(secs)) => match secs.parse::<f64>() {
            Ok(seconds) if seconds.is_finite() => {
                StdinInput::Command(EngineCommand::Transport(Transport::Seek(seconds)))
            }
            _ => {
                warn!("Not a number of seconds: {}", secs);
                StdinInput::Skip
            }
        },
        (Some("s"), None) => {
            warn!("Seek needs a position in seconds");
            StdinInput::Skip
        }
        (Some("q"), _) => StdinInput::Quit,
        (None, _) => StdinInput::Skip,
        (Some(other), _) => {
            warn!("Unknown command: {}", other);
            StdinInput::Skip
        }
    }
}

/// Translate stdin lines into transport commands on a plain thread
fn spawn_stdin_reader(cmd_tx: mpsc::Sender<EngineCommand>, shutdown: CancellationToken) {
    std::thread::spawn(move || {
        println!("Commands: p = play/pause, s <secs> = seek, q = quit");

        for line in std::io::stdin().lock().lines() {
            if shutdown.is_cancelled() {
                return;
            }
            let Ok(line) = line else { break };

            let cmd = match parse_input(&line) {
                StdinInput::Command(cmd) => cmd,
                StdinInput::Quit => break,
                StdinInput::Skip => continue,
            };

            if cmd_tx.blocking_send(cmd).is_err() {
                return;
            }
        }

        let _ = cmd_tx.blocking_send(EngineCommand::Shutdown);
    });
}
