//! Configuration management for pausesync

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Sync playback timing
    #[serde(default)]
    pub sync: SyncConfig,

    /// Player configuration
    #[serde(default)]
    pub player: PlayerConfig,

    /// Pause map storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Progress notifications closer together than this are ignored (ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How far past a pause point the position may be and still trigger it
    #[serde(default = "default_arrival_window_secs")]
    pub arrival_window_secs: f64,

    /// A seek re-arms already-fired pause points within this distance
    #[serde(default = "default_seek_rearm_radius_secs")]
    pub seek_rearm_radius_secs: f64,

    /// Shortest pause held during sync playback
    #[serde(default = "default_min_pause_secs")]
    pub min_pause_secs: f64,

    /// Shortest pause held during sync playback in demo mode
    #[serde(default = "default_demo_min_pause_secs")]
    pub demo_min_pause_secs: f64,

    /// Countdown display refresh period (ms)
    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,

    /// Start with demo mode enabled
    #[serde(default)]
    pub demo_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Interval between progress notifications (ms)
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Media length used by the simulated player
    #[serde(default = "default_media_length_secs")]
    pub media_length_secs: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Where pause maps are saved by default
    pub pause_map_path: Option<PathBuf>,
}

// Default value functions
fn default_debounce_ms() -> u64 {
    50
}

fn default_arrival_window_secs() -> f64 {
    0.2
}

fn default_seek_rearm_radius_secs() -> f64 {
    5.0
}

fn default_min_pause_secs() -> f64 {
    0.3
}

fn default_demo_min_pause_secs() -> f64 {
    2.0
}

fn default_countdown_tick_ms() -> u64 {
    100
}

fn default_progress_interval_ms() -> u64 {
    200
}

fn default_media_length_secs() -> f64 {
    600.0
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            arrival_window_secs: default_arrival_window_secs(),
            seek_rearm_radius_secs: default_seek_rearm_radius_secs(),
            min_pause_secs: default_min_pause_secs(),
            demo_min_pause_secs: default_demo_min_pause_secs(),
            countdown_tick_ms: default_countdown_tick_ms(),
            demo_mode: false,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            media_length_secs: default_media_length_secs(),
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        // A zero period would make the countdown interval panic.
        Duration::from_millis(self.countdown_tick_ms.max(1))
    }
}

impl PlayerConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Where pause maps are read from and written to when no path is given
    pub fn pause_map_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store.pause_map_path {
            return Ok(path.clone());
        }

        let proj_dirs = directories::ProjectDirs::from("dev", "pausesync", "pausesync")
            .context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().join("pause_map.json"))
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "pausesync", "pausesync")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}
