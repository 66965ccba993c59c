//! Pause event store: the ordered pause map shared by recording and sync playback

use anyhow::{Context, Result as AnyResult};
use serde::Serialize;
use std::path::Path;

use super::PauseEvent;
use crate::error::Result;

/// Ordered list of pause events, sorted ascending by timestamp.
///
/// Every mutation validates its input and re-establishes the ordering, so the
/// list is always well-formed and sorted after any operation returns. Equal
/// timestamps are allowed and keep their arrival order.
///
/// Serializes as a bare JSON array of `{ "timestamp", "duration" }` objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PauseEventList {
    events: Vec<PauseEvent>,
}

impl PauseEventList {
    /// Create a new empty list
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Build a list from arbitrary caller input, validating and sorting it
    pub fn from_events(events: Vec<PauseEvent>) -> Result<Self> {
        let mut list = Self::new();
        list.replace(events)?;
        Ok(list)
    }

    /// Insert a single event at its sorted position
    pub fn insert(&mut self, event: PauseEvent) -> Result<()> {
        event.validate()?;
        // Upper bound keeps earlier events with the same timestamp first.
        let index = self
            .events
            .partition_point(|existing| existing.timestamp <= event.timestamp);
        self.events.insert(index, event);
        Ok(())
    }

    /// Replace the whole list.
    ///
    /// A single malformed event rejects the replacement and leaves the list
    /// untouched.
    pub fn replace(&mut self, events: Vec<PauseEvent>) -> Result<()> {
        for event in &events {
            event.validate()?;
        }
        let mut events = events;
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.events = events;
        Ok(())
    }

    /// Replace the list from a JSON array (file contents or pasted text)
    pub fn import_json(&mut self, payload: &str) -> Result<()> {
        let events: Vec<PauseEvent> = serde_json::from_str(payload)?;
        self.replace(events)
    }

    /// Pretty-printed JSON array suitable for export or the clipboard
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.events)?)
    }

    /// Load a pause map file
    pub fn load(path: &Path) -> AnyResult<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pause map: {:?}", path))?;

        let mut list = Self::new();
        list.import_json(&contents)
            .with_context(|| format!("Failed to import pause map: {:?}", path))?;
        Ok(list)
    }

    /// Write the pause map to a file, creating parent directories as needed
    pub fn save(&self, path: &Path) -> AnyResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create pause map directory: {:?}", parent))?;
        }

        let contents = self.to_json_pretty().context("Failed to serialize pause map")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write pause map: {:?}", path))?;
        Ok(())
    }

    /// Drop events that repeat an earlier event's exact timestamp.
    ///
    /// Returns the number of removed events.
    pub fn dedup_timestamps(&mut self) -> usize {
        let before = self.events.len();
        self.events.dedup_by(|later, earlier| later.timestamp == earlier.timestamp);
        before - self.events.len()
    }

    /// Clear the list
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PauseEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[PauseEvent] {
        &self.events
    }

    /// Sum of all recorded pause durations, in seconds
    pub fn total_pause_secs(&self) -> f64 {
        self.events.iter().map(|event| event.duration).sum()
    }
}
