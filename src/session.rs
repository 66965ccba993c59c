//! Sync guard shared between the sync player and the recorder
//!
//! The guard is raised for the whole of a programmatic pause/resume cycle so
//! the recorder does not capture sync pauses as if the user made them.
//! Only [`SyncGuard`] can change the flag; the recorder holds a
//! [`SyncGuardReader`].

use tokio::sync::watch;

/// Write side of the guard, owned by the sync player
#[derive(Debug)]
pub struct SyncGuard {
    tx: watch::Sender<bool>,
}

/// Read-only view of the guard
#[derive(Debug, Clone)]
pub struct SyncGuardReader {
    rx: watch::Receiver<bool>,
}

/// Create a lowered guard and a reader for it
pub fn sync_guard() -> (SyncGuard, SyncGuardReader) {
    let (tx, rx) = watch::channel(false);
    (SyncGuard { tx }, SyncGuardReader { rx })
}

impl SyncGuard {
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn lower(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Hand out another read-only view
    pub fn reader(&self) -> SyncGuardReader {
        SyncGuardReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl SyncGuardReader {
    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readers_follow_writer() {
        let (guard, reader) = sync_guard();
        let second = guard.reader();
        assert!(!reader.is_raised());

        guard.raise();
        assert!(guard.is_raised());
        assert!(reader.is_raised());
        assert!(second.is_raised());

        guard.lower();
        assert!(!reader.is_raised());
        assert!(!second.clone().is_raised());
    }

    #[test]
    fn test_writer_works_without_readers() {
        let (guard, reader) = sync_guard();
        drop(reader);
        guard.raise();
        assert!(guard.is_raised());
    }
}
