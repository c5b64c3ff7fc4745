//! Watch guard for directories that must not gain new entries
//!
//! [`WatchGuard`] subscribes to OS file system events for one directory
//! (non-recursive) and deletes every entry created inside it as soon as the
//! creation event arrives. Event source errors are logged and the loop keeps
//! going.
//!
//! The loop only ends when its [`StopHandle`] is triggered or the process is
//! terminated. The handle is polled between event receives.

use crate::error::{Result, WardenError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, trace, warn};

/// How long a receive waits before the stop flag is checked again
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Shared flag used to stop long-running loops from another thread
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Create a handle that is not stopped
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deletes every entry created inside a guarded directory
pub struct WatchGuard {
    root: PathBuf,
    /// Kept alive so events keep flowing
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    stop: StopHandle,
    purged: u64,
}

impl std::fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchGuard")
            .field("root", &self.root)
            .field("purged", &self.purged)
            .field("stopped", &self.stop.is_stopped())
            .finish()
    }
}

impl WatchGuard {
    /// Start receiving events for `root`
    ///
    /// Events are queued from this point on, even before [`WatchGuard::run`]
    /// is called.
    pub fn new(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(WardenError::InvalidConfiguration(format!(
                "{:?} is not a directory",
                root
            )));
        }

        let (tx, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver is gone once the guard is dropped
            let _ = tx.send(res);
        })?;
        watcher.watch(root, RecursiveMode::NonRecursive)?;
        info!("Watch guard armed for {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
            events,
            stop: StopHandle::new(),
            purged: 0,
        })
    }

    /// Handle that stops [`WatchGuard::run`] from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Guarded directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of entries deleted so far
    pub fn purged(&self) -> u64 {
        self.purged
    }

    /// Process events until stopped; returns the number of deleted entries
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn run(&mut self) -> Result<u64> {
        info!("Guarding {} against new entries", self.root.display());

        while !self.stop.is_stopped() {
            match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(event)) => self.handle_event(event),
                Ok(Err(e)) => error!("Watch error: {}", e),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(WardenError::internal("file system event source closed"));
                }
            }
        }

        info!(
            "Watch guard for {} stopped after removing {} entries",
            self.root.display(),
            self.purged
        );
        Ok(self.purged)
    }

    fn handle_event(&mut self, event: Event) {
        trace!("File system event: {:?}", event);
        if !matches!(event.kind, EventKind::Create(_)) {
            return;
        }

        for path in event.paths {
            if path == self.root {
                continue;
            }
            if purge(&path) {
                self.purged += 1;
            }
        }
    }
}

/// Delete a newly created entry; returns whether something was removed
fn purge(path: &Path) -> bool {
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{:?} vanished before it could be removed", path);
            return false;
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            warn!("Removed new entry {:?} from guarded directory", path);
            true
        }
        Err(e) => {
            error!("Unable to remove {:?}: {}", path, e);
            false
        }
    }
}
