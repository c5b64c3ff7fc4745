//! Main entry point tying configuration, index and pipelines together
//!
//! [`Warden`] owns the [`WardenConfig`] and the [`SqliteIndex`] handle for one
//! installation and hands both to the pipelines by reference. Every call runs
//! synchronously on the caller's thread.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use filewarden::WardenBuilder;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let warden = WardenBuilder::new("/opt/filewarden")
//!     .compression_level(9)
//!     .build()?;
//!
//! warden.backup(Path::new("/etc/ssh/sshd_config"), true)?;
//!
//! let report = warden.reconcile()?;
//! println!("{} files restored", report.files_restored());
//! # Ok(())
//! # }
//! ```

use crate::backup::BackupPipeline;
use crate::config::WardenConfig;
use crate::error::Result;
use crate::fs_watcher::WatchGuard;
use crate::index::{BackupIndex, SqliteIndex};
use crate::types::{BackupReport, ChangeLogEntry, IndexStats, ReconcileReport, TrackedFileRecord};
use crate::utils;
use crate::verification::Reconciler;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// File integrity guardian for one installation
#[derive(Debug)]
pub struct Warden {
    config: WardenConfig,
    index: SqliteIndex,
}

impl Warden {
    /// Open the installation described by `config`
    ///
    /// Validates the configuration, creates the directory layout if needed and
    /// opens the backup index.
    ///
    /// # Errors
    ///
    /// - [`WardenError::InvalidConfiguration`](crate::WardenError::InvalidConfiguration)
    ///   for unusable settings
    /// - I/O errors while creating the layout
    /// - Store errors while opening the index
    #[instrument(skip(config), fields(home = %config.home_dir.display()))]
    pub fn open(config: WardenConfig) -> Result<Self> {
        config.validate()?;
        utils::ensure_layout(&config)?;
        let index = SqliteIndex::open(&config.database_path)?;
        info!("Opened filewarden home {}", config.home_dir.display());
        Ok(Self { config, index })
    }

    /// Open the installation at `home`, honoring `<home>/config.json`
    pub fn open_home(home: &Path) -> Result<Self> {
        Self::open(WardenConfig::load_or_default(home)?)
    }

    /// Active configuration
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Backup index handle
    pub fn index(&self) -> &SqliteIndex {
        &self.index
    }

    /// Back up a file or directory tree
    ///
    /// `path` is made absolute first, so records are keyed the same way no
    /// matter where the process was started.
    pub fn backup(&self, path: &Path, overwrite: bool) -> Result<BackupReport> {
        let path = absolute(path)?;
        BackupPipeline::new(&self.config, &self.index).run(&path, overwrite)
    }

    /// Reconcile every tracked file
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        self.reconciler().reconcile()
    }

    /// Reconcile tracked files at or below `path`
    pub fn reconcile_path(&self, path: &Path) -> Result<ReconcileReport> {
        let path = absolute(path)?;
        self.reconciler().reconcile_path(&path)
    }

    /// Reconciler bound to this installation
    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.config, &self.index)
    }

    /// Arm a watch guard for `dir`; call [`WatchGuard::run`] to start enforcing
    pub fn watch_guard(&self, dir: &Path) -> Result<WatchGuard> {
        WatchGuard::new(&absolute(dir)?)
    }

    /// Tracked-file and change-log counts
    pub fn stats(&self) -> Result<IndexStats> {
        self.index.stats()
    }

    /// All tracked records
    pub fn tracked_files(&self) -> Result<Vec<TrackedFileRecord>> {
        self.index.list_tracked_files()
    }

    /// Change-log entries, optionally for one path
    pub fn change_log(&self, path: Option<&Path>) -> Result<Vec<ChangeLogEntry>> {
        match path {
            Some(path) => self.index.list_change_log(Some(&absolute(path)?)),
            None => self.index.list_change_log(None),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Builder for [`Warden`] with per-field overrides of the standard layout
///
/// # Examples
///
/// ```rust
/// use filewarden::WardenBuilder;
///
/// let builder = WardenBuilder::new("/srv/guard")
///     .write_ledger(false)
///     .staging_dir("/srv/guard/staging");
/// assert!(!builder.config().write_ledger);
/// ```
#[derive(Debug, Clone)]
pub struct WardenBuilder {
    config: WardenConfig,
}

impl WardenBuilder {
    /// Start from the standard layout under `home`
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            config: WardenConfig::with_home(home),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: WardenConfig) -> Self {
        Self { config }
    }

    /// Directory holding artifacts
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.backup_dir = dir.into();
        self
    }

    /// Directory holding log files
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    /// Directory used for restore staging files
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    /// Location of the SQLite index
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = path.into();
        self
    }

    /// Location of the legacy ledger
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// zstd level for new artifacts
    pub fn compression_level(mut self, level: i32) -> Self {
        self.config.compression_level = level;
        self
    }

    /// Whether new paths are appended to the legacy ledger
    pub fn write_ledger(mut self, enabled: bool) -> Self {
        self.config.write_ledger = enabled;
        self
    }

    /// Configuration built so far
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Open the [`Warden`]
    pub fn build(self) -> Result<Warden> {
        Warden::open(self.config)
    }
}
