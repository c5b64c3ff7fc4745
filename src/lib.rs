//! # filewarden - file integrity guardian
//!
//! Keeps chosen files exactly as they were when they were backed up.
//!
//! ## Overview
//!
//! filewarden protects a set of files against tampering and accidental change:
//! - Back up files or whole directory trees into compressed zstd artifacts
//! - Reconcile tracked files against their backups, restoring anything that
//!   went missing or drifted
//! - Record a line diff of every drift in an append-only change log before
//!   the file is reverted
//! - Guard a directory so that any newly created entry is deleted at once
//!
//! ## Architecture
//!
//! - **Fingerprints**: size, mtime and a base64 SHA-256 of the live file,
//!   recomputed on every check
//! - **Artifacts**: one zstd frame per tracked file, stored under a random
//!   15 character name in the backup directory
//! - **Backup index**: SQLite database with one record per tracked path and
//!   the change log
//! - **Legacy ledger**: optional pipe-delimited text mirror of new records
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filewarden::{Warden, WardenConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let warden = Warden::open(WardenConfig::with_home("/opt/filewarden"))?;
//!
//! // Back up a file (overwriting any previous backup)
//! warden.backup(Path::new("/etc/hosts"), true)?;
//!
//! // Later: put everything back the way it was
//! let report = warden.reconcile()?;
//! for path in report.modified.iter().chain(&report.missing) {
//!     println!("restored {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarding a directory
//!
//! ```rust,no_run
//! # use filewarden::{Warden, WardenConfig};
//! # use std::path::Path;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let warden = Warden::open(WardenConfig::default())?;
//! let mut guard = warden.watch_guard(Path::new("/etc/cron.d"))?;
//! let stop = guard.stop_handle();
//! std::thread::spawn(move || guard.run());
//! // ...
//! stop.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] with [`WardenError`]. Refusing to
//! overwrite an existing backup aborts a backup run; every other per-file
//! problem is reported in the run's report and the run moves on.
//!
//! ## Module Organization
//!
//! - [`warden`]: the [`Warden`] facade and its builder
//! - [`backup`]: backup pipeline
//! - [`verification`]: reconciler
//! - [`fs_watcher`]: watch guard
//! - [`index`]: backup index trait and SQLite store
//! - [`ledger`]: legacy text ledger
//! - [`compression`], [`diff`], [`fingerprint`]: building blocks
//! - [`config`], [`types`], [`error`]: shared definitions

pub mod backup;
pub mod compression;
pub mod config;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod fs_watcher;
pub mod index;
pub mod ledger;
pub mod types;
pub mod utils;
pub mod verification;
pub mod warden;

// Re-export main types for convenience
pub use backup::BackupPipeline;
pub use compression::{ArchiveCodec, CodecStats};
pub use config::WardenConfig;
pub use error::{Result, WardenError};
pub use fs_watcher::{StopHandle, WatchGuard};
pub use index::{BackupIndex, SqliteIndex};
pub use ledger::{Ledger, LedgerLine};
pub use types::*;
pub use verification::Reconciler;
pub use warden::{Warden, WardenBuilder};
