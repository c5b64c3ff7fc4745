//! Reconciliation of tracked files against their backups
//!
//! For every tracked record the reconciler compares the live file with the
//! recorded hash and heals any drift by restoring the last backup:
//!
//! | Live file                 | State      | Action                                   |
//! |---------------------------|------------|------------------------------------------|
//! | hash matches              | Unchanged  | none                                     |
//! | gone                      | Missing    | restore, no diff                         |
//! | hash differs              | Modified   | diff or marker, log entry, restore       |
//!
//! Drifted content is never accepted. It is documented in the change log and
//! then overwritten.
//!
//! Restores go through a staging file: the artifact is decompressed into a
//! uniquely named temporary file in the staging directory, copied over the
//! live path, and the staging file is removed when it goes out of scope.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use filewarden::config::WardenConfig;
//! use filewarden::index::SqliteIndex;
//! use filewarden::verification::Reconciler;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WardenConfig::default();
//! let index = SqliteIndex::open(&config.database_path)?;
//!
//! let report = Reconciler::new(&config, &index).reconcile()?;
//! for path in &report.modified {
//!     println!("restored drifted file {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

use crate::compression::ArchiveCodec;
use crate::config::WardenConfig;
use crate::diff::{self, BINARY_NO_DIFF, UNREADABLE_NO_DIFF};
use crate::error::{Result, WardenError};
use crate::fingerprint::{fingerprint, hash_data};
use crate::fs_watcher::StopHandle;
use crate::index::BackupIndex;
use crate::types::{ChangeLogEntry, FileState, Fingerprint, ReconcileReport, TrackedFileRecord};
use crate::utils;
use chrono::Utc;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

/// Result of reconciling one record
struct RecordOutcome {
    state: FileState,
    change_logged: bool,
}

/// Compares tracked files with their backups and restores drift
pub struct Reconciler<'a> {
    config: &'a WardenConfig,
    index: &'a dyn BackupIndex,
    codec: ArchiveCodec,
    stop: Option<StopHandle>,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over an index owned by the caller
    pub fn new(config: &'a WardenConfig, index: &'a dyn BackupIndex) -> Self {
        Self {
            config,
            index,
            codec: ArchiveCodec::new(config.compression_level),
            stop: None,
        }
    }

    /// Stop between records once `stop` is triggered
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Reconcile every tracked record
    #[instrument(skip(self))]
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let records = self.index.list_tracked_files()?;
        info!("Reconciling {} tracked files", records.len());
        Ok(self.reconcile_records(records))
    }

    /// Reconcile only records at or below `path`
    #[instrument(skip(self))]
    pub fn reconcile_path(&self, path: &Path) -> Result<ReconcileReport> {
        let records: Vec<_> = self
            .index
            .list_tracked_files()?
            .into_iter()
            .filter(|record| record.filepath.starts_with(path))
            .collect();

        if records.is_empty() {
            return Err(WardenError::NotTracked(path.to_path_buf()));
        }

        info!("Reconciling {} tracked files under {:?}", records.len(), path);
        Ok(self.reconcile_records(records))
    }

    fn reconcile_records(&self, records: Vec<TrackedFileRecord>) -> ReconcileReport {
        let start = Instant::now();
        let mut report = ReconcileReport::default();

        for record in records {
            if self.stop.as_ref().is_some_and(StopHandle::is_stopped) {
                warn!("Reconcile stopped after {} files", report.files_checked);
                report.cancelled = true;
                break;
            }

            report.files_checked += 1;
            match self.reconcile_record(&record) {
                Ok(outcome) => {
                    if outcome.change_logged {
                        report.changes_logged += 1;
                    }
                    report.record(record.filepath, outcome.state);
                }
                Err(e) => {
                    error!("Unable to reconcile {:?}: {}", record.filepath, e);
                    report.failures.push((record.filepath, e.to_string()));
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Reconcile finished: {} unchanged, {} missing, {} modified, {} failed in {}ms",
            report.unchanged.len(),
            report.missing.len(),
            report.modified.len(),
            report.failures.len(),
            report.duration_ms
        );
        report
    }

    fn reconcile_record(&self, record: &TrackedFileRecord) -> Result<RecordOutcome> {
        let path = record.filepath.as_path();
        let artifact = self.config.artifact_path(&record.artifact_name);

        if fs::symlink_metadata(path).is_err() {
            self.require_artifact(record, &artifact)?;
            warn!("{:?} is missing, restoring from backup", path);
            self.restore(record, &artifact)?;
            info!("Restored missing file {:?}", path);

            // The record may disagree with its own artifact
            let restored = fingerprint(path);
            if restored.content_hash != record.last_known_hash {
                self.refresh_record(record, &restored);
            }
            return Ok(RecordOutcome {
                state: FileState::Missing,
                change_logged: false,
            });
        }

        let live = fingerprint(path);
        if live.content_hash == record.last_known_hash {
            debug!("{:?} unchanged", path);
            return Ok(RecordOutcome {
                state: FileState::Unchanged,
                change_logged: false,
            });
        }

        if live.is_directory {
            return Err(WardenError::RestoreFailed(format!(
                "{:?} is now a directory, not replacing it",
                path
            )));
        }

        self.require_artifact(record, &artifact)?;
        let staged = self.stage(record, &artifact)?;

        let diff_text = describe_drift(staged.path(), path, &live);
        warn!(path = ?path, diff = %diff_text, "File modified, restoring from backup");

        let time_of_change = match live.modified {
            Some(_) => live.timestamp(),
            None => utils::format_timestamp(Utc::now()),
        };
        let entry = ChangeLogEntry {
            filepath: path.to_path_buf(),
            time_of_change,
            diff_hash: hash_data(diff_text.as_bytes()),
            diff_text,
        };
        let change_logged = match self.index.append_change_log(&entry) {
            Ok(()) => true,
            Err(e) if e.is_metadata() => {
                warn!("Unable to record change for {:?}: {}", path, e);
                false
            }
            Err(e) => {
                error!("Change log append failed for {:?}: {}", path, e);
                false
            }
        };

        write_live(path, staged.path())?;
        drop(staged);
        info!("Restored modified file {:?}", path);

        let restored = fingerprint(path);
        if restored.content_hash != record.last_known_hash {
            self.refresh_record(record, &restored);
        }

        Ok(RecordOutcome {
            state: FileState::Modified,
            change_logged,
        })
    }

    fn require_artifact(&self, record: &TrackedFileRecord, artifact: &Path) -> Result<()> {
        if artifact.is_file() {
            Ok(())
        } else {
            Err(WardenError::ArtifactMissing {
                path: record.filepath.clone(),
                artifact: record.artifact_name.clone(),
            })
        }
    }

    /// Decompress the artifact into a fresh staging file
    fn stage(&self, record: &TrackedFileRecord, artifact: &Path) -> Result<NamedTempFile> {
        let staged = tempfile::Builder::new()
            .prefix(&format!("{}.", record.display_name))
            .suffix(".restore")
            .tempfile_in(&self.config.staging_dir)?;

        self.codec.decompress_file(artifact, staged.path())?;
        debug!("Staged {} at {:?}", record.artifact_name, staged.path());
        Ok(staged)
    }

    fn restore(&self, record: &TrackedFileRecord, artifact: &Path) -> Result<()> {
        let staged = self.stage(record, artifact)?;
        write_live(&record.filepath, staged.path())
    }

    fn refresh_record(&self, record: &TrackedFileRecord, restored: &Fingerprint) {
        let refreshed = TrackedFileRecord {
            last_backup_time: restored.timestamp(),
            last_known_hash: restored.content_hash.clone(),
            ..record.clone()
        };
        match self.index.upsert_tracked_file(&refreshed) {
            Ok(()) => debug!("Refreshed recorded hash of {:?}", record.filepath),
            Err(e) => warn!("Unable to refresh record of {:?}: {}", record.filepath, e),
        }
    }
}

/// Diff text recorded for a drifted file
///
/// Never fails: when the live side can't be read or classified the restore
/// still goes ahead, with [`UNREADABLE_NO_DIFF`] in the change log.
fn describe_drift(staged: &Path, live_path: &Path, live: &Fingerprint) -> String {
    // Dangling symlink, FIFO, device or no read permission
    if live.content_hash.is_empty() {
        warn!("{:?} is not a readable regular file, no diff", live_path);
        return UNREADABLE_NO_DIFF.to_string();
    }

    let diff = diff::is_human_readable(live_path).and_then(|text| {
        if text {
            diff::diff_files(staged, live_path)
        } else {
            info!("{:?} is binary, no diff", live_path);
            Ok(BINARY_NO_DIFF.to_string())
        }
    });

    diff.unwrap_or_else(|e| {
        warn!("Unable to diff {:?}: {}", live_path, e);
        UNREADABLE_NO_DIFF.to_string()
    })
}

/// Replace `dest` with the content of `staged`
///
/// A regular file being replaced keeps its permissions.
fn write_live(dest: &Path, staged: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let permissions = fs::symlink_metadata(dest)
        .ok()
        .filter(|metadata| metadata.is_file())
        .map(|metadata| readable(metadata.permissions()));

    match fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(WardenError::RestoreFailed(format!(
                "cannot replace {:?}: {}",
                dest, e
            )))
        }
    }

    let mut source = File::open(staged)?;
    let mut output = File::create(dest)?;
    io::copy(&mut source, &mut output)?;
    if let Some(permissions) = permissions {
        output.set_permissions(permissions)?;
    }
    output.sync_all()?;
    Ok(())
}

/// Keep the owner read bit so the next pass can fingerprint the file
#[cfg(unix)]
fn readable(permissions: fs::Permissions) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    fs::Permissions::from_mode(permissions.mode() | 0o400)
}

#[cfg(not(unix))]
fn readable(permissions: fs::Permissions) -> fs::Permissions {
    permissions
}
