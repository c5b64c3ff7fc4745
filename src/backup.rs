//! Backup pipeline
//!
//! Turns a path into compressed artifacts plus index records. Directories are
//! handled one level at a time: each immediate child is backed up by another
//! call to [`BackupPipeline::backup`], which recurses again for child
//! directories.
//!
//! ## Ordering
//!
//! The artifact is always written before any metadata. When an existing
//! backup is replaced, the new artifact is written under a fresh name, the
//! record is switched over, and only then is the old artifact deleted. A
//! record therefore never points at an artifact that is gone.
//!
//! ## Failures
//!
//! - A refused overwrite aborts the whole run ([`WardenError::OverwriteRefused`]).
//! - I/O and codec failures abort only the current file and are listed in
//!   [`BackupReport::failures`].
//! - Index and ledger write failures after a successful artifact write are
//!   listed in [`BackupReport::metadata_failures`]; the artifact stays.

use crate::compression::ArchiveCodec;
use crate::config::WardenConfig;
use crate::error::{Result, WardenError};
use crate::fingerprint::fingerprint;
use crate::index::BackupIndex;
use crate::ledger::{Ledger, LedgerLine};
use crate::types::{BackupAction, BackupReport, Fingerprint, TrackedFileRecord};
use crate::utils;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

/// Result of backing up one regular file
struct FileOutcome {
    action: BackupAction,
    metadata_error: Option<WardenError>,
}

/// Backs paths up into the configured backup directory
pub struct BackupPipeline<'a> {
    config: &'a WardenConfig,
    index: &'a dyn BackupIndex,
    codec: ArchiveCodec,
    ledger: Option<Ledger>,
}

impl<'a> BackupPipeline<'a> {
    /// Create a pipeline over an index owned by the caller
    pub fn new(config: &'a WardenConfig, index: &'a dyn BackupIndex) -> Self {
        let ledger = config
            .write_ledger
            .then(|| Ledger::new(config.index_path.clone()));
        Self {
            config,
            index,
            codec: ArchiveCodec::new(config.compression_level),
            ledger,
        }
    }

    /// Back up `path` and return a report of everything that happened
    ///
    /// Returns `Err` only when the run was aborted; per-file failures are in
    /// the report.
    #[instrument(skip(self))]
    pub fn run(&self, path: &Path, overwrite: bool) -> Result<BackupReport> {
        info!("Starting backup of {:?} (overwrite: {})", path, overwrite);
        let start = Instant::now();

        let mut report = BackupReport::default();
        self.backup(path, overwrite, &mut report)?;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Backup finished: {} created, {} overwritten, {} skipped, {} failed in {}ms",
            report.created.len(),
            report.overwritten.len(),
            report.skipped.len(),
            report.failures.len(),
            report.duration_ms
        );
        Ok(report)
    }

    /// Back up one path into `report`
    pub fn backup(&self, path: &Path, overwrite: bool, report: &mut BackupReport) -> Result<()> {
        let fp = fingerprint(path);

        if fp.is_empty() {
            debug!("Nothing to back up at {:?}", path);
            report.skipped.push(path.to_path_buf());
            return Ok(());
        }

        if fp.is_directory {
            return self.backup_children(path, overwrite, report);
        }

        match self.backup_file(path, &fp, overwrite) {
            Ok(outcome) => {
                if let Some(e) = outcome.metadata_error {
                    report.metadata_failures.push((path.to_path_buf(), e.to_string()));
                }
                report.record(path.to_path_buf(), outcome.action);
                Ok(())
            }
            Err(e) if e.aborts_run() => {
                error!("Aborting backup run: {}", e);
                Err(e)
            }
            Err(e) => {
                error!("Backup of {:?} failed: {}", path, e);
                report.failures.push((path.to_path_buf(), e.to_string()));
                Ok(())
            }
        }
    }

    fn backup_children(&self, dir: &Path, overwrite: bool, report: &mut BackupReport) -> Result<()> {
        debug!("Descending into {:?}", dir);

        let children = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in children {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let failed = e.path().unwrap_or(dir).to_path_buf();
                    warn!("Unable to list {:?}: {}", failed, e);
                    report.failures.push((failed, WardenError::from(e).to_string()));
                    continue;
                }
            };

            if entry.path_is_symlink() && entry.path().is_dir() {
                warn!("Skipping symlinked directory {:?}", entry.path());
                report.skipped.push(entry.path().to_path_buf());
                continue;
            }

            self.backup(entry.path(), overwrite, report)?;
        }
        Ok(())
    }

    fn backup_file(&self, path: &Path, fp: &Fingerprint, overwrite: bool) -> Result<FileOutcome> {
        match self.index.find_tracked_file(path)? {
            None => self.create_backup(path, fp),
            Some(_) if !overwrite => Err(WardenError::OverwriteRefused {
                path: path.to_path_buf(),
            }),
            Some(existing) => self.replace_backup(path, fp, existing),
        }
    }

    fn new_record(&self, path: &Path, fp: &Fingerprint) -> Result<TrackedFileRecord> {
        let artifact_name = utils::unused_artifact_name(&self.config.backup_dir)?;
        let artifact = self.config.artifact_path(&artifact_name);
        self.codec.compress_file(path, &artifact)?;

        Ok(TrackedFileRecord {
            filepath: path.to_path_buf(),
            display_name: utils::display_name(path),
            artifact_name,
            last_backup_time: fp.timestamp(),
            last_known_hash: fp.content_hash.clone(),
        })
    }

    fn create_backup(&self, path: &Path, fp: &Fingerprint) -> Result<FileOutcome> {
        let record = self.new_record(path, fp)?;
        info!("Backed up {:?} as {}", path, record.artifact_name);

        let mut metadata_error = None;
        match self.index.upsert_tracked_file(&record) {
            Ok(()) => {}
            Err(e) if e.is_metadata() => {
                warn!("Artifact {} written but index update failed: {}", record.artifact_name, e);
                metadata_error = Some(e);
            }
            Err(e) => {
                let _ = fs::remove_file(self.config.artifact_path(&record.artifact_name));
                return Err(e);
            }
        }

        // The ledger only mirrors records the index accepted
        if let Some(ledger) = self.ledger.as_ref().filter(|_| metadata_error.is_none()) {
            if let Err(e) = ledger.append(&LedgerLine::from(&record)) {
                warn!("Unable to append ledger line for {:?}: {}", path, e);
                metadata_error = Some(e);
            }
        }

        Ok(FileOutcome {
            action: BackupAction::Created,
            metadata_error,
        })
    }

    fn replace_backup(
        &self,
        path: &Path,
        fp: &Fingerprint,
        existing: TrackedFileRecord,
    ) -> Result<FileOutcome> {
        let record = self.new_record(path, fp)?;

        if let Err(e) = self.index.upsert_tracked_file(&record) {
            warn!(
                "Index update failed for {:?}, keeping previous backup {}",
                path, existing.artifact_name
            );
            let _ = fs::remove_file(self.config.artifact_path(&record.artifact_name));
            return Err(e);
        }

        if existing.artifact_name != record.artifact_name {
            let old = self.config.artifact_path(&existing.artifact_name);
            match fs::remove_file(&old) {
                Ok(()) => debug!("Removed previous artifact {:?}", old),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Unable to remove previous artifact {:?}: {}", old, e),
            }
        }

        info!(
            "Replaced backup of {:?}: {} -> {}",
            path, existing.artifact_name, record.artifact_name
        );
        Ok(FileOutcome {
            action: BackupAction::Overwritten,
            metadata_error: None,
        })
    }
}
