//! Core data types used throughout filewarden
//!
//! ## Overview
//!
//! - **Live state**: [`Fingerprint`] - a point-in-time summary of a path
//! - **Persisted state**: [`TrackedFileRecord`], [`ChangeLogEntry`]
//! - **Diffs**: [`DiffHunk`], [`LineChange`]
//! - **Results**: [`BackupReport`], [`ReconcileReport`], [`IndexStats`]
//!
//! ## Examples
//!
//! ```rust
//! use filewarden::types::{FileState, ReconcileReport};
//! use std::path::PathBuf;
//!
//! let mut report = ReconcileReport::default();
//! report.record(PathBuf::from("/etc/hosts"), FileState::Modified);
//! assert_eq!(report.modified.len(), 1);
//! assert!(report.has_drift());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Point-in-time identity of a path on disk
///
/// Fingerprints are never cached; every call to
/// [`fingerprint`](crate::fingerprint::fingerprint) re-reads the disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Path that was fingerprinted (empty for the missing sentinel)
    pub path: PathBuf,
    /// Whether the path is a directory
    pub is_directory: bool,
    /// Size in bytes as reported by stat
    pub size: u64,
    /// Modification time from the same stat call
    pub modified: Option<DateTime<Utc>>,
    /// Base64 SHA-256 of the content, `"directory"` for directories, empty when missing
    pub content_hash: String,
}

impl Fingerprint {
    /// The sentinel returned for missing or unreadable paths
    pub fn empty() -> Self {
        Self {
            path: PathBuf::new(),
            is_directory: false,
            size: 0,
            modified: None,
            content_hash: String::new(),
        }
    }

    /// Whether there is nothing to act on (missing, unreadable or zero-length)
    pub fn is_empty(&self) -> bool {
        self.size == 0 && !self.is_directory
    }

    /// ISO-8601 modification time, empty when unknown
    pub fn timestamp(&self) -> String {
        self.modified
            .map(crate::utils::format_timestamp)
            .unwrap_or_default()
    }
}

/// Authoritative metadata row for one guarded path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFileRecord {
    /// Absolute path of the guarded file (unique key)
    pub filepath: PathBuf,
    /// Final path segment, used for display and staging names
    pub display_name: String,
    /// File name of the compressed artifact inside the backup directory
    pub artifact_name: String,
    /// Modification time of the file when it was backed up
    pub last_backup_time: String,
    /// Base64 SHA-256 of the content when it was backed up
    pub last_known_hash: String,
}

/// Append-only record of one detected modification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Path that drifted
    pub filepath: PathBuf,
    /// Modification time of the drifted file
    pub time_of_change: String,
    /// Unified diff text, or the binary marker
    pub diff_text: String,
    /// Base64 SHA-256 of `diff_text`
    pub diff_hash: String,
}

/// A single changed line inside a hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineChange {
    /// Line removed from the old side (1-based line number, content)
    Deleted(usize, String),
    /// Line added on the new side (1-based line number, content)
    Added(usize, String),
}

/// A contiguous block of differing lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// First line on the old side (1-based)
    pub from_line: usize,
    /// Number of old lines in the hunk
    pub from_count: usize,
    /// First line on the new side (1-based)
    pub to_line: usize,
    /// Number of new lines in the hunk
    pub to_count: usize,
    /// Removed lines followed by added lines
    pub changes: Vec<LineChange>,
}

impl fmt::Display for DiffHunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "@@ -{},{} +{},{} @@",
            self.from_line, self.from_count, self.to_line, self.to_count
        )?;
        for change in &self.changes {
            match change {
                LineChange::Deleted(_, line) => writeln!(f, "-{}", line)?,
                LineChange::Added(_, line) => writeln!(f, "+{}", line)?,
            }
        }
        Ok(())
    }
}

/// Observable state of a tracked path during one reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    /// Live hash matches the recorded hash
    Unchanged,
    /// Live path was gone and has been restored
    Missing,
    /// Live content drifted and has been restored
    Modified,
}

/// What the backup pipeline did with one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupAction {
    /// First backup of the path
    Created,
    /// Existing backup replaced
    Overwritten,
}

/// Summary of a backup run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupReport {
    /// Paths backed up for the first time
    pub created: Vec<PathBuf>,
    /// Paths whose backup was replaced
    pub overwritten: Vec<PathBuf>,
    /// Paths skipped because they were empty or missing
    pub skipped: Vec<PathBuf>,
    /// Paths whose artifact is valid but whose metadata write failed
    pub metadata_failures: Vec<(PathBuf, String)>,
    /// Paths whose backup failed
    pub failures: Vec<(PathBuf, String)>,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

impl BackupReport {
    /// Record the action taken for a file
    pub fn record(&mut self, path: PathBuf, action: BackupAction) {
        match action {
            BackupAction::Created => self.created.push(path),
            BackupAction::Overwritten => self.overwritten.push(path),
        }
    }

    /// Number of files that now have a fresh artifact
    pub fn files_backed_up(&self) -> usize {
        self.created.len() + self.overwritten.len()
    }

    /// Whether any path failed outright
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Summary of a reconcile pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Number of records examined
    pub files_checked: usize,
    /// Paths found intact
    pub unchanged: Vec<PathBuf>,
    /// Paths restored after deletion
    pub missing: Vec<PathBuf>,
    /// Paths restored after modification
    pub modified: Vec<PathBuf>,
    /// Change-log entries appended
    pub changes_logged: usize,
    /// Paths whose reconciliation failed
    pub failures: Vec<(PathBuf, String)>,
    /// Whether the pass stopped early on request
    pub cancelled: bool,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

impl ReconcileReport {
    /// Record the outcome for one path
    pub fn record(&mut self, path: PathBuf, state: FileState) {
        match state {
            FileState::Unchanged => self.unchanged.push(path),
            FileState::Missing => self.missing.push(path),
            FileState::Modified => self.modified.push(path),
        }
    }

    /// Number of restore actions performed
    pub fn files_restored(&self) -> usize {
        self.missing.len() + self.modified.len()
    }

    /// Whether any drift was found
    pub fn has_drift(&self) -> bool {
        self.files_restored() > 0
    }

    /// Whether any path failed outright
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Row counts of the backup index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of tracked files
    pub tracked_files: usize,
    /// Number of change-log entries
    pub change_log_entries: usize,
}
