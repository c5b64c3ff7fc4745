//! Error types for filewarden
//!
//! Every fallible operation in the crate returns [`Result<T>`]. The variants
//! are grouped by how callers are expected to react:
//!
//! - **Run-aborting**: [`WardenError::OverwriteRefused`] stops the whole backup
//!   run so nobody believes a backup happened when it didn't.
//! - **Per-path**: I/O and codec failures abort the current path only. The
//!   pipelines record them and move on to the next path.
//! - **Metadata**: store errors are logged and tolerated because the artifact
//!   on disk is still a valid recovery source.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in filewarden
pub type Result<T> = std::result::Result<T, WardenError>;

/// Main error type for all filewarden operations
#[derive(Debug, Error)]
pub enum WardenError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the backup index store
    #[error("Index store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory listing error from walkdir
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Errors from the filesystem event source
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Compression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompression errors (corrupt, truncated or foreign artifacts)
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// The path is already tracked and overwriting was disabled
    #[error("Refusing to overwrite existing backup of {path:?} (overwrite disabled)")]
    OverwriteRefused {
        /// Path that is already tracked
        path: PathBuf,
    },

    /// A tracked record points at an artifact that does not exist
    #[error("Backup artifact {artifact} for {path:?} is missing")]
    ArtifactMissing {
        /// Tracked path
        path: PathBuf,
        /// Artifact name recorded in the index
        artifact: String,
    },

    /// Path has no tracked record
    #[error("Path is not tracked: {0:?}")]
    NotTracked(PathBuf),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Restore operation failed
    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    /// Create a compression error with a custom message
    pub fn compression(msg: impl Into<String>) -> Self {
        WardenError::Compression(msg.into())
    }

    /// Create a decompression error with a custom message
    pub fn decompression(msg: impl Into<String>) -> Self {
        WardenError::Decompression(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        WardenError::Internal(msg.into())
    }

    /// Whether this error must stop the whole run rather than a single path
    pub fn aborts_run(&self) -> bool {
        matches!(self, WardenError::OverwriteRefused { .. })
    }

    /// Whether this error came from the metadata store
    pub fn is_metadata(&self) -> bool {
        matches!(self, WardenError::Store(_))
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            WardenError::OverwriteRefused { path } => {
                format!(
                    "{:?} is already backed up. Re-run with --overwrite true to replace the existing backup.",
                    path
                )
            }
            WardenError::ArtifactMissing { path, artifact } => {
                format!(
                    "The backup of {:?} ({}) is gone from the backup directory. Back the file up again once it is known good.",
                    path, artifact
                )
            }
            WardenError::NotTracked(path) => {
                format!("{:?} is not tracked. Use --backup first.", path)
            }
            _ => self.to_string(),
        }
    }
}
