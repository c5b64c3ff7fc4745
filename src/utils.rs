//! Utility functions for filewarden
//!
//! ### Naming
//! - Random artifact names for the backup directory
//! - Display names derived from a path's final segment
//!
//! ### Layout
//! - Creating the home, backup and log directories and the ledger file
//! - Owner-only permission normalization (Unix)
//!
//! ### Formatting
//! - ISO-8601 timestamps
//! - Human-readable byte counts

use crate::config::WardenConfig;
use crate::error::{Result, WardenError};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::{debug, trace};

/// Length of the random part of an artifact name
pub const ARTIFACT_NAME_LEN: usize = 15;

/// Suffix appended to every artifact name
pub const ARTIFACT_SUFFIX: &str = ".zst";

/// Attempts made to find an unused artifact name
const MAX_NAME_ATTEMPTS: usize = 16;

/// Generate a random artifact name: 15 alphanumeric characters plus `.zst`
pub fn generate_artifact_name() -> String {
    let stem: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ARTIFACT_NAME_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", stem, ARTIFACT_SUFFIX)
}

/// Generate an artifact name that doesn't exist yet in `backup_dir`
pub fn unused_artifact_name(backup_dir: &Path) -> Result<String> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let name = generate_artifact_name();
        if !backup_dir.join(&name).exists() {
            return Ok(name);
        }
        debug!("Artifact name {} already taken, retrying", name);
    }
    Err(WardenError::internal(format!(
        "No free artifact name found in {:?} after {} attempts",
        backup_dir, MAX_NAME_ATTEMPTS
    )))
}

/// Final path segment used as the display name of a tracked file
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Format a timestamp as RFC 3339 (ISO-8601) with second precision
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Create the directory layout described by `config`
///
/// Missing directories are created, the ledger file is created empty when
/// absent, and the home, backup and log directories are normalized to
/// owner-only access.
pub fn ensure_layout(config: &WardenConfig) -> Result<()> {
    for dir in [&config.home_dir, &config.backup_dir, &config.log_dir] {
        if !dir.exists() {
            debug!("Creating directory {:?}", dir);
            fs::create_dir_all(dir)?;
        }
        normalize_permissions(dir, 0o700)?;
    }

    if config.write_ledger && !config.index_path.exists() {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.index_path)?;
    }

    fs::create_dir_all(&config.staging_dir)?;
    Ok(())
}

/// Set `mode` on `path` if it differs
#[cfg(unix)]
pub fn normalize_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let current = fs::metadata(path)?.permissions().mode() & 0o777;
    if current != mode {
        trace!("Normalizing permissions of {:?}: {:o} -> {:o}", path, current, mode);
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

/// Permissions are left alone on platforms without Unix modes
#[cfg(not(unix))]
pub fn normalize_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Atomic file write (write to temp file then rename)
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
