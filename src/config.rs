//! Configuration for a filewarden installation
//!
//! All directory paths live in one explicit [`WardenConfig`] that is handed to
//! each component at construction.
//!
//! ```text
//! <home>/
//! ├── config.json   # optional persisted configuration
//! ├── fh.db         # backup index (SQLite)
//! ├── index.safe    # legacy pipe-delimited ledger
//! ├── backups/      # <15 random chars>.zst artifacts
//! └── logs/         # filewarden.log
//! ```

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default installation directory
pub const DEFAULT_HOME: &str = "/opt/filewarden";

/// Name of the persisted configuration file inside the home directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the log file inside the log directory
pub const LOG_FILE_NAME: &str = "filewarden.log";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Home directory holding the index and state
    pub home_dir: PathBuf,
    /// Directory holding compressed artifacts
    pub backup_dir: PathBuf,
    /// Directory holding log files
    pub log_dir: PathBuf,
    /// Legacy append-only ledger file
    pub index_path: PathBuf,
    /// SQLite backup index
    pub database_path: PathBuf,
    /// Directory for temporary staging files during restores
    pub staging_dir: PathBuf,
    /// zstd compression level
    pub compression_level: i32,
    /// Whether to keep appending to the legacy ledger
    pub write_ledger: bool,
}

impl WardenConfig {
    /// Derive the standard layout under `home`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home_dir = home.into();
        Self {
            backup_dir: home_dir.join("backups"),
            log_dir: home_dir.join("logs"),
            index_path: home_dir.join("index.safe"),
            database_path: home_dir.join("fh.db"),
            staging_dir: std::env::temp_dir(),
            compression_level: zstd::DEFAULT_COMPRESSION_LEVEL,
            write_ledger: true,
            home_dir,
        }
    }

    /// Path of the log file
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    /// Path of an artifact inside the backup directory
    pub fn artifact_path(&self, artifact_name: &str) -> PathBuf {
        self.backup_dir.join(artifact_name)
    }

    /// Check the configuration for values that can't work
    pub fn validate(&self) -> Result<()> {
        let range = zstd::compression_level_range();
        if self.compression_level == 0 || !range.contains(&self.compression_level) {
            return Err(WardenError::InvalidConfiguration(format!(
                "compression level {} outside {:?} (0 is not allowed)",
                self.compression_level, range
            )));
        }

        for (name, path) in [
            ("home_dir", &self.home_dir),
            ("backup_dir", &self.backup_dir),
            ("log_dir", &self.log_dir),
            ("index_path", &self.index_path),
            ("database_path", &self.database_path),
            ("staging_dir", &self.staging_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(WardenError::InvalidConfiguration(format!("{} is empty", name)));
            }
        }

        Ok(())
    }

    /// Load a configuration previously written by [`WardenConfig::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<home>/config.json` if present, otherwise derive the default layout
    pub fn load_or_default(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::with_home(home))
        }
    }

    /// Persist the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        crate::utils::atomic_write(path, json.as_bytes())
    }
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self::with_home(DEFAULT_HOME)
    }
}
