//! Legacy append-only text ledger
//!
//! Older installations kept a plain-text mirror of the index at
//! `<home>/index.safe`, one line per newly tracked path:
//!
//! ```text
//! /etc/hosts|-:-|hosts|-:-|aB3dE5fG7hJ9kL1.zst|-:-|2024-01-01T00:00:00Z|-:-|<hash>
//! ```
//!
//! The SQLite index is authoritative. The ledger is only appended to so the
//! file stays readable by tools that grep it.

use crate::error::Result;
use crate::types::TrackedFileRecord;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Field separator used by ledger lines
pub const LEDGER_SEPARATOR: &str = "|-:-|";

/// One parsed ledger line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLine {
    /// Tracked path
    pub filepath: PathBuf,
    /// Final path segment
    pub display_name: String,
    /// Artifact file name
    pub artifact_name: String,
    /// Backup timestamp
    pub time: String,
    /// Content hash at backup time
    pub hash: String,
}

impl LedgerLine {
    /// Parse a single line; `None` if it does not have exactly five fields
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line
            .trim_end_matches(['\r', '\n'])
            .split(LEDGER_SEPARATOR)
            .collect();
        match fields.as_slice() {
            [filepath, display_name, artifact_name, time, hash] if !filepath.is_empty() => {
                Some(Self {
                    filepath: PathBuf::from(filepath),
                    display_name: display_name.to_string(),
                    artifact_name: artifact_name.to_string(),
                    time: time.to_string(),
                    hash: hash.to_string(),
                })
            }
            _ => None,
        }
    }
}

impl From<&TrackedFileRecord> for LedgerLine {
    fn from(record: &TrackedFileRecord) -> Self {
        Self {
            filepath: record.filepath.clone(),
            display_name: record.display_name.clone(),
            artifact_name: record.artifact_name.clone(),
            time: record.last_backup_time.clone(),
            hash: record.last_known_hash.clone(),
        }
    }
}

impl From<LedgerLine> for TrackedFileRecord {
    fn from(line: LedgerLine) -> Self {
        Self {
            filepath: line.filepath,
            display_name: line.display_name,
            artifact_name: line.artifact_name,
            last_backup_time: line.time,
            last_known_hash: line.hash,
        }
    }
}

impl fmt::Display for LedgerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = LEDGER_SEPARATOR;
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.filepath.display(),
            self.display_name,
            self.artifact_name,
            self.time,
            self.hash,
        )
    }
}

/// Handle on the ledger file
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Ledger stored at `path`; the file is created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line
    pub fn append(&self, line: &LedgerLine) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        debug!("Appended ledger line for {:?}", line.filepath);
        Ok(())
    }

    /// All well-formed lines in file order; a missing ledger reads as empty
    pub fn lines(&self) -> Result<Vec<LedgerLine>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::new();
        for (number, raw) in content.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            match LedgerLine::parse(raw) {
                Some(line) => lines.push(line),
                None => warn!("Skipping malformed ledger line {} in {:?}", number + 1, self.path),
            }
        }
        Ok(lines)
    }

    /// Most recent line for `filepath`
    pub fn latest(&self, filepath: &Path) -> Result<Option<LedgerLine>> {
        Ok(self
            .lines()?
            .into_iter()
            .rev()
            .find(|line| line.filepath == filepath))
    }
}
