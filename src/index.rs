//! Backup index: tracked-file records and the change log
//!
//! The pipelines talk to the store through the narrow [`BackupIndex`] trait.
//! [`SqliteIndex`] is the production implementation.
//!
//! ## Schema
//!
//! ```text
//! fileindex   (filepath PK, name, backupfile, backuptime, hash)
//! filechanges (id PK autoincrement, filepath, timeofchange, change, changehash)
//! ```
//!
//! `filepath` being the primary key of `fileindex` is what guarantees at most
//! one record per guarded path. `filechanges` uses a surrogate key so any
//! number of entries can be appended for the same path.

use crate::error::Result;
use crate::types::{ChangeLogEntry, IndexStats, TrackedFileRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

const CURRENT_VERSION: i32 = 1;

/// Persistent store consumed by the backup pipeline and the reconciler
pub trait BackupIndex {
    /// Insert a record, or replace the record with the same filepath
    fn upsert_tracked_file(&self, record: &TrackedFileRecord) -> Result<()>;

    /// Look up the record for an exact filepath
    fn find_tracked_file(&self, filepath: &Path) -> Result<Option<TrackedFileRecord>>;

    /// All records, ordered by filepath
    fn list_tracked_files(&self) -> Result<Vec<TrackedFileRecord>>;

    /// Number of tracked files
    fn count_tracked_files(&self) -> Result<usize>;

    /// Append a change-log entry
    fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<()>;

    /// Change-log entries in insertion order, optionally for one path
    fn list_change_log(&self, filepath: Option<&Path>) -> Result<Vec<ChangeLogEntry>>;

    /// Number of change-log entries
    fn count_change_log(&self) -> Result<usize>;

    /// Both row counts at once
    fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            tracked_files: self.count_tracked_files()?,
            change_log_entries: self.count_change_log()?,
        })
    }
}

/// SQLite-backed [`BackupIndex`]
pub struct SqliteIndex {
    conn: Connection,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteIndex {
    /// Open or create the index database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening backup index at {}", path.display());
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Create an in-memory index (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        debug!("Migrating backup index to v1");
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS fileindex (
                filepath TEXT NOT NULL PRIMARY KEY,
                name TEXT NOT NULL,
                backupfile TEXT NOT NULL,
                backuptime TEXT NOT NULL,
                hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS filechanges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filepath TEXT NOT NULL,
                timeofchange TEXT NOT NULL,
                change TEXT NOT NULL,
                changehash TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_filechanges_path ON filechanges(filepath);
            ",
        )?;
    }

    conn.pragma_update(None, "user_version", CURRENT_VERSION)?;
    Ok(())
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TrackedFileRecord> {
    Ok(TrackedFileRecord {
        filepath: PathBuf::from(row.get::<_, String>(0)?),
        display_name: row.get(1)?,
        artifact_name: row.get(2)?,
        last_backup_time: row.get(3)?,
        last_known_hash: row.get(4)?,
    })
}

fn change_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeLogEntry> {
    Ok(ChangeLogEntry {
        filepath: PathBuf::from(row.get::<_, String>(0)?),
        time_of_change: row.get(1)?,
        diff_text: row.get(2)?,
        diff_hash: row.get(3)?,
    })
}

impl BackupIndex for SqliteIndex {
    fn upsert_tracked_file(&self, record: &TrackedFileRecord) -> Result<()> {
        trace!("Upserting record for {:?}", record.filepath);
        self.conn.execute(
            r"
            INSERT INTO fileindex (filepath, name, backupfile, backuptime, hash)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(filepath) DO UPDATE SET
                name = excluded.name,
                backupfile = excluded.backupfile,
                backuptime = excluded.backuptime,
                hash = excluded.hash
            ",
            params![
                path_key(&record.filepath),
                record.display_name,
                record.artifact_name,
                record.last_backup_time,
                record.last_known_hash,
            ],
        )?;
        Ok(())
    }

    fn find_tracked_file(&self, filepath: &Path) -> Result<Option<TrackedFileRecord>> {
        let record = self
            .conn
            .query_row(
                r"
                SELECT filepath, name, backupfile, backuptime, hash
                FROM fileindex WHERE filepath = ?1
                ",
                params![path_key(filepath)],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn list_tracked_files(&self) -> Result<Vec<TrackedFileRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT filepath, name, backupfile, backuptime, hash
            FROM fileindex ORDER BY filepath
            ",
        )?;
        let rows = stmt.query_map([], record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count_tracked_files(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(filepath) FROM fileindex", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        trace!("Appending change-log entry for {:?}", entry.filepath);
        self.conn.execute(
            r"
            INSERT INTO filechanges (filepath, timeofchange, change, changehash)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                path_key(&entry.filepath),
                entry.time_of_change,
                entry.diff_text,
                entry.diff_hash,
            ],
        )?;
        Ok(())
    }

    fn list_change_log(&self, filepath: Option<&Path>) -> Result<Vec<ChangeLogEntry>> {
        let entries = match filepath {
            Some(path) => {
                let mut stmt = self.conn.prepare(
                    r"
                    SELECT filepath, timeofchange, change, changehash
                    FROM filechanges WHERE filepath = ?1 ORDER BY id
                    ",
                )?;
                let rows = stmt.query_map(params![path_key(path)], change_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    r"
                    SELECT filepath, timeofchange, change, changehash
                    FROM filechanges ORDER BY id
                    ",
                )?;
                let rows = stmt.query_map([], change_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(entries)
    }

    fn count_change_log(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(id) FROM filechanges", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
