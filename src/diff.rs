//! Line-level diffing for drifted text files
//!
//! ## Algorithm
//!
//! A single left-to-right scan with two cursors. Equal lines advance both
//! cursors. On the first mismatch both cursors advance together while the
//! lines keep differing, and that run becomes one hunk. When either side runs
//! out inside or right after such a run, the remainder of both sides joins
//! the hunk, so pure tail insertions and deletions are reported in full.
//!
//! This is deliberately not a minimal edit script. An insertion in the middle
//! of a file shifts the following lines, and the scan reports everything up to
//! the next accidental resynchronization as one replacement hunk. That is
//! good enough to show an operator what changed before the file is reverted.
//!
//! ## Output
//!
//! ```text
//! @@ -2,0 +2,1 @@
//! +world
//! ```
//!
//! Binary content is never diffed; callers check [`is_human_readable`] first
//! and log [`BINARY_NO_DIFF`] instead.

use crate::error::Result;
use crate::types::{DiffHunk, LineChange};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Marker recorded instead of a diff for binary files
pub const BINARY_NO_DIFF: &str = "binary, no diff";

/// Diff text recorded when the live file could not be read or compared
pub const UNREADABLE_NO_DIFF: &str = "unreadable, no diff";

/// Bytes 1..4 of an ELF executable
const ELF_SIGNATURE: &[u8; 3] = b"ELF";

/// Split text into lines on `\n`, keeping a trailing partial line
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_terminator('\n').collect()
}

/// Compute hunks turning `old_lines` into `new_lines`
pub fn compute_line_diff(old_lines: &[&str], new_lines: &[&str]) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < old_lines.len() || j < new_lines.len() {
        if i < old_lines.len() && j < new_lines.len() && old_lines[i] == new_lines[j] {
            i += 1;
            j += 1;
            continue;
        }

        let (old_start, new_start) = (i, j);
        while i < old_lines.len() && j < new_lines.len() && old_lines[i] != new_lines[j] {
            i += 1;
            j += 1;
        }

        // One side ran out: nothing left to resynchronize on.
        if i == old_lines.len() || j == new_lines.len() {
            i = old_lines.len();
            j = new_lines.len();
        }

        hunks.push(build_hunk(old_lines, new_lines, old_start..i, new_start..j));
    }

    hunks
}

fn build_hunk(
    old_lines: &[&str],
    new_lines: &[&str],
    old_range: std::ops::Range<usize>,
    new_range: std::ops::Range<usize>,
) -> DiffHunk {
    let mut changes = Vec::with_capacity(old_range.len() + new_range.len());
    for idx in old_range.clone() {
        changes.push(LineChange::Deleted(idx + 1, old_lines[idx].to_string()));
    }
    for idx in new_range.clone() {
        changes.push(LineChange::Added(idx + 1, new_lines[idx].to_string()));
    }

    DiffHunk {
        from_line: old_range.start + 1,
        from_count: old_range.len(),
        to_line: new_range.start + 1,
        to_count: new_range.len(),
        changes,
    }
}

/// Render hunks as unified diff text
pub fn render_hunks(hunks: &[DiffHunk]) -> String {
    hunks.iter().map(|hunk| hunk.to_string()).collect()
}

/// Count `(added, deleted)` lines across hunks
pub fn count_changes(hunks: &[DiffHunk]) -> (usize, usize) {
    hunks
        .iter()
        .flat_map(|hunk| hunk.changes.iter())
        .fold((0, 0), |(added, deleted), change| match change {
            LineChange::Added(..) => (added + 1, deleted),
            LineChange::Deleted(..) => (added, deleted + 1),
        })
}

/// Diff two text contents
pub fn diff_text(old_content: &[u8], new_content: &[u8]) -> Vec<DiffHunk> {
    let old_text = String::from_utf8_lossy(old_content);
    let new_text = String::from_utf8_lossy(new_content);
    compute_line_diff(&split_lines(&old_text), &split_lines(&new_text))
}

/// Diff two files on disk and render the result
pub fn diff_files(old_path: &Path, new_path: &Path) -> Result<String> {
    let old_content = fs::read(old_path)?;
    let new_content = fs::read(new_path)?;
    Ok(render_hunks(&diff_text(&old_content, &new_content)))
}

/// Whether the file at `path` looks like text
///
/// See [`is_human_readable_stream`] for the heuristic.
pub fn is_human_readable(path: &Path) -> Result<bool> {
    let file = File::open(path)?;
    is_human_readable_stream(file).map_err(Into::into)
}

/// Classify a byte stream as text (`true`) or binary (`false`)
///
/// The first four bytes are read as a header: if bytes 1..4 spell `ELF` the
/// stream is binary. The rest of the stream (after the header) is then scanned
/// for NUL, SOH or STX; any of them means binary. Those three bytes never
/// occur inside multi-byte UTF-8 sequences, so a byte scan finds exactly what a
/// character-by-character scan would.
pub fn is_human_readable_stream<R: Read>(reader: R) -> io::Result<bool> {
    let mut reader = BufReader::new(reader);

    let mut header = Vec::with_capacity(4);
    (&mut reader).take(4).read_to_end(&mut header)?;
    if header.len() == 4 && &header[1..4] == ELF_SIGNATURE {
        return Ok(false);
    }

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            return Ok(true);
        }
        if buffer[..bytes_read].iter().any(|&b| b <= 0x02) {
            return Ok(false);
        }
    }
}
