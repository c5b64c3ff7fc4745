//! Fingerprint service
//!
//! [`fingerprint`] summarizes a path's current identity: size, modification
//! time and a base64 SHA-256 of its content. It never fails. Missing and
//! unreadable paths yield [`Fingerprint::empty`], as do FIFOs, sockets and
//! devices, which are never opened. Directories carry the
//! [`DIRECTORY_SENTINEL`] in place of a digest.

use crate::types::Fingerprint;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Hash value stored for directories; means "recurse", never "compare"
pub const DIRECTORY_SENTINEL: &str = "directory";

/// Fingerprint `path` as it is on disk right now
///
/// # Examples
///
/// ```rust
/// use filewarden::fingerprint::fingerprint;
///
/// let fp = fingerprint(std::path::Path::new("/definitely/not/here"));
/// assert!(fp.is_empty());
/// assert_eq!(fp.content_hash, "");
/// ```
pub fn fingerprint(path: &Path) -> Fingerprint {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            trace!("No fingerprint for {:?}: {}", path, e);
            return Fingerprint::empty();
        }
    };

    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    if metadata.is_dir() {
        return Fingerprint {
            path: path.to_path_buf(),
            is_directory: true,
            size: metadata.len(),
            modified,
            content_hash: DIRECTORY_SENTINEL.to_string(),
        };
    }

    // Opening a FIFO or device could block forever
    if !metadata.is_file() {
        debug!("{:?} is not a regular file, no fingerprint", path);
        return Fingerprint::empty();
    }

    let content_hash = match File::open(path).and_then(hash_reader) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Unable to read {:?} for hashing: {}", path, e);
            return Fingerprint::empty();
        }
    };

    Fingerprint {
        path: path.to_path_buf(),
        is_directory: false,
        size: metadata.len(),
        modified,
        content_hash,
    }
}

/// Stream a reader through SHA-256 and return the base64 digest
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(STANDARD.encode(hasher.finalize()))
}

/// Base64 SHA-256 of in-memory data
pub fn hash_data(data: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(data))
}
