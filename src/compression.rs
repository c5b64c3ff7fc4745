//! Streaming zstd codec for backup artifacts
//!
//! Every artifact is a single self-contained zstd frame: no dictionary, no
//! custom header. Both directions stream through fixed-size buffers, so a
//! file is never held in memory as a whole.
//!
//! ## Failure behavior
//!
//! Decompression of a foreign, corrupt or truncated artifact fails with
//! [`WardenError::Decompression`] instead of returning partial data.
//!
//! ## Examples
//!
//! ```rust
//! use filewarden::compression::ArchiveCodec;
//!
//! let codec = ArchiveCodec::default();
//!
//! let mut artifact = Vec::new();
//! codec.compress(&b"hello\n"[..], &mut artifact).unwrap();
//!
//! let mut restored = Vec::new();
//! codec.decompress(&artifact[..], &mut restored).unwrap();
//! assert_eq!(restored, b"hello\n");
//! ```

use crate::error::{Result, WardenError};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, trace};

/// Byte counts for one codec operation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CodecStats {
    /// Bytes read from the source
    pub bytes_in: u64,
    /// Bytes written to the destination
    pub bytes_out: u64,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

impl CodecStats {
    /// Output size relative to input size (1.0 when nothing was read)
    pub fn ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            return 1.0;
        }
        self.bytes_out as f64 / self.bytes_in as f64
    }
}

/// zstd codec used for all artifacts
#[derive(Debug, Clone, Copy)]
pub struct ArchiveCodec {
    level: i32,
}

impl ArchiveCodec {
    /// Create a codec with the given zstd level
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// Configured compression level
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Compress everything from `source` into `sink` as one zstd frame
    pub fn compress<R: Read, W: Write>(&self, source: R, sink: W) -> Result<CodecStats> {
        let start = Instant::now();
        let mut counted = CountingWriter::new(sink);

        let mut encoder = zstd::stream::write::Encoder::new(&mut counted, self.level)
            .map_err(|e| WardenError::compression(format!("encoder setup failed: {}", e)))?;
        let bytes_in = io::copy(&mut BufReader::new(source), &mut encoder)
            .map_err(|e| WardenError::compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| WardenError::compression(format!("finishing frame failed: {}", e)))?;
        counted
            .flush()
            .map_err(|e| WardenError::compression(e.to_string()))?;

        let stats = CodecStats {
            bytes_in,
            bytes_out: counted.written,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        trace!("Compressed {} -> {} bytes", stats.bytes_in, stats.bytes_out);
        Ok(stats)
    }

    /// Decompress a single zstd frame from `source` into `sink`
    pub fn decompress<R: Read, W: Write>(&self, source: R, mut sink: W) -> Result<CodecStats> {
        let start = Instant::now();
        let mut counted = CountingReader::new(source);

        let bytes_out = {
            let mut decoder = zstd::stream::read::Decoder::new(&mut counted)
                .map_err(|e| WardenError::decompression(format!("decoder setup failed: {}", e)))?
                .single_frame();
            io::copy(&mut decoder, &mut sink)
                .map_err(|e| WardenError::decompression(e.to_string()))?
        };
        sink.flush()?;

        let stats = CodecStats {
            bytes_in: counted.read,
            bytes_out,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        trace!("Decompressed {} -> {} bytes", stats.bytes_in, stats.bytes_out);
        Ok(stats)
    }

    /// Compress the file at `source` into a new artifact file at `artifact`
    ///
    /// A partially written artifact is removed when compression fails.
    pub fn compress_file(&self, source: &Path, artifact: &Path) -> Result<CodecStats> {
        let input = File::open(source)?;
        let output = BufWriter::new(File::create(artifact)?);

        match self.compress(input, output) {
            Ok(stats) => {
                debug!(
                    "Wrote artifact {:?} ({} -> {} bytes)",
                    artifact, stats.bytes_in, stats.bytes_out
                );
                Ok(stats)
            }
            Err(e) => {
                let _ = std::fs::remove_file(artifact);
                Err(e)
            }
        }
    }

    /// Decompress the artifact at `artifact` into `dest`, truncating `dest`
    pub fn decompress_file(&self, artifact: &Path, dest: &Path) -> Result<CodecStats> {
        let input = File::open(artifact)?;
        let output = BufWriter::new(File::create(dest)?);
        self.decompress(input, output)
    }
}

impl Default for ArchiveCodec {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

/// Writer adapter that counts bytes passed through it
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader adapter that counts bytes passed through it
struct CountingReader<R> {
    inner: R,
    read: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, read: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        Ok(n)
    }
}
