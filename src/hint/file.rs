//! Hint File
//!
//! Decoded view over a mapped hint file, plus the atomic write protocol and
//! whole-file LZ4 compression shared with the builder.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::Path;

use crate::error::{KvError, Result};

use super::mfile::MappedFile;
use super::record::RecordIter;
use super::{is_compressed_path, tmp_path};

/// Size of the uncompressed-length header in front of an LZ4 block
const LZ4_SIZE_HEADER: usize = 4;

/// Decoded bytes: either the mapping itself or an owned decompressed copy
#[derive(Debug)]
enum Decoded {
    Mapped,
    Owned(Vec<u8>),
}

/// Logical view over a hint file
#[derive(Debug)]
pub struct HintFile {
    mapped: MappedFile,
    decoded: Decoded,
}

impl HintFile {
    /// Open a hint file for scanning.
    ///
    /// Returns `Ok(None)` when there is no prior state: the file is missing or
    /// empty. A compressed file whose decoded size disagrees with its header
    /// is removed and reported as the fatal `CorruptHintFile`.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        Self::open_with_rewrite(path, None)
    }

    /// Open a hint file and, if `rewrite` is given, write its decoded contents
    /// there atomically (recompressing when that name asks for it).
    ///
    /// A failed rewrite is logged and leaves the source readable; the hint is
    /// still returned so it can be replayed.
    pub fn open_with_rewrite(path: &Path, rewrite: Option<&Path>) -> Result<Option<Self>> {
        let mapped = match MappedFile::open(path) {
            Ok(m) => m,
            Err(KvError::FileNotFound(_)) => {
                tracing::debug!("No hint file at {}", path.display());
                return Ok(None);
            }
            Err(KvError::EmptyFile(_)) => {
                tracing::debug!("Hint file {} is empty", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let decoded = if is_compressed_path(path) {
            match decompress(&mapped) {
                Ok(buf) => Decoded::Owned(buf),
                Err((expected, actual)) => {
                    tracing::error!(
                        "Decompress {} failed: {} < {}, removing it",
                        path.display(),
                        actual,
                        expected
                    );
                    mapped.close();
                    if let Err(e) = fs::remove_file(path) {
                        tracing::warn!("Failed to remove {}: {}", path.display(), e);
                    }
                    return Err(KvError::CorruptHintFile {
                        path: path.to_path_buf(),
                        expected,
                        actual,
                    });
                }
            }
        } else {
            Decoded::Mapped
        };

        let hint = Self { mapped, decoded };
        tracing::debug!(
            "Opened hint file {} ({} bytes on disk, {} decoded)",
            path.display(),
            hint.mapped.len(),
            hint.len()
        );

        if let Some(target) = rewrite {
            if let Err(e) = hint.write_to(target) {
                tracing::warn!(
                    "Rewrite of {} to {} failed: {}",
                    path.display(),
                    target.display(),
                    e
                );
            }
        }

        Ok(Some(hint))
    }

    /// Decoded packed-record bytes
    pub fn bytes(&self) -> &[u8] {
        match &self.decoded {
            Decoded::Mapped => self.mapped.as_bytes(),
            Decoded::Owned(buf) => buf,
        }
    }

    /// Decoded length
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// True when the decoded bytes are the mapping itself (no copy was made)
    pub fn is_aliased(&self) -> bool {
        matches!(self.decoded, Decoded::Mapped)
    }

    pub fn path(&self) -> &Path {
        self.mapped.path()
    }

    /// Iterate the records, reconstructing locators for `bucket`
    pub fn records(&self, bucket: u8) -> RecordIter<'_> {
        RecordIter::new(self.bytes(), bucket)
    }

    /// Write the decoded contents to `target` atomically, compressing if the
    /// target name asks for it
    pub fn write_to(&self, target: &Path) -> Result<usize> {
        if is_compressed_path(target) {
            write_atomic(target, &compress(self.bytes()))
        } else {
            write_atomic(target, self.bytes())
        }
    }

    /// Release the owned buffer (if any), then unmap and close
    pub fn close(self) {
        let Self { mapped, decoded } = self;
        drop(decoded);
        mapped.close();
    }
}

// =============================================================================
// Compression
// =============================================================================

/// LZ4-compress `bytes`, prepending the uncompressed length
pub fn compress(bytes: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(bytes)
}

/// Decompress a size-prepended LZ4 block.
///
/// On failure returns `(expected, actual)`: the size the header announced and
/// the size actually produced.
fn decompress(data: &[u8]) -> std::result::Result<Vec<u8>, (usize, usize)> {
    if data.len() < LZ4_SIZE_HEADER {
        return Err((LZ4_SIZE_HEADER, data.len()));
    }

    let expected = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    // LZ4 cannot expand a block by more than 255x
    if expected > (data.len() - LZ4_SIZE_HEADER).saturating_mul(255) {
        return Err((expected, 0));
    }
    let mut buf = vec![0u8; expected];
    let actual = match lz4_flex::decompress_into(&data[LZ4_SIZE_HEADER..], &mut buf) {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!("LZ4 decode error: {}", e);
            0
        }
    };

    if actual != expected {
        return Err((expected, actual));
    }
    Ok(buf)
}

// =============================================================================
// Atomic Write
// =============================================================================

/// Write `bytes` to `path` atomically.
///
/// Content goes to `<path>.tmp` first; only when every byte is accounted for
/// is the old `<path>` removed and the temporary renamed over it. A short
/// write leaves `<path>` untouched and returns `ShortWrite`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<usize> {
    write_atomic_with(path, bytes, |tmp| File::create(tmp).map(SyncedFile))
}

/// `write_atomic` with the temporary's writer supplied by `open`
pub(crate) fn write_atomic_with<W, F>(path: &Path, bytes: &[u8], open: F) -> Result<usize>
where
    W: Write,
    F: FnOnce(&Path) -> io::Result<W>,
{
    let tmp = tmp_path(path);
    let mut writer = open(&tmp).map_err(|e| {
        tracing::warn!("Open {} failed: {}", tmp.display(), e);
        KvError::Io(e)
    })?;

    let written = match write_counted(&mut writer, bytes) {
        Ok(n) => n,
        Err(e) => {
            drop(writer);
            discard_tmp(&tmp);
            return Err(KvError::Io(e));
        }
    };
    drop(writer);

    if written != bytes.len() {
        tracing::warn!(
            "Write to {} failed: {} of {} bytes",
            tmp.display(),
            written,
            bytes.len()
        );
        discard_tmp(&tmp);
        return Err(KvError::ShortWrite {
            path: tmp,
            written,
            expected: bytes.len(),
        });
    }

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(KvError::Io(e)),
    }
    fs::rename(&tmp, path)?;

    tracing::debug!("Wrote {} ({} bytes)", path.display(), written);
    Ok(written)
}

/// Write as much of `bytes` as the sink accepts, then flush and sync.
/// Returns the number of bytes the sink took.
fn write_counted<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < bytes.len() {
        match writer.write(&bytes[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    writer.flush()?;
    Ok(written)
}

fn discard_tmp(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!("Failed to remove {}: {}", tmp.display(), e);
        }
    }
}

/// A file sink that syncs to disk on flush
pub(crate) struct SyncedFile(File);

impl Write for SyncedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.sync_all()
    }
}
