//! Memory-mapped file handle
//!
//! Read-only private mapping of a whole file, released on drop.

use std::fs::File;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::error::{KvError, Result};

/// A file opened read-only and mapped in full.
///
/// The descriptor and the mapping live exactly as long as the handle; every
/// exit path (including `?` in callers) unmaps and closes through `Drop`.
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    mmap: Mmap,
    _file: File,
}

impl MappedFile {
    /// Open and map `path`.
    ///
    /// Fails with `FileNotFound` for a missing file, `EmptyFile` for a
    /// zero-length one (which cannot be mapped) and `MapFailed` otherwise.
    pub fn open(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KvError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(KvError::Io(e)),
        };

        let len = file.metadata()?.len();
        if len == 0 {
            return Err(KvError::EmptyFile(path.to_path_buf()));
        }

        // SAFETY: hint files are immutable once renamed into place; new
        // snapshots replace the path instead of writing through it.
        let mmap = unsafe { MmapOptions::new().map_copy_read_only(&file) }.map_err(|source| {
            KvError::MapFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;

        tracing::trace!("Mapped {} ({} bytes)", path.display(), mmap.len());

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Unmap and close now
    pub fn close(self) {
        drop(self);
    }
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.mmap
    }
}
