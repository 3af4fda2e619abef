//! Hint Record codec
//!
//! Encodes and decodes packed hint records and the bucket-aware locator.
//!
//! ## Record Layout (little-endian)
//! ```text
//! ┌──────────┬────────────────┬─────────────┬────────────┬──────────────┐
//! │KeySize(1)│ PosHigh (3)    │ Version (4) │ ValHash (2)│ Key + 0x00   │
//! └──────────┴────────────────┴─────────────┴────────────┴──────────────┘
//! ```

use std::fmt;

use crate::error::{KvError, Result};

/// Fixed header: key_size (1) + position_high (3) + version (4) + value_hash (2)
pub const RECORD_HEADER_SIZE: usize = 10;

/// Longest key a record can carry (key_size is 8 bits)
pub const MAX_KEY_SIZE: usize = u8::MAX as usize;

// =============================================================================
// Locator
// =============================================================================

/// 32-bit address of an item: `(offset_high24 << 8) | bucket_id`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Locator(u32);

impl Locator {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Rebuild a locator from the persisted upper 24 bits and a bucket id
    pub const fn from_parts(offset_high: u32, bucket: u8) -> Self {
        Self(((offset_high & 0x00ff_ffff) << 8) | bucket as u32)
    }

    /// Upper 24 bits: the part a hint record persists
    pub const fn offset_high(self) -> u32 {
        self.0 >> 8
    }

    /// Low byte: the owning bucket
    pub const fn bucket(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({:#08x}@{})", self.offset_high(), self.bucket())
    }
}

impl From<u32> for Locator {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

// =============================================================================
// Decoded Record
// =============================================================================

/// One decoded record, borrowing its key from the scanned buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintEntry<'a> {
    pub key: &'a [u8],
    pub locator: Locator,
    pub version: i32,
    pub value_hash: u16,
}

impl HintEntry<'_> {
    pub fn is_tombstone(&self) -> bool {
        self.version <= 0
    }
}

/// Encoded length of a record with a `key_size`-byte key
pub const fn record_len(key_size: usize) -> usize {
    RECORD_HEADER_SIZE + key_size + 1
}

// =============================================================================
// Encoding/Decoding
// =============================================================================

/// Append one record to `out`.
///
/// Only the upper 24 bits of `locator` are stored; the bucket byte comes back
/// from the hint file's bucket at decode time.
pub fn encode_into(
    out: &mut Vec<u8>,
    key: &[u8],
    locator: Locator,
    version: i32,
    value_hash: u16,
) -> Result<usize> {
    if key.len() > MAX_KEY_SIZE {
        return Err(KvError::KeyTooLong(key.len()));
    }

    let pos = locator.offset_high().to_le_bytes();
    let len = record_len(key.len());
    out.reserve(len);

    out.push(key.len() as u8);
    out.extend_from_slice(&pos[..3]);
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&value_hash.to_le_bytes());
    out.extend_from_slice(key);
    out.push(0);

    Ok(len)
}

/// Encode one record to a fresh buffer
pub fn encode(key: &[u8], locator: Locator, version: i32, value_hash: u16) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(record_len(key.len()));
    encode_into(&mut out, key, locator, version, value_hash)?;
    Ok(out)
}

/// Decode the record at the start of `bytes`.
///
/// Returns the entry and the number of bytes it occupies. Never reads past
/// the end of `bytes`: a record that does not fit yields `TruncatedRecord`
/// carrying the shortfall.
pub fn decode(bytes: &[u8], bucket: u8) -> Result<(HintEntry<'_>, usize)> {
    let Some(&key_size) = bytes.first() else {
        return Err(KvError::TruncatedRecord {
            needed: record_len(0),
        });
    };

    let key_size = key_size as usize;
    let len = record_len(key_size);
    if bytes.len() < len {
        return Err(KvError::TruncatedRecord {
            needed: len - bytes.len(),
        });
    }

    let offset_high = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], 0]);
    let version = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let value_hash = u16::from_le_bytes([bytes[8], bytes[9]]);
    let key = &bytes[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + key_size];

    let entry = HintEntry {
        key,
        locator: Locator::from_parts(offset_high, bucket),
        version,
        value_hash,
    };
    Ok((entry, len))
}

// =============================================================================
// Record Iterator
// =============================================================================

/// Iterator over the packed records of a decoded hint buffer.
///
/// Yields `Err(TruncatedRecord)` at most once, for a cut-off tail, then ends.
pub struct RecordIter<'a> {
    remaining: &'a [u8],
    bucket: u8,
    done: bool,
}

impl<'a> RecordIter<'a> {
    pub fn new(bytes: &'a [u8], bucket: u8) -> Self {
        Self {
            remaining: bytes,
            bucket,
            done: false,
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<HintEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining.is_empty() {
            return None;
        }

        let bytes: &'a [u8] = self.remaining;
        match decode(bytes, self.bucket) {
            Ok((entry, len)) => {
                self.remaining = &bytes[len..];
                Some(Ok(entry))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
