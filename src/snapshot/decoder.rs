//! Forward-Only RDB Snapshot Decoder
//!
//! Reads a snapshot file front to back and decodes the key/value/expiry records
//! of one database section.
//!
//! ## Supported Layout
//!
//! ```text
//! ... FE <db> [FB] <count> <expires> { [FC <u64 LE ms>] <type> <klen> <key> <vlen> <value> } ...
//! ```
//!
//! Everything before the matching `FE <db>` pair is skipped byte by byte, so
//! the header, auxiliary fields and earlier databases are never interpreted.
//! Only the short string length encoding (top two bits `00`) and the string
//! value type are accepted. Anything else fails with a [`SnapshotError`] rather
//! than being guessed at.

use crate::snapshot::opcode;
use bytes::Bytes;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, trace};

/// Value type byte for a plain string record.
pub const STRING_VALUE_TYPE: u8 = 0x00;

/// Mask for the 6-bit length carried by a short string length byte.
const SHORT_LENGTH_MASK: u8 = 0b0011_1111;

/// Errors that can occur while decoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file could not be opened or read
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested database index never appeared before end of stream
    #[error("database {0} not found in snapshot")]
    DatabaseNotFound(u8),

    /// The stream ended while more bytes were required
    #[error("unexpected end of snapshot while reading {context}")]
    UnexpectedEof { context: &'static str },

    /// A length byte used an encoding other than the 6-bit short form
    #[error("unsupported length encoding {byte:#04x} for {field}")]
    UnsupportedLengthEncoding { field: &'static str, byte: u8 },

    /// A record holds something other than a plain string
    #[error("unsupported value type {0:#04x}")]
    UnsupportedValueType(u8),

    /// A record uses the second-resolution expiry opcode
    #[error("expiry in seconds is not supported")]
    SecondsExpiryUnsupported,
}

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// A decoded record: payload plus optional absolute expiry in Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub value: Bytes,
    pub expires_at_ms: Option<u64>,
}

impl SnapshotEntry {
    /// Returns true if the entry has no expiry or `now_ms` has not passed it.
    #[inline]
    pub fn is_live_at(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_none_or(|exp| now_ms <= exp)
    }
}

/// Decoded key/value pairs of one database.
pub type SnapshotMap = HashMap<Bytes, SnapshotEntry>;

/// A forward-only reader over snapshot bytes.
///
/// # Example
///
/// ```
/// use snapkv::snapshot::SnapshotReader;
/// use std::io::Cursor;
///
/// let bytes = b"\xFE\x00\x01\x00\x00\x03foo\x03bar";
/// let mut reader = SnapshotReader::new(Cursor::new(&bytes[..]));
/// let mut map = Default::default();
/// reader.read_database_into(0, 0, &mut map).unwrap();
/// assert_eq!(map[&b"foo"[..]].value, "bar");
/// ```
#[derive(Debug)]
pub struct SnapshotReader<R> {
    reader: R,
    /// Number of bytes consumed so far
    position: u64,
}

impl SnapshotReader<BufReader<File>> {
    /// Opens the snapshot file at `path` for decoding.
    pub fn open(path: impl AsRef<Path>) -> SnapshotResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> SnapshotReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
        }
    }

    /// Returns the number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads one byte, or `None` at end of stream.
    fn next_byte(&mut self) -> SnapshotResult<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_u8(&mut self, context: &'static str) -> SnapshotResult<u8> {
        self.next_byte()?
            .ok_or(SnapshotError::UnexpectedEof { context })
    }

    fn read_exact(&mut self, buf: &mut [u8], context: &'static str) -> SnapshotResult<()> {
        match self.reader.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(SnapshotError::UnexpectedEof { context })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Scans forward until a select-database opcode followed by `db`.
    ///
    /// On success the reader is positioned at the start of that section's
    /// header.
    pub fn seek_database(&mut self, db: u8) -> SnapshotResult<()> {
        let mut at_select = false;

        while let Some(byte) = self.next_byte()? {
            if at_select {
                at_select = false;
                if byte == db {
                    debug!(db, offset = self.position - 2, "Selected database section");
                    return Ok(());
                }
                trace!(db = byte, "Skipping database section");
            } else if byte == opcode::SELECT_DB {
                at_select = true;
            }
        }

        Err(SnapshotError::DatabaseNotFound(db))
    }

    /// Reads the section header and returns the number of entries that follow.
    fn read_section_header(&mut self) -> SnapshotResult<u8> {
        let count = loop {
            let byte = self.read_u8("entry count")?;
            if byte != opcode::RESIZE_DB {
                break byte;
            }
            trace!("Skipping resize hint");
        };

        // Size of the expires hash table; only a hint.
        self.read_u8("expires table size")?;

        Ok(count)
    }

    /// Reads a 6-bit length-prefixed string.
    fn read_string(&mut self, field: &'static str) -> SnapshotResult<Bytes> {
        let length_byte = self.read_u8(field)?;
        if length_byte >> 6 != 0 {
            return Err(SnapshotError::UnsupportedLengthEncoding {
                field,
                byte: length_byte,
            });
        }

        let mut buf = vec![0u8; usize::from(length_byte & SHORT_LENGTH_MASK)];
        self.read_exact(&mut buf, field)?;
        Ok(Bytes::from(buf))
    }

    /// Decodes one record.
    pub fn read_entry(&mut self) -> SnapshotResult<(Bytes, SnapshotEntry)> {
        let leading = self.read_u8("entry")?;

        let (expires_at_ms, value_type) = match leading {
            opcode::EXPIRE_TIME_MS => {
                let mut buf = [0u8; 8];
                self.read_exact(&mut buf, "millisecond expiry")?;
                let expiry = u64::from_le_bytes(buf);
                (Some(expiry), self.read_u8("value type")?)
            }
            opcode::EXPIRE_TIME => return Err(SnapshotError::SecondsExpiryUnsupported),
            value_type => (None, value_type),
        };

        if value_type != STRING_VALUE_TYPE {
            return Err(SnapshotError::UnsupportedValueType(value_type));
        }

        let key = self.read_string("key")?;
        let value = self.read_string("value")?;

        Ok((
            key,
            SnapshotEntry {
                value,
                expires_at_ms,
            },
        ))
    }

    /// Decodes database `db` into `out`, keeping only entries live at `now_ms`.
    ///
    /// Entries are inserted as they are decoded, so after an error `out` still
    /// holds everything read before the failure.
    pub fn read_database_into(
        &mut self,
        db: u8,
        now_ms: u64,
        out: &mut SnapshotMap,
    ) -> SnapshotResult<()> {
        self.seek_database(db)?;

        let count = self.read_section_header()?;
        debug!(db, count, "Decoding database section");

        for index in 0..count {
            let (key, entry) = self.read_entry().inspect_err(|e| {
                debug!(db, index, error = %e, "Failed to decode entry");
            })?;

            if entry.is_live_at(now_ms) {
                trace!(
                    key = %String::from_utf8_lossy(&key),
                    expires_at_ms = ?entry.expires_at_ms,
                    "Decoded entry"
                );
                out.insert(key, entry);
            } else {
                trace!(key = %String::from_utf8_lossy(&key), now_ms, "Dropping expired entry");
            }
        }

        Ok(())
    }

    /// Decodes database `db` into a fresh map.
    pub fn read_database(&mut self, db: u8, now_ms: u64) -> SnapshotResult<SnapshotMap> {
        let mut out = SnapshotMap::new();
        self.read_database_into(db, now_ms, &mut out)?;
        Ok(out)
    }
}

/// Opens `path` and decodes database `db`, keeping entries live at `now_ms`.
///
/// The file is read from scratch on every call.
pub fn load_database(path: impl AsRef<Path>, db: u8, now_ms: u64) -> SnapshotResult<SnapshotMap> {
    SnapshotReader::open(path)?.read_database(db, now_ms)
}
