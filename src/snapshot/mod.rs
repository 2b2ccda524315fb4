//! RDB Snapshot Module
//!
//! Read-only access to an on-disk snapshot in the RDB layout. The server never
//! writes snapshots; it consults one as a fallback data source when a key is
//! missing from memory and as the backing set for `KEYS`.
//!
//! ## Overview
//!
//! A snapshot is a sequence of database sections. Each section starts with a
//! select-database opcode and a one-byte index, followed by a small header and
//! the records themselves:
//!
//! ```text
//! REDIS0011 <aux fields> FE 00 FB 03 01 <record> <record> <record> FF <checksum>
//! ```
//!
//! A decode builds a fresh map on every call. Nothing is cached.
//!
//! ## Example
//!
//! ```no_run
//! use snapkv::snapshot::{load_database, unix_time_ms};
//!
//! let map = load_database("./dump.rdb", 0, unix_time_ms())?;
//! for (key, entry) in &map {
//!     println!("{:?} => {:?}", key, entry.value);
//! }
//! # Ok::<(), snapkv::snapshot::SnapshotError>(())
//! ```

pub mod decoder;
pub mod dump;

pub use decoder::{
    load_database, SnapshotEntry, SnapshotError, SnapshotMap, SnapshotReader, SnapshotResult,
    STRING_VALUE_TYPE,
};
pub use dump::dump_bytes;

use std::time::{SystemTime, UNIX_EPOCH};

/// Reserved opcode bytes of the snapshot format.
pub mod opcode {
    /// Auxiliary metadata field
    pub const AUX: u8 = 0xFA;
    /// Hash table size hints for the current database
    pub const RESIZE_DB: u8 = 0xFB;
    /// Absolute expiry, 8-byte little-endian Unix milliseconds
    pub const EXPIRE_TIME_MS: u8 = 0xFC;
    /// Absolute expiry, 4-byte Unix seconds (unsupported)
    pub const EXPIRE_TIME: u8 = 0xFD;
    /// Start of a database section
    pub const SELECT_DB: u8 = 0xFE;
    /// End of file, followed by a checksum
    pub const EOF: u8 = 0xFF;
}

/// Current wall-clock time in Unix milliseconds, the reference "now" for decoding.
pub fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
