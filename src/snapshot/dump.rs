//! Byte-level snapshot dump for debugging.

use crate::snapshot::SnapshotResult;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::trace;

/// Logs every byte of the snapshot at `path` at trace level.
///
/// Each line shows the offset, the byte as a printable character (or `.`),
/// and its decimal, hex and binary forms. Returns the number of bytes read.
pub fn dump_bytes(path: impl AsRef<Path>) -> SnapshotResult<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0u64;

    for byte in reader.bytes() {
        let byte = byte?;
        trace!(offset = count, "{}", format_byte(byte));
        count += 1;
    }

    Ok(count)
}

fn format_byte(byte: u8) -> String {
    let printable = if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else {
        '.'
    };
    format!("{} {:3} {:02x} {:08b}", printable, byte, byte, byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_byte() {
        assert_eq!(format_byte(b'R'), "R  82 52 01010010");
        assert_eq!(format_byte(0xFE), ". 254 fe 11111110");
        assert_eq!(format_byte(b'\n'), ".  10 0a 00001010");
    }

    #[test]
    fn test_dump_counts_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"REDIS0011\xFE\x00").unwrap();

        assert_eq!(dump_bytes(file.path()).unwrap(), 11);
    }
}
