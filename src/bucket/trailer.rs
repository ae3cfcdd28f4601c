use byteorder::{ByteOrder, LittleEndian};

use crate::corruption;
use crate::error::Result;
use crate::io::SECTOR_SIZE;

use super::page::{ENTRIES_PER_PAGE, FENCE_LEN};

/// The trailer occupies the last sector of a data file so the file stays
/// sector-aligned end to end.
pub const TRAILER_SIZE: usize = SECTOR_SIZE;

const MAGIC: &[u8; 8] = b"PAILDAT\0";
const VERSION: u32 = 1;

/// Per-file trailer: makes the entry count durable and records the
/// geometry the index was written with, so a bucket can be reopened and
/// a file from a mismatched build rejected.
///
/// ```text
/// offset 0   magic            [u8; 8]
/// offset 8   version          u32
/// offset 12  sector_size      u32
/// offset 16  fence_len        u32
/// offset 20  entries_per_page u32
/// offset 24  entries_count    u64
/// offset 32  checksum         u64   rolling CRC-64 over key/value pairs
/// offset 40  zero padding to the end of the sector
/// ```
#[derive(Debug, Clone)]
pub struct Trailer {
    pub entries_count: u64,
    pub checksum: u64,
}

impl Trailer {
    pub fn new(entries_count: u64, checksum: u64) -> Self {
        Self {
            entries_count,
            checksum,
        }
    }

    pub fn encode(&self) -> [u8; TRAILER_SIZE] {
        let mut buf = [0u8; TRAILER_SIZE];
        buf[0..8].copy_from_slice(MAGIC);
        LittleEndian::write_u32(&mut buf[8..12], VERSION);
        LittleEndian::write_u32(&mut buf[12..16], SECTOR_SIZE as u32);
        LittleEndian::write_u32(&mut buf[16..20], FENCE_LEN as u32);
        LittleEndian::write_u32(&mut buf[20..24], ENTRIES_PER_PAGE as u32);
        LittleEndian::write_u64(&mut buf[24..32], self.entries_count);
        LittleEndian::write_u64(&mut buf[32..40], self.checksum);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 40 {
            return Err(corruption!("trailer too short: {} bytes", buf.len()));
        }
        if &buf[0..8] != MAGIC {
            return Err(corruption!("bad trailer magic"));
        }
        let version = LittleEndian::read_u32(&buf[8..12]);
        if version != VERSION {
            return Err(corruption!("unsupported data file version: {version}"));
        }
        let sector_size = LittleEndian::read_u32(&buf[12..16]);
        let fence_len = LittleEndian::read_u32(&buf[16..20]);
        let entries_per_page = LittleEndian::read_u32(&buf[20..24]);
        if sector_size != SECTOR_SIZE as u32
            || fence_len != FENCE_LEN as u32
            || entries_per_page != ENTRIES_PER_PAGE as u32
        {
            return Err(corruption!(
                "geometry mismatch: sector {sector_size}, fences {fence_len}, \
                 entries per page {entries_per_page}"
            ));
        }
        Ok(Self {
            entries_count: LittleEndian::read_u64(&buf[24..32]),
            checksum: LittleEndian::read_u64(&buf[32..40]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_roundtrip() {
        let trailer = Trailer::new(1_000_000, 0xfeed_f00d);
        let encoded = trailer.encode();
        assert_eq!(encoded.len(), TRAILER_SIZE);
        let decoded = Trailer::decode(&encoded).expect("decode failed");
        assert_eq!(decoded.entries_count, 1_000_000);
        assert_eq!(decoded.checksum, 0xfeed_f00d);
    }

    #[test]
    fn test_bad_magic() {
        let mut encoded = Trailer::new(1, 2).encode();
        encoded[0..8].copy_from_slice(b"INVALID!");
        assert!(matches!(
            Trailer::decode(&encoded),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut encoded = Trailer::new(1, 2).encode();
        LittleEndian::write_u32(&mut encoded[8..12], 999);
        assert!(matches!(
            Trailer::decode(&encoded),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_geometry_mismatch() {
        let mut encoded = Trailer::new(1, 2).encode();
        LittleEndian::write_u32(&mut encoded[12..16], 512);
        assert!(matches!(
            Trailer::decode(&encoded),
            Err(Error::Corruption(_))
        ));
    }
}
