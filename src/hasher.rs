use std::fmt;

use crc::{Algorithm, Crc};
use xxhash_rust::xxh64::xxh64;

pub const CRC_64_ECMA: Algorithm<u64> = crc::CRC_64_ECMA_182;

/// Hashes a record key. Every index in a bucket is built with this
/// function, so it must stay stable across processes and releases:
/// xxHash64 with seed 0.
pub fn hash_key(key: &[u8]) -> u64 {
    xxh64(key, 0)
}

/// Rolling content checksum over a file's key/value pairs, stored in the
/// trailer and recomputed by [`crate::bucket::DataFile::verify_checksum`].
///
/// Each pair contributes `crc64(key) ^ crc64(value)`, XORed into the
/// running value, so the result is independent of how the pairs are
/// chunked into updates.
pub struct Checksum {
    rolling: u64,
    crc64: Crc<u64>,
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checksum")
            .field("rolling", &self.rolling)
            .finish()
    }
}

impl Checksum {
    pub fn new() -> Self {
        Self {
            rolling: 0,
            crc64: Crc::<u64>::new(&CRC_64_ECMA),
        }
    }

    /// Folds a key-value pair into the rolling checksum.
    pub fn update(&mut self, key: &[u8], value: &[u8]) {
        let key_checksum = self.crc64.checksum(key);
        let value_checksum = self.crc64.checksum(value);
        self.rolling ^= key_checksum ^ value_checksum;
    }

    /// Returns the current rolling checksum.
    pub fn value(&self) -> u64 {
        self.rolling
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key_is_pinned() {
        // xxHash64 seed 0 reference values; a change here breaks every
        // index written by an earlier build.
        assert_eq!(hash_key(b""), 0xef46db3751d8e999);
        assert_eq!(hash_key(b"a"), 0xd24ec4f1a98c6e5b);
    }

    #[test]
    fn test_hash_key_differs_per_key() {
        assert_ne!(hash_key(b"key1"), hash_key(b"key2"));
    }

    #[test]
    fn test_rolling_checksum_order_independent_chunking() {
        let mut checksum = Checksum::new();
        checksum.update(b"key1", b"value1");
        let single_step = checksum.value();

        let mut checksum = Checksum::new();
        checksum.update(b"key1", b"");
        let partial = checksum.value();
        checksum.update(b"", b"value1");
        let multi_step = checksum.value();

        assert_eq!(single_step, multi_step);
        assert_ne!(single_step, partial);
    }
}
