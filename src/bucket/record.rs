use std::fmt;

use crate::error::Result;
use crate::format;
use crate::hasher::hash_key;
use crate::io::{FileInput, FileOutput};

/// A key-value record. The hash is computed from the key on construction
/// and is what the file index is sorted and searched by.
///
/// On the record stream a record is serialized as
/// `(key_len u64, key, value_len u64, value)`, little-endian lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub hash: u64,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        let key = key.into();
        let hash = hash_key(&key);
        Self {
            key,
            value: value.into(),
            hash,
        }
    }

    /// Serialized length on the record stream.
    pub fn encoded_len(&self) -> u64 {
        2 * 8 + self.key.len() as u64 + self.value.len() as u64
    }

    /// Appends the serialized record to the output stream.
    pub fn write_to(&self, out: &mut FileOutput) -> Result<()> {
        out.write_bytes(&self.key)?;
        out.write_bytes(&self.value)
    }

    /// Reads one record from the sequential stream, rehashing the key.
    pub fn read_from(input: &mut FileInput) -> Result<Self> {
        let mut key = Vec::new();
        let mut value = Vec::new();
        input.read_bytes(&mut key)?;
        input.read_bytes(&mut value)?;
        Ok(Self::new(key, value))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}: {}}}",
            format::bytes(&self.key),
            format::bytes(&self.value)
        )
    }
}
