//! A bucket: an ordered collection of immutable data files serving a
//! key-value shard.
//!
//! ## Data file layout
//!
//! ```text
//! +------------------------------+
//! | record region                |  (key_len u64, key,
//! |   ...                        |   value_len u64, value)*
//! | zero padding to a sector     |
//! +------------------------------+
//! | index region                 |  sorted (hash, offset) entries,
//! |   IndexPage * pages          |  one sector per page, with
//! |                              |  pre/post fence arrays
//! +------------------------------+
//! | trailer                      |  one sector: magic, geometry,
//! +------------------------------+  entry count, content checksum
//! ```
//!
//! Each [`Bucket::insert`] seals one new data file; nothing is ever
//! updated in place. [`Bucket::read`] probes every file in insertion
//! order and returns at most one match per file, so a key rewritten by a
//! later insert yields its full history, oldest first.

pub mod data_file;
pub mod iterator;
pub mod page;
pub mod reader;
pub mod record;
pub mod trailer;
pub mod writer;

use std::fs;
use std::io::SeekFrom;
use std::path::PathBuf;

use crate::config::BucketConfig;
use crate::error::{Error, Result};
use crate::format;
use crate::hasher::hash_key;
use crate::io::{FileInput, SECTOR_SIZE};

pub use data_file::DataFile;
pub use iterator::PageIterator;
pub use record::Record;

/// Caller-owned scratch state for lookups: the input handle with its
/// bounce buffer, the page iterator with its page buffer, and the
/// candidate-offset vector. Holding these outside the bucket lets each
/// concurrent reader drive its own positional reads over the shared
/// descriptors without allocating per lookup.
pub struct ReadContext {
    input: FileInput,
    pager: PageIterator,
    offsets: Vec<u64>,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
}

impl ReadContext {
    pub fn new() -> Result<Self> {
        Self::with_buffer_size(SECTOR_SIZE)
    }

    /// A context whose input buffer holds `buffer_size` bytes, rounded
    /// up to a sector multiple.
    pub fn with_buffer_size(buffer_size: usize) -> Result<Self> {
        Ok(Self {
            input: FileInput::new(buffer_size)?,
            pager: PageIterator::new()?,
            offsets: Vec::new(),
            key_buf: Vec::new(),
            value_buf: Vec::new(),
        })
    }

    /// Record offsets probed by the most recent per-file search,
    /// including candidates that were rejected on key comparison.
    pub fn candidates(&self) -> &[u64] {
        &self.offsets
    }
}

/// A directory-scoped collection of sealed data files.
pub struct Bucket {
    config: BucketConfig,
    files: Vec<DataFile>,
    next_ordinal: u64,
}

impl Bucket {
    /// Opens a bucket, creating the directory if needed and restoring
    /// the file list from any `<N>.data` files already present.
    pub fn open(config: BucketConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir).map_err(|source| Error::Io {
            op: "mkdir",
            source,
        })?;

        let mut found: Vec<(u64, PathBuf)> = Vec::new();
        let entries = fs::read_dir(&config.dir).map_err(|source| Error::Io {
            op: "readdir",
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| Error::Io {
                op: "readdir",
                source,
            })?;
            if let Some(ordinal) = parse_ordinal(&entry.file_name()) {
                found.push((ordinal, entry.path()));
            }
        }
        found.sort_unstable_by_key(|(ordinal, _)| *ordinal);

        let next_ordinal = found.last().map_or(0, |(ordinal, _)| ordinal + 1);
        let mut files = Vec::with_capacity(found.len());
        for (_, path) in found {
            files.push(DataFile::open(path, config.direct_io)?);
        }

        tracing::info!(
            dir = %config.dir.display(),
            files = files.len(),
            "opened bucket"
        );
        Ok(Self {
            config,
            files,
            next_ordinal,
        })
    }

    /// The sealed files, in insertion order.
    pub fn files(&self) -> &[DataFile] {
        &self.files
    }

    /// A read context whose input buffer is sized per this bucket's
    /// configuration.
    pub fn read_context(&self) -> Result<ReadContext> {
        ReadContext::with_buffer_size(self.config.read_buffer_size)
    }

    /// Sorts the batch by key hash and seals it into a new data file.
    /// On failure nothing is registered; the partial file may remain on
    /// disk for the caller to clean up.
    pub fn insert(&mut self, mut records: Vec<Record>) -> Result<()> {
        let path = self.config.dir.join(format!("{}.data", self.next_ordinal));
        let sealed = writer::write_data_file(
            &path,
            &mut records,
            self.config.direct_io,
            self.config.write_buffer_size,
        )
        .and_then(|()| DataFile::open(&path, self.config.direct_io));

        match sealed {
            Ok(file) => {
                self.files.push(file);
                self.next_ordinal += 1;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "insert failed; partial file may remain on disk"
                );
                Err(err)
            }
        }
    }

    /// Looks up `key` across every data file in insertion order. Each
    /// file contributes at most one record: the first candidate offset
    /// whose stored key matches exactly.
    pub fn read(&self, key: &[u8], ctx: &mut ReadContext) -> Result<Vec<Record>> {
        let target = hash_key(key);
        let mut result = Vec::new();

        for file in &self.files {
            ctx.input.attach(file.file(), self.config.direct_io)?;
            reader::get_hash_offsets(
                &mut ctx.input,
                &mut ctx.pager,
                &mut ctx.offsets,
                file.entries_count(),
                target,
                file.index_offset(),
            )?;
            for &offset in &ctx.offsets {
                ctx.input.seek(SeekFrom::Start(offset))?;
                ctx.input.read_bytes(&mut ctx.key_buf)?;
                if ctx.key_buf == key {
                    ctx.input.read_bytes(&mut ctx.value_buf)?;
                    result.push(Record::new(key.to_vec(), ctx.value_buf.clone()));
                    break;
                }
            }
            ctx.input.close();
        }

        tracing::debug!(
            key = %format::bytes(key),
            matches = result.len(),
            "bucket read"
        );
        Ok(result)
    }
}

/// Parses a data file name of the form `<N>.data`.
fn parse_ordinal(name: &std::ffi::OsStr) -> Option<u64> {
    name.to_str()?
        .strip_suffix(".data")?
        .parse::<u64>()
        .ok()
}
