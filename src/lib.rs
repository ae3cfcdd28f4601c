//! Pail is a hash-indexed, append-only key-value storage engine.
//!
//! A [`Bucket`] stores batches of records into immutable, sorted data
//! files and serves point lookups by key. Each insert seals one file:
//! records sorted by key hash, followed by a paginated hash index whose
//! per-page fence arrays let a lookup skip pages without reading them,
//! followed by a trailer carrying the entry count and a content
//! checksum. All file I/O goes through sector-aligned buffers, so the
//! same code paths run with or without `O_DIRECT`.
//!
//! ```no_run
//! use pail::{Bucket, BucketConfig, ReadContext, Record};
//!
//! # fn main() -> pail::Result<()> {
//! let mut bucket = Bucket::open(BucketConfig::new("/var/lib/pail"))?;
//! bucket.insert(vec![Record::new("a", "alpha")])?;
//!
//! let mut ctx = ReadContext::new()?;
//! let matches = bucket.read(b"a", &mut ctx)?;
//! assert_eq!(matches[0].value, b"alpha");
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod config;
pub mod error;
pub mod format;
pub mod hasher;
pub mod io;
pub mod tmpfs;

pub use bucket::{Bucket, DataFile, ReadContext, Record};
pub use config::BucketConfig;
pub use error::{Error, Result};
