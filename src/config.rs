use std::path::PathBuf;

use crate::io::SECTOR_SIZE;

/// Configuration for a bucket.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Directory holding the bucket's data files
    pub dir: PathBuf,

    /// Open data files with O_DIRECT for both writes and reads
    /// (default: false)
    pub direct_io: bool,

    /// Write-side bounce buffer size, rounded up to a sector multiple
    /// (default: 64KB)
    pub write_buffer_size: usize,

    /// Read-side bounce buffer size, rounded up to a sector multiple
    /// (default: one sector)
    pub read_buffer_size: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./pail"),
            direct_io: false,
            write_buffer_size: 64 * 1024, // 64KB
            read_buffer_size: SECTOR_SIZE,
        }
    }
}

impl BucketConfig {
    /// Create a new config with the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Enable direct I/O
    pub fn direct_io(mut self, enabled: bool) -> Self {
        self.direct_io = enabled;
        self
    }

    /// Set write buffer size
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}
