//! Aligned buffered file I/O.
//!
//! Direct I/O (`O_DIRECT` on Linux) bypasses the operating system's page
//! cache, which suits an engine that lays its files out in sector-sized
//! units anyway. It imposes strict alignment requirements:
//!
//! 1. The memory buffer's starting address must be aligned to the sector
//!    size.
//! 2. The number of bytes transferred must be a multiple of the sector
//!    size.
//! 3. The file offset must be a multiple of the sector size.
//!
//! [`FileInput`] and [`FileOutput`] satisfy these through an internal
//! aligned bounce buffer, so the same call sites work whether or not the
//! file was opened with `O_DIRECT`.

pub mod aligned;
pub mod input;
pub mod output;

pub use aligned::{aligned_len, AlignedBuf};
pub use input::FileInput;
pub use output::FileOutput;

/// The I/O alignment unit, typically a disk sector size.
pub const SECTOR_SIZE: usize = 4096;
