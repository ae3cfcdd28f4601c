use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};

use crate::error::{Error, Result};

use super::SECTOR_SIZE;

/// Rounds `requested` up to the nearest multiple of the sector size.
/// A zero request still gets one full sector.
pub fn aligned_len(requested: usize) -> usize {
    if requested == 0 {
        return SECTOR_SIZE;
    }
    requested.div_ceil(SECTOR_SIZE) * SECTOR_SIZE
}

/// A heap buffer whose start address is aligned to the sector size, as
/// required for direct I/O transfers.
pub struct AlignedBuf {
    data: *mut u8,
    capacity: usize,
    layout: Layout,
}

unsafe impl Send for AlignedBuf {}

impl AlignedBuf {
    /// Allocates a zeroed buffer of `capacity` bytes. `capacity` must be a
    /// multiple of the sector size; use [`aligned_len`] to round up.
    pub fn new(capacity: usize) -> Result<Self> {
        debug_assert_eq!(capacity % SECTOR_SIZE, 0);
        let layout =
            Layout::from_size_align(capacity, SECTOR_SIZE).map_err(|_| Error::Alloc)?;
        let data = unsafe { alloc_zeroed(layout) };
        if data.is_null() {
            return Err(Error::Alloc);
        }
        Ok(Self {
            data,
            capacity,
            layout,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        unsafe { dealloc(self.data, self.layout) }
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.data, self.capacity) }
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.data, self.capacity) }
    }
}
