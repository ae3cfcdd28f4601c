use crate::error::{Error, Result};
use crate::io::{AlignedBuf, FileInput, SECTOR_SIZE};

use super::page::{self, pages_for, IndexEntry, ENTRIES_PER_PAGE, FENCE_LEN};

/// A cursor over a file's index pages.
///
/// Owns one sector-aligned page buffer and loads pages on demand with
/// aligned `pread`s, so the same iterator works under `O_DIRECT`. The
/// file handle is passed into each call rather than held, which keeps
/// the iterator reusable across files within a read context.
///
/// A short page read is reported as [`Error::ShortRead`]: the index
/// region never ends mid-page, so anything less than a full sector is
/// corruption rather than end-of-file.
pub struct PageIterator {
    page: AlignedBuf,
    index_offset: u64,
    entries_num: u64,
    pages_num: u64,
    page_id: u64,
    /// Valid entries in the loaded page; `ENTRIES_PER_PAGE` everywhere
    /// except the last page.
    size: usize,
    /// Entry the cursor points at within the loaded page.
    cursor: usize,
}

impl PageIterator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            page: AlignedBuf::new(SECTOR_SIZE)?,
            index_offset: 0,
            entries_num: 0,
            pages_num: 0,
            page_id: 0,
            size: 0,
            cursor: 0,
        })
    }

    /// Positions the iterator at `entry_index` within an index region of
    /// `entries_num` entries starting at `index_offset`, loading the
    /// containing page.
    pub fn init(
        &mut self,
        input: &mut FileInput,
        entry_index: u64,
        index_offset: u64,
        entries_num: u64,
    ) -> Result<()> {
        self.index_offset = index_offset;
        self.entries_num = entries_num;
        self.pages_num = pages_for(entries_num);
        self.cursor = (entry_index % ENTRIES_PER_PAGE as u64) as usize;
        self.set_page_id(input, entry_index / ENTRIES_PER_PAGE as u64)
    }

    /// Jumps to `page_id`, recomputing the valid-entry count and loading
    /// the page. The cursor is left where it was.
    pub fn set_page_id(&mut self, input: &mut FileInput, page_id: u64) -> Result<()> {
        self.page_id = page_id;
        let first = page_id * ENTRIES_PER_PAGE as u64;
        self.size = if first + ENTRIES_PER_PAGE as u64 > self.entries_num {
            (self.entries_num - first) as usize
        } else {
            ENTRIES_PER_PAGE
        };
        self.load(input)
    }

    /// The entry under the cursor.
    pub fn current(&self) -> IndexEntry {
        self.entry(self.cursor)
    }

    /// The entry at `i` within the loaded page.
    pub fn entry(&self, i: usize) -> IndexEntry {
        debug_assert!(i < self.size);
        page::entry(&self.page, i)
    }

    /// First hash of the loaded page.
    pub fn first_hash(&self) -> u64 {
        self.entry(0).hash
    }

    /// Last valid hash of the loaded page.
    pub fn last_hash(&self) -> u64 {
        self.entry(self.size - 1).hash
    }

    /// First hash of page `page_id - i - 1`. Only valid for
    /// `i < min(page_id, FENCE_LEN)`.
    pub fn pre_hash(&self, i: usize) -> u64 {
        debug_assert!((i as u64) < self.page_id.min(FENCE_LEN as u64));
        page::pre_hash(&self.page, i)
    }

    /// Last hash of page `page_id + i + 1`. Only valid for
    /// `i < min(pages_num - page_id - 1, FENCE_LEN)`.
    pub fn post_hash(&self, i: usize) -> u64 {
        debug_assert!((i as u64) < (self.pages_num - self.page_id - 1).min(FENCE_LEN as u64));
        page::post_hash(&self.page, i)
    }

    pub fn page_id(&self) -> u64 {
        self.page_id
    }

    pub fn pages_num(&self) -> u64 {
        self.pages_num
    }

    pub fn entries_num(&self) -> u64 {
        self.entries_num
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Moves the cursor within the loaded page without any I/O.
    pub fn seek_entry(&mut self, i: usize) {
        debug_assert!(i < self.size);
        self.cursor = i;
    }

    /// Steps to the next entry, crossing into the next page when needed.
    /// Returns `Ok(false)` past the last entry.
    pub fn inc(&mut self, input: &mut FileInput) -> Result<bool> {
        if self.cursor + 1 < self.size {
            self.cursor += 1;
            return Ok(true);
        }
        if self.page_id + 1 >= self.pages_num {
            return Ok(false);
        }
        self.cursor = 0;
        self.set_page_id(input, self.page_id + 1)?;
        Ok(true)
    }

    /// Steps to the previous entry, crossing into the previous page when
    /// needed. Returns `Ok(false)` before the first entry.
    pub fn dec(&mut self, input: &mut FileInput) -> Result<bool> {
        if self.cursor > 0 {
            self.cursor -= 1;
            return Ok(true);
        }
        if self.page_id == 0 {
            return Ok(false);
        }
        // Every page before the last is full.
        self.cursor = ENTRIES_PER_PAGE - 1;
        self.set_page_id(input, self.page_id - 1)?;
        Ok(true)
    }

    /// Loads the page at `page_id` with one sector-aligned `pread`.
    fn load(&mut self, input: &mut FileInput) -> Result<()> {
        let at = self.index_offset + self.page_id * SECTOR_SIZE as u64;
        let got = input.pread(&mut self.page, at)?;
        if got != SECTOR_SIZE {
            return Err(Error::ShortRead {
                expected: SECTOR_SIZE,
                got,
            });
        }
        Ok(())
    }
}
