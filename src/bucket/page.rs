//! Index page layout.
//!
//! The index region of a data file is a sequence of sector-sized pages:
//!
//! ```text
//! +---------------------------+
//! | pre_hashes  [u64; 8]      |  first hash of each of the preceding
//! +---------------------------+  8 pages, nearest first
//! | post_hashes [u64; 8]      |  last hash of each of the following
//! +---------------------------+  8 pages, nearest first
//! | entries     [entry; 248]  |  (hash u64, offset u64), sorted by hash
//! +---------------------------+
//! ```
//!
//! The fence arrays let a search skip whole pages without loading them.
//! Fence slots that would refer past the first or last page are written
//! as zero and must never be consulted; readers bound their fence window
//! by the file's page count.
//!
//! Pages are raw sector buffers. The accessors below read and write
//! fields in place so a loaded page never needs a decode pass.

use byteorder::{ByteOrder, LittleEndian};

use crate::io::SECTOR_SIZE;

/// Fence hashes kept per side of a page.
pub const FENCE_LEN: usize = 8;

/// Bytes per index entry: hash u64 + offset u64.
pub const ENTRY_SIZE: usize = 16;

/// Entries per page; chosen so a page is exactly one sector.
pub const ENTRIES_PER_PAGE: usize = (SECTOR_SIZE - 2 * FENCE_LEN * 8) / ENTRY_SIZE;

const POST_OFFSET: usize = FENCE_LEN * 8;
const ENTRIES_OFFSET: usize = 2 * FENCE_LEN * 8;

/// One slot of the index: the record's key hash and its byte offset in
/// the record region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: u64,
    pub offset: u64,
}

/// Number of index pages needed for `entries_num` entries.
pub fn pages_for(entries_num: u64) -> u64 {
    entries_num.div_ceil(ENTRIES_PER_PAGE as u64)
}

pub fn pre_hash(page: &[u8], i: usize) -> u64 {
    debug_assert!(i < FENCE_LEN);
    LittleEndian::read_u64(&page[i * 8..])
}

pub fn post_hash(page: &[u8], i: usize) -> u64 {
    debug_assert!(i < FENCE_LEN);
    LittleEndian::read_u64(&page[POST_OFFSET + i * 8..])
}

pub fn entry(page: &[u8], i: usize) -> IndexEntry {
    debug_assert!(i < ENTRIES_PER_PAGE);
    let at = ENTRIES_OFFSET + i * ENTRY_SIZE;
    IndexEntry {
        hash: LittleEndian::read_u64(&page[at..]),
        offset: LittleEndian::read_u64(&page[at + 8..]),
    }
}

pub fn set_pre_hash(page: &mut [u8], i: usize, hash: u64) {
    debug_assert!(i < FENCE_LEN);
    LittleEndian::write_u64(&mut page[i * 8..i * 8 + 8], hash);
}

pub fn set_post_hash(page: &mut [u8], i: usize, hash: u64) {
    debug_assert!(i < FENCE_LEN);
    let at = POST_OFFSET + i * 8;
    LittleEndian::write_u64(&mut page[at..at + 8], hash);
}

pub fn set_entry(page: &mut [u8], i: usize, entry: IndexEntry) {
    debug_assert!(i < ENTRIES_PER_PAGE);
    let at = ENTRIES_OFFSET + i * ENTRY_SIZE;
    LittleEndian::write_u64(&mut page[at..at + 8], entry.hash);
    LittleEndian::write_u64(&mut page[at + 8..at + 16], entry.offset);
}
