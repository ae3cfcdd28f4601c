//! The write path: turns a batch of records into one sealed data file.
//!
//! Records are sorted by hash and streamed out, then the index pages are
//! emitted over the same stream, then the trailer. Every region boundary
//! is sector-aligned, so the file can be written and later read with
//! `O_DIRECT`.

use std::path::Path;

use crate::error::Result;
use crate::hasher::Checksum;
use crate::io::{FileOutput, SECTOR_SIZE};

use super::page::{
    self, pages_for, IndexEntry, ENTRIES_PER_PAGE, FENCE_LEN,
};
use super::record::Record;
use super::trailer::Trailer;

/// Sorts `records` by hash and writes a complete data file at `path`:
/// record region, zero padding to the next sector boundary, index pages,
/// trailer. On error the partially written file is left for the caller
/// to clean up and nothing is registered.
pub fn write_data_file(
    path: &Path,
    records: &mut [Record],
    direct_io: bool,
    buffer_size: usize,
) -> Result<()> {
    records.sort_unstable_by_key(|r| r.hash);

    let mut out = FileOutput::new(buffer_size)?;
    out.open(path, direct_io)?;

    // Record region. Offsets are byte positions of each record's key_len
    // field, in written (= hash) order.
    let mut offsets = Vec::with_capacity(records.len());
    let mut checksum = Checksum::new();
    let mut offset = 0u64;
    for record in records.iter() {
        record.write_to(&mut out)?;
        offsets.push(offset);
        offset += record.encoded_len();
        checksum.update(&record.key, &record.value);
    }

    // Pad so the index region starts on a sector boundary.
    let tail = (offset % SECTOR_SIZE as u64) as usize;
    if tail > 0 {
        out.write(&vec![0u8; SECTOR_SIZE - tail])?;
    }

    write_index(&mut out, records, &offsets)?;

    let trailer = Trailer::new(records.len() as u64, checksum.value());
    out.write(&trailer.encode())?;
    out.close()?;

    tracing::info!(
        path = %path.display(),
        entries = records.len(),
        bytes = out.total_written(),
        "sealed data file"
    );
    Ok(())
}

/// Emits the index pages for `records` (already in hash order). Fence
/// slots that would refer past the first or last page stay zero; the
/// search bounds its fence window by the page count and never reads
/// them.
fn write_index(
    out: &mut FileOutput,
    records: &[Record],
    offsets: &[u64],
) -> Result<()> {
    let entries_num = records.len();
    let pages_num = pages_for(entries_num as u64) as usize;
    let mut buf = [0u8; SECTOR_SIZE];

    for p in 0..pages_num {
        buf.fill(0);

        let lo = p * ENTRIES_PER_PAGE;
        let hi = (lo + ENTRIES_PER_PAGE).min(entries_num);
        for (slot, i) in (lo..hi).enumerate() {
            page::set_entry(
                &mut buf,
                slot,
                IndexEntry {
                    hash: records[i].hash,
                    offset: offsets[i],
                },
            );
        }

        // pre_hashes[i]: first hash of page p - i - 1, nearest first.
        let preceding = p.min(FENCE_LEN);
        for i in 0..preceding {
            let first = (p - i - 1) * ENTRIES_PER_PAGE;
            page::set_pre_hash(&mut buf, i, records[first].hash);
        }

        // post_hashes[i]: last hash of page p + i + 1, nearest first.
        let following = (pages_num - 1 - p).min(FENCE_LEN);
        for i in 0..following {
            let last = ((p + i + 2) * ENTRIES_PER_PAGE).min(entries_num) - 1;
            page::set_post_hash(&mut buf, i, records[last].hash);
        }

        out.write(&buf)?;
    }
    Ok(())
}
