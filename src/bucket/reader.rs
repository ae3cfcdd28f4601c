//! The index search: locating every record offset whose indexed hash
//! equals a target.
//!
//! The search never scans the whole index. It estimates a landing entry
//! by interpolating the hash's top 32 bits over the entry count, loads
//! that page, and then compares:
//!
//! - landed inside the run: walk both directions collecting offsets;
//! - landed low: stride forward using the post fences, which give the
//!   last hash of up to [`FENCE_LEN`] following pages without loading
//!   them, then sweep the landing page;
//! - landed high: stride backward using the pre fences, binary search
//!   the landing page, then walk the run leftward.
//!
//! With a well-distributed hash the estimate lands within a page or two
//! of the target, so a lookup costs a small constant number of page
//! loads.

use crate::error::Result;
use crate::io::FileInput;

use super::iterator::PageIterator;
use super::page::FENCE_LEN;

/// Collects into `offsets` the record-region offset of every index entry
/// whose hash equals `target`. Order is not meaningful. Runs spanning
/// page boundaries are collected in full.
pub(crate) fn get_hash_offsets(
    input: &mut FileInput,
    pager: &mut PageIterator,
    offsets: &mut Vec<u64>,
    entries_num: u64,
    target: u64,
    index_offset: u64,
) -> Result<()> {
    offsets.clear();
    if entries_num == 0 {
        return Ok(());
    }

    // Estimated landing entry, interpolated from the top 32 bits.
    let estimate = ((target >> 32) as u128 * entries_num as u128 >> 32) as u64;
    pager.init(input, estimate, index_offset, entries_num)?;

    let landed = pager.current().hash;
    if landed == target {
        collect_around(input, pager, offsets, estimate, target, index_offset)
    } else if landed < target {
        sweep_right(input, pager, offsets, target)
    } else {
        search_left(input, pager, offsets, target)
    }
}

/// The estimate landed inside the run: collect it, walk left to the
/// run's start, then re-position and walk right to its end.
fn collect_around(
    input: &mut FileInput,
    pager: &mut PageIterator,
    offsets: &mut Vec<u64>,
    estimate: u64,
    target: u64,
    index_offset: u64,
) -> Result<()> {
    offsets.push(pager.current().offset);
    while pager.dec(input)? && pager.current().hash == target {
        offsets.push(pager.current().offset);
    }
    pager.init(input, estimate, index_offset, pager.entries_num())?;
    while pager.inc(input)? && pager.current().hash == target {
        offsets.push(pager.current().offset);
    }
    Ok(())
}

/// The landing page's hashes are below the target: stride forward with
/// the post fences until the current page can contain the target, then
/// sweep entries until one exceeds it.
fn sweep_right(
    input: &mut FileInput,
    pager: &mut PageIterator,
    offsets: &mut Vec<u64>,
    target: u64,
) -> Result<()> {
    while pager.page_id() + 1 < pager.pages_num() && pager.last_hash() < target {
        // Post fences for pages that actually exist.
        let window = (pager.pages_num() - pager.page_id() - 1).min(FENCE_LEN as u64);
        let mut p = 0;
        while p < window && pager.post_hash(p as usize) < target {
            p += 1;
        }
        // Fence p is the nearest following page whose last hash reaches
        // the target; without one, jump past the whole window.
        let step = if p < window { p + 1 } else { window };
        pager.set_page_id(input, pager.page_id() + step)?;
        pager.seek_entry(0);
    }
    loop {
        let entry = pager.current();
        if entry.hash > target {
            return Ok(());
        }
        if entry.hash == target {
            offsets.push(entry.offset);
        }
        if !pager.inc(input)? {
            return Ok(());
        }
    }
}

/// The landing page's hashes are above the target: stride backward with
/// the pre fences, binary search the landing page for the run's last
/// entry, then walk the run leftward across page boundaries.
fn search_left(
    input: &mut FileInput,
    pager: &mut PageIterator,
    offsets: &mut Vec<u64>,
    target: u64,
) -> Result<()> {
    while pager.page_id() > 0 && pager.first_hash() > target {
        let window = pager.page_id().min(FENCE_LEN as u64);
        let mut p = 0;
        while p < window && pager.pre_hash(p as usize) > target {
            p += 1;
        }
        let step = if p < window { p + 1 } else { window };
        pager.set_page_id(input, pager.page_id() - step)?;
    }

    // Last entry with hash <= target within the page.
    let mut bot = 0;
    let mut top = pager.size();
    while top > 1 {
        let mid = top / 2;
        if target >= pager.entry(bot + mid).hash {
            bot += mid;
        }
        top -= mid;
    }
    if pager.entry(bot).hash != target {
        return Ok(());
    }

    loop {
        let entry = pager.entry(bot);
        if entry.hash != target {
            return Ok(());
        }
        offsets.push(entry.offset);
        if bot > 0 {
            bot -= 1;
            continue;
        }
        if pager.page_id() == 0 {
            return Ok(());
        }
        pager.set_page_id(input, pager.page_id() - 1)?;
        bot = pager.size() - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::page::ENTRIES_PER_PAGE;
    use crate::bucket::record::Record;
    use crate::bucket::trailer::TRAILER_SIZE;
    use crate::bucket::writer::write_data_file;
    use crate::io::SECTOR_SIZE;
    use crate::tmpfs::NamedTempFile;

    struct Fixture {
        _tmp: NamedTempFile,
        input: FileInput,
        pager: PageIterator,
        index_offset: u64,
        entries_num: u64,
    }

    impl Fixture {
        /// Writes a data file with the given forged hashes (must produce
        /// at least one record each) and opens it for searching.
        fn new(hashes: &[u64]) -> Self {
            let mut records: Vec<Record> = hashes
                .iter()
                .enumerate()
                .map(|(i, &hash)| {
                    let mut record = Record::new(format!("k{i}"), format!("v{i}"));
                    record.hash = hash;
                    record
                })
                .collect();
            let tmp = NamedTempFile::new().unwrap();
            write_data_file(tmp.path(), &mut records, false, SECTOR_SIZE).unwrap();

            let byte_size = std::fs::metadata(tmp.path()).unwrap().len();
            let entries_num = hashes.len() as u64;
            let index_offset = byte_size
                - TRAILER_SIZE as u64
                - crate::bucket::page::pages_for(entries_num) * SECTOR_SIZE as u64;

            let mut input = FileInput::new(SECTOR_SIZE).unwrap();
            input.open(tmp.path(), false).unwrap();
            Self {
                _tmp: tmp,
                input,
                pager: PageIterator::new().unwrap(),
                index_offset,
                entries_num,
            }
        }

        fn search(&mut self, target: u64) -> Vec<u64> {
            let mut offsets = Vec::new();
            get_hash_offsets(
                &mut self.input,
                &mut self.pager,
                &mut offsets,
                self.entries_num,
                target,
                self.index_offset,
            )
            .unwrap();
            offsets
        }

        /// Offset of the i-th entry in hash order, read back from the
        /// index itself.
        fn entry_offset(&mut self, i: u64) -> u64 {
            self.pager
                .init(&mut self.input, i, self.index_offset, self.entries_num)
                .unwrap();
            self.pager.current().offset
        }
    }

    /// Hashes spread evenly over the full u64 range so the interpolation
    /// lands close to the true position.
    fn uniform_hashes(n: u64) -> Vec<u64> {
        let step = u64::MAX / n;
        (0..n).map(|i| (i + 1) * step).collect()
    }

    #[test]
    fn test_empty_index() {
        let mut fx = Fixture::new(&[]);
        assert!(fx.search(42).is_empty());
    }

    #[test]
    fn test_single_page_hits_and_misses() {
        let hashes = uniform_hashes(100);
        let mut fx = Fixture::new(&hashes);
        for &h in &hashes {
            assert_eq!(fx.search(h).len(), 1, "hash {h:#x} not found");
        }
        assert!(fx.search(0).is_empty());
        assert!(fx.search(u64::MAX).is_empty());
        assert!(fx.search(hashes[0] + 1).is_empty());
    }

    #[test]
    fn test_multi_page_every_hash_found() {
        // 1000 entries over 5 pages.
        let hashes = uniform_hashes(1000);
        let mut fx = Fixture::new(&hashes);
        for &h in &hashes {
            assert_eq!(fx.search(h).len(), 1, "hash {h:#x} not found");
        }
    }

    #[test]
    fn test_target_below_and_above_all() {
        let hashes = uniform_hashes(1000);
        let mut fx = Fixture::new(&hashes);
        assert!(fx.search(1).is_empty());
        assert!(fx.search(u64::MAX).is_empty());
    }

    #[test]
    fn test_forward_skip_with_skewed_low_estimate() {
        // All hashes have small top-32 bits, so the interpolated landing
        // entry is far left of most true positions and the search must
        // stride forward over the post fences.
        let n = 20 * ENTRIES_PER_PAGE as u64;
        let hashes: Vec<u64> = (1..=n).map(|i| i << 20).collect();
        let mut fx = Fixture::new(&hashes);

        // The largest hash sits on the last page; its estimate is ~0.
        let target = n << 20;
        assert_eq!(fx.search(target), vec![fx.entry_offset(n - 1)]);
        // A missing hash beyond every entry terminates cleanly.
        assert!(fx.search((n + 1) << 20).is_empty());
    }

    #[test]
    fn test_backward_skip_with_skewed_high_estimate() {
        // All hashes live in the top of the u64 range: the interpolated
        // landing overshoots and the search must stride back over the
        // pre fences.
        let n = 20 * ENTRIES_PER_PAGE as u64;
        let base = u64::MAX / 2;
        let hashes: Vec<u64> = (0..n).map(|i| base + (i << 8)).collect();
        let mut fx = Fixture::new(&hashes);

        // The smallest hash estimates to the middle of the file but
        // lives at entry 0.
        assert_eq!(fx.search(base), vec![fx.entry_offset(0)]);
        assert!(fx.search(base - 1).is_empty());
    }

    #[test]
    fn test_equal_run_spanning_page_boundary() {
        // A run of identical hashes long enough to straddle a page
        // boundary; every offset in the run must come back regardless of
        // which side the estimate lands on.
        let run_len = ENTRIES_PER_PAGE + 40;
        let shared = u64::MAX / 2;
        let mut hashes = Vec::new();
        for i in 0..200u64 {
            hashes.push(1 + (i << 16)); // filler well below the run
        }
        hashes.extend(std::iter::repeat(shared).take(run_len));
        for i in 0..200u64 {
            hashes.push(u64::MAX - (i << 16)); // filler well above
        }
        let mut fx = Fixture::new(&hashes);

        let found = fx.search(shared);
        assert_eq!(found.len(), run_len);
        // All offsets are distinct records.
        let mut unique = found.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), run_len);
    }

    #[test]
    fn test_duplicate_hashes_on_single_page() {
        let mut hashes = uniform_hashes(100);
        let dup = hashes[50];
        hashes.push(dup);
        hashes.push(dup);
        let mut fx = Fixture::new(&hashes);
        assert_eq!(fx.search(dup).len(), 3);
    }
}
