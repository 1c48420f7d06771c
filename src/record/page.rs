use tracing::trace;

use super::error::{RecordError, RecordResult};
use super::row::RecordId;
use crate::file::{BLOCK_SZ, BlockId};

/// Size of one directory entry: `(size: u16, loc: u16)`
const SLOT_SIZE: usize = 4;

/// Slotted page over one block.
///
/// Layout: directory entry 0 is the block header `(num_records, end_free)`;
/// entry `i` (1-based) at offset `4 * i` is `(size, loc)` for record `i`.
/// Record data is packed at the end of the block and grows toward lower
/// addresses, while the directory grows toward higher addresses.
/// A directory entry with `size == 0` is a tombstone.
///
/// Pages are working copies: fetch from the heap file, mutate, put back.
pub struct SlottedPage {
    block: Vec<u8>, // exactly BLOCK_SZ bytes
    block_id: BlockId,
    num_records: u16,
    /// Offset of the last free byte before the packed record data
    end_free: u16,
}

impl SlottedPage {
    /// Largest record an empty block can hold
    pub const MAX_RECORD_SIZE: usize = BLOCK_SZ - 1 - 2 * SLOT_SIZE;

    /// Create a freshly initialized, empty page
    pub fn new_empty(block_id: BlockId) -> Self {
        let mut page = Self {
            block: vec![0u8; BLOCK_SZ],
            block_id,
            num_records: 0,
            end_free: 0,
        };
        page.initialize_empty();
        page
    }

    /// Wrap an existing block image, reading header and directory from it
    pub fn from_bytes(block_id: BlockId, block: Vec<u8>) -> RecordResult<Self> {
        if block.len() != BLOCK_SZ {
            return Err(RecordError::Corrupt(
                block_id,
                format!("block is {} bytes, expected {}", block.len(), BLOCK_SZ),
            ));
        }

        let mut page = Self {
            block,
            block_id,
            num_records: 0,
            end_free: 0,
        };
        let (num_records, end_free) = page.get_header(0);
        page.num_records = num_records;
        page.end_free = end_free;

        if end_free as usize >= BLOCK_SZ || !page.directory_fits() {
            return Err(RecordError::Corrupt(
                block_id,
                format!(
                    "header num_records={} end_free={} overlaps directory",
                    num_records, end_free
                ),
            ));
        }

        for record_id in 1..=num_records {
            let (size, loc) = page.get_header(record_id);
            if loc == 0 {
                continue;
            }
            if loc <= end_free || loc as usize + size as usize > BLOCK_SZ {
                return Err(RecordError::Corrupt(
                    block_id,
                    format!(
                        "record {} at loc={} size={} is outside the data region",
                        record_id, loc, size
                    ),
                ));
            }
        }

        Ok(page)
    }

    /// Reset this page to an empty block
    pub fn initialize_empty(&mut self) {
        self.num_records = 0;
        self.end_free = (BLOCK_SZ - 1) as u16;
        self.put_block_header();
    }

    /// Add a new record and return its id
    pub fn add(&mut self, data: &[u8]) -> RecordResult<RecordId> {
        if !self.has_room(data.len()) {
            return Err(RecordError::NoRoom {
                needed: data.len(),
                available: self.free_space(),
            });
        }

        let id = self.num_records + 1;
        let size = data.len() as u16;
        self.num_records = id;
        self.end_free -= size;
        let loc = self.end_free + 1;

        self.put_block_header();
        self.put_header(id, size, loc);
        self.block[loc as usize..(loc + size) as usize].copy_from_slice(data);

        trace!(block_id = self.block_id, record_id = id, size, loc, "record added");
        Ok(id)
    }

    /// Get a record's bytes; `None` for tombstones and unknown ids
    pub fn get(&self, record_id: RecordId) -> Option<&[u8]> {
        if !self.is_valid_id(record_id) {
            return None;
        }

        let (size, loc) = self.get_header(record_id);
        if loc == 0 {
            return None;
        }
        Some(&self.block[loc as usize..loc as usize + size as usize])
    }

    /// Delete a record, compacting the data region over its bytes.
    /// The id stays allocated as a tombstone.
    pub fn delete(&mut self, record_id: RecordId) -> RecordResult<()> {
        if !self.is_valid_id(record_id) {
            return Err(RecordError::NoSuchRecord(self.block_id, record_id));
        }

        let (size, loc) = self.get_header(record_id);
        self.put_header(record_id, 0, 0);
        if loc != 0 {
            self.slide(loc, loc + size);
        }

        trace!(block_id = self.block_id, record_id, size, "record deleted");
        Ok(())
    }

    /// Replace a record's bytes, growing or shrinking it in place.
    /// On `NoRoom` the old record is retained.
    pub fn put(&mut self, record_id: RecordId, data: &[u8]) -> RecordResult<()> {
        if !self.is_valid_id(record_id) {
            return Err(RecordError::NoSuchRecord(self.block_id, record_id));
        }

        let (size, loc) = self.get_header(record_id);
        if loc == 0 {
            return Err(RecordError::NoSuchRecord(self.block_id, record_id));
        }

        let new_size = data.len();
        let new_loc = if new_size > size as usize {
            let extra = new_size - size as usize;
            if !self.has_room(extra) {
                return Err(RecordError::NoRoom {
                    needed: extra,
                    available: self.free_space(),
                });
            }
            let new_loc = loc - extra as u16;
            self.slide(loc, new_loc);
            self.block[new_loc as usize..new_loc as usize + new_size].copy_from_slice(data);
            new_loc
        } else {
            self.block[loc as usize..loc as usize + new_size].copy_from_slice(data);
            let new_end = loc + new_size as u16;
            self.slide(new_end, loc + size);
            loc + (size - new_size as u16)
        };

        self.put_header(record_id, new_size as u16, new_loc);

        trace!(
            block_id = self.block_id,
            record_id,
            old_size = size,
            new_size,
            "record updated"
        );
        Ok(())
    }

    /// Ids of all live records, ascending
    pub fn ids(&self) -> Vec<RecordId> {
        (1..=self.num_records)
            .filter(|&id| self.get_header(id).0 != 0)
            .collect()
    }

    /// Check if a record of `size` bytes (plus its directory entry) fits
    pub fn has_room(&self, size: usize) -> bool {
        size as isize <= self.available()
    }

    /// Bytes available for record data, net of the next directory entry
    pub fn free_space(&self) -> usize {
        self.available().max(0) as usize
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// Raw block image
    pub fn data(&self) -> &[u8] {
        &self.block
    }

    /// Number of directory entries in use (including tombstones)
    pub fn num_records(&self) -> u16 {
        self.num_records
    }

    pub fn end_free(&self) -> u16 {
        self.end_free
    }

    // Reserves one directory entry beyond the current count so a following
    // add always has room for its own entry.
    fn available(&self) -> isize {
        self.end_free as isize - (self.num_records as isize + 2) * SLOT_SIZE as isize
    }

    fn is_valid_id(&self, record_id: RecordId) -> bool {
        record_id != 0 && record_id <= self.num_records
    }

    fn directory_fits(&self) -> bool {
        self.end_free as usize + 1 >= (self.num_records as usize + 1) * SLOT_SIZE
    }

    /// Shift the data stored below `start` by `end - start` bytes and fix up
    /// the directory. A positive shift closes the gap `[start, end)`; a
    /// negative shift opens a gap of `start - end` bytes ending at `start`.
    fn slide(&mut self, start: u16, end: u16) {
        let shift = end as isize - start as isize;
        if shift == 0 {
            return;
        }

        let data_start = self.end_free as usize + 1;
        let dest = (data_start as isize + shift) as usize;
        self.block.copy_within(data_start..start as usize, dest);

        for record_id in self.ids() {
            let (size, loc) = self.get_header(record_id);
            if loc <= start {
                self.put_header(record_id, size, (loc as isize + shift) as u16);
            }
        }

        self.end_free = (self.end_free as isize + shift) as u16;
        self.put_block_header();
        debug_assert!(self.directory_fits());
    }

    /// Get a 2-byte integer at the given offset
    fn get_n(&self, offset: usize) -> u16 {
        u16::from_ne_bytes([self.block[offset], self.block[offset + 1]])
    }

    /// Put a 2-byte integer at the given offset
    fn put_n(&mut self, offset: usize, n: u16) {
        self.block[offset..offset + 2].copy_from_slice(&n.to_ne_bytes());
    }

    /// Read directory entry `id`; entry 0 is the block header
    fn get_header(&self, id: RecordId) -> (u16, u16) {
        let offset = SLOT_SIZE * id as usize;
        (self.get_n(offset), self.get_n(offset + 2))
    }

    fn put_header(&mut self, id: RecordId, size: u16, loc: u16) {
        let offset = SLOT_SIZE * id as usize;
        self.put_n(offset, size);
        self.put_n(offset + 2, loc);
    }

    fn put_block_header(&mut self) {
        self.put_header(0, self.num_records, self.end_free);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Check the space accounting invariant and that no two live records overlap
    fn assert_consistent(page: &SlottedPage) {
        let directory_end = (page.num_records() as usize + 1) * SLOT_SIZE;
        assert!(page.end_free() as usize + 1 >= directory_end);

        let mut ranges: Vec<(usize, usize)> = page
            .ids()
            .into_iter()
            .map(|id| {
                let (size, loc) = page.get_header(id);
                (loc as usize, loc as usize + size as usize)
            })
            .collect();
        ranges.sort();
        for range in &ranges {
            assert!(range.0 > page.end_free() as usize);
            assert!(range.1 <= BLOCK_SZ);
        }
        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "records overlap: {:?}", pair);
        }
    }

    #[test]
    fn test_new_empty_page() {
        let page = SlottedPage::new_empty(1);
        assert_eq!(page.block_id(), 1);
        assert_eq!(page.num_records(), 0);
        assert_eq!(page.end_free(), (BLOCK_SZ - 1) as u16);
        assert!(page.ids().is_empty());
        assert_eq!(page.free_space(), SlottedPage::MAX_RECORD_SIZE);
    }

    #[test]
    fn test_add_and_get() {
        let mut page = SlottedPage::new_empty(1);
        let id1 = page.add(b"hello").unwrap();
        let id2 = page.add(b"wonderful world").unwrap();

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(page.get(id1), Some(&b"hello"[..]));
        assert_eq!(page.get(id2), Some(&b"wonderful world"[..]));
        assert_eq!(page.ids(), vec![1, 2]);

        // Second record sits directly before the first
        assert_eq!(page.get_header(1), (5, (BLOCK_SZ - 5) as u16));
        assert_eq!(page.get_header(2), (15, (BLOCK_SZ - 20) as u16));
        assert_eq!(page.end_free(), (BLOCK_SZ - 21) as u16);
        assert_consistent(&page);
    }

    #[test]
    fn test_get_unknown_id() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"x").unwrap();

        assert_eq!(page.get(0), None);
        assert_eq!(page.get(2), None);
    }

    #[test]
    fn test_add_exactly_fits() {
        let mut page = SlottedPage::new_empty(1);
        page.add(&[1u8; 100]).unwrap();

        let room = page.free_space();
        assert!(page.has_room(room));
        assert!(!page.has_room(room + 1));

        let id = page.add(&vec![7u8; room]).unwrap();
        assert_eq!(page.get(id).unwrap().len(), room);
        assert_consistent(&page);
    }

    #[test]
    fn test_add_one_byte_too_many() {
        let mut page = SlottedPage::new_empty(1);
        page.add(&[1u8; 100]).unwrap();

        let room = page.free_space();
        let result = page.add(&vec![7u8; room + 1]);
        assert!(matches!(result, Err(RecordError::NoRoom { .. })));

        // Nothing changed
        assert_eq!(page.ids(), vec![1]);
        assert_eq!(page.free_space(), room);
    }

    #[test]
    fn test_max_record_size() {
        let mut page = SlottedPage::new_empty(1);
        let id = page.add(&vec![9u8; SlottedPage::MAX_RECORD_SIZE]).unwrap();
        assert_eq!(page.get(id).unwrap().len(), SlottedPage::MAX_RECORD_SIZE);
        assert_consistent(&page);

        let mut page = SlottedPage::new_empty(1);
        let result = page.add(&vec![9u8; SlottedPage::MAX_RECORD_SIZE + 1]);
        assert!(result.unwrap_err().is_no_room());
    }

    #[test]
    fn test_delete() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"aaaa").unwrap();
        page.add(b"bbbbbbbb").unwrap();
        page.add(b"cc").unwrap();
        let free_before = page.free_space();

        page.delete(2).unwrap();

        assert_eq!(page.get(2), None);
        assert_eq!(page.ids(), vec![1, 3]);
        assert_eq!(page.get(1), Some(&b"aaaa"[..]));
        assert_eq!(page.get(3), Some(&b"cc"[..]));
        assert_eq!(page.free_space(), free_before + 8);
        // The id is retained as a tombstone
        assert_eq!(page.num_records(), 3);
        assert_consistent(&page);
    }

    #[test]
    fn test_delete_lowest_record_restores_end_free() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"first").unwrap();
        let end_free_before = page.end_free();
        page.add(b"second").unwrap();

        page.delete(2).unwrap();
        assert_eq!(page.end_free(), end_free_before);
        assert_eq!(page.get(1), Some(&b"first"[..]));
        assert_consistent(&page);
    }

    #[test]
    fn test_delete_all_records() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"one").unwrap();
        page.add(b"two").unwrap();
        page.delete(1).unwrap();
        page.delete(2).unwrap();

        assert!(page.ids().is_empty());
        assert_eq!(page.end_free(), (BLOCK_SZ - 1) as u16);
        assert_consistent(&page);
    }

    #[test]
    fn test_delete_twice_is_harmless() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"one").unwrap();
        page.add(b"two").unwrap();
        page.delete(1).unwrap();
        let end_free = page.end_free();

        page.delete(1).unwrap();
        assert_eq!(page.end_free(), end_free);
        assert_eq!(page.get(2), Some(&b"two"[..]));
    }

    #[test]
    fn test_delete_unknown_id() {
        let mut page = SlottedPage::new_empty(1);
        assert!(matches!(page.delete(1), Err(RecordError::NoSuchRecord(1, 1))));
    }

    #[test]
    fn test_put_grow() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"aaaa").unwrap();
        page.add(b"bbbb").unwrap();
        page.add(b"cccc").unwrap();
        let free_before = page.free_space();

        page.put(2, b"BBBBBBBBBB").unwrap();

        assert_eq!(page.get(1), Some(&b"aaaa"[..]));
        assert_eq!(page.get(2), Some(&b"BBBBBBBBBB"[..]));
        assert_eq!(page.get(3), Some(&b"cccc"[..]));
        assert_eq!(page.free_space(), free_before - 6);
        assert_consistent(&page);
    }

    #[test]
    fn test_put_grow_first_record() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"top").unwrap();
        page.add(b"middle").unwrap();

        page.put(1, b"top record grown").unwrap();

        assert_eq!(page.get(1), Some(&b"top record grown"[..]));
        assert_eq!(page.get(2), Some(&b"middle"[..]));
        assert_consistent(&page);
    }

    #[test]
    fn test_put_shrink() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"aaaa").unwrap();
        page.add(b"bbbbbbbbbb").unwrap();
        page.add(b"cccc").unwrap();
        let free_before = page.free_space();

        page.put(2, b"BB").unwrap();

        assert_eq!(page.get(1), Some(&b"aaaa"[..]));
        assert_eq!(page.get(2), Some(&b"BB"[..]));
        assert_eq!(page.get(3), Some(&b"cccc"[..]));
        assert_eq!(page.free_space(), free_before + 8);
        assert_consistent(&page);

        // Freed space is usable by later adds
        let id = page.add(&vec![1u8; page.free_space()]).unwrap();
        assert_eq!(id, 4);
        assert_consistent(&page);
    }

    #[test]
    fn test_put_same_size() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"abcd").unwrap();
        let end_free = page.end_free();

        page.put(1, b"wxyz").unwrap();
        assert_eq!(page.get(1), Some(&b"wxyz"[..]));
        assert_eq!(page.end_free(), end_free);
    }

    #[test]
    fn test_put_no_room_keeps_old_record() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"small").unwrap();
        page.add(&vec![0u8; page.free_space() - 2]).unwrap();

        let result = page.put(1, &[1u8; 64]);
        assert!(matches!(result, Err(RecordError::NoRoom { .. })));
        assert_eq!(page.get(1), Some(&b"small"[..]));
        assert_consistent(&page);
    }

    #[test]
    fn test_put_tombstone() {
        let mut page = SlottedPage::new_empty(1);
        page.add(b"gone").unwrap();
        page.delete(1).unwrap();

        assert!(matches!(page.put(1, b"back"), Err(RecordError::NoSuchRecord(..))));
    }

    #[test]
    fn test_mixed_operations_stay_consistent() {
        let mut page = SlottedPage::new_empty(3);
        let mut expected: Vec<Option<Vec<u8>>> = Vec::new();

        for i in 0..40u8 {
            let data = vec![i; (i as usize % 7) + 1];
            page.add(&data).unwrap();
            expected.push(Some(data));
        }
        for id in (1..=40u16).step_by(3) {
            page.delete(id).unwrap();
            expected[id as usize - 1] = None;
            assert_consistent(&page);
        }
        for id in (2..=40u16).step_by(4) {
            if expected[id as usize - 1].is_some() {
                let data = vec![0xAB; (id as usize % 11) + 1];
                page.put(id, &data).unwrap();
                expected[id as usize - 1] = Some(data);
                assert_consistent(&page);
            }
        }

        for (i, data) in expected.iter().enumerate() {
            assert_eq!(page.get(i as u16 + 1), data.as_deref());
        }
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let mut page = SlottedPage::new_empty(5);
        page.add(b"persist me").unwrap();
        page.add(b"and me").unwrap();
        page.delete(1).unwrap();

        let restored = SlottedPage::from_bytes(5, page.data().to_vec()).unwrap();
        assert_eq!(restored.num_records(), 2);
        assert_eq!(restored.end_free(), page.end_free());
        assert_eq!(restored.ids(), vec![2]);
        assert_eq!(restored.get(2), Some(&b"and me"[..]));
    }

    #[test]
    fn test_from_bytes_rejects_bad_blocks() {
        let result = SlottedPage::from_bytes(1, vec![0u8; 100]);
        assert!(matches!(result, Err(RecordError::Corrupt(1, _))));

        // An all-zero block was never initialized
        let result = SlottedPage::from_bytes(2, vec![0u8; BLOCK_SZ]);
        assert!(matches!(result, Err(RecordError::Corrupt(2, _))));
    }

    #[test]
    fn test_from_bytes_rejects_bad_directory_entries() {
        let mut page = SlottedPage::new_empty(3);
        page.add(b"hello").unwrap();
        page.add(b"world").unwrap();

        // Record runs past the end of the block
        let mut bad = SlottedPage::from_bytes(3, page.data().to_vec()).unwrap();
        bad.put_header(2, 5, (BLOCK_SZ - 2) as u16);
        let result = SlottedPage::from_bytes(3, bad.data().to_vec());
        assert!(matches!(result, Err(RecordError::Corrupt(3, _))));

        // Record starts inside the free region
        let mut bad = SlottedPage::from_bytes(3, page.data().to_vec()).unwrap();
        bad.put_header(1, 5, 100);
        let result = SlottedPage::from_bytes(3, bad.data().to_vec());
        assert!(matches!(result, Err(RecordError::Corrupt(3, _))));

        // Tombstones are skipped
        let mut page = page;
        page.delete(1).unwrap();
        assert!(SlottedPage::from_bytes(3, page.data().to_vec()).is_ok());
    }
}
