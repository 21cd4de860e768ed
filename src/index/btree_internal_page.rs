use std::cmp::Ordering;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, PAGE_SIZE};

use super::btree_page::{
    init_header, read_u32, write_u32, PageType, BTREE_PAGE_HEADER_SIZE, MAX_SIZE_OFFSET,
    PAGE_ID_OFFSET, PARENT_PAGE_ID_OFFSET, SIZE_OFFSET,
};
use super::index_key::{IndexKey, KeyComparator, KEY_SIZE};

/// Bytes per slot: key + child page id.
const SLOT_SIZE: usize = KEY_SIZE + 4;

/// Hard capacity of an internal page; configured max sizes may not exceed it.
pub const INTERNAL_PAGE_MAX_SIZE: usize = (PAGE_SIZE - BTREE_PAGE_HEADER_SIZE) / SLOT_SIZE;

fn slot_offset(index: usize) -> usize {
    BTREE_PAGE_HEADER_SIZE + index * SLOT_SIZE
}

fn key_at(data: &[u8], index: usize) -> IndexKey {
    let offset = slot_offset(index);
    IndexKey::from_bytes(&data[offset..offset + KEY_SIZE])
}

fn value_at(data: &[u8], index: usize) -> PageId {
    PageId::new(read_u32(data, slot_offset(index) + KEY_SIZE))
}

/// Returns the slot whose subtree covers `key`: the largest index >= 1 with
/// `key_at(index) <= key`, or 0 when every stored key is greater. Slot 0's
/// key is a dummy and is never consulted.
fn index_lookup<C: KeyComparator>(data: &[u8], key: &IndexKey, comparator: &C) -> usize {
    let size = read_u32(data, SIZE_OFFSET) as usize;

    // Binary search for the first slot in [1, size) whose key exceeds `key`;
    // the covering child sits one slot to the left.
    let mut left = 1;
    let mut right = size;
    while left < right {
        let mid = left + (right - left) / 2;
        if comparator.compare(&key_at(data, mid), key) == Ordering::Greater {
            right = mid;
        } else {
            left = mid + 1;
        }
    }
    left - 1
}

/// Mutable view of an internal page. Slots hold `(key, child page id)`
/// pairs; a page of size n has n children and n-1 usable keys, slot 0's key
/// being the dummy below the leftmost child.
pub struct InternalPage<'a> {
    data: &'a mut [u8],
}

impl<'a> InternalPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self, page_id: PageId, parent_page_id: PageId, max_size: usize) {
        assert!(
            (3..=INTERNAL_PAGE_MAX_SIZE).contains(&max_size),
            "internal max size out of range"
        );
        init_header(
            self.data,
            PageType::Internal,
            page_id,
            parent_page_id,
            max_size,
        );
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn parent_page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PARENT_PAGE_ID_OFFSET))
    }

    pub fn set_parent_page_id(&mut self, parent_page_id: PageId) {
        write_u32(self.data, PARENT_PAGE_ID_OFFSET, parent_page_id.as_u32());
    }

    pub fn size(&self) -> usize {
        read_u32(self.data, SIZE_OFFSET) as usize
    }

    fn set_size(&mut self, size: usize) {
        write_u32(self.data, SIZE_OFFSET, size as u32);
    }

    pub fn max_size(&self) -> usize {
        read_u32(self.data, MAX_SIZE_OFFSET) as usize
    }

    /// Minimum child count for a non-root internal page. Half rounds down so
    /// that donating `size / 2` slots in a split always leaves both sides
    /// legal.
    pub fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    pub fn key_at(&self, index: usize) -> IndexKey {
        assert!(index < self.size());
        key_at(self.data, index)
    }

    pub fn set_key_at(&mut self, index: usize, key: &IndexKey) {
        assert!(index < self.size());
        let offset = slot_offset(index);
        self.data[offset..offset + KEY_SIZE].copy_from_slice(key.as_bytes());
    }

    pub fn value_at(&self, index: usize) -> PageId {
        assert!(index < self.size());
        value_at(self.data, index)
    }

    pub fn set_value_at(&mut self, index: usize, value: PageId) {
        assert!(index < self.size());
        write_u32(self.data, slot_offset(index) + KEY_SIZE, value.as_u32());
    }

    pub fn index_lookup<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> usize {
        index_lookup(self.data, key, comparator)
    }

    /// Child page id covering `key`.
    pub fn lookup<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> PageId {
        self.value_at(self.index_lookup(key, comparator))
    }

    /// Turns an empty page into a root with two children separated by
    /// `new_key`.
    pub fn populate_new_root(&mut self, old_value: PageId, new_key: &IndexKey, new_value: PageId) {
        self.set_size(2);
        self.set_value_at(0, old_value);
        self.set_key_at(1, new_key);
        self.set_value_at(1, new_value);
    }

    /// Inserts `(new_key, new_value)` immediately after the slot holding
    /// `old_value` and returns the new size.
    pub fn insert_node_after(
        &mut self,
        old_value: PageId,
        new_key: &IndexKey,
        new_value: PageId,
    ) -> usize {
        let index = self.value_index(old_value);
        self.insert_at(index + 1, new_key, new_value);
        self.size()
    }

    pub fn insert_at(&mut self, index: usize, key: &IndexKey, value: PageId) {
        let size = self.size();
        assert!(index <= size, "insert index out of bounds");
        assert!(size < self.max_size(), "insert into a full internal page");

        self.data
            .copy_within(slot_offset(index)..slot_offset(size), slot_offset(index + 1));
        let offset = slot_offset(index);
        self.data[offset..offset + KEY_SIZE].copy_from_slice(key.as_bytes());
        write_u32(self.data, offset + KEY_SIZE, value.as_u32());
        self.set_size(size + 1);
    }

    /// Slot index of the child `value`. A child the parent does not know is
    /// a structural corruption, so a miss panics.
    pub fn value_index(&self, value: PageId) -> usize {
        let size = self.size();
        (0..size)
            .find(|&index| value_at(self.data, index) == value)
            .unwrap_or_else(|| {
                panic!(
                    "child {value} not found in internal page {}",
                    self.page_id()
                )
            })
    }

    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        assert!(index < size, "remove index out of bounds");

        self.data
            .copy_within(slot_offset(index + 1)..slot_offset(size), slot_offset(index));
        self.set_size(size - 1);
    }

    /// Collapses a single-child root: removes the only slot and returns its
    /// child. Calling this on any other page is a bug.
    pub fn remove_and_return_only_child(&mut self) -> PageId {
        assert_eq!(self.size(), 1, "page has more than one child");
        let child = self.value_at(0);
        self.set_size(0);
        child
    }

    /// Donates the upper half of the slots to an empty sibling, adopting the
    /// moved children. The caller promotes the sibling's slot-0 key, which
    /// then becomes the sibling's dummy.
    pub fn move_half_to(&mut self, recipient: &mut InternalPage, bpm: &BufferPoolManager) -> Result<()> {
        let size = self.size();
        let move_count = size / 2;
        let start = size - move_count;

        for index in start..size {
            recipient.copy_last_from(&key_at(self.data, index), value_at(self.data, index), bpm)?;
        }
        self.set_size(start);
        Ok(())
    }

    /// Appends every slot to `recipient` (the left sibling). The parent's
    /// separator `middle_key` comes along as the key over this page's
    /// leftmost child, keeping the subtree ordering intact.
    pub fn move_all_to(
        &mut self,
        recipient: &mut InternalPage,
        middle_key: &IndexKey,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        let size = self.size();
        recipient.copy_last_from(middle_key, value_at(self.data, 0), bpm)?;
        for index in 1..size {
            recipient.copy_last_from(&key_at(self.data, index), value_at(self.data, index), bpm)?;
        }
        self.set_size(0);
        Ok(())
    }

    /// Redistribution: the leftmost child moves to the end of `recipient`
    /// under the parent's separator key.
    pub fn move_first_to_end_of(
        &mut self,
        recipient: &mut InternalPage,
        middle_key: &IndexKey,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        recipient.copy_last_from(middle_key, value_at(self.data, 0), bpm)?;
        self.remove(0);
        Ok(())
    }

    /// Redistribution: the rightmost child moves to the front of
    /// `recipient`, which files the parent's separator key over its formerly
    /// leftmost child.
    pub fn move_last_to_front_of(
        &mut self,
        recipient: &mut InternalPage,
        middle_key: &IndexKey,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        let last = self.size() - 1;
        recipient.copy_first_from(middle_key, value_at(self.data, last), bpm)?;
        self.remove(last);
        Ok(())
    }

    fn copy_last_from(
        &mut self,
        key: &IndexKey,
        child: PageId,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        self.adopt(child, bpm)?;
        self.insert_at(self.size(), key, child);
        Ok(())
    }

    fn copy_first_from(
        &mut self,
        middle_key: &IndexKey,
        child: PageId,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        self.adopt(child, bpm)?;
        self.insert_at(0, middle_key, child);
        // The old leftmost child shifted to slot 1; the separator key now
        // partitions it from the adopted child. Slot 0's key is the dummy.
        self.set_key_at(1, middle_key);
        Ok(())
    }

    /// Rewrites a moved child's parent pointer through the buffer pool. This
    /// is the only place page-layout code touches the pool.
    fn adopt(&self, child: PageId, bpm: &BufferPoolManager) -> Result<()> {
        let mut guard = bpm.fetch_page_write(child)?;
        write_u32(guard.data_mut(), PARENT_PAGE_ID_OFFSET, self.page_id().as_u32());
        Ok(())
    }
}

/// Read-only view of an internal page.
pub struct InternalPageRef<'a> {
    data: &'a [u8],
}

impl<'a> InternalPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn parent_page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PARENT_PAGE_ID_OFFSET))
    }

    pub fn size(&self) -> usize {
        read_u32(self.data, SIZE_OFFSET) as usize
    }

    pub fn max_size(&self) -> usize {
        read_u32(self.data, MAX_SIZE_OFFSET) as usize
    }

    pub fn key_at(&self, index: usize) -> IndexKey {
        assert!(index < self.size());
        key_at(self.data, index)
    }

    pub fn value_at(&self, index: usize) -> PageId {
        assert!(index < self.size());
        value_at(self.data, index)
    }

    pub fn index_lookup<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> usize {
        index_lookup(self.data, key, comparator)
    }

    pub fn lookup<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> PageId {
        self.value_at(self.index_lookup(key, comparator))
    }

    /// Slot index of the child `value`; a miss panics, as on the mutable
    /// view.
    pub fn value_index(&self, value: PageId) -> usize {
        let size = self.size();
        (0..size)
            .find(|&index| value_at(self.data, index) == value)
            .unwrap_or_else(|| {
                panic!(
                    "child {value} not found in internal page {}",
                    self.page_id()
                )
            })
    }
}
