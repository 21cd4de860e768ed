use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{RecordId, Result, INVALID_PAGE_ID};

use super::btree_leaf_page::LeafPageRef;
use super::index_key::IndexKey;

/// Cursor over the leaf chain yielding `(key, record id)` pairs in key
/// order. The iterator keeps its current leaf pinned through a read guard;
/// crossing to the next leaf unpins the old one first. It is finite and not
/// restartable.
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    /// Pinned current leaf; None is the end sentinel
    guard: Option<ReadPageGuard>,
    slot: usize,
}

impl IndexIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, guard: Option<ReadPageGuard>, slot: usize) -> Self {
        Self { bpm, guard, slot }
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            guard: None,
            slot: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// Yields the next entry, following `next_page_id` across leaf
    /// boundaries.
    pub fn next_entry(&mut self) -> Result<Option<(IndexKey, RecordId)>> {
        loop {
            let Some(guard) = &self.guard else {
                return Ok(None);
            };

            let leaf = LeafPageRef::new(guard.data());
            if self.slot < leaf.size() {
                let item = leaf.item_at(self.slot);
                self.slot += 1;
                return Ok(Some(item));
            }

            let next_page_id = leaf.next_page_id();
            // Unpin the exhausted leaf before touching the next one.
            self.guard = None;
            self.slot = 0;
            if next_page_id != INVALID_PAGE_ID {
                self.guard = Some(self.bpm.fetch_page_read(next_page_id)?);
            }
        }
    }
}

impl Iterator for IndexIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
