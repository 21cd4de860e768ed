use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{PageId, RecordId, Result, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::storage::page::{HeaderPage, HeaderPageRef};

use super::btree_internal_page::{InternalPage, InternalPageRef};
use super::btree_iterator::IndexIterator;
use super::btree_leaf_page::{LeafPage, LeafPageRef};
use super::btree_page::{write_u32, BTreePage, PARENT_PAGE_ID_OFFSET};
use super::index_key::{IndexKey, KeyComparator};

/// An on-disk B+ tree over unique keys, built entirely through the buffer
/// pool. Internal pages steer the search; leaf pages hold record ids and
/// chain together in key order for range scans.
///
/// The tree has no internal latch: `insert`/`remove` take `&mut self`, so
/// writers are serialized by the borrow checker, and readers during a write
/// are ruled out the same way.
pub struct BPlusTree<C: KeyComparator> {
    index_name: String,
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<C: KeyComparator> BPlusTree<C> {
    /// Creates an empty tree. Nothing is written until the first insert.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            root_page_id: INVALID_PAGE_ID,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        }
    }

    /// Opens a tree whose root is recorded on the header page. A name with
    /// no record yields an empty tree.
    pub fn open(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let index_name = index_name.into();
        let root_page_id = {
            let guard = bpm.fetch_page_read(HEADER_PAGE_ID)?;
            HeaderPageRef::new(guard.data())
                .get_root_id(&index_name)
                .unwrap_or(INVALID_PAGE_ID)
        };

        Ok(Self {
            index_name,
            root_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Point lookup. Returns the record id stored under `key`, if any.
    pub fn get_value(&self, key: &IndexKey) -> Result<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }

        let leaf_id = self.find_leaf(key)?;
        let guard = self.bpm.fetch_page_read(leaf_id)?;
        Ok(LeafPageRef::new(guard.data()).lookup(key, &self.comparator))
    }

    /// Inserts a unique key. Returns false (and changes nothing) when the
    /// key is already present.
    pub fn insert(&mut self, key: IndexKey, rid: RecordId) -> Result<bool> {
        if self.is_empty() {
            self.start_new_tree(key, rid)?;
            return Ok(true);
        }
        self.insert_into_leaf(key, rid)
    }

    /// Removes `key` if present; removing an absent key is a no-op.
    pub fn remove(&mut self, key: &IndexKey) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let leaf_id = self.find_leaf(key)?;
        let (size, min_size, parent_id) = {
            let mut guard = self.bpm.fetch_page_write(leaf_id)?;
            let mut leaf = LeafPage::new(guard.data_mut());

            let index = leaf.key_index(key, &self.comparator);
            if index >= leaf.size()
                || self.comparator.compare(&leaf.key_at(index), key) != Ordering::Equal
            {
                return Ok(());
            }
            leaf.remove_at(index);
            (leaf.size(), leaf.min_size(), leaf.parent_page_id())
        };

        if parent_id == INVALID_PAGE_ID {
            // Root leaf: only emptiness matters.
            if size == 0 {
                self.bpm.delete_page(leaf_id)?;
                self.root_page_id = INVALID_PAGE_ID;
                self.update_root_page_id(false)?;
                debug!(index = %self.index_name, "tree emptied");
            }
            return Ok(());
        }

        if size < min_size {
            self.coalesce_or_redistribute(leaf_id, parent_id)?;
        }
        Ok(())
    }

    /// Iterator over the whole tree from the leftmost leaf.
    pub fn begin(&self) -> Result<IndexIterator> {
        if self.is_empty() {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }

        let leaf_id = self.find_leftmost_leaf()?;
        let guard = self.bpm.fetch_page_read(leaf_id)?;
        Ok(IndexIterator::new(Arc::clone(&self.bpm), Some(guard), 0))
    }

    /// Iterator starting at the first key >= `key`.
    pub fn begin_at(&self, key: &IndexKey) -> Result<IndexIterator> {
        if self.is_empty() {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }

        let leaf_id = self.find_leaf(key)?;
        let guard = self.bpm.fetch_page_read(leaf_id)?;
        let slot = LeafPageRef::new(guard.data()).key_index(key, &self.comparator);
        Ok(IndexIterator::new(Arc::clone(&self.bpm), Some(guard), slot))
    }

    /// Descends from the root to the leaf covering `key`. Each level's page
    /// is unpinned as soon as the next child is known.
    fn find_leaf(&self, key: &IndexKey) -> Result<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            let guard = self.bpm.fetch_page_read(page_id)?;
            if BTreePage::new(guard.data()).is_leaf() {
                return Ok(page_id);
            }
            page_id = InternalPageRef::new(guard.data()).lookup(key, &self.comparator);
        }
    }

    fn find_leftmost_leaf(&self) -> Result<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            let guard = self.bpm.fetch_page_read(page_id)?;
            if BTreePage::new(guard.data()).is_leaf() {
                return Ok(page_id);
            }
            page_id = InternalPageRef::new(guard.data()).value_at(0);
        }
    }

    fn start_new_tree(&mut self, key: IndexKey, rid: RecordId) -> Result<()> {
        let root_id = {
            let mut guard = self.bpm.new_page()?;
            let root_id = guard.page_id();
            let mut leaf = LeafPage::new(guard.data_mut());
            leaf.init(root_id, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.insert(key, rid, &self.comparator);
            root_id
        };

        self.root_page_id = root_id;
        self.update_root_page_id(true)?;
        debug!(index = %self.index_name, root = root_id.as_u32(), "started new tree");
        Ok(())
    }

    fn insert_into_leaf(&mut self, key: IndexKey, rid: RecordId) -> Result<bool> {
        let leaf_id = self.find_leaf(&key)?;

        let split = {
            let mut guard = self.bpm.fetch_page_write(leaf_id)?;
            let mut leaf = LeafPage::new(guard.data_mut());

            let old_size = leaf.size();
            let new_size = leaf.insert(key, rid, &self.comparator);
            if new_size == old_size {
                return Ok(false);
            }

            if new_size == self.leaf_max_size {
                // The leaf hit its split trigger; carve off the upper half.
                let mut sibling_guard = match self.bpm.new_page() {
                    Ok(guard) => guard,
                    Err(e) => {
                        // Undo the insert so the aborted operation leaves no
                        // structural change behind.
                        let index = leaf.key_index(&key, &self.comparator);
                        leaf.remove_at(index);
                        return Err(e);
                    }
                };
                let sibling_id = sibling_guard.page_id();
                let mut sibling = LeafPage::new(sibling_guard.data_mut());
                sibling.init(sibling_id, leaf.parent_page_id(), self.leaf_max_size);

                leaf.move_half_to(&mut sibling);
                sibling.set_next_page_id(leaf.next_page_id());
                leaf.set_next_page_id(sibling_id);

                debug!(
                    leaf = leaf_id.as_u32(),
                    sibling = sibling_id.as_u32(),
                    "split leaf"
                );
                Some((sibling.key_at(0), sibling_id, leaf.parent_page_id()))
            } else {
                None
            }
        };

        if let Some((separator, sibling_id, parent_id)) = split {
            self.insert_into_parent(leaf_id, separator, sibling_id, parent_id)?;
        }
        Ok(true)
    }

    /// Propagates a split upward: links `new_id` (with separator `key`)
    /// next to `old_id` in the parent, growing a new root or splitting the
    /// parent as needed.
    fn insert_into_parent(
        &mut self,
        old_id: PageId,
        key: IndexKey,
        new_id: PageId,
        parent_id: PageId,
    ) -> Result<()> {
        if parent_id == INVALID_PAGE_ID {
            // The old node was the root; grow the tree by one level.
            let new_root_id = {
                let mut guard = self.bpm.new_page()?;
                let new_root_id = guard.page_id();
                let mut root = InternalPage::new(guard.data_mut());
                root.init(new_root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.populate_new_root(old_id, &key, new_id);
                new_root_id
            };

            for child in [old_id, new_id] {
                let mut guard = self.bpm.fetch_page_write(child)?;
                write_u32(guard.data_mut(), PARENT_PAGE_ID_OFFSET, new_root_id.as_u32());
            }

            self.root_page_id = new_root_id;
            self.update_root_page_id(false)?;
            debug!(root = new_root_id.as_u32(), "grew new root");
            return Ok(());
        }

        let split = {
            let mut guard = self.bpm.fetch_page_write(parent_id)?;
            let mut parent = InternalPage::new(guard.data_mut());

            let new_size = parent.insert_node_after(old_id, &key, new_id);
            if new_size == self.internal_max_size {
                let mut sibling_guard = self.bpm.new_page()?;
                let sibling_id = sibling_guard.page_id();
                let mut sibling = InternalPage::new(sibling_guard.data_mut());
                sibling.init(sibling_id, parent.parent_page_id(), self.internal_max_size);

                parent.move_half_to(&mut sibling, &self.bpm)?;

                debug!(
                    parent = parent_id.as_u32(),
                    sibling = sibling_id.as_u32(),
                    "split internal page"
                );
                Some((sibling.key_at(0), sibling_id, parent.parent_page_id()))
            } else {
                None
            }
        };

        if let Some((separator, sibling_id, grandparent_id)) = split {
            self.insert_into_parent(parent_id, separator, sibling_id, grandparent_id)?;
        }
        Ok(())
    }

    /// Rebalances an underfull page: borrow from the left sibling, then the
    /// right; failing both, merge into the left or absorb the right. The
    /// parent may become underfull in turn, so the repair walks upward.
    fn coalesce_or_redistribute(&mut self, node_id: PageId, parent_id: PageId) -> Result<()> {
        let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
        let mut node_guard = self.bpm.fetch_page_write(node_id)?;

        let (node_index, left_id, right_id) = {
            let parent = InternalPageRef::new(parent_guard.data());
            let node_index = parent.value_index(node_id);
            let left_id = (node_index > 0).then(|| parent.value_at(node_index - 1));
            let right_id =
                (node_index + 1 < parent.size()).then(|| parent.value_at(node_index + 1));
            (node_index, left_id, right_id)
        };

        let is_leaf = BTreePage::new(node_guard.data()).is_leaf();

        // A sibling can donate when it sits above its minimum size; the
        // bound is max_size / 2 for both page kinds.
        let can_spare = |guard: &WritePageGuard| {
            let page = BTreePage::new(guard.data());
            page.size() > page.max_size() / 2
        };

        // Redistribute from the left sibling's tail.
        if let Some(left_id) = left_id {
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;
            if can_spare(&left_guard) {
                if is_leaf {
                    let mut left = LeafPage::new(left_guard.data_mut());
                    let mut node = LeafPage::new(node_guard.data_mut());
                    left.move_last_to_front_of(&mut node);
                    let mut parent = InternalPage::new(parent_guard.data_mut());
                    parent.set_key_at(node_index, &node.key_at(0));
                } else {
                    let middle_key =
                        InternalPageRef::new(parent_guard.data()).key_at(node_index);
                    let mut left = InternalPage::new(left_guard.data_mut());
                    let new_separator = left.key_at(left.size() - 1);
                    let mut node = InternalPage::new(node_guard.data_mut());
                    left.move_last_to_front_of(&mut node, &middle_key, &self.bpm)?;
                    let mut parent = InternalPage::new(parent_guard.data_mut());
                    parent.set_key_at(node_index, &new_separator);
                }
                return Ok(());
            }
        }

        // Redistribute from the right sibling's head.
        if let Some(right_id) = right_id {
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;
            if can_spare(&right_guard) {
                if is_leaf {
                    let mut right = LeafPage::new(right_guard.data_mut());
                    let mut node = LeafPage::new(node_guard.data_mut());
                    right.move_first_to_end_of(&mut node);
                    let mut parent = InternalPage::new(parent_guard.data_mut());
                    parent.set_key_at(node_index + 1, &right.key_at(0));
                } else {
                    let middle_key =
                        InternalPageRef::new(parent_guard.data()).key_at(node_index + 1);
                    let mut right = InternalPage::new(right_guard.data_mut());
                    let new_separator = right.key_at(1);
                    let mut node = InternalPage::new(node_guard.data_mut());
                    right.move_first_to_end_of(&mut node, &middle_key, &self.bpm)?;
                    let mut parent = InternalPage::new(parent_guard.data_mut());
                    parent.set_key_at(node_index + 1, &new_separator);
                }
                return Ok(());
            }
        }

        // Neither sibling can spare an entry: merge. The left merge folds
        // this node into its predecessor; otherwise the right sibling is
        // absorbed into this node.
        let (removed_index, deleted_id) = if let Some(left_id) = left_id {
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;
            if is_leaf {
                let mut left = LeafPage::new(left_guard.data_mut());
                let mut node = LeafPage::new(node_guard.data_mut());
                node.move_all_to(&mut left);
            } else {
                let middle_key = InternalPageRef::new(parent_guard.data()).key_at(node_index);
                let mut left = InternalPage::new(left_guard.data_mut());
                let mut node = InternalPage::new(node_guard.data_mut());
                node.move_all_to(&mut left, &middle_key, &self.bpm)?;
            }
            (node_index, node_id)
        } else {
            let right_id = right_id.expect("underfull non-root page must have a sibling");
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;
            if is_leaf {
                let mut right = LeafPage::new(right_guard.data_mut());
                let mut node = LeafPage::new(node_guard.data_mut());
                right.move_all_to(&mut node);
            } else {
                let middle_key =
                    InternalPageRef::new(parent_guard.data()).key_at(node_index + 1);
                let mut right = InternalPage::new(right_guard.data_mut());
                let mut node = InternalPage::new(node_guard.data_mut());
                right.move_all_to(&mut node, &middle_key, &self.bpm)?;
            }
            (node_index + 1, right_id)
        };

        {
            let mut parent = InternalPage::new(parent_guard.data_mut());
            parent.remove(removed_index);
        }
        drop(node_guard);
        self.bpm.delete_page(deleted_id)?;
        debug!(page = deleted_id.as_u32(), "coalesced page");

        let (parent_size, parent_min, grandparent_id) = {
            let parent = InternalPageRef::new(parent_guard.data());
            (
                parent.size(),
                parent.max_size() / 2,
                parent.parent_page_id(),
            )
        };
        drop(parent_guard);

        if grandparent_id == INVALID_PAGE_ID {
            if parent_size == 1 {
                self.adjust_root(parent_id)?;
            }
        } else if parent_size < parent_min {
            self.coalesce_or_redistribute(parent_id, grandparent_id)?;
        }
        Ok(())
    }

    /// Collapses an internal root that is down to a single child; the child
    /// becomes the new root.
    fn adjust_root(&mut self, old_root_id: PageId) -> Result<()> {
        let child_id = {
            let mut guard = self.bpm.fetch_page_write(old_root_id)?;
            let mut root = InternalPage::new(guard.data_mut());
            root.remove_and_return_only_child()
        };

        {
            let mut guard = self.bpm.fetch_page_write(child_id)?;
            write_u32(guard.data_mut(), PARENT_PAGE_ID_OFFSET, INVALID_PAGE_ID.0);
        }

        self.bpm.delete_page(old_root_id)?;
        self.root_page_id = child_id;
        self.update_root_page_id(false)?;
        debug!(root = child_id.as_u32(), "collapsed root");
        Ok(())
    }

    /// Persists the root page id on the header page. Called on every root
    /// change; `insert_record` registers the index's first record.
    fn update_root_page_id(&self, insert_record: bool) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::new(guard.data_mut());
        if !(insert_record && header.insert_record(&self.index_name, self.root_page_id)) {
            header.update_record(&self.index_name, self.root_page_id);
        }
        Ok(())
    }
}

