pub mod btree_index;
pub mod btree_internal_page;
pub mod btree_iterator;
pub mod btree_leaf_page;
pub mod btree_page;
pub mod index_key;

pub use btree_index::BPlusTree;
pub use btree_internal_page::{InternalPage, InternalPageRef, INTERNAL_PAGE_MAX_SIZE};
pub use btree_iterator::IndexIterator;
pub use btree_leaf_page::{LeafPage, LeafPageRef, LEAF_PAGE_MAX_SIZE};
pub use btree_page::{BTreePage, PageType, BTREE_PAGE_HEADER_SIZE};
pub use index_key::{BytewiseComparator, IndexKey, KeyComparator, UintComparator};
