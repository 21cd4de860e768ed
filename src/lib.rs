//! Quarry - the storage-engine core of a disk-oriented database
//!
//! The crate turns a fixed pool of in-memory frames and a block-addressed
//! disk file into a durable, indexed key-value store. Four subsystems stack
//! on top of each other:
//!
//! - **Storage** (`storage`): page-granular disk I/O
//!   - `DiskManager`: reads, writes and allocates 4 KB pages in one file
//!   - `DiskScheduler`: background worker draining a page I/O queue
//!   - `HeaderPage`: reserved page 0, persisting index roots by name
//!
//! - **Container** (`container`): in-memory associative structures
//!   - `ExtendibleHashTable`: directory-doubling hash map, used by the
//!     buffer pool as its page table
//!
//! - **Buffer pool** (`buffer`): ownership of frame memory
//!   - `BufferPoolManager`: pins pages into frames, evicting through LRU-K
//!   - `LruKReplacer`: ranks victims by their k-th most recent access
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pins over page bytes
//!
//! - **Index** (`index`): the on-disk B+ tree
//!   - `BPlusTree`: unique-key point lookups, inserts, removes and ordered
//!     iteration, built entirely through the buffer pool
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry::buffer::BufferPoolManager;
//! use quarry::index::{BPlusTree, IndexKey, UintComparator};
//! use quarry::storage::disk::DiskManager;
//! use quarry::{RecordId, PageId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(100, 2, disk_manager));
//!
//! let mut tree = BPlusTree::new("example", Arc::clone(&bpm), UintComparator, 64, 64);
//! let rid = RecordId::new(PageId::new(7), SlotId::new(0));
//! tree.insert(IndexKey::from_u64(42), rid).unwrap();
//! assert_eq!(tree.get_value(&IndexKey::from_u64(42)).unwrap(), Some(rid));
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, QuarryError, RecordId, Result, SlotId};
