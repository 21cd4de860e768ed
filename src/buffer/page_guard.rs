use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolShared;
use super::FrameHeader;

/// RAII guard for read-only access to a page.
///
/// Holds the frame's data lock and one pin for its whole lifetime; dropping
/// the guard releases both (an unpin with no dirty mark).
pub struct ReadPageGuard {
    page_id: PageId,
    pool: Arc<PoolShared>,
    /// Keeps the frame alive for the lifetime-erased data lock below
    _frame: Arc<FrameHeader>,
    data_lock: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    /// Acquires the frame's data lock. The caller must have already pinned
    /// the frame; the pin is released when this guard drops.
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, pool: Arc<PoolShared>) -> Self {
        let data_lock = frame.data.read();
        // The lock borrows from the frame, which the guard keeps alive via
        // the Arc, so erasing the lifetime is sound.
        let data_lock: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(data_lock) };

        Self {
            page_id,
            pool,
            _frame: frame,
            data_lock: Some(data_lock),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_lock.as_ref().unwrap()[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the data lock before taking the pool latch in unpin.
        self.data_lock.take();
        self.pool.unpin(self.page_id, false);
    }
}

/// RAII guard for exclusive access to a page.
///
/// Dropping the guard unpins the page; if `data_mut` was called the unpin
/// carries the dirty mark.
pub struct WritePageGuard {
    page_id: PageId,
    pool: Arc<PoolShared>,
    _frame: Arc<FrameHeader>,
    data_lock: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    is_dirty: bool,
}

impl WritePageGuard {
    /// Acquires the frame's data lock for writing. The caller must have
    /// already pinned the frame.
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, pool: Arc<PoolShared>) -> Self {
        let data_lock = frame.data.write();
        let data_lock: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(data_lock) };

        Self {
            page_id,
            pool,
            _frame: frame,
            data_lock: Some(data_lock),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_lock.as_ref().unwrap()[..]
    }

    /// Returns the page bytes for mutation and marks the guard dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data_lock.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.data_lock.take();
        self.pool.unpin(self.page_id, self.is_dirty);
    }
}
