use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{
    FrameId, PageId, QuarryError, Result, DEFAULT_BUCKET_SIZE, INVALID_PAGE_ID, PAGE_SIZE,
};
use crate::container::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Bookkeeping protected by the pool latch. Every public buffer pool
/// operation holds this lock for its whole body, so the operations are
/// linearizable with respect to one another.
struct PoolState {
    /// Page table: maps resident page IDs to frame IDs
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Frames not currently holding any page
    free_list: VecDeque<FrameId>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
}

/// State shared between the buffer pool and its page guards.
pub(crate) struct PoolShared {
    frames: Vec<Arc<FrameHeader>>,
    state: Mutex<PoolState>,
}

impl PoolShared {
    /// Decrements a page's pin count, ORing in the dirty flag. Returns false
    /// when the page is not resident or was not pinned. At pin count zero
    /// the frame becomes evictable. Page guards call this on drop.
    pub(crate) fn unpin(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();

        let Some(frame_id) = state.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        if is_dirty {
            frame.set_dirty(true);
        }
        match frame.unpin() {
            None => false,
            Some(0) => {
                state.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
        }
    }
}

/// BufferPoolManager owns a fixed set of frames and moves pages between
/// them and disk. Frames are handed out as pinned RAII guards; the LRU-K
/// replacer picks victims among unpinned frames when the free list runs dry.
pub struct BufferPoolManager {
    pool_size: usize,
    shared: Arc<PoolShared>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a buffer pool with `pool_size` frames and an LRU-K replacer
    /// of the given k.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        assert!(pool_size > 0, "buffer pool must have at least one frame");

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let shared = Arc::new(PoolShared {
            frames,
            state: Mutex::new(PoolState {
                page_table: ExtendibleHashTable::new(DEFAULT_BUCKET_SIZE),
                free_list,
                replacer: LruKReplacer::new(k, pool_size),
            }),
        });

        Self {
            pool_size,
            shared,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and pins it into a frame, returning a write
    /// guard over its zeroed bytes. Fails with `BufferPoolFull` when every
    /// frame is pinned.
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let mut state = self.shared.state.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.shared.frames[frame_id.as_usize()];

        let page_id = match self.disk_scheduler.disk_manager().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                // Frame goes back unused; nothing else references it yet.
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);
        drop(state);

        debug!(page_id = page_id.as_u32(), frame_id = frame_id.as_u32(), "new page");
        Ok(WritePageGuard::new(
            page_id,
            Arc::clone(frame),
            Arc::clone(&self.shared),
        ))
    }

    /// Pins an existing page for shared access, reading it from disk when it
    /// is not resident.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame_id = self.fetch_frame(page_id)?;
        let frame = &self.shared.frames[frame_id.as_usize()];
        Ok(ReadPageGuard::new(
            page_id,
            Arc::clone(frame),
            Arc::clone(&self.shared),
        ))
    }

    /// Pins an existing page for exclusive access, reading it from disk when
    /// it is not resident.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame_id = self.fetch_frame(page_id)?;
        let frame = &self.shared.frames[frame_id.as_usize()];
        Ok(WritePageGuard::new(
            page_id,
            Arc::clone(frame),
            Arc::clone(&self.shared),
        ))
    }

    /// Explicit unpin, for callers not going through guards. Returns false
    /// if the page is not resident or its pin count is already zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.shared.unpin(page_id, is_dirty)
    }

    /// Writes a resident page to disk and clears its dirty bit. Returns
    /// false when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let state = self.shared.state.lock();
        let Some(frame_id) = state.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &self.shared.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);

        debug!(page_id = page_id.as_u32(), "flushed page");
        Ok(true)
    }

    /// Writes every resident page to disk and clears all dirty bits.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _state = self.shared.state.lock();

        for frame in &self.shared.frames {
            let page_id = frame.page_id();
            if page_id == INVALID_PAGE_ID {
                continue;
            }
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
            frame.set_dirty(false);
        }

        Ok(())
    }

    /// Drops a page from the pool and deallocates it on disk. Returns false
    /// when the page is not resident; a pinned page cannot be deleted.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.shared.state.lock();

        let Some(frame_id) = state.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &self.shared.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Err(QuarryError::PageStillPinned(page_id));
        }

        state.page_table.remove(&page_id);
        state.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;

        debug!(page_id = page_id.as_u32(), "deleted page");
        Ok(true)
    }

    /// Returns the pin count of a resident page, or None when not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.shared.state.lock();
        state
            .page_table
            .find(&page_id)
            .map(|frame_id| self.shared.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.shared.state.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Pins the page into a frame and returns the frame id. The caller turns
    /// the pin into a guard.
    fn fetch_frame(&self, page_id: PageId) -> Result<FrameId> {
        if page_id == INVALID_PAGE_ID {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let mut state = self.shared.state.lock();

        // Resident: bump the pin and refresh the access history.
        if let Some(frame_id) = state.page_table.find(&page_id) {
            let frame = &self.shared.frames[frame_id.as_usize()];
            frame.pin();
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);
            return Ok(frame_id);
        }

        // Miss: take a frame and load the page from disk.
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.shared.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = self.disk_scheduler.schedule_read_sync(page_id, &mut data) {
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.copy_from(&data);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    /// Pops a free frame, or evicts one. Evicted dirty pages are written
    /// back before the frame is reused. The returned frame is reset.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = state.replacer.evict() else {
            return Err(QuarryError::BufferPoolFull);
        };
        let frame = &self.shared.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(old_page_id, &data)?;
            debug!(
                page_id = old_page_id.as_u32(),
                frame_id = frame_id.as_u32(),
                "wrote back dirty victim"
            );
        }

        state.page_table.remove(&old_page_id);
        frame.reset();
        Ok(frame_id)
    }
}
