use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::common::{PageId, QuarryError, Result, PAGE_SIZE};

use super::DiskManager;

/// A queued page transfer. Requests own their page buffer, so nothing in
/// the pipeline aliases caller memory; results travel back over a one-shot
/// reply channel.
enum DiskRequest {
    Read {
        page_id: PageId,
        reply: Sender<Result<Box<[u8; PAGE_SIZE]>>>,
    },
    Write {
        page_id: PageId,
        data: Box<[u8; PAGE_SIZE]>,
        reply: Sender<Result<()>>,
    },
}

/// DiskScheduler funnels page I/O through a single background worker. The
/// buffer pool calls the synchronous wrappers, which block on the reply
/// channel until the worker has served the request.
///
/// Shutdown rides on channel disconnection: dropping the scheduler closes
/// the request queue, the worker serves whatever is still queued and exits,
/// and the drop joins it.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    /// Closed (taken) on drop to stop the worker
    requests: Option<Sender<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a scheduler and spawns its worker thread.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (requests, queue) = bounded::<DiskRequest>(128);
        let worker = {
            let disk_manager = Arc::clone(&disk_manager);
            thread::spawn(move || Self::run_worker(disk_manager, queue))
        };

        Self {
            disk_manager,
            requests: Some(requests),
            worker: Some(worker),
        }
    }

    /// Reads a page, blocking until the worker completes it.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (reply, response) = bounded(1);
        self.submit(DiskRequest::Read { page_id, reply })?;
        let page = Self::await_reply(&response, page_id)??;
        data.copy_from_slice(&page[..]);
        Ok(())
    }

    /// Writes a page, blocking until the worker completes it.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let mut page = Box::new([0u8; PAGE_SIZE]);
        page.copy_from_slice(data);

        let (reply, response) = bounded(1);
        self.submit(DiskRequest::Write {
            page_id,
            data: page,
            reply,
        })?;
        Self::await_reply(&response, page_id)?
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    fn submit(&self, request: DiskRequest) -> Result<()> {
        self.requests
            .as_ref()
            .expect("scheduler used after shutdown")
            .send(request)
            .map_err(|_| QuarryError::DiskScheduler("worker thread is gone".into()))
    }

    fn await_reply<T>(response: &Receiver<T>, page_id: PageId) -> Result<T> {
        response.recv().map_err(|_| {
            QuarryError::Channel(format!("no completion for I/O on page {page_id}"))
        })
    }

    /// Worker body: serves requests until the scheduler's sender is
    /// dropped, which also drains anything still queued.
    fn run_worker(disk_manager: Arc<DiskManager>, queue: Receiver<DiskRequest>) {
        for request in queue {
            match request {
                DiskRequest::Read { page_id, reply } => {
                    let mut page = Box::new([0u8; PAGE_SIZE]);
                    let result = disk_manager
                        .read_page(page_id, &mut page[..])
                        .map(|()| page);
                    let _ = reply.send(result);
                }
                DiskRequest::Write {
                    page_id,
                    data,
                    reply,
                } => {
                    let _ = reply.send(disk_manager.write_page(page_id, &data[..]));
                }
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
