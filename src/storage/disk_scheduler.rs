//! Disk Scheduler - asynchronous, ordered access to a page store.
//!
//! Callers build a [`DiskRequest`], hand it to [`DiskScheduler::schedule`]
//! (which never blocks), and later wait on the request's [`Completion`].
//! A single worker thread owns the [`PageStore`] and executes requests one
//! at a time, strictly in submission order.
//!
//! ```text
//!  caller ──schedule──▶ ┌────────────────┐      ┌─────────────┐
//!  caller ──schedule──▶ │  FIFO channel  │ ───▶ │   worker    │ ──▶ PageStore
//!  caller ──schedule──▶ └────────────────┘      └──────┬──────┘
//!    ▲                                                 │
//!    └──────────── Completion (exactly one send) ◀─────┘
//! ```

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::page_store::PageStore;

/// Direction of a disk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
}

/// A single read or write against the page store.
///
/// The request owns its buffer: for a read it is the destination, for a
/// write the source. Either way the buffer comes back to the waiter through
/// the [`Completion`], so no page memory is shared with the worker.
pub struct DiskRequest {
    kind: RequestKind,
    page_id: PageId,
    data: Box<Page>,
    done: Sender<Result<Box<Page>>>,
}

impl DiskRequest {
    /// A request to read `page_id` into a fresh buffer.
    pub fn read(page_id: PageId) -> (Self, Completion) {
        Self::with_buffer(RequestKind::Read, page_id, Page::boxed())
    }

    /// A request to persist `data` as the content of `page_id`.
    pub fn write(page_id: PageId, data: Box<Page>) -> (Self, Completion) {
        Self::with_buffer(RequestKind::Write, page_id, data)
    }

    fn with_buffer(kind: RequestKind, page_id: PageId, data: Box<Page>) -> (Self, Completion) {
        let (done, rx) = channel::bounded(1);
        let request = Self {
            kind,
            page_id,
            data,
            done,
        };
        (request, Completion { rx })
    }

    #[inline]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Run the request against `store` and signal its waiter.
    fn execute<S: PageStore + ?Sized>(self, store: &mut S) {
        let Self {
            kind,
            page_id,
            mut data,
            done,
        } = self;

        let outcome = match kind {
            RequestKind::Read => store.read_page(page_id, &mut data),
            RequestKind::Write => store.write_page(page_id, &data),
        };
        if let Err(e) = &outcome {
            error!(%page_id, ?kind, error = %e, "disk request failed");
        }

        // The waiter may have given up; nobody is left to tell.
        let _ = done.send(outcome.map(|()| data));
    }
}

/// The waiting side of a [`DiskRequest`].
///
/// Consumed by [`Completion::wait`], so exactly one waiter observes the
/// outcome.
#[must_use = "a completion must be waited on to observe the request outcome"]
pub struct Completion {
    rx: Receiver<Result<Box<Page>>>,
}

impl Completion {
    /// Block until the request has been executed.
    ///
    /// Returns the request's buffer: the page read for a read request, the
    /// written bytes for a write.
    ///
    /// # Errors
    /// - The page store's error, if the operation failed
    /// - `Error::SchedulerShutdown` if the request was dropped unexecuted
    pub fn wait(self) -> Result<Box<Page>> {
        self.rx.recv().map_err(|_| Error::SchedulerShutdown)?
    }
}

/// Single-consumer, multi-producer request pipeline in front of a page store.
///
/// # Shutdown
/// [`shutdown`](Self::shutdown) stops accepting requests, lets the worker
/// drain what is already queued, and joins it. Callers must not schedule
/// new work concurrently with shutdown; such requests fail with
/// `Error::SchedulerShutdown`. Dropping the scheduler shuts it down.
pub struct DiskScheduler {
    /// `None` once shut down.
    sender: Mutex<Option<Sender<DiskRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DiskScheduler {
    /// Start a scheduler whose worker takes ownership of `store`.
    ///
    /// # Errors
    /// Returns `Error::Io` if the worker thread cannot be spawned.
    pub fn new<S: PageStore + 'static>(store: S) -> Result<Self> {
        let (sender, receiver) = channel::unbounded();

        let worker = thread::Builder::new()
            .name("disk-scheduler".into())
            .spawn(move || run_worker(store, receiver))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Enqueue a request. Never blocks on I/O.
    ///
    /// # Errors
    /// Returns `Error::SchedulerShutdown` after [`shutdown`](Self::shutdown).
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(Error::SchedulerShutdown)?;

        trace!(page_id = %request.page_id, kind = ?request.kind, "scheduling disk request");
        sender.send(request).map_err(|_| Error::SchedulerShutdown)
    }

    /// Read `page_id` and wait for the result.
    pub fn read_page(&self, page_id: PageId) -> Result<Box<Page>> {
        let (request, completion) = DiskRequest::read(page_id);
        self.schedule(request)?;
        completion.wait()
    }

    /// Write `data` to `page_id` and wait until the store has it.
    pub fn write_page(&self, page_id: PageId, data: Box<Page>) -> Result<()> {
        let (request, completion) = DiskRequest::write(page_id, data);
        self.schedule(request)?;
        completion.wait().map(drop)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stop accepting requests and terminate the worker.
    ///
    /// Requests queued before this call are executed before the worker
    /// exits. Calling it again is a no-op.
    pub fn shutdown(&self) {
        // Dropping the last sender ends the worker's receive loop.
        drop(self.sender.lock().take());

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("disk scheduler worker panicked");
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<S: PageStore>(mut store: S, requests: Receiver<DiskRequest>) {
    debug!("disk scheduler worker started");
    for request in requests.iter() {
        request.execute(&mut store);
    }
    debug!("disk scheduler worker stopped");
}
