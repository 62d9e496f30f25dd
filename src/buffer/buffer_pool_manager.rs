//! Buffer Pool Manager - the page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page allocation with monotonically increasing identifiers
//! - Page caching between the page store and memory
//! - Pin-based reference counting through RAII guards
//! - Write-back of dirty victims and write-through on write-guard release
//! - LRU-K victim selection

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::buffer::replacer::LruKReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::config::BufferPoolConfig;
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::{DiskScheduler, PageStore};

/// Everything the pool-wide lock protects.
struct PoolState {
    /// Resident pages: page id to the frame holding it.
    page_table: HashMap<PageId, FrameId>,

    /// Frames holding no page (LIFO).
    free_list: Vec<FrameId>,

    replacer: LruKReplacer,

    /// Next identifier to hand out. Identifiers below it were allocated.
    next_page_id: PageId,

    /// Allocated identifiers that were explicitly deleted.
    deleted: HashSet<PageId>,
}

impl PoolState {
    /// Whether `page_id` was allocated and not deleted, resident or not.
    fn is_known(&self, page_id: PageId) -> bool {
        page_id < self.next_page_id && !self.deleted.contains(&page_id)
    }
}

/// Manages a fixed pool of frames caching pages of a [`PageStore`].
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────────────────┐
/// │                     BufferPoolManager                         │
/// │  ┌──────────── Mutex<PoolState> ─────────────┐                │
/// │  │ page_table  free_list  replacer  next_id  │                │
/// │  └───────────────────────────────────────────┘                │
/// │  ┌───────────────────────────────────┐   ┌────────────────┐   │
/// │  │        frames: Vec<Frame>         │   │ DiskScheduler  │──▶ PageStore
/// │  │  [Frame0] [Frame1] [Frame2] ...   │   │ (worker thread)│   │
/// │  └───────────────────────────────────┘   └────────────────┘   │
/// └───────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// Every operation runs under one pool-wide lock, including the disk
/// round trips for write-back, loads and flushes. I/O latency therefore
/// serializes all pool traffic; this keeps eviction atomic.
///
/// Page bytes are behind each frame's own `RwLock`, which guards hold for
/// their lifetime. A fetch takes the frame lock only after releasing the
/// pool lock, so waiting for a busy page never blocks the pool.
///
/// A thread must not hold a guard on a page while acquiring a second guard
/// on the same page if either of them is a write guard: it would wait on
/// itself.
///
/// # Usage
/// ```
/// use pagepool::buffer::BufferPoolManager;
/// use pagepool::common::config::BufferPoolConfig;
/// use pagepool::storage::MemoryPageStore;
///
/// let bpm = BufferPoolManager::new(BufferPoolConfig::new(4, 2), MemoryPageStore::new()).unwrap();
///
/// let page_id = {
///     let mut guard = bpm.new_page().unwrap();
///     guard.as_mut_slice()[0] = 0xAB;
///     guard.page_id()
/// }; // write-through, unpin
///
/// let guard = bpm.fetch_page_read(page_id).unwrap();
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    state: Mutex<PoolState>,

    scheduler: DiskScheduler,

    stats: BufferPoolStats,

    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a buffer pool over `store`.
    ///
    /// Page identifiers continue after the highest page already in the
    /// store, so a pool over a reopened store can fetch existing pages.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if the config is rejected
    /// - `Error::Io` if the scheduler's worker thread cannot be spawned
    pub fn new<S: PageStore + 'static>(config: BufferPoolConfig, store: S) -> Result<Self> {
        config.validate()?;
        let pool_size = config.pool_size;
        let next_page_id = PageId::new(store.page_count());

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();

        // Reversed so frame 0 is handed out first.
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        let state = PoolState {
            page_table: HashMap::with_capacity(pool_size),
            free_list,
            replacer: LruKReplacer::new(pool_size, config.replacer_k),
            next_page_id,
            deleted: HashSet::new(),
        };

        debug!(pool_size, k = state.replacer.k(), %next_page_id, "buffer pool created");

        Ok(Self {
            frames,
            state: Mutex::new(state),
            scheduler: DiskScheduler::new(store)?,
            stats: BufferPoolStats::new(),
            pool_size,
        })
    }

    // ========================================================================
    // Public API: Allocate pages
    // ========================================================================

    /// Allocate a new zeroed page and pin it in a frame.
    ///
    /// The page starts with pin count 1. Release it with
    /// [`unpin_page`](Self::unpin_page), or use [`new_page`](Self::new_page)
    /// to get a guard instead.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - `Error::PageIdsExhausted` once `u32::MAX` would be the next id
    /// - I/O errors from writing back a dirty victim
    pub fn allocate_page(&self) -> Result<PageId> {
        self.allocate_internal(false).map(|(page_id, _)| page_id)
    }

    /// Allocate a new page and return a write guard on it.
    ///
    /// The guard takes over the allocation's pin.
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let (page_id, frame_id) = self.allocate_internal(true)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for shared reading.
    ///
    /// Loads the page from the store if it is not resident, possibly
    /// evicting another page.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page was never allocated or was deleted
    /// - `Error::NoFreeFrames` if the page must be loaded and all frames are pinned
    /// - I/O errors from the load or from writing back a dirty victim
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id, false)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for exclusive writing.
    ///
    /// The page is marked dirty immediately, and written through to the
    /// store when the guard is released.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id, true)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Delete, flush, pin bookkeeping
    // ========================================================================

    /// Forget a page permanently, discarding unflushed content.
    ///
    /// Returns `false` if the page is unknown or still pinned. A known page
    /// that is not resident is simply forgotten.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            if !state.is_known(page_id) {
                return false;
            }
            state.deleted.insert(page_id);
            debug!(%page_id, "deleted non-resident page");
            return true;
        };

        let frame = &self.frames[frame_id.0];
        if frame.is_pinned() {
            debug!(%page_id, pin_count = frame.pin_count(), "refusing to delete pinned page");
            return false;
        }

        state.replacer.remove(frame_id);
        state.page_table.remove(&page_id);
        state.deleted.insert(page_id);
        frame.clear();
        state.free_list.push(frame_id);

        debug!(%page_id, %frame_id, "deleted page");
        true
    }

    /// Write a resident dirty page through to the store and mark it clean.
    ///
    /// Returns `Ok(false)` if the page is not resident or already clean.
    /// A page currently held by a write guard is also skipped: that guard
    /// writes it through on release.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };

        self.flush_frame(frame_id, page_id)
    }

    /// Flush every resident page. Returns the number of pages written.
    ///
    /// Clean pages are skipped. A failed page does not stop the others;
    /// the first error is returned once every page has been tried.
    pub fn flush_all_pages(&self) -> Result<usize> {
        let state = self.state.lock();

        let mut resident: Vec<(PageId, FrameId)> = state
            .page_table
            .iter()
            .map(|(&pid, &fid)| (pid, fid))
            .collect();
        resident.sort_unstable();

        let mut written = 0;
        let mut first_error = None;
        for (page_id, frame_id) in resident {
            match self.flush_frame(frame_id, page_id) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(%page_id, error = %e, "flush failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        debug!(written, "flushed all pages");
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    /// Pin count of a resident page, or `None` if it is not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|fid| self.frames[fid.0].pin_count())
    }

    /// Release one pin on a resident page.
    ///
    /// When the count reaches zero the page becomes evictable. Unpinning a
    /// page that is not resident or not pinned logs a warning and returns
    /// `false`.
    pub fn unpin_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        self.unpin_locked(&mut state, page_id)
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of frames holding no page.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of pages currently held in frames.
    pub fn resident_page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Whether `page_id` is resident.
    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Number of frames the replacer may evict right now.
    pub fn evictable_count(&self) -> usize {
        self.state.lock().replacer.size()
    }

    // ========================================================================
    // Internal: called by guards on release
    // ========================================================================

    /// Unpin on behalf of a read guard.
    pub(crate) fn release_read(&self, page_id: PageId) {
        self.unpin_page(page_id);
    }

    /// Write the guard's bytes through to the store without ending the guard.
    pub(crate) fn write_through(&self, page_id: PageId, page: &Page) -> Result<()> {
        let _state = self.state.lock();
        self.write_to_store(page_id, page)
    }

    /// Write-through then unpin, on behalf of a write guard.
    ///
    /// The pin is released even when the write fails; the page is then
    /// marked dirty and written back again on eviction. An earlier writer's
    /// successful release may have cleared the flag this guard set on fetch,
    /// so a failure must set it again rather than leave it alone.
    pub(crate) fn release_write(&self, frame_id: FrameId, page_id: PageId, page: &Page) -> Result<()> {
        let mut state = self.state.lock();

        let written = self.write_to_store(page_id, page);
        self.frames[frame_id.0].set_dirty(written.is_err());
        self.unpin_locked(&mut state, page_id);

        written
    }

    // ========================================================================
    // Internal: core logic, all with the pool lock held
    // ========================================================================

    fn allocate_internal(&self, write_intent: bool) -> Result<(PageId, FrameId)> {
        let mut state = self.state.lock();

        let page_id = state.next_page_id;
        let next_page_id = page_id.next().ok_or(Error::PageIdsExhausted)?;

        let frame_id = self.acquire_frame(&mut state)?;
        state.next_page_id = next_page_id;

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.assign(page_id);
        frame.set_dirty(write_intent);
        state.page_table.insert(page_id, frame_id);
        self.pin_locked(&mut state, frame_id);

        debug!(%page_id, %frame_id, "allocated page");
        Ok((page_id, frame_id))
    }

    fn fetch_page_internal(&self, page_id: PageId, write_intent: bool) -> Result<FrameId> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            trace!(%page_id, %frame_id, "buffer pool hit");
            self.stats.record_hit();
            self.pin_locked(&mut state, frame_id);
            if write_intent {
                self.frames[frame_id.0].set_dirty(true);
            }
            return Ok(frame_id);
        }

        if !state.is_known(page_id) {
            return Err(Error::PageNotFound(page_id));
        }

        self.stats.record_miss();
        let frame_id = self.acquire_frame(&mut state)?;

        let data = match self.scheduler.read_page(page_id) {
            Ok(data) => data,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };
        self.stats.record_disk_read();

        let frame = &self.frames[frame_id.0];
        frame.page_mut().copy_from(&data);
        frame.assign(page_id);
        frame.set_dirty(write_intent);
        state.page_table.insert(page_id, frame_id);
        self.pin_locked(&mut state, frame_id);

        debug!(%page_id, %frame_id, "loaded page from store");
        Ok(frame_id)
    }

    /// Pin a resident frame and shield it from eviction.
    fn pin_locked(&self, state: &mut PoolState, frame_id: FrameId) {
        self.frames[frame_id.0].pin();
        state.replacer.set_evictable(frame_id, false);
        state.replacer.record_access(frame_id);
    }

    fn unpin_locked(&self, state: &mut PoolState, page_id: PageId) -> bool {
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            warn!(%page_id, "unpin of a page that is not resident");
            return false;
        };

        match self.frames[frame_id.0].unpin() {
            None => {
                warn!(%page_id, "unpin of a page that is not pinned");
                false
            }
            Some(0) => {
                state.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
        }
    }

    /// Take a free frame, or evict the replacer's victim.
    ///
    /// A dirty victim is written back first. On return the frame is empty
    /// and unmapped.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.evict().ok_or(Error::NoFreeFrames)?;
        let frame = &self.frames[frame_id.0];
        let victim = frame.page_id();

        if let Some(victim_id) = victim {
            if frame.is_dirty() {
                let written = {
                    let page = frame.page();
                    self.write_to_store(victim_id, &page)
                };
                if let Err(e) = written {
                    // Keep the victim resident and evictable.
                    state.replacer.record_access(frame_id);
                    state.replacer.set_evictable(frame_id, true);
                    return Err(e);
                }
            }
            state.page_table.remove(&victim_id);
        }

        frame.clear();
        self.stats.record_eviction();
        debug!(%frame_id, victim = ?victim, "evicted page");
        Ok(frame_id)
    }

    /// Write a frame through if dirty. Returns whether anything was written.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<bool> {
        let frame = &self.frames[frame_id.0];
        if !frame.is_dirty() {
            return Ok(false);
        }

        let Some(page) = frame.try_page() else {
            trace!(%page_id, "skipping flush of page held by a writer");
            return Ok(false);
        };
        self.write_to_store(page_id, &page)?;
        drop(page);

        frame.set_dirty(false);
        Ok(true)
    }

    fn write_to_store(&self, page_id: PageId, page: &Page) -> Result<()> {
        self.scheduler.write_page(page_id, page.to_boxed())?;
        self.stats.record_disk_write();
        trace!(%page_id, "wrote page to store");
        Ok(())
    }
}
