//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds one [`Page`] plus the metadata the pool needs to manage
//! it: which page is loaded, how many guards pin it, and whether its bytes
//! differ from the page store.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// # Locking discipline
/// - `page`: its own `RwLock`. Guards hold it for their whole lifetime, so
///   readers share the bytes and a writer has them exclusively.
/// - `page_id`, `pin_count`, `is_dirty`: only ever *changed* while the
///   pool-wide lock is held. The atomics and the small mutex keep each field
///   tear-free for lock-free reads; the pool lock is what keeps them
///   consistent with the page table and the replacer.
pub struct Frame {
    page: RwLock<Page>,

    /// Page currently loaded, or `None` if the frame is free.
    page_id: Mutex<Option<PageId>>,

    /// Number of outstanding pins (guards plus raw allocations).
    pin_count: AtomicU32,

    /// Whether the bytes have changed since the last write-through.
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            page_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Page access
    // ========================================================================

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Acquire the read lock only if no writer holds it.
    #[inline]
    pub fn try_page(&self) -> Option<RwLockReadGuard<'_, Page>> {
        self.page.try_read()
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    #[inline]
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.lock() = page_id;
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count, or `None` (and
    /// leaves the count at zero) if the frame was not pinned.
    #[inline]
    pub fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            })
            .ok()
            .map(|old| old - 1)
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Set or clear the dirty flag.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// Check if the frame is empty (no page loaded).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id().is_none()
    }

    /// Bind the frame to `page_id` with clean, unpinned metadata.
    ///
    /// The bytes are left alone; the caller fills them.
    pub fn assign(&self, page_id: PageId) {
        self.set_page_id(Some(page_id));
        self.pin_count.store(0, Ordering::Relaxed);
        self.set_dirty(false);
    }

    /// Forget the loaded page. The bytes are discarded lazily on reuse.
    pub fn clear(&self) {
        self.set_page_id(None);
        self.pin_count.store(0, Ordering::Relaxed);
        self.set_dirty(false);
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
