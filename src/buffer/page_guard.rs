//! RAII guards for page access.
//!
//! Guards are the only way to reach a frame's bytes:
//! - [`PageReadGuard`] - shared read access, unpins on release
//! - [`PageWriteGuard`] - exclusive write access, writes through to the
//!   page store and then unpins on release
//!
//! Release happens on drop or through the consuming `release` methods, so
//! a guard can release its pin exactly once.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::error;

use crate::common::{FrameId, PageId, Result};
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;

/// Guard for read-only page access.
///
/// Several read guards may share a page. The page is unpinned when the guard
/// is dropped or released.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let first = guard.as_slice()[0];
/// guard.release(); // or let it fall out of scope
/// ```
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Unpin the page now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.bpm.release_read(self.page_id);
    }
}

/// Guard for exclusive write access to a page.
///
/// The page is marked dirty when the guard is created. On release the guard
/// writes its bytes through to the page store whether or not they changed,
/// then unpins. A failed write-through on drop is logged; use
/// [`release`](Self::release) to observe it instead.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(page_id)?;
/// guard.as_mut_slice()[0] = 0xFF;
/// guard.release()?; // write-through, then unpin
/// ```
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
    /// Set once the write-through and unpin have run.
    released: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
            released: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Write the current bytes through to the page store, keeping the guard.
    ///
    /// The page stays dirty: the guard may still change it.
    pub fn flush(&self) -> Result<()> {
        self.bpm.write_through(self.page_id, &self.lock)
    }

    /// Write through and unpin now, reporting a failed write.
    ///
    /// The pin is released even if the write fails.
    pub fn release(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        self.released = true;
        self.bpm
            .release_write(self.frame_id, self.page_id, &self.lock)
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.finish() {
            error!(page_id = %self.page_id, error = %e, "write-through failed on guard drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::BufferPoolManager;
    use crate::common::config::BufferPoolConfig;
    use crate::storage::MemoryPageStore;

    fn create_test_bpm(pool_size: usize) -> (BufferPoolManager, MemoryPageStore) {
        let store = MemoryPageStore::new();
        let bpm = BufferPoolManager::new(BufferPoolConfig::new(pool_size, 2), store.clone()).unwrap();
        (bpm, store)
    }

    #[test]
    fn test_read_guard_unpins_once() {
        let (bpm, _store) = create_test_bpm(4);
        let pid = bpm.allocate_page().unwrap();
        bpm.unpin_page(pid);

        let g1 = bpm.fetch_page_read(pid).unwrap();
        let g2 = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(bpm.get_pin_count(pid), Some(2));

        g1.release();
        assert_eq!(bpm.get_pin_count(pid), Some(1));
        drop(g2);
        assert_eq!(bpm.get_pin_count(pid), Some(0));
        assert_eq!(bpm.evictable_count(), 1);
    }

    #[test]
    fn test_write_guard_writes_through_on_drop() {
        let (bpm, store) = create_test_bpm(4);

        let pid = {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[..5].copy_from_slice(b"hello");
            guard.page_id()
        };

        assert_eq!(&store.page_bytes(pid).unwrap()[..5], b"hello");
        assert_eq!(bpm.get_pin_count(pid), Some(0));
        assert!(!bpm.flush_page(pid).unwrap(), "page is clean after release");
    }

    #[test]
    fn test_write_guard_writes_even_when_unchanged() {
        let (bpm, store) = create_test_bpm(4);
        let pid = bpm.allocate_page().unwrap();
        bpm.unpin_page(pid);
        assert!(store.page_bytes(pid).is_none());

        bpm.fetch_page_write(pid).unwrap().release().unwrap();

        assert!(store.page_bytes(pid).is_some());
    }

    #[test]
    fn test_explicit_flush_keeps_guard() {
        let (bpm, store) = create_test_bpm(4);
        let mut guard = bpm.new_page().unwrap();
        let pid = guard.page_id();

        guard.as_mut_slice()[0] = 1;
        guard.flush().unwrap();
        assert_eq!(store.page_bytes(pid).unwrap()[0], 1);
        assert_eq!(bpm.get_pin_count(pid), Some(1));

        guard.as_mut_slice()[0] = 2;
        guard.release().unwrap();
        assert_eq!(store.page_bytes(pid).unwrap()[0], 2);
        assert_eq!(bpm.get_pin_count(pid), Some(0));
    }

    #[test]
    fn test_guard_ids() {
        let (bpm, _store) = create_test_bpm(4);
        let guard = bpm.new_page().unwrap();
        let pid = guard.page_id();
        let fid = guard.frame_id();
        drop(guard);

        let reader = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(reader.page_id(), pid);
        assert_eq!(reader.frame_id(), fid);
    }
}
