//! Page store abstraction.
//!
//! The buffer pool only needs a component that can read and write a
//! fixed-size page by numeric identifier. How the bytes are made durable is
//! the store's business. Two stores ship with the crate:
//! - [`MemoryPageStore`] - a shared in-memory map, used by tests and demos
//! - [`DiskManager`](super::DiskManager) - one file of consecutive pages

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Durable mapping from page identifier to a 4KB block.
///
/// Stores are driven by a single thread (the disk scheduler's worker), so
/// methods take `&mut self` and implementations need no internal locking.
pub trait PageStore: Send {
    /// Fill `page` with the stored bytes for `page_id`.
    ///
    /// A page that was never written reads back as all zeros.
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Persist `page` as the content of `page_id`, replacing prior content.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// One past the highest page identifier that holds data.
    ///
    /// A fresh buffer pool starts issuing identifiers here, so pages left by
    /// an earlier pool stay addressable.
    fn page_count(&self) -> u32;
}

impl<S: PageStore + ?Sized> PageStore for Box<S> {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        (**self).read_page(page_id, page)
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        (**self).write_page(page_id, page)
    }

    fn page_count(&self) -> u32 {
        (**self).page_count()
    }
}

/// In-memory page store.
///
/// Cloning yields another handle to the same pages, so a test can give one
/// handle to the buffer pool and keep another to inspect what was written.
///
/// # Example
/// ```
/// use pagepool::storage::{MemoryPageStore, PageStore};
/// use pagepool::{Page, PageId};
///
/// let mut store = MemoryPageStore::new();
/// let inspector = store.clone();
///
/// let mut page = Page::new();
/// page.as_mut_slice()[0] = 7;
/// store.write_page(PageId::new(3), &page).unwrap();
///
/// assert_eq!(inspector.page_bytes(PageId::new(3)).unwrap()[0], 7);
/// assert_eq!(inspector.page_count(), 4);
/// ```
#[derive(Clone, Default)]
pub struct MemoryPageStore {
    pages: Arc<RwLock<HashMap<PageId, Box<Page>>>>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the stored bytes for `page_id`, if it was ever written.
    pub fn page_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.pages
            .read()
            .get(&page_id)
            .map(|page| page.as_slice().to_vec())
    }

    /// Number of distinct pages written so far.
    pub fn written_pages(&self) -> usize {
        self.pages.read().len()
    }
}

impl PageStore for MemoryPageStore {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        match self.pages.read().get(&page_id) {
            Some(stored) => page.copy_from(stored),
            None => page.reset(),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.pages.write().insert(page_id, page.to_boxed());
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.pages
            .read()
            .keys()
            .map(|pid| pid.0.saturating_add(1))
            .max()
            .unwrap_or(0)
    }
}
