//! Page - the fixed-size unit of storage.
//!
//! A [`Page`] is a raw 4KB byte block. It is what the page store reads and
//! writes, what each buffer frame caches, and what a disk request carries
//! between the pool and the scheduler's worker thread. The pool never
//! interprets its contents.

use crate::common::config::PAGE_SIZE;

/// A page of data (4KB, 4KB-aligned).
///
/// # Copying
/// `Page` does not implement `Clone`: copying 4KB should be explicit, so the
/// only copy paths are [`Page::copy_from`] and [`Page::to_boxed`], used where
/// bytes must cross the scheduler's thread boundary.
///
/// # Example
/// ```
/// use pagepool::Page;
///
/// let mut page = Page::new();
/// page.as_mut_slice()[0] = 0xFF;
/// assert_eq!(page.as_slice()[0], 0xFF);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Allocate a zeroed page on the heap.
    #[inline]
    pub fn boxed() -> Box<Self> {
        Box::new(Self::new())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Overwrite this page with the bytes of `other`.
    #[inline]
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    /// Heap copy of this page, for handing to the disk scheduler.
    pub fn to_boxed(&self) -> Box<Page> {
        let mut copy = Self::boxed();
        copy.copy_from(self);
        copy
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        f.debug_struct("Page").field("used_bytes", &used).finish()
    }
}
