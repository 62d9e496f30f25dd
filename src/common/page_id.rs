//! Page identifier type.

use std::fmt;

/// Identifies a page in the backing page store.
///
/// Identifiers are handed out by the buffer pool in increasing order and
/// are never reused, so a `u32` gives 4 billion pages (16TB at 4KB each)
/// before the sequence runs out.
///
/// # Example
/// ```
/// use pagepool::PageId;
///
/// let page_id = PageId::new(42);
/// assert_eq!(page_id.0, 42);
/// assert_eq!(page_id.next(), Some(PageId::new(43)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// The identifier that follows this one, or `None` at `u32::MAX`.
    #[inline]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(PageId)
    }

    /// Byte offset of this page in a file of consecutive pages.
    #[inline]
    pub fn file_offset(self, page_size: usize) -> u64 {
        u64::from(self.0) * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_next() {
        assert_eq!(PageId::new(0).next(), Some(PageId::new(1)));
        assert_eq!(PageId::new(41).next().map(|p| p.0), Some(42));
        assert_eq!(PageId::new(u32::MAX).next(), None);
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        assert!(PageId::new(5) > PageId::new(3));
    }

    #[test]
    fn test_file_offset() {
        assert_eq!(PageId::new(0).file_offset(4096), 0);
        assert_eq!(PageId::new(3).file_offset(4096), 12288);
        assert_eq!(PageId::new(u32::MAX).file_offset(4096), u32::MAX as u64 * 4096);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
    }
}
