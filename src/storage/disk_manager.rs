//! Disk Manager - a file-backed page store.
//!
//! The [`DiskManager`] keeps every page of one database in a single file
//! and implements [`PageStore`] on top of positioned reads and writes.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{PageId, Result};
use crate::storage::page::Page;
use crate::storage::page_store::PageStore;

/// Stores pages in one file, laid out sequentially.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Writing page N past the end of the file extends it; the gap reads back
/// as zeros, and so does any page beyond the end.
///
/// # Thread Safety
/// `DiskManager` is single-threaded. It is owned by the disk scheduler's
/// worker, which serializes all requests.
///
/// # Durability
/// Every write is followed by `fsync()`.
pub struct DiskManager {
    file: File,
    /// Number of whole pages in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
        })
    }

    /// Open an existing database file.
    ///
    /// A trailing partial page (from a torn write) is ignored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let pages = file.metadata()?.len() / PAGE_SIZE as u64;
        let page_count = u32::try_from(pages).unwrap_or(u32::MAX);

        debug!(page_count, "opened database file");
        Ok(Self { file, page_count })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Size of the page area of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        u64::from(self.page_count) * PAGE_SIZE as u64
    }
}

impl PageStore for DiskManager {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        if page_id.0 >= self.page_count {
            page.reset();
            return Ok(());
        }

        self.file
            .seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        if page_id.0 >= self.page_count {
            self.page_count = page_id.0.saturating_add(1);
        }
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn page_with(byte: u8) -> Page {
        let mut page = Page::new();
        page.as_mut_slice()[0] = byte;
        page.as_mut_slice()[PAGE_SIZE - 1] = byte;
        page
    }

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
        assert_eq!(dm.page_count(), 0);
        assert_eq!(dm.file_size(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskManager::create(&path).unwrap();
        assert!(DiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(DiskManager::open(dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_unwritten_page_reads_zeroed() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("test.db")).unwrap();

        let mut page = page_with(0xFF);
        dm.read_page(PageId::new(7), &mut page).unwrap();
        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("test.db")).unwrap();

        dm.write_page(PageId::new(0), &page_with(0xAB)).unwrap();

        let mut page = Page::new();
        dm.read_page(PageId::new(0), &mut page).unwrap();
        assert_eq!(page.as_slice()[0], 0xAB);
        assert_eq!(page.as_slice()[PAGE_SIZE - 1], 0xAB);
    }

    #[test]
    fn test_write_past_end_extends_with_zeroed_gap() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("test.db")).unwrap();

        dm.write_page(PageId::new(3), &page_with(0x33)).unwrap();
        assert_eq!(dm.page_count(), 4);
        assert_eq!(dm.file_size(), 4 * PAGE_SIZE as u64);

        let mut gap = page_with(0xFF);
        dm.read_page(PageId::new(1), &mut gap).unwrap();
        assert!(gap.as_slice().iter().all(|&b| b == 0));

        // Rewriting an earlier page does not shrink the count.
        dm.write_page(PageId::new(0), &page_with(0x01)).unwrap();
        assert_eq!(dm.page_count(), 4);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::create(&path).unwrap();
            dm.write_page(PageId::new(0), &page_with(0x42)).unwrap();
            dm.write_page(PageId::new(1), &page_with(0x43)).unwrap();
        }

        {
            let mut dm = DiskManager::open(&path).unwrap();
            assert_eq!(dm.page_count(), 2);

            let mut page = Page::new();
            dm.read_page(PageId::new(1), &mut page).unwrap();
            assert_eq!(page.as_slice()[0], 0x43);
        }
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.page_count(), 0);
            dm.write_page(PageId::new(0), &Page::new()).unwrap();
        }

        {
            let dm = DiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.page_count(), 1);
        }
    }
}
