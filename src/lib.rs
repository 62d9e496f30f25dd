//! pagepool - a page buffer pool with LRU-K eviction.
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          callers                             │
//! │        new_page / fetch_page_read / fetch_page_write         │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼  PageReadGuard / PageWriteGuard
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Buffer Pool (buffer/)                        │
//! │   BufferPoolManager + Frame + LruKReplacer + Statistics      │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼  DiskRequest / Completion
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Storage (storage/)                           │
//! │   DiskScheduler (worker thread) → PageStore                  │
//! │        MemoryPageStore | DiskManager (single file)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool, frames, guards and the LRU-K replacer
//! - [`storage`] - Pages, page stores and the disk scheduler
//!
//! # Quick Start
//! ```no_run
//! use pagepool::{BufferPoolConfig, BufferPoolManager, DiskManager};
//!
//! let dm = DiskManager::open_or_create("my_database.db").unwrap();
//! let bpm = BufferPoolManager::new(BufferPoolConfig::default(), dm).unwrap();
//!
//! let mut guard = bpm.new_page().unwrap();
//! guard.as_mut_slice()[0] = 0xFF;
//! guard.release().unwrap(); // written through to my_database.db
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

pub use common::config::{BufferPoolConfig, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, PageReadGuard, PageWriteGuard, StatsSnapshot};
pub use storage::{DiskManager, DiskScheduler, MemoryPageStore, Page, PageStore};
