//! Storage layer - pages, page stores and the disk scheduler.
//!
//! - [`Page`] - The raw 4KB data container
//! - [`PageStore`] - What the buffer pool needs from durable storage
//! - [`MemoryPageStore`] / [`DiskManager`] - Store implementations
//! - [`DiskScheduler`] - Ordered background I/O in front of a store

mod disk_manager;
mod disk_scheduler;
pub mod page;
mod page_store;

pub use disk_manager::DiskManager;
pub use disk_scheduler::{Completion, DiskRequest, DiskScheduler, RequestKind};
pub use page::Page;
pub use page_store::{MemoryPageStore, PageStore};
