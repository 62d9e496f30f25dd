//! Error types for the buffer pool.

use thiserror::Error;

use super::PageId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the pool, the scheduler and the page stores.
///
/// Capacity exhaustion and unknown pages are ordinary, recoverable outcomes:
/// callers are expected to match on them and retry or back off.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing page store failed a read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page identifier was never allocated by this pool, or was deleted.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Every frame is pinned and the replacer has nothing evictable.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// Every page identifier has been handed out.
    #[error("Page identifiers exhausted")]
    PageIdsExhausted,

    /// The disk scheduler no longer accepts work, or dropped a request
    /// before completing it.
    #[error("Disk scheduler is shut down")]
    SchedulerShutdown,

    /// A pool configuration value was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
