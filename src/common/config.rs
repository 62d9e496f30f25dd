//! Configuration constants and pool settings.

use super::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// This is the only size the pool, the scheduler and every page store agree
/// on. It matches the OS page size on most systems, which keeps file offsets
/// aligned for direct I/O.
pub const PAGE_SIZE: usize = 4096;

/// Number of frames used by [`BufferPoolConfig::default`].
pub const DEFAULT_POOL_SIZE: usize = 64;

/// History depth used by [`BufferPoolConfig::default`] for the LRU-K replacer.
pub const DEFAULT_REPLACER_K: usize = 2;

/// Settings for a [`BufferPoolManager`](crate::buffer::BufferPoolManager).
///
/// # Example
/// ```
/// use pagepool::common::config::BufferPoolConfig;
///
/// let config = BufferPoolConfig::default().with_pool_size(8).with_replacer_k(3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub pool_size: usize,
    /// Number of accesses the replacer remembers per frame.
    pub replacer_k: usize,
}

impl BufferPoolConfig {
    pub fn new(pool_size: usize, replacer_k: usize) -> Self {
        Self {
            pool_size,
            replacer_k,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_replacer_k(mut self, replacer_k: usize) -> Self {
        self.replacer_k = replacer_k;
        self
    }

    /// Reject settings the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be > 0".into()));
        }
        if self.replacer_k == 0 {
            return Err(Error::InvalidConfig("replacer_k must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE, DEFAULT_REPLACER_K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.replacer_k, DEFAULT_REPLACER_K);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = BufferPoolConfig::default()
            .with_pool_size(3)
            .with_replacer_k(5);
        assert_eq!(config, BufferPoolConfig::new(3, 5));
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(matches!(
            BufferPoolConfig::new(0, 2).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            BufferPoolConfig::new(4, 0).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }
}
