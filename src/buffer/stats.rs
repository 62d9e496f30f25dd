//! Buffer pool statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the buffer pool.
///
/// Counters are independent and updated with `Relaxed` ordering; a
/// [`snapshot`](Self::snapshot) is not a consistent cut across them.
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetch found its page resident.
    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch had to load its page from the store.
    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_disk_read(&self) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_disk_write(&self) {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`BufferPoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

impl StatsSnapshot {
    /// Fraction of fetches served without a disk read (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} evictions={} reads={} writes={} hit_rate={:.1}%",
            self.hits,
            self.misses,
            self.evictions,
            self.disk_reads,
            self.disk_writes,
            self.hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let snapshot = BufferPoolStats::new().snapshot();
        assert_eq!(snapshot, StatsSnapshot::default());
        assert_eq!(snapshot.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = BufferPoolStats::new();
        for _ in 0..3 {
            stats.record_hit();
        }
        stats.record_miss();

        assert_eq!(stats.snapshot().hit_rate(), 0.75);
    }

    #[test]
    fn test_display() {
        let stats = BufferPoolStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_eviction();
        stats.record_disk_read();
        stats.record_disk_write();
        stats.record_disk_write();

        assert_eq!(
            stats.snapshot().to_string(),
            "hits=1 misses=1 evictions=1 reads=1 writes=2 hit_rate=50.0%"
        );
    }
}
