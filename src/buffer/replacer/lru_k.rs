//! LRU-K replacement policy.
//!
//! Each tracked frame remembers the timestamps of its last `k` accesses on a
//! logical clock. The victim is the evictable frame with the largest
//! *backward k-distance*: `now - (k-th most recent access)`. A frame seen
//! fewer than `k` times has infinite distance. Ties (in practice: several
//! infinite-distance frames) go to the frame whose oldest remembered access
//! is earliest, which degrades to plain LRU within that group.
//!
//! ```text
//! k = 2, now = 8
//! frame 0: [1, 5]   distance 8 - 1 = 7
//! frame 1: [6, 7]   distance 8 - 6 = 2
//! frame 2: [3]      distance ∞        ◀── victim
//! ```

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

use tracing::trace;

use crate::common::FrameId;

/// Access history of one frame, oldest first, at most `k` entries.
#[derive(Debug, Default)]
struct History {
    timestamps: VecDeque<u64>,
}

impl History {
    fn record(&mut self, timestamp: u64, k: usize) {
        self.timestamps.push_back(timestamp);
        if self.timestamps.len() > k {
            self.timestamps.pop_front();
        }
    }

    /// `None` stands for infinity.
    fn backward_k_distance(&self, now: u64, k: usize) -> Option<u64> {
        if self.timestamps.len() < k {
            return None;
        }
        // Bounded to k entries, so the front is the k-th most recent.
        self.timestamps.front().map(|&kth| now - kth)
    }

    fn earliest(&self) -> u64 {
        self.timestamps.front().copied().unwrap_or(0)
    }
}

/// LRU-K eviction policy.
///
/// Not internally synchronized: the buffer pool owns it under its pool-wide
/// lock.
pub struct LruKReplacer {
    k: usize,
    /// Frames are `0..num_frames`.
    num_frames: usize,
    /// Logical clock, advanced once per recorded access.
    current_timestamp: u64,
    histories: HashMap<FrameId, History>,
    evictable: HashSet<FrameId>,
}

impl LruKReplacer {
    /// Create a replacer for `num_frames` frames remembering `k` accesses each.
    ///
    /// # Panics
    /// Panics if `k` is 0.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "k must be > 0");
        Self {
            k,
            num_frames,
            current_timestamp: 0,
            histories: HashMap::with_capacity(num_frames),
            evictable: HashSet::with_capacity(num_frames),
        }
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Record an access to `frame_id` at the next logical timestamp.
    pub fn record_access(&mut self, frame_id: FrameId) {
        debug_assert!(frame_id.index() < self.num_frames, "{} out of range", frame_id);

        self.current_timestamp += 1;
        self.histories
            .entry(frame_id)
            .or_default()
            .record(self.current_timestamp, self.k);
    }

    /// Allow or forbid eviction of `frame_id`. History is untouched.
    ///
    /// Only tracked frames can become evictable; marking an untracked frame
    /// evictable is ignored.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if !evictable {
            self.evictable.remove(&frame_id);
        } else if self.histories.contains_key(&frame_id) {
            self.evictable.insert(frame_id);
        } else {
            trace!(%frame_id, "ignoring set_evictable on untracked frame");
        }
    }

    /// Pick and forget the victim frame, or `None` if nothing is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        let now = self.current_timestamp;
        let k = self.k;

        let victim = self
            .evictable
            .iter()
            .filter_map(|frame_id| self.histories.get(frame_id).map(|h| (*frame_id, h)))
            .max_by_key(|(_, history)| {
                let distance = history.backward_k_distance(now, k).unwrap_or(u64::MAX);
                (distance, Reverse(history.earliest()))
            })
            .map(|(frame_id, _)| frame_id)?;

        self.remove(victim);
        trace!(frame_id = %victim, "lru-k victim selected");
        Some(victim)
    }

    /// Drop all history and evictable membership of `frame_id`.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.histories.remove(&frame_id);
        self.evictable.remove(&frame_id);
    }

    /// Number of evictable frames.
    #[inline]
    pub fn size(&self) -> usize {
        self.evictable.len()
    }

    /// Whether `frame_id` has recorded history.
    #[inline]
    pub fn is_tracked(&self, frame_id: FrameId) -> bool {
        self.histories.contains_key(&frame_id)
    }

    #[inline]
    pub fn is_evictable(&self, frame_id: FrameId) -> bool {
        self.evictable.contains(&frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: usize) -> FrameId {
        FrameId::new(id)
    }

    #[test]
    fn test_empty_replacer_has_no_victim() {
        let mut replacer = LruKReplacer::new(4, 2);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_infinite_distance_beats_finite() {
        let mut replacer = LruKReplacer::new(4, 2);

        // A: [1, 5]  B: [2]
        replacer.record_access(fid(0)); // t=1
        replacer.record_access(fid(1)); // t=2
        replacer.record_access(fid(2)); // t=3
        replacer.record_access(fid(2)); // t=4
        replacer.record_access(fid(0)); // t=5

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_infinite_ties_break_on_earliest_access() {
        let mut replacer = LruKReplacer::new(4, 3);

        replacer.record_access(fid(2)); // t=1
        replacer.record_access(fid(0)); // t=2
        replacer.record_access(fid(1)); // t=3
        replacer.record_access(fid(2)); // t=4

        for id in 0..3 {
            replacer.set_evictable(fid(id), true);
        }

        // All have < 3 accesses; frame 2's oldest access (t=1) is earliest.
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    fn test_largest_finite_distance_wins() {
        let mut replacer = LruKReplacer::new(4, 2);

        replacer.record_access(fid(0)); // t=1
        replacer.record_access(fid(1)); // t=2
        replacer.record_access(fid(1)); // t=3
        replacer.record_access(fid(0)); // t=4
        // now=4: frame 0 history [1,4] -> 3, frame 1 history [2,3] -> 2

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_history_is_bounded_to_k() {
        let mut replacer = LruKReplacer::new(4, 2);

        replacer.record_access(fid(0)); // t=1
        replacer.record_access(fid(1)); // t=2
        replacer.record_access(fid(0)); // t=3
        replacer.record_access(fid(0)); // t=4
        replacer.record_access(fid(1)); // t=5

        // Frame 0 keeps only [3, 4] -> distance 2; frame 1 [2, 5] -> 3.
        // Had frame 0 kept t=1 it would have looked older.
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    fn test_pinned_frames_are_skipped() {
        let mut replacer = LruKReplacer::new(4, 2);

        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), false);
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
        assert!(replacer.is_tracked(fid(0)));
    }

    #[test]
    fn test_set_evictable_toggles_without_touching_history() {
        let mut replacer = LruKReplacer::new(4, 2);

        replacer.record_access(fid(0));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(fid(0), false);
        assert_eq!(replacer.size(), 0);
        assert!(replacer.is_tracked(fid(0)));
    }

    #[test]
    fn test_untracked_frame_cannot_become_evictable() {
        let mut replacer = LruKReplacer::new(4, 2);
        replacer.set_evictable(fid(3), true);

        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_remove_drops_history() {
        let mut replacer = LruKReplacer::new(4, 2);

        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        replacer.remove(fid(0));
        assert!(!replacer.is_tracked(fid(0)));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(1)));

        // A removed frame starts over with a fresh history.
        replacer.record_access(fid(0));
        assert!(replacer.is_tracked(fid(0)));
        assert!(!replacer.is_evictable(fid(0)));
    }

    #[test]
    fn test_evicted_frame_is_forgotten() {
        let mut replacer = LruKReplacer::new(2, 2);

        replacer.record_access(fid(0));
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.evict(), Some(fid(0)));

        assert!(!replacer.is_tracked(fid(0)));
        assert!(!replacer.is_evictable(fid(0)));
    }
}
