use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Tracks access history for a single frame
#[derive(Debug)]
struct FrameAccessInfo {
    /// History of access timestamps (most recent at back), trimmed to the
    /// last k entries
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl FrameAccessInfo {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Timestamp of the k-th most recent access, or None when the frame has
    /// been sampled fewer than k times (an infinite backward distance).
    fn kth_recent(&self, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            Some(self.history[self.history.len() - k])
        }
    }

    fn earliest(&self) -> Timestamp {
        *self.history.front().expect("frame has no recorded access")
    }
}

/// State behind the replacer latch.
struct ReplacerState {
    /// Monotonic logical clock, advanced on every recorded access
    current_timestamp: Timestamp,
    /// Per-frame history, keyed in frame-id order so ties fall to the lowest
    /// frame id
    frames: BTreeMap<FrameId, FrameAccessInfo>,
    /// Number of evictable frames
    num_evictable: usize,
}

/// LRU-K replacement policy.
///
/// The replacer evicts the frame whose k-th most recent access is oldest.
/// Frames with fewer than k recorded accesses sort before every fully
/// sampled frame; among those the frame with the oldest recorded access
/// wins, classic LRU. Exact ties break to the lowest frame id.
pub struct LruKReplacer {
    k: usize,
    max_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and maximum frame
    /// count.
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k > 0, "k must be positive");
        Self {
            k,
            max_frames,
            state: Mutex::new(ReplacerState {
                current_timestamp: 0,
                frames: BTreeMap::new(),
                num_evictable: 0,
            }),
        }
    }

    /// Evicts the frame whose k-th most recent access is oldest, dropping
    /// its history. Returns None if there are no evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        if state.num_evictable == 0 {
            return None;
        }

        let mut victim: Option<(FrameId, Option<Timestamp>, Timestamp)> = None;

        for (&frame_id, info) in state.frames.iter() {
            if !info.is_evictable {
                continue;
            }

            let kth = info.kth_recent(self.k);
            let earliest = info.earliest();

            let replace = match &victim {
                None => true,
                Some((_, best_kth, best_earliest)) => match (best_kth, kth) {
                    // Under-sampled candidates beat fully sampled victims.
                    (Some(_), None) => true,
                    (None, Some(_)) => false,
                    (None, None) => earliest < *best_earliest,
                    (Some(best), Some(cur)) => cur < *best,
                },
            };

            if replace {
                victim = Some((frame_id, kth, earliest));
            }
        }

        let (frame_id, _, _) = victim?;
        state.frames.remove(&frame_id);
        state.num_evictable -= 1;
        Some(frame_id)
    }

    /// Records that the given frame was accessed, advancing the logical
    /// clock. An unknown frame becomes tracked (non-evictable).
    pub fn record_access(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.max_frames,
            "frame id {frame_id} out of range"
        );

        let mut state = self.state.lock();
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        state
            .frames
            .entry(frame_id)
            .or_insert_with(FrameAccessInfo::new)
            .record_access(timestamp, self.k);
    }

    /// Sets whether a frame is evictable. No-op when the frame is unknown or
    /// the state is unchanged.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        assert!(
            frame_id.as_usize() < self.max_frames,
            "frame id {frame_id} out of range"
        );

        let mut state = self.state.lock();
        if let Some(info) = state.frames.get_mut(&frame_id) {
            if info.is_evictable != is_evictable {
                info.is_evictable = is_evictable;
                if is_evictable {
                    state.num_evictable += 1;
                } else {
                    state.num_evictable -= 1;
                }
            }
        }
    }

    /// Forgets a frame entirely. The frame must be unknown (no-op) or
    /// evictable; removing a pinned frame is a caller bug.
    pub fn remove(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.max_frames,
            "frame id {frame_id} out of range"
        );

        let mut state = self.state.lock();
        if let Some(info) = state.frames.remove(&frame_id) {
            assert!(info.is_evictable, "removing a non-evictable frame");
            state.num_evictable -= 1;
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_k_replacer_new() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.k(), 2);
    }

    #[test]
    fn test_lru_k_replacer_evict_empty() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_under_sampled_lru() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);
        replacer.set_evictable(FrameId::new(2), true);

        assert_eq!(replacer.size(), 3);

        // All three have a single access (< k), so the earliest access wins.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_lru_k_replacer_infinite_beats_finite() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));

        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 1 has fewer than k accesses and is evicted before frame 0
        // despite being touched more recently.
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_kth_recent_ordering() {
        let replacer = LruKReplacer::new(2, 10);

        // Frame 0: accesses at t=0,1. Frame 1: t=2,3. Frame 2: t=4,5.
        for frame in 0..3u32 {
            replacer.record_access(FrameId::new(frame));
            replacer.record_access(FrameId::new(frame));
        }
        for frame in 0..3u32 {
            replacer.set_evictable(FrameId::new(frame), true);
        }

        // Frame 0 has the oldest 2nd-most-recent access.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    }

    #[test]
    fn test_lru_k_replacer_not_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_set_evictable_unknown_frame() {
        let replacer = LruKReplacer::new(2, 10);

        // Unknown frames are ignored.
        replacer.set_evictable(FrameId::new(5), true);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_remove() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.remove(FrameId::new(0));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        // Removing an unknown frame is a no-op.
        replacer.remove(FrameId::new(3));
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_lru_k_replacer_remove_pinned_frame_panics() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access(FrameId::new(0));
        replacer.remove(FrameId::new(0));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_lru_k_replacer_out_of_range_frame_panics() {
        let replacer = LruKReplacer::new(2, 4);
        replacer.record_access(FrameId::new(4));
    }

    #[test]
    fn test_lru_k_replacer_toggle_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(FrameId::new(0), false);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_history_trimmed_to_k() {
        let replacer = LruKReplacer::new(2, 10);

        // Frame 0 is accessed often but long ago relative to its own last
        // two touches; only the last k accesses matter.
        for _ in 0..10 {
            replacer.record_access(FrameId::new(0));
        }
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 0's 2nd-most-recent access (t=8) is older than frame 1's
        // (t=10), so frame 0 goes first.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }
}
