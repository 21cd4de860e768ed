//! Integration tests for the LRU-K replacer

use quarry::buffer::LruKReplacer;
use quarry::common::FrameId;

#[test]
fn test_lru_k_eviction_order_under_sampled() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..5 {
        replacer.record_access(FrameId::new(i));
        replacer.set_evictable(FrameId::new(i), true);
    }
    assert_eq!(replacer.size(), 5);

    // Every frame has a single access (< k), so eviction follows the oldest
    // recorded access: plain FIFO here.
    for i in 0..5 {
        assert_eq!(replacer.evict(), Some(FrameId::new(i)));
    }
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_under_sampled_beats_fully_sampled() {
    let replacer = LruKReplacer::new(2, 10);

    // Frame 0: one access. Frames 1, 2: two accesses each.
    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(2));
    replacer.record_access(FrameId::new(2));

    for i in 0..3 {
        replacer.set_evictable(FrameId::new(i), true);
    }

    // Frame 0 is under-sampled and goes first despite its access being
    // neither the oldest nor the newest overall.
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    // Among fully sampled frames the oldest 2nd-most-recent access wins.
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
}

/// Deterministic table for the selection rule. Accesses consume timestamps
/// 0, 1, 2, ...:
///
/// ```text
/// frame  accesses       2nd-most-recent
///   1    0, 4, 8        4
///   2    1, 5           1
///   3    2, 6           2
///   4    3, 7           3   (not evictable)
///   5    9              +inf, first access 9
///   6    10             +inf, first access 10
/// ```
///
/// Expected order among evictable frames: 5 and 6 first (under-sampled,
/// oldest first access wins), then 2, 3 by 2nd-most-recent, with frame 1
/// last. Frame 4 is pinned throughout.
#[test]
fn test_lru_k_selection_table() {
    let replacer = LruKReplacer::new(2, 10);

    for frame in [1u32, 2, 3, 4] {
        replacer.record_access(FrameId::new(frame));
    }
    for frame in [1u32, 2, 3, 4, 1] {
        replacer.record_access(FrameId::new(frame));
    }
    replacer.record_access(FrameId::new(5));
    replacer.record_access(FrameId::new(6));

    for frame in [1u32, 2, 3, 5, 6] {
        replacer.set_evictable(FrameId::new(frame), true);
    }
    assert_eq!(replacer.size(), 5);

    assert_eq!(replacer.evict(), Some(FrameId::new(5)));
    assert_eq!(replacer.evict(), Some(FrameId::new(6)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), Some(FrameId::new(3)));
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_with_k_one_is_plain_lru() {
    let replacer = LruKReplacer::new(1, 10);

    // With k = 1 every frame is fully sampled after one access and the
    // candidate is simply the most recent access: classical LRU.
    for i in 0..4 {
        replacer.record_access(FrameId::new(i));
        replacer.set_evictable(FrameId::new(i), true);
    }
    replacer.record_access(FrameId::new(0)); // refresh frame 0

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), Some(FrameId::new(3)));
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_lru_k_pinned_frames_not_evicted() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(2));

    replacer.set_evictable(FrameId::new(1), true);
    replacer.set_evictable(FrameId::new(2), true);
    assert_eq!(replacer.size(), 2);

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_evicted_frame_forgets_history() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(0));
    replacer.set_evictable(FrameId::new(0), true);
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));

    // Re-recorded after eviction, the frame starts from scratch: a single
    // access means +inf distance again.
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(0));
    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);

    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_lru_k_infinite_frames_order_by_first_access() {
    let replacer = LruKReplacer::new(3, 10);

    // Frames 7 and 2 both have a single access; the earliest first access
    // wins regardless of frame id.
    replacer.record_access(FrameId::new(7));
    replacer.record_access(FrameId::new(2));
    replacer.set_evictable(FrameId::new(7), true);
    replacer.set_evictable(FrameId::new(2), true);

    assert_eq!(replacer.evict(), Some(FrameId::new(7)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
}

#[test]
fn test_lru_k_concurrent_access() {
    use std::sync::Arc;
    use std::thread;

    let replacer = Arc::new(LruKReplacer::new(2, 100));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..25 {
                    let frame_id = FrameId::new((t * 25 + i) as u32);
                    replacer.record_access(frame_id);
                    replacer.set_evictable(frame_id, true);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 100);
    for _ in 0..100 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.size(), 0);
}
