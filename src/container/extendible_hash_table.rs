use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use parking_lot::Mutex;

/// A bucket holds up to `bucket_size` entries and a local depth that records
/// how many low hash bits all of its entries share.
#[derive(Debug)]
struct Bucket<K, V> {
    local_depth: usize,
    items: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(local_depth: usize, capacity: usize) -> Self {
        Self {
            local_depth,
            items: Vec::with_capacity(capacity),
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        if let Some(pos) = self.items.iter().position(|(k, _)| k == key) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }
}

/// State behind the table latch: the directory of `2^global_depth` slots and
/// the bucket arena the slots index into. Multiple directory slots alias the
/// same bucket whenever that bucket's local depth is below the global depth.
struct TableState<K, V> {
    global_depth: usize,
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

/// ExtendibleHashTable is an in-memory hash map whose directory doubles and
/// whose buckets split on demand. The buffer pool uses it as its page table
/// (PageId -> FrameId).
///
/// A single mutex serializes every operation; the table is linearizable but
/// makes no lock-free guarantees.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hash_builder: S,
    state: Mutex<TableState<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a table with a single depth-0 bucket of the given capacity.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Creates a table using the supplied hasher. Tests use this to pin a
    /// deterministic hash function.
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            bucket_size,
            hash_builder,
            state: Mutex::new(TableState {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(0, bucket_size)],
            }),
        }
    }

    fn hash_of(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns the value stored under `key`, if any.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash_of(key);
        let state = self.state.lock();
        let idx = (hash as usize) & ((1 << state.global_depth) - 1);
        state.buckets[state.dir[idx]].find(key).cloned()
    }

    /// Removes the entry for `key`. Returns false if the key was absent.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash_of(key);
        let mut state = self.state.lock();
        let idx = (hash as usize) & ((1 << state.global_depth) - 1);
        let bucket = state.dir[idx];
        state.buckets[bucket].remove(key)
    }

    /// Inserts `key -> value`, overwriting any previous value for the key.
    /// A full target bucket is split (doubling the directory when its local
    /// depth has caught up with the global depth) and the insert retried;
    /// splitting repeats if the re-partition leaves one side still full.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash_of(&key);
        let mut state = self.state.lock();

        loop {
            let idx = (hash as usize) & ((1 << state.global_depth) - 1);
            let bucket_idx = state.dir[idx];

            {
                let bucket = &mut state.buckets[bucket_idx];
                if let Some(slot) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                    return;
                }
                if bucket.items.len() < self.bucket_size {
                    bucket.items.push((key, value));
                    return;
                }
            }

            self.split_bucket(&mut state, idx, bucket_idx);
        }
    }

    /// Splits the full bucket at arena slot `bucket_idx`, reachable through
    /// directory index `idx`. Entries whose hash has bit `local_depth` set
    /// move to the new sibling, and every aliasing directory slot on that
    /// side is repointed.
    fn split_bucket(&self, state: &mut TableState<K, V>, idx: usize, bucket_idx: usize) {
        let depth = state.buckets[bucket_idx].local_depth;

        if depth == state.global_depth {
            // Double the directory; each new slot aliases its low-index twin.
            let len = state.dir.len();
            state.dir.extend_from_within(0..len);
            state.global_depth += 1;
        }

        let sibling_idx = state.buckets.len();
        state.buckets.push(Bucket::new(depth + 1, self.bucket_size));
        state.buckets[bucket_idx].local_depth = depth + 1;

        // Repoint the directory slots that share the split bucket's suffix
        // and have the new discriminating bit set.
        let suffix_mask = (1 << depth) - 1;
        let suffix = idx & suffix_mask;
        for slot in 0..state.dir.len() {
            if slot & suffix_mask == suffix && (slot >> depth) & 1 == 1 {
                state.dir[slot] = sibling_idx;
            }
        }

        // Re-partition the old bucket's entries by the new bit.
        let items = std::mem::take(&mut state.buckets[bucket_idx].items);
        for (k, v) in items {
            let h = self.hash_of(&k) as usize;
            if (h >> depth) & 1 == 1 {
                state.buckets[sibling_idx].items.push((k, v));
            } else {
                state.buckets[bucket_idx].items.push((k, v));
            }
        }
    }

    /// Current number of directory address bits.
    pub fn global_depth(&self) -> usize {
        self.state.lock().global_depth
    }

    /// Local depth of the bucket behind directory slot `dir_index`.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let state = self.state.lock();
        state.buckets[state.dir[dir_index]].local_depth
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.state.lock().buckets.len()
    }
}
