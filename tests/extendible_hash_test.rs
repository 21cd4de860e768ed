//! Integration tests for the extendible hash table

use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use std::thread;

use quarry::container::ExtendibleHashTable;

/// Hasher that passes integer keys through unchanged, so the tests control
/// directory placement bit by bit.
#[derive(Clone, Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut buf = [0u8; 8];
        let n = bytes.len().min(8);
        buf[..n].copy_from_slice(&bytes[..n]);
        self.0 = u64::from_le_bytes(buf);
    }

    fn write_u32(&mut self, i: u32) {
        self.0 = u64::from(i);
    }

    fn write_u64(&mut self, i: u64) {
        self.0 = i;
    }
}

#[derive(Clone, Default)]
struct IdentityState;

impl BuildHasher for IdentityState {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}

fn identity_table(bucket_size: usize) -> ExtendibleHashTable<u32, String, IdentityState> {
    ExtendibleHashTable::with_hasher(bucket_size, IdentityState)
}

#[test]
fn test_basic_insert_find_remove() {
    let table = ExtendibleHashTable::new(4);

    for i in 0..16u32 {
        table.insert(i, i * 10);
    }
    for i in 0..16u32 {
        assert_eq!(table.find(&i), Some(i * 10), "key {i}");
    }
    assert_eq!(table.find(&100), None);

    assert!(table.remove(&7));
    assert!(!table.remove(&7));
    assert_eq!(table.find(&7), None);
    assert_eq!(table.find(&8), Some(80));
}

#[test]
fn test_insert_overwrites_existing_key() {
    let table = ExtendibleHashTable::new(2);

    table.insert(1, "one");
    table.insert(1, "uno");
    assert_eq!(table.find(&1), Some("uno"));
    assert_eq!(table.num_buckets(), 1);
}

#[test]
fn test_split_doubles_directory() {
    let table = identity_table(2);

    // Keys 0 and 1 differ in bit 0, so the first split separates them
    // without any aliasing left over.
    table.insert(0, "a".into());
    table.insert(1, "b".into());
    assert_eq!(table.global_depth(), 0);

    table.insert(2, "c".into());
    assert!(table.global_depth() >= 1);

    assert_eq!(table.find(&0), Some("a".into()));
    assert_eq!(table.find(&1), Some("b".into()));
    assert_eq!(table.find(&2), Some("c".into()));
}

#[test]
fn test_split_chain_on_shared_low_bits() {
    let table = identity_table(2);

    // 4, 12 and 16 agree on their low two bits; separating them forces the
    // directory through depths 1, 2 and 3.
    table.insert(4, "a".into());
    table.insert(12, "b".into());
    table.insert(16, "c".into());

    assert_eq!(table.global_depth(), 3);
    assert_eq!(table.num_buckets(), 4);
    assert_eq!(table.find(&4), Some("a".into()));
    assert_eq!(table.find(&12), Some("b".into()));
    assert_eq!(table.find(&16), Some("c".into()));
}

#[test]
fn test_local_depths_bounded_by_global() {
    let table = identity_table(3);

    for key in 0..64u32 {
        table.insert(key, String::new());
    }

    let global = table.global_depth();
    assert!(table.num_buckets() <= 1 << global);
    for dir_index in 0..(1usize << global) {
        assert!(table.local_depth(dir_index) <= global);
    }
}

#[test]
fn test_remove_then_reinsert() {
    let table = identity_table(2);

    for key in 0..8u32 {
        table.insert(key, format!("v{key}"));
    }
    for key in 0..8u32 {
        assert!(table.remove(&key));
    }
    for key in 0..8u32 {
        assert_eq!(table.find(&key), None);
        table.insert(key, format!("w{key}"));
    }
    for key in 0..8u32 {
        assert_eq!(table.find(&key), Some(format!("w{key}")));
    }
}

#[test]
fn test_concurrent_inserts_and_finds() {
    let table = Arc::new(ExtendibleHashTable::new(4));

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for i in 0..250u32 {
                    let key = t * 250 + i;
                    table.insert(key, key as u64);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for key in 0..1000u32 {
        assert_eq!(table.find(&key), Some(key as u64), "key {key}");
    }
}
