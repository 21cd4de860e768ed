use std::sync::Arc;

use quarry::buffer::BufferPoolManager;
use quarry::index::{BPlusTree, IndexKey, UintComparator};
use quarry::storage::disk::DiskManager;
use quarry::{PageId, RecordId, SlotId};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("Quarry - a disk-oriented storage engine core");
    println!("============================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to create disk manager"));
    println!("Opened database file: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(16, 2, disk_manager));
    println!("Created buffer pool with 16 frames (LRU-2)\n");

    let mut tree = BPlusTree::new("demo_index", Arc::clone(&bpm), UintComparator, 8, 8);

    // Insert a batch of keys out of order.
    let keys: Vec<u64> = (1..=40).rev().collect();
    for &k in &keys {
        let rid = RecordId::new(PageId::new(k as u32), SlotId::new(0));
        tree.insert(IndexKey::from_u64(k), rid)
            .expect("insert failed");
    }
    println!("Inserted {} keys", keys.len());
    println!("Root page: {}", tree.root_page_id());

    // Point lookups.
    for probe in [1u64, 20, 40, 99] {
        match tree.get_value(&IndexKey::from_u64(probe)).expect("lookup failed") {
            Some(rid) => println!("  key {:>2} -> {}", probe, rid),
            None => println!("  key {:>2} -> (absent)", probe),
        }
    }

    // Range scan from key 30 upward.
    print!("\nKeys from 30 on:");
    for item in tree.begin_at(&IndexKey::from_u64(30)).expect("iterator failed") {
        let (key, _) = item.expect("scan failed");
        print!(" {}", key.to_u64());
    }
    println!();

    // Remove the odd keys and scan everything that is left.
    for k in (1..=40).filter(|k| k % 2 == 1) {
        tree.remove(&IndexKey::from_u64(k)).expect("remove failed");
    }
    print!("\nAfter removing odd keys:");
    for item in tree.begin().expect("iterator failed") {
        let (key, _) = item.expect("scan failed");
        print!(" {}", key.to_u64());
    }
    println!();

    bpm.flush_all_pages().expect("flush failed");
    let dm = bpm.disk_manager();
    println!(
        "\nFlushed. Disk stats: {} pages, {} reads, {} writes",
        dm.num_pages(),
        dm.num_reads(),
        dm.num_writes()
    );

    std::fs::remove_file(db_path).ok();
    println!("Demo completed");
}
