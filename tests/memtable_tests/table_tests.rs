//! MemTable Tests
//!
//! Tests verify:
//! - Insert / get with last-writer-wins
//! - Size tracking
//! - Sorted iteration
//! - Snapshot, release and restore around a flush
//! - Flush thresholds
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use fluxlsm::memtable::MemTable;
use fluxlsm::Record;

fn record(id: u64, content: &str) -> Record {
    Record::new(id, 1, 1, content.to_string(), id * 10)
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
    assert!(!memtable.has_frozen());
}

#[test]
fn test_insert_and_get() {
    let memtable = MemTable::new();

    memtable.insert(record(1, "first"));

    assert_eq!(memtable.get(1), Some(record(1, "first")));
    assert_eq!(memtable.get(2), None);
}

#[test]
fn test_insert_overwrites_existing() {
    let memtable = MemTable::new();

    memtable.insert(record(1, "old"));
    memtable.insert(record(1, "newer"));

    assert_eq!(memtable.entry_count(), 1);
    assert_eq!(memtable.get(1).unwrap().content_str(), Some("newer"));
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_size_tracks_encoded_length() {
    let memtable = MemTable::new();

    let first = record(1, "abc");
    let expected = first.encoded_len();
    assert_eq!(memtable.insert(first), expected);

    memtable.insert(record(2, "defgh"));
    assert_eq!(memtable.size(), record(1, "abc").encoded_len() + record(2, "defgh").encoded_len());
}

#[test]
fn test_overwrite_replaces_size() {
    let memtable = MemTable::new();

    memtable.insert(record(1, "a much longer message"));
    memtable.insert(record(1, "short"));

    assert_eq!(memtable.size(), record(1, "short").encoded_len());
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_is_key_ordered() {
    let memtable = MemTable::new();
    for id in [5, 1, 9, 3] {
        memtable.insert(record(id, "x"));
    }

    let keys: Vec<u64> = memtable.iter().map(|r| r.id).collect();
    assert_eq!(keys, vec![1, 3, 5, 9]);
}

// =============================================================================
// Flush Lifecycle Tests
// =============================================================================

#[test]
fn test_snapshot_moves_active_to_frozen() {
    let memtable = MemTable::new();
    memtable.insert(record(1, "a"));
    memtable.insert(record(2, "b"));

    let frozen = memtable.snapshot_and_clear().unwrap();

    assert_eq!(frozen.len(), 2);
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.has_frozen());
    assert!(!memtable.is_empty());
    // Still readable while the flush runs
    assert_eq!(memtable.get(2), Some(record(2, "b")));
}

#[test]
fn test_snapshot_of_empty_table_is_none() {
    let memtable = MemTable::new();
    assert!(memtable.snapshot_and_clear().is_none());
}

#[test]
fn test_second_snapshot_waits_for_release() {
    let memtable = MemTable::new();
    memtable.insert(record(1, "a"));
    let _frozen = memtable.snapshot_and_clear().unwrap();

    memtable.insert(record(2, "b"));
    assert!(memtable.snapshot_and_clear().is_none());

    memtable.release_frozen();
    assert_eq!(memtable.get(1), None);
    assert_eq!(memtable.snapshot_and_clear().unwrap().len(), 1);
}

#[test]
fn test_restore_keeps_newer_writes() {
    let memtable = MemTable::new();
    memtable.insert(record(1, "frozen-1"));
    memtable.insert(record(2, "frozen-2"));
    let _frozen = memtable.snapshot_and_clear().unwrap();

    memtable.insert(record(2, "written-during-flush"));
    memtable.restore_frozen();

    assert!(!memtable.has_frozen());
    assert_eq!(memtable.entry_count(), 2);
    assert_eq!(memtable.get(1).unwrap().content_str(), Some("frozen-1"));
    assert_eq!(
        memtable.get(2).unwrap().content_str(),
        Some("written-during-flush")
    );
    assert_eq!(
        memtable.size(),
        record(1, "frozen-1").encoded_len() + record(2, "written-during-flush").encoded_len()
    );
}

// =============================================================================
// Threshold Tests
// =============================================================================

#[test]
fn test_should_flush_by_size() {
    let memtable = MemTable::new();
    let size = memtable.insert(record(1, "payload"));

    assert!(!memtable.should_flush(size + 1, None));
    assert!(memtable.should_flush(size, None));
}

#[test]
fn test_should_flush_by_entry_count() {
    let memtable = MemTable::new();
    for id in 0..3 {
        memtable.insert(record(id, "x"));
    }

    assert!(!memtable.should_flush(usize::MAX, Some(4)));
    assert!(memtable.should_flush(usize::MAX, Some(3)));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let memtable = Arc::new(MemTable::new());

    let writers: Vec<_> = (0..4u64)
        .map(|t| {
            let memtable = Arc::clone(&memtable);
            thread::spawn(move || {
                for i in 0..250 {
                    memtable.insert(record(t * 1_000 + i, "concurrent"));
                }
            })
        })
        .collect();

    let reader = {
        let memtable = Arc::clone(&memtable);
        thread::spawn(move || {
            for _ in 0..1_000 {
                if let Some(r) = memtable.get(0) {
                    assert_eq!(r.content_str(), Some("concurrent"));
                }
            }
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(memtable.entry_count(), 1_000);
}
