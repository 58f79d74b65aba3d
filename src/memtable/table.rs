//! MemTable implementation
//!
//! BTreeMap-based memtable with a frozen slot for in-flight flushes.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::record::Record;

/// Immutable snapshot handed to the flush path
pub type FrozenTable = Arc<BTreeMap<u64, Record>>;

#[derive(Default)]
struct Tables {
    /// Receives all inserts
    active: BTreeMap<u64, Record>,
    /// Approximate encoded size of `active`
    active_size: usize,
    /// Snapshot currently being written to a segment
    frozen: Option<FrozenTable>,
}

/// In-memory table for recent writes
pub struct MemTable {
    tables: RwLock<Tables>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Insert a record, replacing any record with the same key
    ///
    /// Returns the new approximate size of the active table.
    pub fn insert(&self, record: Record) -> usize {
        let mut tables = self.tables.write();
        let added = record.encoded_len();
        if let Some(old) = tables.active.insert(record.id, record) {
            tables.active_size -= old.encoded_len();
        }
        tables.active_size += added;
        tables.active_size
    }

    /// Look up a key in the active table, then in the frozen snapshot
    pub fn get(&self, key: u64) -> Option<Record> {
        let tables = self.tables.read();
        if let Some(record) = tables.active.get(&key) {
            return Some(record.clone());
        }
        tables
            .frozen
            .as_ref()
            .and_then(|frozen| frozen.get(&key).cloned())
    }

    /// Move the active records into the frozen slot and install an empty table
    ///
    /// Returns `None` if there is nothing to flush, or if a previous snapshot
    /// has not been released or restored yet.
    pub fn snapshot_and_clear(&self) -> Option<FrozenTable> {
        let mut tables = self.tables.write();
        if tables.active.is_empty() || tables.frozen.is_some() {
            return None;
        }
        let snapshot = Arc::new(std::mem::take(&mut tables.active));
        tables.active_size = 0;
        tables.frozen = Some(Arc::clone(&snapshot));
        Some(snapshot)
    }

    /// Drop the frozen snapshot once its segment is registered
    pub fn release_frozen(&self) {
        self.tables.write().frozen = None;
    }

    /// Merge the frozen snapshot back into the active table after a failed
    /// flush
    ///
    /// Records written while the flush was running are newer and win.
    pub fn restore_frozen(&self) {
        let mut tables = self.tables.write();
        let Some(frozen) = tables.frozen.take() else {
            return;
        };
        let frozen = Arc::try_unwrap(frozen).unwrap_or_else(|shared| (*shared).clone());
        for (key, record) in frozen {
            if !tables.active.contains_key(&key) {
                tables.active_size += record.encoded_len();
                tables.active.insert(key, record);
            }
        }
    }

    /// Get approximate size in bytes of the active table
    pub fn size(&self) -> usize {
        self.tables.read().active_size
    }

    /// Get the number of records in the active table
    pub fn entry_count(&self) -> usize {
        self.tables.read().active.len()
    }

    /// True if neither the active table nor a frozen snapshot holds records
    pub fn is_empty(&self) -> bool {
        let tables = self.tables.read();
        tables.active.is_empty() && tables.frozen.is_none()
    }

    /// True if a flush is in flight
    pub fn has_frozen(&self) -> bool {
        self.tables.read().frozen.is_some()
    }

    /// Check if the active table reached either limit
    pub fn should_flush(&self, size_limit: usize, entry_limit: Option<usize>) -> bool {
        let tables = self.tables.read();
        tables.active_size >= size_limit
            || entry_limit.is_some_and(|limit| tables.active.len() >= limit)
    }

    /// Clone the active records in key order
    pub fn iter(&self) -> impl Iterator<Item = Record> {
        let records: Vec<Record> = self.tables.read().active.values().cloned().collect();
        records.into_iter()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
