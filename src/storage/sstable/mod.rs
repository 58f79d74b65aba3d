//! Segment (SSTable) Module
//!
//! Immutable on-disk, key-sorted record files.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (20 bytes)                                        │
//! │   MinKey: u64 (8) | MaxKey: u64 (8) | RecordCount: u32 (4)│
//! ├──────────────────────────────────────────────────────────┤
//! │ Records (variable), ascending by id                      │
//! │   [id][channel_id][author_id][content_len][content]      │
//! │   [created_at]  ... repeated RecordCount times ...       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//! All integers are little-endian. The file checksum lives in the manifest,
//! not in the segment itself.

mod builder;
mod iterator;
mod reader;

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

pub use builder::{SegmentSummary, SegmentWriter};
pub use iterator::SegmentIterator;
pub use reader::SegmentReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Header size: MinKey (8) + MaxKey (8) + RecordCount (4) = 20 bytes
pub const HEADER_SIZE: u64 = 20;

/// Extension of registered segment files
pub(crate) const SEGMENT_EXTENSION: &str = "sst";

/// Extension used while a segment is still being written
pub(crate) const TEMP_EXTENSION: &str = "tmp";

// =============================================================================
// Segment Metadata
// =============================================================================

/// Metadata of a registered segment, persisted in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Unique file id (`segment_{id:06}.sst`)
    pub id: u64,
    /// Data recency ordinal; reads scan higher `seq` first
    pub seq: u64,
    /// 0 for flush output, incremented by every merge
    pub generation: u32,
    /// Smallest key in this segment
    pub min_key: u64,
    /// Largest key in this segment
    pub max_key: u64,
    /// Number of records
    pub record_count: u32,
    /// File size in bytes
    pub byte_size: u64,
    /// Epoch millis of the newest flush that contributed data
    pub created_at: u64,
    /// CRC32 of the whole file
    pub checksum: u32,
}

impl SegmentMeta {
    /// Quick check if a key might be in this segment (range check)
    pub fn might_contain(&self, key: u64) -> bool {
        key >= self.min_key && key <= self.max_key
    }

    /// Whether the key ranges of two segments intersect
    pub fn overlaps(&self, other: &SegmentMeta) -> bool {
        self.min_key <= other.max_key && other.min_key <= self.max_key
    }

    /// Sort key for recency order (oldest first)
    pub fn recency(&self) -> (u64, u64) {
        (self.seq, self.id)
    }
}

// =============================================================================
// Segment Lifecycle
// =============================================================================

/// Lifecycle of a registered segment
///
/// `Active → Merging → Retired`. A merge that fails returns its inputs to
/// `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SegmentState {
    /// Serves reads, eligible as compaction input
    Active = 0,
    /// Serves reads, claimed by a running compaction
    Merging = 1,
    /// Removed from the segment list, file deleted
    Retired = 2,
}

impl SegmentState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SegmentState::Active,
            1 => SegmentState::Merging,
            _ => SegmentState::Retired,
        }
    }
}

/// Atomic holder for a `SegmentState`
#[derive(Debug)]
pub(crate) struct AtomicSegmentState(AtomicU8);

impl AtomicSegmentState {
    pub(crate) fn new(state: SegmentState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> SegmentState {
        SegmentState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: SegmentState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to`; false if the current state is not `from`
    pub(crate) fn transition(&self, from: SegmentState, to: SegmentState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
