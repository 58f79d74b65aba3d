//! Storage Module
//!
//! Persistent storage layer: immutable segment files plus the manifest that
//! says which of them are live.
//!
//! ## Responsibilities
//! - Persist flushed records to disk in sorted format
//! - Point lookups across segments, newest first
//! - Atomic registration and retirement of segments
//! - Crash cleanup of unregistered files
//!
//! ## Directory Layout
//! ```text
//! segments/
//!   ├── MANIFEST             registered segment list (bincode + CRC32)
//!   ├── segment_000001.sst   immutable segment
//!   └── segment_000002.tmp   in-progress write, deleted on open
//! ```

mod manager;
mod manifest;
pub mod sstable;

use std::time::{SystemTime, UNIX_EPOCH};

pub use manager::{Segment, SegmentList, StorageManager};
pub use manifest::{Manifest, ManifestState};
pub use sstable::{
    SegmentIterator, SegmentMeta, SegmentReader, SegmentState, SegmentSummary, SegmentWriter,
};

/// Wall-clock time in epoch milliseconds
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
