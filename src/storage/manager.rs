//! Storage Manager
//!
//! Manages the set of registered segments and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Reopen registered segments on startup, delete orphans
//! - Search segments newest → oldest for reads
//! - Create new segments from MemTable flushes
//! - Track segment lifecycle (Active → Merging → Retired)
//! - Swap the published segment list atomically with the manifest

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{FluxError, Result};
use crate::memtable::FrozenTable;
use crate::record::Record;

use super::manifest::{self, Manifest, ManifestState};
use super::now_millis;
use super::sstable::{
    AtomicSegmentState, SegmentMeta, SegmentReader, SegmentState, SegmentWriter,
    SEGMENT_EXTENSION, TEMP_EXTENSION,
};

/// A registered segment: metadata, open reader and lifecycle state
pub struct Segment {
    meta: SegmentMeta,
    reader: SegmentReader,
    state: AtomicSegmentState,
}

impl Segment {
    fn new(meta: SegmentMeta, reader: SegmentReader) -> Self {
        Self {
            meta,
            reader,
            state: AtomicSegmentState::new(SegmentState::Active),
        }
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn id(&self) -> u64 {
        self.meta.id
    }

    pub fn state(&self) -> SegmentState {
        self.state.load()
    }

    pub fn reader(&self) -> &SegmentReader {
        &self.reader
    }

    /// Point lookup inside this segment
    pub fn get(&self, key: u64) -> Result<Option<Record>> {
        self.reader.get(key)
    }
}

/// Published segment list, oldest → newest by `(seq, id)`
pub type SegmentList = Arc<Vec<Arc<Segment>>>;

/// Manages the storage layer
///
/// ## Concurrency:
/// - `segments`: readers clone the `Arc` and drop the lock immediately, so a
///   read works on a point-in-time view and never blocks a mutation for long
/// - `registry`: one exclusive section per mutation (flush registration,
///   compaction replacement, expiry); the manifest is persisted before the
///   new list is published
/// - All methods use `&self`
pub struct StorageManager {
    /// Directory where segments are stored
    dir: PathBuf,

    /// Current published segment list
    segments: RwLock<SegmentList>,

    /// Authoritative manifest state; held while a mutation commits
    registry: Mutex<ManifestState>,

    manifest: Manifest,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Load the manifest (empty if none)
    /// 3. Delete temp files and segment files the manifest does not list
    /// 4. Open readers for every registered segment and verify checksums
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let manifest = Manifest::new(path);
        let state = manifest.load()?.unwrap_or(ManifestState {
            next_segment_id: 1,
            next_seq: 1,
            segments: Vec::new(),
        });

        Self::remove_orphans(path, &state)?;

        let mut segments = Vec::with_capacity(state.segments.len());
        for meta in &state.segments {
            let segment_path = Self::segment_path_with_dir(path, meta.id);
            let reader = SegmentReader::open(&segment_path).map_err(|e| match e {
                FluxError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    FluxError::Corruption(format!(
                        "registered segment {} is missing",
                        segment_path.display()
                    ))
                }
                other => other,
            })?;
            if reader.checksum() != meta.checksum || reader.byte_size() != meta.byte_size {
                return Err(FluxError::Corruption(format!(
                    "segment {} does not match its manifest entry",
                    segment_path.display()
                )));
            }
            segments.push(Arc::new(Segment::new(meta.clone(), reader)));
        }
        segments.sort_by_key(|s| s.meta.recency());

        tracing::info!(
            dir = %path.display(),
            segments = segments.len(),
            next_segment_id = state.next_segment_id,
            "Storage opened"
        );

        Ok(Self {
            dir: path.to_path_buf(),
            segments: RwLock::new(Arc::new(segments)),
            registry: Mutex::new(state),
            manifest,
        })
    }

    /// Point-in-time view of the registered segments
    pub fn snapshot(&self) -> SegmentList {
        Arc::clone(&self.segments.read())
    }

    /// Get a record by key (searches all segments newest → oldest)
    ///
    /// The first segment holding the key wins: newer segments shadow older
    /// ones under last-writer-wins.
    pub fn get(&self, key: u64) -> Result<Option<Record>> {
        let segments = self.snapshot();

        for segment in segments.iter().rev() {
            // Skip segment if key is outside its range (O(1) check)
            if !segment.meta.might_contain(key) {
                continue;
            }
            if let Some(record) = segment.get(key)? {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Flush a frozen MemTable to a new segment and register it
    ///
    /// The segment is written and fsynced before it is registered; on any
    /// failure nothing is registered and the partial file is removed.
    pub fn flush(&self, records: &FrozenTable) -> Result<SegmentMeta> {
        if records.is_empty() {
            return Err(FluxError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let (id, seq) = {
            let mut registry = self.registry.lock();
            let id = registry.next_segment_id;
            let seq = registry.next_seq;
            registry.next_segment_id += 1;
            registry.next_seq += 1;
            (id, seq)
        };
        let path = self.segment_path(id);

        let mut writer = SegmentWriter::new(&path)?;
        for record in records.values() {
            if let Err(e) = writer.add(record) {
                writer.abandon();
                return Err(e);
            }
        }
        let summary = match writer.finish() {
            Ok(summary) => summary,
            Err(e) => {
                Self::remove_file(&path.with_extension(TEMP_EXTENSION));
                Self::remove_file(&path);
                return Err(e);
            }
        };

        let meta = SegmentMeta {
            id,
            seq,
            generation: 0,
            min_key: summary.min_key,
            max_key: summary.max_key,
            record_count: summary.record_count,
            byte_size: summary.byte_size,
            created_at: now_millis(),
            checksum: summary.checksum,
        };

        let segment = match self.open_segment(meta.clone()) {
            Ok(segment) => segment,
            Err(e) => {
                Self::remove_file(&path);
                return Err(e);
            }
        };
        if let Err(e) = self.commit(vec![segment], &[]) {
            Self::remove_file(&path);
            return Err(e);
        }

        tracing::info!(
            segment_id = meta.id,
            records = meta.record_count,
            bytes = meta.byte_size,
            "Flushed MemTable to segment"
        );
        Ok(meta)
    }

    /// Open a reader over a freshly written segment file
    pub fn open_segment(&self, meta: SegmentMeta) -> Result<Arc<Segment>> {
        let reader = SegmentReader::open(&self.segment_path(meta.id))?;
        if reader.checksum() != meta.checksum {
            return Err(FluxError::Corruption(format!(
                "segment {} checksum changed after write",
                meta.id
            )));
        }
        Ok(Arc::new(Segment::new(meta, reader)))
    }

    /// Reserve a file id for a compaction output
    pub fn allocate_segment_id(&self) -> u64 {
        let mut registry = self.registry.lock();
        let id = registry.next_segment_id;
        registry.next_segment_id += 1;
        id
    }

    /// Claim segments for a merge: `Active → Merging`
    ///
    /// Fails without claiming anything if any id is unknown or already
    /// claimed.
    pub fn begin_merge(&self, ids: &[u64]) -> Result<Vec<Arc<Segment>>> {
        let segments = self.snapshot();
        let mut claimed: Vec<Arc<Segment>> = Vec::with_capacity(ids.len());

        for id in ids {
            let found = segments.iter().find(|s| s.meta.id == *id);
            let ok = match found {
                Some(segment) => {
                    if segment
                        .state
                        .transition(SegmentState::Active, SegmentState::Merging)
                    {
                        claimed.push(Arc::clone(segment));
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };
            if !ok {
                self.abort_merge(&claimed);
                return Err(FluxError::Compaction(format!(
                    "segment {} is not available for compaction",
                    id
                )));
            }
        }

        claimed.sort_by_key(|s| s.meta.recency());
        Ok(claimed)
    }

    /// Return claimed segments to `Active` after a failed merge
    pub fn abort_merge(&self, segments: &[Arc<Segment>]) {
        for segment in segments {
            segment
                .state
                .transition(SegmentState::Merging, SegmentState::Active);
        }
    }

    /// Register `outputs` and retire `inputs` in one step
    ///
    /// Inputs are deleted from disk only after the new list is durable.
    pub fn replace(&self, inputs: &[Arc<Segment>], outputs: Vec<Arc<Segment>>) -> Result<()> {
        let input_ids: Vec<u64> = inputs.iter().map(|s| s.meta.id).collect();
        let removed = self.commit(outputs, &input_ids)?;
        self.retire(&removed);
        Ok(())
    }

    /// Get the number of registered segments
    pub fn sstable_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Metadata of every registered segment, oldest first
    pub fn segment_metas(&self) -> Vec<SegmentMeta> {
        self.snapshot().iter().map(|s| s.meta.clone()).collect()
    }

    /// Metadata of segments eligible as compaction input, oldest first
    pub fn active_metas(&self) -> Vec<SegmentMeta> {
        self.snapshot()
            .iter()
            .filter(|s| s.state() == SegmentState::Active)
            .map(|s| s.meta.clone())
            .collect()
    }

    /// Sum of registered segment sizes in bytes
    pub fn total_bytes(&self) -> u64 {
        self.snapshot().iter().map(|s| s.meta.byte_size).sum()
    }

    /// Get the data directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the next segment id (for testing/debugging)
    pub fn next_segment_id(&self) -> u64 {
        self.registry.lock().next_segment_id
    }

    /// Generate the file path for a segment with given id
    pub fn segment_path(&self, id: u64) -> PathBuf {
        Self::segment_path_with_dir(&self.dir, id)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Persist and publish a new segment set
    ///
    /// Returns the segments that were removed from the list.
    fn commit(&self, added: Vec<Arc<Segment>>, removed_ids: &[u64]) -> Result<Vec<Arc<Segment>>> {
        let mut registry = self.registry.lock();
        let current = self.snapshot();

        let mut next: Vec<Arc<Segment>> = Vec::with_capacity(current.len() + added.len());
        let mut removed = Vec::with_capacity(removed_ids.len());
        for segment in current.iter() {
            if removed_ids.contains(&segment.meta.id) {
                removed.push(Arc::clone(segment));
            } else {
                next.push(Arc::clone(segment));
            }
        }
        next.extend(added);
        next.sort_by_key(|s| s.meta.recency());

        let mut state = registry.clone();
        state.segments = next.iter().map(|s| s.meta.clone()).collect();
        self.manifest.save(&state)?;

        *registry = state;
        *self.segments.write() = Arc::new(next);
        Ok(removed)
    }

    /// Mark removed segments retired and delete their files
    fn retire(&self, removed: &[Arc<Segment>]) {
        for segment in removed {
            segment.state.store(SegmentState::Retired);
            Self::remove_file(segment.reader.path());
        }
        if let Err(e) = manifest::sync_dir(&self.dir) {
            tracing::warn!(error = %e, "Failed to sync segment directory after retirement");
        }
    }

    /// Delete leftovers from interrupted flushes and compactions
    fn remove_orphans(dir: &Path, state: &ManifestState) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_temp = path.extension().is_some_and(|ext| ext == TEMP_EXTENSION);
            let is_orphan = Self::parse_segment_id(&path)
                .is_some_and(|id| !state.segments.iter().any(|m| m.id == id));
            if is_temp || is_orphan {
                tracing::warn!(path = %path.display(), "Removing unregistered file");
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn remove_file(path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete segment file");
            }
        }
    }

    /// Generate segment path given a directory and id
    fn segment_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("segment_{:06}.{}", id, SEGMENT_EXTENSION))
    }

    /// Parse segment id from filename
    /// "segment_000042.sst" → Some(42)
    fn parse_segment_id(path: &Path) -> Option<u64> {
        if path.extension()? != SEGMENT_EXTENSION {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("segment_")?;
        id_str.parse().ok()
    }
}
