//! Engine Module
//!
//! The storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Validate and buffer writes in the MemTable
//! - Flush the MemTable into immutable segments
//! - Serve reads from MemTable then segments, newest first
//! - Run compaction and TTL expiry through the configured strategy
//! - Expose write-amplification metrics

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::compaction::{CompactionManager, CompactionMetrics, CompactionReport};
use crate::config::Config;
use crate::error::{FluxError, Result};
use crate::memtable::MemTable;
use crate::record::Record;
use crate::storage::{now_millis, SegmentMeta, StorageManager};

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Writes**: go straight to the MemTable (internal RwLock); they never
///   wait for disk
/// - **Reads**: MemTable, then a point-in-time snapshot of the segment list;
///   never blocked by flush or compaction
/// - **Flush**: serialized by `flush_lock`
/// - **Compaction / expiry**: serialized by `compaction_lock`; may run while
///   a flush is in progress
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory holding segments and the manifest
    storage_dir: PathBuf,

    /// In-memory buffer for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent segment set (internal RwLock on the published list)
    storage: StorageManager,

    /// Strategy + merge executor
    compaction: CompactionManager,

    /// Shared with `compaction`
    metrics: Arc<CompactionMetrics>,

    flush_lock: Mutex<()>,
    compaction_lock: Mutex<()>,
}

impl Engine {
    const SEGMENT_DIR: &'static str = "segments";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config
    /// 2. Create `{data_dir}/segments`
    /// 3. Reopen registered segments, delete orphans
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage_dir = config.data_dir.join(Self::SEGMENT_DIR);
        fs::create_dir_all(&storage_dir)?;

        let storage = StorageManager::open(&storage_dir)?;
        let metrics = Arc::new(CompactionMetrics::new());
        let compaction = CompactionManager::new(
            config.compaction_strategy.clone(),
            config.max_segment_size,
            Arc::clone(&metrics),
        );

        tracing::info!(
            data_dir = %config.data_dir.display(),
            strategy = config.compaction_strategy.name(),
            segments = storage.sstable_count(),
            "Engine opened"
        );

        Ok(Self {
            config,
            storage_dir,
            memtable: MemTable::new(),
            storage,
            compaction,
            metrics,
            flush_lock: Mutex::new(()),
            compaction_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Write / Read
    // =========================================================================

    /// Buffer a record; overwrites any earlier record with the same id
    pub fn write(&self, record: Record) -> Result<()> {
        record.validate()?;
        self.memtable.insert(record);
        Ok(())
    }

    /// Get a record by key
    ///
    /// Search order:
    /// 1. MemTable (active, then the one being flushed)
    /// 2. Segments (newest to oldest)
    pub fn read(&self, key: u64) -> Result<Record> {
        if let Some(record) = self.memtable.get(key) {
            return Ok(record);
        }
        self.storage
            .get(key)?
            .ok_or(FluxError::NotFound { key })
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// True once the MemTable has reached its configured limits
    pub fn should_flush(&self) -> bool {
        self.memtable
            .should_flush(self.config.memtable_size_limit, self.config.memtable_entry_limit)
    }

    /// Persist the MemTable as a new segment
    ///
    /// Returns `None` if there was nothing to flush. On failure the records
    /// stay readable in the MemTable and the next flush retries them.
    pub fn flush(&self) -> Result<Option<SegmentMeta>> {
        let _guard = self.flush_lock.lock();

        let Some(frozen) = self.memtable.snapshot_and_clear() else {
            return Ok(None);
        };

        match self.storage.flush(&frozen) {
            Ok(meta) => {
                self.memtable.release_frozen();
                self.metrics.record_flush(meta.byte_size);
                Ok(Some(meta))
            }
            Err(e) => {
                self.memtable.restore_frozen();
                tracing::error!(records = frozen.len(), error = %e, "Flush failed");
                Err(e)
            }
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Run one compaction chosen by the configured strategy
    pub fn compact(&self) -> Result<CompactionReport> {
        self.compact_at(now_millis())
    }

    /// `compact` with an explicit notion of "now" in epoch milliseconds
    pub fn compact_at(&self, now_ms: u64) -> Result<CompactionReport> {
        let _guard = self.compaction_lock.lock();
        self.compaction.compact(&self.storage, now_ms)
    }

    /// Drop segments past the time-window TTL; returns how many were removed
    pub fn expire(&self) -> Result<usize> {
        self.expire_at(now_millis())
    }

    /// `expire` with an explicit notion of "now" in epoch milliseconds
    pub fn expire_at(&self, now_ms: u64) -> Result<usize> {
        let _guard = self.compaction_lock.lock();
        self.compaction.expire(&self.storage, now_ms)
    }

    /// Close the engine gracefully
    ///
    /// Flushes any buffered records
    pub fn close(self) -> Result<()> {
        self.flush()?;
        tracing::info!(segments = self.storage.sstable_count(), "Engine closed");
        Ok(())
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    /// Compaction I/O per flushed byte (0.0 before the first flush)
    pub fn write_amplification(&self) -> f64 {
        self.metrics.write_amplification()
    }

    /// Bytes read by compaction
    pub fn total_bytes_read(&self) -> u64 {
        self.metrics.bytes_read()
    }

    /// Bytes written by compaction
    pub fn total_bytes_written(&self) -> u64 {
        self.metrics.bytes_written()
    }

    pub fn metrics(&self) -> &CompactionMetrics {
        &self.metrics
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the segment directory path
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of registered segments
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Metadata of every registered segment, oldest first
    pub fn segments(&self) -> Vec<SegmentMeta> {
        self.storage.segment_metas()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
