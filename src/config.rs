//! Configuration for fluxlsm
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::compaction::CompactionStrategy;
use crate::error::{FluxError, Result};

/// Main configuration for an engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── segments/
    ///           ├── MANIFEST           (registered segment list)
    ///           └── segment_NNNNNN.sst (immutable segment files)
    pub data_dir: PathBuf,

    /// Compaction output is split once a segment would grow past this size (bytes)
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Approximate buffer size (in bytes) at which a flush is due
    pub memtable_size_limit: usize,

    /// Optional record count at which a flush is due
    pub memtable_entry_limit: Option<usize>,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Strategy used to pick merge inputs
    pub compaction_strategy: CompactionStrategy,

    /// Tick interval of the background maintenance worker (milliseconds)
    pub maintenance_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./fluxlsm_data"),
            max_segment_size: 64 * 1024 * 1024,    // 64 MB
            memtable_size_limit: 16 * 1024 * 1024, // 16 MB
            memtable_entry_limit: None,
            compaction_strategy: CompactionStrategy::default(),
            maintenance_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(FluxError::Config("max_segment_size must be > 0".into()));
        }
        if self.memtable_size_limit == 0 {
            return Err(FluxError::Config("memtable_size_limit must be > 0".into()));
        }
        if self.memtable_entry_limit == Some(0) {
            return Err(FluxError::Config("memtable_entry_limit must be > 0".into()));
        }
        if self.maintenance_interval_ms == 0 {
            return Err(FluxError::Config(
                "maintenance_interval_ms must be > 0".into(),
            ));
        }
        self.compaction_strategy.validate()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the maximum size of a single compaction output (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the memtable record count limit
    pub fn memtable_entry_limit(mut self, count: usize) -> Self {
        self.config.memtable_entry_limit = Some(count);
        self
    }

    /// Set the compaction strategy
    pub fn compaction_strategy(mut self, strategy: CompactionStrategy) -> Self {
        self.config.compaction_strategy = strategy;
        self
    }

    /// Set the background maintenance tick (in milliseconds)
    pub fn maintenance_interval_ms(mut self, ms: u64) -> Self {
        self.config.maintenance_interval_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
