//! # fluxlsm
//!
//! An embeddable LSM storage engine for append-heavy chat messages keyed by
//! Snowflake ids, with:
//! - Sorted in-memory buffer flushed to immutable segments
//! - Last-writer-wins point reads across buffer and segments
//! - Pluggable compaction: Size-Tiered or Time-Window
//! - Write-amplification accounting
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │        write / read / flush / compact / expire               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  MemTable   │─flush───►│   Storage   │◄──replace──┐
//!   │  (RwLock)   │          │ (segments)  │            │
//!   └─────────────┘          └──────┬──────┘            │
//!                                   │ plan              │
//!                                   ▼                   │
//!                           ┌─────────────┐             │
//!                           │ Compaction  │─────────────┘
//!                           │ STCS / TWCS │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod memtable;
pub mod storage;
pub mod compaction;
pub mod engine;
pub mod maintenance;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FluxError, Result};
pub use config::Config;
pub use engine::Engine;
pub use record::{Record, SnowflakeId};
pub use compaction::{CompactionReport, CompactionStrategy};
pub use maintenance::{MaintenanceHandle, MaintenanceWorker};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of fluxlsm
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
