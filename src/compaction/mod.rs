//! Compaction Module
//!
//! Merges segments to bound read amplification, and drops expired data.
//!
//! ## Responsibilities
//! - Select merge inputs (size-tiered or time-window)
//! - Merge inputs with last-writer-wins per key
//! - Swap outputs in atomically, retire inputs
//! - Track write amplification
//!
//! ```text
//!   CompactionStrategy ──plan──► CompactionManager ──replace──► StorageManager
//!                                      │
//!                                      ▼
//!                              CompactionMetrics
//! ```

mod manager;
mod metrics;
mod strategy;

pub use manager::{CompactionManager, CompactionReport};
pub use metrics::{CompactionMetrics, MetricsSnapshot};
pub use strategy::{
    CompactionPlan, CompactionStrategy, SizeTieredOptions, TimeWindowOptions, WindowClock,
};
