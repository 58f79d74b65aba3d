//! Compaction Metrics
//!
//! Lock-free byte and event counters for one engine. Write amplification is
//! derived from them:
//!
//! ```text
//!                 bytes_read + bytes_written
//!   WA  =  ─────────────────────────────────────
//!                 original_bytes_written
//! ```
//!
//! `original_bytes_written` counts flush output only, `bytes_read` and
//! `bytes_written` count compaction input and output. An engine that never
//! compacted reports 0.0 over its flushed bytes; an engine that never flushed
//! reports 0.0.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared by the engine and its compaction manager
///
/// Counters are only ever incremented and use `Ordering::Relaxed`.
#[derive(Debug, Default)]
pub struct CompactionMetrics {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    original_bytes_written: AtomicU64,
    compactions: AtomicU64,
    segments_compacted: AtomicU64,
    records_dropped: AtomicU64,
    segments_expired: AtomicU64,
}

/// Plain copy of the counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub original_bytes_written: u64,
    pub compactions: u64,
    pub segments_compacted: u64,
    pub records_dropped: u64,
    pub segments_expired: u64,
    pub write_amplification: f64,
}

impl CompactionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Recording =====

    /// Record a MemTable flush of `bytes`
    pub fn record_flush(&self, bytes: u64) {
        self.original_bytes_written
            .fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record one finished merge
    pub fn record_compaction(
        &self,
        segments: u64,
        bytes_read: u64,
        bytes_written: u64,
        records_dropped: u64,
    ) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.segments_compacted.fetch_add(segments, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes_read, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes_written, Ordering::Relaxed);
        self.records_dropped
            .fetch_add(records_dropped, Ordering::Relaxed);
    }

    /// Record segments dropped by TTL expiry
    pub fn record_expired(&self, segments: u64) {
        self.segments_expired.fetch_add(segments, Ordering::Relaxed);
    }

    // ===== Accessors =====

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn original_bytes_written(&self) -> u64 {
        self.original_bytes_written.load(Ordering::Relaxed)
    }

    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    pub fn segments_compacted(&self) -> u64 {
        self.segments_compacted.load(Ordering::Relaxed)
    }

    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }

    pub fn segments_expired(&self) -> u64 {
        self.segments_expired.load(Ordering::Relaxed)
    }

    /// Compaction I/O per byte of flushed data, 0.0 before the first flush
    pub fn write_amplification(&self) -> f64 {
        let original = self.original_bytes_written();
        if original == 0 {
            return 0.0;
        }
        (self.bytes_read() + self.bytes_written()) as f64 / original as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_read: self.bytes_read(),
            bytes_written: self.bytes_written(),
            original_bytes_written: self.original_bytes_written(),
            compactions: self.compactions(),
            segments_compacted: self.segments_compacted(),
            records_dropped: self.records_dropped(),
            segments_expired: self.segments_expired(),
            write_amplification: self.write_amplification(),
        }
    }

    /// Format metrics as a human-readable report
    pub fn report(&self) -> String {
        let s = self.snapshot();
        format!(
            "═══ Compaction Metrics ═══\n\
             Flushed:      {} bytes\n\
             Compactions:  {}\n\
               segments:   {}\n\
               read:       {} bytes\n\
               written:    {} bytes\n\
               dropped:    {} records\n\
             Expired:      {} segments\n\
             Write amplification: {:.2}x",
            s.original_bytes_written,
            s.compactions,
            s.segments_compacted,
            s.bytes_read,
            s.bytes_written,
            s.records_dropped,
            s.segments_expired,
            s.write_amplification,
        )
    }
}
