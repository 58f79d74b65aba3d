//! Compaction strategies
//!
//! Pure selection functions over segment metadata. They never touch disk.
//!
//! ## Contiguity
//! Segments are handed in oldest → newest order and a plan always selects a
//! run of neighbours. A merge output inherits the newest `seq` of its
//! inputs, so no segment left out of the plan can end up on the wrong side
//! of the output in read order.
//!
//! ## Size-Tiered
//! - Group neighbouring segments whose sizes stay within a factor-of-2 band
//!   of the group average
//! - A group with >= `min_threshold` members is a candidate
//! - The candidate with the smallest average size is merged first
//!
//! Bounds read amplification, but merges arrive in bursts that grow with
//! every tier.
//!
//! ## Time-Window
//! - Place each segment in a fixed-size window by the time of its newest data
//! - Once a window has aged out, merge its segments into one run
//! - Never merge across windows, never touch the current window
//!
//! Historical windows are rewritten once, at the cost of many small segments
//! in the active window.

use crate::error::{FluxError, Result};
use crate::record::SnowflakeId;
use crate::storage::SegmentMeta;

/// Size-tiered parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SizeTieredOptions {
    /// Members a tier needs before it is merged
    pub min_threshold: usize,
    /// Most segments merged in one plan
    pub max_threshold: usize,
    /// Lower bound of the tier band, as a fraction of the tier average
    pub bucket_low: f64,
    /// Upper bound of the tier band, as a multiple of the tier average
    pub bucket_high: f64,
    /// Segments smaller than this all count as this size
    pub min_segment_size: u64,
}

impl Default for SizeTieredOptions {
    fn default() -> Self {
        Self {
            min_threshold: 4,
            max_threshold: 32,
            bucket_low: 0.5,
            bucket_high: 2.0,
            min_segment_size: 1024,
        }
    }
}

/// Where a segment's time comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClock {
    /// Timestamp bits of the segment's largest Snowflake key
    KeyTimestamp,
    /// The segment's `created_at`
    CreatedAt,
}

/// Time-window parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindowOptions {
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Segments an aged-out window needs before it is merged
    pub min_threshold: usize,
    pub clock: WindowClock,
    /// Segments whose newest data is older than this are dropped by expiry
    pub ttl_ms: Option<u64>,
}

impl Default for TimeWindowOptions {
    fn default() -> Self {
        Self {
            window_ms: 86_400_000, // 1 day
            min_threshold: 2,
            clock: WindowClock::KeyTimestamp,
            ttl_ms: None,
        }
    }
}

impl TimeWindowOptions {
    /// Time used to place a segment into a window
    pub fn segment_time(&self, meta: &SegmentMeta) -> u64 {
        match self.clock {
            WindowClock::KeyTimestamp => SnowflakeId(meta.max_key).timestamp_millis(),
            WindowClock::CreatedAt => meta.created_at,
        }
    }

    /// Window index of a segment
    pub fn window_of(&self, meta: &SegmentMeta) -> u64 {
        self.segment_time(meta) / self.window_ms
    }

    /// True once no more writes are expected for `window`
    pub fn is_aged_out(&self, window: u64, now_ms: u64) -> bool {
        (window + 1).saturating_mul(self.window_ms) <= now_ms
    }
}

/// Strategy used to select merge inputs
#[derive(Debug, Clone, PartialEq)]
pub enum CompactionStrategy {
    SizeTiered(SizeTieredOptions),
    TimeWindow(TimeWindowOptions),
}

impl Default for CompactionStrategy {
    fn default() -> Self {
        CompactionStrategy::SizeTiered(SizeTieredOptions::default())
    }
}

/// Segments selected for one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionPlan {
    pub strategy_name: &'static str,
    /// Inputs, oldest first
    pub input_segment_ids: Vec<u64>,
    pub estimated_output_count: usize,
}

impl CompactionPlan {
    fn empty(strategy_name: &'static str) -> Self {
        Self {
            strategy_name,
            input_segment_ids: Vec::new(),
            estimated_output_count: 0,
        }
    }

    fn from_run(strategy_name: &'static str, run: &[SegmentMeta], max_segment_size: u64) -> Self {
        let total: u64 = run.iter().map(|m| m.byte_size).sum();
        let outputs = total.div_ceil(max_segment_size.max(1)).max(1);
        Self {
            strategy_name,
            input_segment_ids: run.iter().map(|m| m.id).collect(),
            estimated_output_count: outputs as usize,
        }
    }

    /// True if there is nothing to merge
    pub fn is_empty(&self) -> bool {
        self.input_segment_ids.is_empty()
    }
}

impl CompactionStrategy {
    /// Human-readable strategy name
    pub fn name(&self) -> &'static str {
        match self {
            CompactionStrategy::SizeTiered(_) => "size-tiered",
            CompactionStrategy::TimeWindow(_) => "time-window",
        }
    }

    /// Reject parameters the strategy cannot work with
    pub fn validate(&self) -> Result<()> {
        match self {
            CompactionStrategy::SizeTiered(opts) => {
                if opts.min_threshold < 2 {
                    return Err(FluxError::Config("min_threshold must be >= 2".into()));
                }
                if opts.max_threshold < opts.min_threshold {
                    return Err(FluxError::Config(
                        "max_threshold must be >= min_threshold".into(),
                    ));
                }
                if !(opts.bucket_low > 0.0 && opts.bucket_low <= 1.0 && opts.bucket_high >= 1.0) {
                    return Err(FluxError::Config(
                        "bucket band must satisfy 0 < bucket_low <= 1 <= bucket_high".into(),
                    ));
                }
            }
            CompactionStrategy::TimeWindow(opts) => {
                if opts.window_ms == 0 {
                    return Err(FluxError::Config("window_ms must be > 0".into()));
                }
                if opts.min_threshold < 2 {
                    return Err(FluxError::Config("min_threshold must be >= 2".into()));
                }
            }
        }
        Ok(())
    }

    /// Select the next merge
    ///
    /// `segments` must hold only mergeable segments, oldest first.
    pub fn plan(&self, segments: &[SegmentMeta], now_ms: u64, max_segment_size: u64) -> CompactionPlan {
        let run = match self {
            CompactionStrategy::SizeTiered(opts) => select_size_tiered(opts, segments),
            CompactionStrategy::TimeWindow(opts) => select_time_window(opts, segments, now_ms),
        };
        match run {
            Some(run) => CompactionPlan::from_run(self.name(), run, max_segment_size),
            None => CompactionPlan::empty(self.name()),
        }
    }

    /// Segments whose newest data outlived the time-window TTL
    ///
    /// `segments` is every registered segment, oldest first. A segment that
    /// overlaps an older survivor is kept even when aged out, so dropping the
    /// result never exposes a superseded version of a key.
    ///
    /// Always empty for size-tiered or when no TTL is set.
    pub fn expired(&self, segments: &[SegmentMeta], now_ms: u64) -> Vec<u64> {
        let CompactionStrategy::TimeWindow(opts) = self else {
            return Vec::new();
        };
        let Some(ttl) = opts.ttl_ms else {
            return Vec::new();
        };

        let cutoff = now_ms.saturating_sub(ttl);
        let mut survivors: Vec<&SegmentMeta> = Vec::new();
        let mut expired = Vec::new();
        for meta in segments {
            if opts.segment_time(meta) < cutoff && !survivors.iter().any(|s| s.overlaps(meta)) {
                expired.push(meta.id);
            } else {
                survivors.push(meta);
            }
        }
        expired
    }
}

/// Outputs of one merge share its `seq`; such a run is already compacted
fn is_single_merge_output(run: &[SegmentMeta]) -> bool {
    run.iter().all(|m| m.generation > 0) && run.windows(2).all(|w| w[0].seq == w[1].seq)
}

fn select_size_tiered<'a>(
    opts: &SizeTieredOptions,
    segments: &'a [SegmentMeta],
) -> Option<&'a [SegmentMeta]> {
    let size_of = |m: &SegmentMeta| m.byte_size.max(opts.min_segment_size) as f64;

    let mut best: Option<(&[SegmentMeta], f64)> = None;
    let mut start = 0;
    while start < segments.len() {
        let mut end = start + 1;
        let mut total = size_of(&segments[start]);
        while end < segments.len() {
            let average = total / (end - start) as f64;
            let size = size_of(&segments[end]);
            if size < average * opts.bucket_low || size > average * opts.bucket_high {
                break;
            }
            total += size;
            end += 1;
        }

        let tier = &segments[start..end];
        if tier.len() >= opts.min_threshold && !is_single_merge_output(tier) {
            let tier = &tier[..tier.len().min(opts.max_threshold)];
            let average = tier.iter().map(size_of).sum::<f64>() / tier.len() as f64;
            if best.map_or(true, |(_, best_avg)| average < best_avg) {
                best = Some((tier, average));
            }
        }
        start = end;
    }

    if let Some((tier, average)) = best {
        tracing::debug!(
            segments = tier.len(),
            average_bytes = average as u64,
            "Size-tiered candidate selected"
        );
    }
    best.map(|(tier, _)| tier)
}

fn select_time_window<'a>(
    opts: &TimeWindowOptions,
    segments: &'a [SegmentMeta],
    now_ms: u64,
) -> Option<&'a [SegmentMeta]> {
    let mut start = 0;
    while start < segments.len() {
        let window = opts.window_of(&segments[start]);
        let mut end = start + 1;
        while end < segments.len() && opts.window_of(&segments[end]) == window {
            end += 1;
        }

        let run = &segments[start..end];
        if opts.is_aged_out(window, now_ms)
            && run.len() >= opts.min_threshold
            && !is_single_merge_output(run)
        {
            tracing::debug!(window, segments = run.len(), "Time-window candidate selected");
            return Some(run);
        }
        start = end;
    }
    None
}
