//! Compaction Manager
//!
//! Runs the merge a strategy selected.
//!
//! ## Flow
//! ```text
//!   plan ──► begin_merge (Active → Merging)
//!              │
//!              ▼
//!   k-way heap merge, newest version per key wins
//!              │
//!              ▼
//!   write outputs, split at max_segment_size
//!              │
//!              ▼
//!   replace: manifest swap, inputs retired and deleted
//! ```
//! If any step fails the outputs are deleted and the inputs return to
//! `Active`; the published segment set is untouched.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::error::{FluxError, Result};
use crate::record::Record;
use crate::storage::sstable::TEMP_EXTENSION;
use crate::storage::{Segment, SegmentIterator, SegmentMeta, SegmentWriter, StorageManager};

use super::metrics::CompactionMetrics;
use super::strategy::{CompactionPlan, CompactionStrategy};

/// Outcome of one compaction run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub strategy: &'static str,
    pub input_segments: usize,
    pub output_segments: usize,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub records_in: u64,
    pub records_out: u64,
}

impl CompactionReport {
    fn noop(strategy: &'static str) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// True if nothing was merged
    pub fn is_noop(&self) -> bool {
        self.input_segments == 0
    }

    /// Superseded versions dropped by the merge
    pub fn records_dropped(&self) -> u64 {
        self.records_in - self.records_out
    }
}

/// Applies a compaction strategy to a storage manager
pub struct CompactionManager {
    strategy: CompactionStrategy,
    max_segment_size: u64,
    metrics: Arc<CompactionMetrics>,
}

impl CompactionManager {
    pub fn new(
        strategy: CompactionStrategy,
        max_segment_size: u64,
        metrics: Arc<CompactionMetrics>,
    ) -> Self {
        Self {
            strategy,
            max_segment_size,
            metrics,
        }
    }

    pub fn strategy(&self) -> &CompactionStrategy {
        &self.strategy
    }

    pub fn metrics(&self) -> &Arc<CompactionMetrics> {
        &self.metrics
    }

    /// Ask the strategy for the next merge over the currently mergeable segments
    pub fn plan(&self, storage: &StorageManager, now_ms: u64) -> CompactionPlan {
        self.strategy
            .plan(&storage.active_metas(), now_ms, self.max_segment_size)
    }

    /// Plan and run one merge
    pub fn compact(&self, storage: &StorageManager, now_ms: u64) -> Result<CompactionReport> {
        let plan = self.plan(storage, now_ms);
        self.execute(storage, &plan)
    }

    /// Run a merge over exactly the segments in `plan`
    pub fn execute(&self, storage: &StorageManager, plan: &CompactionPlan) -> Result<CompactionReport> {
        if plan.is_empty() {
            tracing::debug!(strategy = plan.strategy_name, "No compaction candidates");
            return Ok(CompactionReport::noop(plan.strategy_name));
        }

        let inputs = storage.begin_merge(&plan.input_segment_ids)?;
        tracing::info!(
            strategy = plan.strategy_name,
            inputs = ?plan.input_segment_ids,
            "Compaction started"
        );

        let (outputs, mut report) = match self.merge(storage, &inputs) {
            Ok(merged) => merged,
            Err(e) => {
                storage.abort_merge(&inputs);
                tracing::error!(strategy = plan.strategy_name, error = %e, "Compaction failed");
                return Err(e);
            }
        };
        report.strategy = plan.strategy_name;

        let output_paths: Vec<_> = outputs
            .iter()
            .map(|s| s.reader().path().to_path_buf())
            .collect();
        if let Err(e) = storage.replace(&inputs, outputs) {
            for path in &output_paths {
                remove_output(path);
            }
            storage.abort_merge(&inputs);
            tracing::error!(strategy = plan.strategy_name, error = %e, "Compaction commit failed");
            return Err(e);
        }

        self.metrics.record_compaction(
            report.input_segments as u64,
            report.bytes_read,
            report.bytes_written,
            report.records_dropped(),
        );
        tracing::info!(
            strategy = report.strategy,
            inputs = report.input_segments,
            outputs = report.output_segments,
            records_in = report.records_in,
            records_out = report.records_out,
            bytes_read = report.bytes_read,
            bytes_written = report.bytes_written,
            "Compaction finished"
        );
        Ok(report)
    }

    /// Drop segments whose data outlived the strategy's TTL
    ///
    /// Returns the number of segments removed.
    ///
    /// All-or-nothing: if a merge holds any of the expired segments, nothing
    /// is removed and the next pass tries again.
    pub fn expire(&self, storage: &StorageManager, now_ms: u64) -> Result<usize> {
        let expired = self.strategy.expired(&storage.segment_metas(), now_ms);
        if expired.is_empty() {
            return Ok(0);
        }

        let claimed = match storage.begin_merge(&expired) {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::debug!(error = %e, "Expiry deferred");
                return Ok(0);
            }
        };
        if let Err(e) = storage.replace(&claimed, Vec::new()) {
            storage.abort_merge(&claimed);
            return Err(e);
        }

        self.metrics.record_expired(claimed.len() as u64);
        tracing::info!(
            segments = claimed.len(),
            records = claimed
                .iter()
                .map(|s| s.meta().record_count as u64)
                .sum::<u64>(),
            "Expired segments removed"
        );
        Ok(claimed.len())
    }

    // =========================================================================
    // Merge
    // =========================================================================

    /// Merge claimed inputs into new, unregistered segments
    fn merge(
        &self,
        storage: &StorageManager,
        inputs: &[Arc<Segment>],
    ) -> Result<(Vec<Arc<Segment>>, CompactionReport)> {
        let mut report = CompactionReport {
            input_segments: inputs.len(),
            bytes_read: inputs.iter().map(|s| s.meta().byte_size).sum(),
            ..Default::default()
        };

        // Every output takes the newest position of its inputs in read order
        let seq = inputs.iter().map(|s| s.meta().seq).max().unwrap_or_default();
        let generation = inputs
            .iter()
            .map(|s| s.meta().generation)
            .max()
            .unwrap_or_default()
            + 1;
        let created_at = inputs
            .iter()
            .map(|s| s.meta().created_at)
            .max()
            .unwrap_or_default();

        let mut output = OutputSet::new(storage, seq, generation, created_at);
        let result = (|| -> Result<()> {
            let mut merge = MergeIterator::new(inputs)?;
            let mut last_key: Option<u64> = None;

            while let Some(record) = merge.next_record()? {
                report.records_in += 1;
                if last_key == Some(record.id) {
                    continue;
                }
                last_key = Some(record.id);

                output.add(&record, self.max_segment_size)?;
                report.records_out += 1;
            }
            output.finish_current()
        })();

        match result {
            Ok(()) => {
                report.output_segments = output.segments.len();
                report.bytes_written = output.segments.iter().map(|s| s.meta().byte_size).sum();
                Ok((output.segments, report))
            }
            Err(e) => {
                output.discard();
                Err(e)
            }
        }
    }
}

fn remove_output(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete compaction output");
        }
    }
}

// =============================================================================
// Output Writer
// =============================================================================

/// Compaction outputs written so far plus the one being filled
struct OutputSet<'a> {
    storage: &'a StorageManager,
    seq: u64,
    generation: u32,
    created_at: u64,
    current: Option<(u64, SegmentWriter)>,
    segments: Vec<Arc<Segment>>,
}

impl<'a> OutputSet<'a> {
    fn new(storage: &'a StorageManager, seq: u64, generation: u32, created_at: u64) -> Self {
        Self {
            storage,
            seq,
            generation,
            created_at,
            current: None,
            segments: Vec::new(),
        }
    }

    fn add(&mut self, record: &Record, max_segment_size: u64) -> Result<()> {
        let full = self.current.as_ref().is_some_and(|(_, writer)| {
            !writer.is_empty() && writer.byte_size() + record.encoded_len() as u64 > max_segment_size
        });
        if full {
            self.finish_current()?;
        }

        if self.current.is_none() {
            let id = self.storage.allocate_segment_id();
            let writer = SegmentWriter::new(&self.storage.segment_path(id))?;
            self.current = Some((id, writer));
        }
        match self.current.as_mut() {
            Some((_, writer)) => writer.add(record),
            None => Err(FluxError::Compaction("no open output segment".into())),
        }
    }

    fn finish_current(&mut self) -> Result<()> {
        let Some((id, writer)) = self.current.take() else {
            return Ok(());
        };
        if writer.is_empty() {
            writer.abandon();
            return Ok(());
        }

        let path = writer.path().to_path_buf();
        let summary = match writer.finish() {
            Ok(summary) => summary,
            Err(e) => {
                remove_output(&path.with_extension(TEMP_EXTENSION));
                remove_output(&path);
                return Err(e);
            }
        };
        let meta = SegmentMeta {
            id,
            seq: self.seq,
            generation: self.generation,
            min_key: summary.min_key,
            max_key: summary.max_key,
            record_count: summary.record_count,
            byte_size: summary.byte_size,
            created_at: self.created_at,
            checksum: summary.checksum,
        };
        match self.storage.open_segment(meta) {
            Ok(segment) => {
                self.segments.push(segment);
                Ok(())
            }
            Err(e) => {
                remove_output(&path);
                Err(e)
            }
        }
    }

    /// Delete everything written so far
    fn discard(mut self) {
        if let Some((_, writer)) = self.current.take() {
            writer.abandon();
        }
        for segment in self.segments.drain(..) {
            remove_output(segment.reader().path());
        }
    }
}

// =============================================================================
// K-way Merge
// =============================================================================

/// Heap entry: the next record of one input
struct MergeEntry {
    record: Record,
    /// Position of the input in read order; higher is newer
    rank: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.record.id == other.record.id && self.rank == other.rank
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    /// Max-heap order: smallest key first, newest input first on equal keys
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .record
            .id
            .cmp(&self.record.id)
            .then(self.rank.cmp(&other.rank))
    }
}

/// Yields every record of every input in key order; for a repeated key the
/// newest version comes first
struct MergeIterator {
    sources: Vec<SegmentIterator>,
    heap: BinaryHeap<MergeEntry>,
}

impl MergeIterator {
    /// `inputs` must be in read order, oldest first
    fn new(inputs: &[Arc<Segment>]) -> Result<Self> {
        let mut sources = Vec::with_capacity(inputs.len());
        for segment in inputs {
            sources.push(segment.reader().iter()?);
        }

        let mut merge = Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
        };
        for rank in 0..merge.sources.len() {
            merge.advance(rank)?;
        }
        Ok(merge)
    }

    fn advance(&mut self, rank: usize) -> Result<()> {
        if let Some(next) = self.sources[rank].next() {
            self.heap.push(MergeEntry {
                record: next?,
                rank,
            });
        }
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };
        self.advance(entry.rank)?;
        Ok(Some(entry.record))
    }
}
