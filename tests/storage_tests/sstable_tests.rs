//! Tests for the segment file format
//!
//! These tests verify:
//! - Segment creation through the temp-file-then-rename path
//! - O(log n) key lookups via the in-memory index
//! - Sequential iteration with independent file handles
//! - Min/max key range filtering
//! - Header and body validation on open

use std::fs;
use std::path::{Path, PathBuf};

use fluxlsm::storage::{SegmentIterator, SegmentReader, SegmentSummary, SegmentWriter};
use fluxlsm::{FluxError, Record};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_segment() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("segment_000001.sst");
    (temp_dir, path)
}

fn record(id: u64) -> Record {
    Record::new(id, id % 3, 100 + id, format!("message {}", id), 1_000 + id)
}

/// Create a segment holding keys `first, first + step, ...`
fn create_segment(path: &Path, first: u64, step: u64, count: u64) -> SegmentSummary {
    let mut writer = SegmentWriter::new(path).unwrap();
    for i in 0..count {
        writer.add(&record(first + i * step)).unwrap();
    }
    writer.finish().unwrap()
}

// =============================================================================
// SegmentWriter Tests
// =============================================================================

#[test]
fn test_writer_renames_into_place() {
    let (_temp, path) = setup_temp_segment();

    let mut writer = SegmentWriter::new(&path).unwrap();
    writer.add(&record(1)).unwrap();
    assert!(!path.exists());
    assert!(path.with_extension("tmp").exists());

    writer.finish().unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_summary_describes_file() {
    let (_temp, path) = setup_temp_segment();

    let summary = create_segment(&path, 10, 5, 20);

    assert_eq!(summary.min_key, 10);
    assert_eq!(summary.max_key, 10 + 19 * 5);
    assert_eq!(summary.record_count, 20);
    assert_eq!(summary.byte_size, fs::metadata(&path).unwrap().len());
    assert_eq!(summary.checksum, crc32fast::hash(&fs::read(&path).unwrap()));
}

#[test]
fn test_writer_rejects_unsorted_keys() {
    let (_temp, path) = setup_temp_segment();

    let mut writer = SegmentWriter::new(&path).unwrap();
    writer.add(&record(5)).unwrap();

    assert!(matches!(writer.add(&record(5)), Err(FluxError::InvalidRecord(_))));
    assert!(matches!(writer.add(&record(4)), Err(FluxError::InvalidRecord(_))));
    writer.abandon();
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_writer_tracks_size() {
    let (_temp, path) = setup_temp_segment();

    let mut writer = SegmentWriter::new(&path).unwrap();
    assert!(writer.is_empty());
    assert_eq!(writer.byte_size(), 20);

    writer.add(&record(1)).unwrap();
    assert_eq!(writer.byte_size(), 20 + record(1).encoded_len() as u64);
    assert_eq!(writer.record_count(), 1);
    writer.abandon();
}

// =============================================================================
// SegmentReader Tests
// =============================================================================

#[test]
fn test_reader_point_lookups() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 0, 2, 500);

    let reader = SegmentReader::open(&path).unwrap();

    assert_eq!(reader.record_count(), 500);
    assert_eq!(reader.get(0).unwrap(), Some(record(0)));
    assert_eq!(reader.get(498).unwrap(), Some(record(498)));
    assert_eq!(reader.get(998).unwrap(), Some(record(998)));
    // Inside the range but absent
    assert_eq!(reader.get(499).unwrap(), None);
    // Outside the range
    assert_eq!(reader.get(5_000).unwrap(), None);
}

#[test]
fn test_reader_key_range() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 100, 1, 50);

    let reader = SegmentReader::open(&path).unwrap();

    assert_eq!(reader.min_key(), 100);
    assert_eq!(reader.max_key(), 149);
    assert!(reader.might_contain(100));
    assert!(reader.might_contain(149));
    assert!(!reader.might_contain(99));
    assert!(!reader.might_contain(150));
    assert_eq!(reader.keys().collect::<Vec<_>>(), (100..150).collect::<Vec<_>>());
}

#[test]
fn test_reader_checksum_matches_summary() {
    let (_temp, path) = setup_temp_segment();
    let summary = create_segment(&path, 1, 1, 10);

    let reader = SegmentReader::open(&path).unwrap();
    assert_eq!(reader.checksum(), summary.checksum);
    assert_eq!(reader.byte_size(), summary.byte_size);
}

#[test]
fn test_reader_rejects_truncated_file() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 1, 1, 10);

    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() - 3]).unwrap();

    assert!(matches!(
        SegmentReader::open(&path),
        Err(FluxError::Corruption(_))
    ));
}

#[test]
fn test_reader_rejects_wrong_record_count() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 1, 1, 10);

    let mut data = fs::read(&path).unwrap();
    data[16..20].copy_from_slice(&11u32.to_le_bytes());
    fs::write(&path, data).unwrap();

    assert!(matches!(
        SegmentReader::open(&path),
        Err(FluxError::Corruption(_))
    ));
}

#[test]
fn test_reader_rejects_short_header() {
    let (_temp, path) = setup_temp_segment();
    fs::write(&path, [0u8; 7]).unwrap();

    assert!(matches!(
        SegmentReader::open(&path),
        Err(FluxError::Corruption(_))
    ));
}

#[test]
fn test_empty_segment_opens() {
    let (_temp, path) = setup_temp_segment();
    let summary = SegmentWriter::new(&path).unwrap().finish().unwrap();

    assert_eq!(summary.record_count, 0);
    let reader = SegmentReader::open(&path).unwrap();
    assert_eq!(reader.record_count(), 0);
    assert_eq!(reader.get(1).unwrap(), None);
}

// =============================================================================
// SegmentIterator Tests
// =============================================================================

#[test]
fn test_iterator_yields_all_in_order() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 7, 3, 100);

    let reader = SegmentReader::open(&path).unwrap();
    let records: Vec<Record> = reader.iter().unwrap().map(|r| r.unwrap()).collect();

    assert_eq!(records.len(), 100);
    assert_eq!(records[0], record(7));
    assert_eq!(records[99], record(7 + 99 * 3));
    assert!(records.windows(2).all(|w| w[0].id < w[1].id));
}

#[test]
fn test_iterators_are_independent() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 1, 1, 10);

    let mut first = SegmentIterator::open(&path).unwrap();
    let mut second = SegmentIterator::open(&path).unwrap();

    assert_eq!(first.next().unwrap().unwrap().id, 1);
    assert_eq!(first.next().unwrap().unwrap().id, 2);
    assert_eq!(second.next().unwrap().unwrap().id, 1);
    assert_eq!(first.remaining(), 8);
    assert_eq!(second.remaining(), 9);
}

#[test]
fn test_iterator_stops_after_truncation() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 1, 1, 5);

    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() - 10]).unwrap();

    let results: Vec<_> = SegmentIterator::open(&path).unwrap().collect();
    assert_eq!(results.len(), 5);
    assert!(results[..4].iter().all(|r| r.is_ok()));
    assert!(matches!(results[4], Err(FluxError::Corruption(_))));
}
