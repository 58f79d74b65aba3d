//! Segment Builder
//!
//! Writes sorted records to a new segment file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::error::{FluxError, Result};
use crate::record::{self, Record};

use super::{HEADER_SIZE, TEMP_EXTENSION};

/// What a finished segment file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSummary {
    pub min_key: u64,
    pub max_key: u64,
    pub record_count: u32,
    pub byte_size: u64,
    pub checksum: u32,
}

/// Builder for creating new segments from records in ascending key order
///
/// Data goes to `<name>.tmp` first; `finish()` fsyncs and renames it to the
/// final path, so a segment file under its final name is always complete.
pub struct SegmentWriter {
    /// Final file path
    path: PathBuf,
    /// Path written while building
    temp_path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Reused encode buffer
    scratch: BytesMut,
    /// Number of records written
    record_count: u32,
    /// Current file size, header included
    byte_size: u64,
    /// Track min/max keys for metadata
    min_key: Option<u64>,
    max_key: Option<u64>,
    /// Running CRC hasher for the record section
    data_hasher: crc32fast::Hasher,
}

impl SegmentWriter {
    /// Create a new segment builder
    ///
    /// Writes a placeholder header immediately; call `add()` in ascending key
    /// order, then `finish()` to patch the header and sync.
    pub fn new(path: &Path) -> Result<Self> {
        let temp_path = path.with_extension(TEMP_EXTENSION);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(&[0u8; HEADER_SIZE as usize])?;

        Ok(Self {
            path: path.to_path_buf(),
            temp_path,
            writer,
            scratch: BytesMut::with_capacity(record::RECORD_FIXED_SIZE + record::MAX_CONTENT_LEN),
            record_count: 0,
            byte_size: HEADER_SIZE,
            min_key: None,
            max_key: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append a record; keys must be strictly ascending
    pub fn add(&mut self, record: &Record) -> Result<()> {
        if let Some(last) = self.max_key {
            if record.id <= last {
                return Err(FluxError::InvalidRecord(format!(
                    "key {} added after {} (segment keys must be ascending)",
                    record.id, last
                )));
            }
        }

        self.scratch.clear();
        record::encode_into(record, &mut self.scratch)?;
        self.writer.write_all(&self.scratch)?;
        self.data_hasher.update(&self.scratch);

        if self.min_key.is_none() {
            self.min_key = Some(record.id);
        }
        self.max_key = Some(record.id);
        self.byte_size += self.scratch.len() as u64;
        self.record_count += 1;

        Ok(())
    }

    /// Current file size in bytes, header included
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Number of records added so far
    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    /// True if no record has been added
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Final path of the segment
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finish building: patch header, fsync, rename into place
    pub fn finish(mut self) -> Result<SegmentSummary> {
        let min_key = self.min_key.unwrap_or_default();
        let max_key = self.max_key.unwrap_or_default();

        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(&min_key.to_le_bytes());
        header[8..16].copy_from_slice(&max_key.to_le_bytes());
        header[16..20].copy_from_slice(&self.record_count.to_le_bytes());

        self.writer.flush()?;
        let mut file = self.writer.into_inner().map_err(|e| {
            FluxError::Io(std::io::Error::new(
                e.error().kind(),
                format!("Failed to flush segment: {}", e.error()),
            ))
        })?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;

        // Whole-file CRC = CRC(header) combined with CRC(records)
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.combine(&self.data_hasher);

        Ok(SegmentSummary {
            min_key,
            max_key,
            record_count: self.record_count,
            byte_size: self.byte_size,
            checksum: hasher.finalize(),
        })
    }

    /// Drop a partially written segment
    pub fn abandon(self) {
        let temp_path = self.temp_path.clone();
        drop(self.writer);
        if let Err(e) = fs::remove_file(&temp_path) {
            tracing::warn!(path = %temp_path.display(), error = %e, "Failed to remove abandoned segment");
        }
    }
}
