//! Segment Iterator
//!
//! Sequential iteration over all records in a segment.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{FluxError, Result};
use crate::record::{self, Record, RECORD_FIXED_SIZE};

use super::HEADER_SIZE;

/// Bytes before the content: id, channel_id, author_id, content_len
const RECORD_PREFIX: usize = RECORD_FIXED_SIZE - 8;

/// Iterator over segment records in ascending key order
pub struct SegmentIterator {
    reader: BufReader<File>,
    /// Records left according to the header
    remaining: u32,
    /// Set after the first error; iteration stops there
    failed: bool,
}

impl SegmentIterator {
    /// Open an independent handle on `path` positioned at the first record
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut header = [0u8; HEADER_SIZE as usize];
        reader.read_exact(&mut header)?;
        let mut count = [0u8; 4];
        count.copy_from_slice(&header[16..20]);

        Ok(Self {
            reader,
            remaining: u32::from_le_bytes(count),
            failed: false,
        })
    }

    /// Records not yet yielded
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    fn read_record(&mut self) -> Result<Record> {
        let mut prefix = [0u8; RECORD_PREFIX];
        self.reader.read_exact(&mut prefix).map_err(truncated)?;

        let (_, total_len) = record::peek_key_and_len(&prefix)
            .ok_or_else(|| FluxError::Corruption("short record prefix".into()))?;

        let mut buf = vec![0u8; total_len];
        buf[..RECORD_PREFIX].copy_from_slice(&prefix);
        self.reader
            .read_exact(&mut buf[RECORD_PREFIX..])
            .map_err(truncated)?;

        record::decode(&buf)
    }
}

impl Iterator for SegmentIterator {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.failed {
            return None;
        }
        self.remaining -= 1;

        let result = self.read_record();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

fn truncated(e: std::io::Error) -> FluxError {
    if e.kind() == ErrorKind::UnexpectedEof {
        FluxError::Corruption("segment ends before its declared record count".into())
    } else {
        FluxError::Io(e)
    }
}
