//! Segment Reader
//!
//! Opens segment files and provides O(log n) key lookups via an in-memory
//! key index.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{FluxError, Result};
use crate::record::{self, Record};

use super::iterator::SegmentIterator;
use super::HEADER_SIZE;

/// Position of one record inside the file
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    key: u64,
    offset: u64,
    len: u32,
}

/// Reader for segment files with in-memory index for O(log n) lookups
pub struct SegmentReader {
    path: PathBuf,
    /// Shared handle for point reads
    file: Mutex<BufReader<File>>,
    /// Sorted by key
    index: Vec<IndexEntry>,
    min_key: u64,
    max_key: u64,
    byte_size: u64,
    checksum: u32,
}

impl SegmentReader {
    /// Open a segment for reading
    ///
    /// Validates the header against the records and loads the key index.
    /// Only keys and lengths are parsed; record content is not decoded.
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        if data.len() < HEADER_SIZE as usize {
            return Err(FluxError::Corruption(format!(
                "segment {} is {} bytes, shorter than its header",
                path.display(),
                data.len()
            )));
        }

        let min_key = u64::from_le_bytes(read_array(&data[0..8]));
        let max_key = u64::from_le_bytes(read_array(&data[8..16]));
        let record_count = u32::from_le_bytes(read_array(&data[16..20]));

        let mut index = Vec::with_capacity(record_count as usize);
        let mut pos = HEADER_SIZE as usize;
        while pos < data.len() {
            let (key, len) = record::peek_key_and_len(&data[pos..]).ok_or_else(|| {
                FluxError::Corruption(format!(
                    "truncated record header at offset {} in {}",
                    pos,
                    path.display()
                ))
            })?;
            if pos + len > data.len() {
                return Err(FluxError::Corruption(format!(
                    "record {} at offset {} runs past end of {}",
                    key,
                    pos,
                    path.display()
                )));
            }
            if index.last().is_some_and(|prev: &IndexEntry| prev.key >= key) {
                return Err(FluxError::Corruption(format!(
                    "keys out of order at offset {} in {}",
                    pos,
                    path.display()
                )));
            }
            index.push(IndexEntry {
                key,
                offset: pos as u64,
                len: len as u32,
            });
            pos += len;
        }

        if index.len() != record_count as usize {
            return Err(FluxError::Corruption(format!(
                "header of {} declares {} records, found {}",
                path.display(),
                record_count,
                index.len()
            )));
        }
        if let (Some(first), Some(last)) = (index.first(), index.last()) {
            if first.key != min_key || last.key != max_key {
                return Err(FluxError::Corruption(format!(
                    "header key range of {} does not match its records",
                    path.display()
                )));
            }
        }

        let checksum = crc32fast::hash(&data);
        let byte_size = data.len() as u64;
        drop(data);

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(File::open(path)?)),
            index,
            min_key,
            max_key,
            byte_size,
            checksum,
        })
    }

    /// Get a record by key: binary search over the index, then one read
    ///
    /// Returns `Ok(None)` if the key is not in this segment.
    pub fn get(&self, key: u64) -> Result<Option<Record>> {
        if !self.might_contain(key) {
            return Ok(None);
        }
        let entry = match self.index.binary_search_by_key(&key, |e| e.key) {
            Ok(pos) => self.index[pos],
            Err(_) => return Ok(None),
        };

        let mut buf = vec![0u8; entry.len as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(entry.offset))?;
            file.read_exact(&mut buf)?;
        }
        record::decode(&buf).map(Some)
    }

    /// Quick check if a key might be in this segment (range check)
    pub fn might_contain(&self, key: u64) -> bool {
        !self.index.is_empty() && key >= self.min_key && key <= self.max_key
    }

    /// Create an iterator over all records with its own file handle
    /// (for compaction, debugging)
    pub fn iter(&self) -> Result<SegmentIterator> {
        SegmentIterator::open(&self.path)
    }

    /// All keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.index.iter().map(|e| e.key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn min_key(&self) -> u64 {
        self.min_key
    }

    pub fn max_key(&self) -> u64 {
        self.max_key
    }

    pub fn record_count(&self) -> u32 {
        self.index.len() as u32
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// CRC32 of the file computed at open
    pub fn checksum(&self) -> u32 {
        self.checksum
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
