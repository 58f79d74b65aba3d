//! Manifest
//!
//! The list of registered segments. A segment file that is not in the
//! manifest is an orphan from an interrupted flush or compaction and is
//! deleted on the next open.
//!
//! ## File Format
//! ```text
//! ┌──────────┬─────────────┬─────────────────┬───────────┬──────────────────────────┐
//! │ "FLXM"(4)│ Version (2) │ PayloadLen (4)  │ CRC32 (4) │ bincode(ManifestState)   │
//! └──────────┴─────────────┴─────────────────┴───────────┴──────────────────────────┘
//! ```
//! Written with write-temp, fsync, rename, fsync-directory.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FluxError, Result};

use super::sstable::SegmentMeta;

/// Magic bytes identifying a manifest file
const MAGIC: &[u8; 4] = b"FLXM";

/// Current manifest format version
const VERSION: u16 = 1;

/// Magic (4) + Version (2) + PayloadLen (4) + CRC (4)
const HEADER_SIZE: usize = 14;

pub(crate) const MANIFEST_FILENAME: &str = "MANIFEST";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";

/// Everything needed to reopen the segment set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestState {
    /// Next file id to hand out
    pub next_segment_id: u64,
    /// Next flush sequence to hand out
    pub next_seq: u64,
    /// Registered segments, oldest first
    pub segments: Vec<SegmentMeta>,
}

/// Reads and atomically replaces the manifest of one segment directory
pub struct Manifest {
    dir: PathBuf,
}

impl Manifest {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILENAME)
    }

    /// Load the manifest; `None` if the directory has never been committed to
    pub fn load(&self) -> Result<Option<ManifestState>> {
        let data = match fs::read(self.path()) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode(&data).map(Some)
    }

    /// Replace the manifest with `state`
    ///
    /// An `Err` means the previous manifest is still in place. Once the
    /// rename has happened the new state is committed, and a failed
    /// directory sync is only logged.
    pub fn save(&self, state: &ManifestState) -> Result<()> {
        self.save_with(state, sync_dir)
    }

    fn save_with(
        &self,
        state: &ManifestState,
        sync: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<()> {
        let data = Self::encode(state)?;
        let temp_path = self.dir.join(MANIFEST_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.path())?;
        if let Err(e) = sync(&self.dir) {
            tracing::warn!(
                dir = %self.dir.display(),
                error = %e,
                "Manifest renamed but directory sync failed"
            );
        }
        Ok(())
    }

    fn encode(state: &ManifestState) -> Result<Vec<u8>> {
        let payload = bincode::serialize(state)?;
        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len());
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&VERSION.to_le_bytes());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        data.extend_from_slice(&payload);
        Ok(data)
    }

    fn decode(data: &[u8]) -> Result<ManifestState> {
        if data.len() < HEADER_SIZE {
            return Err(FluxError::Corruption("manifest shorter than header".into()));
        }
        if &data[0..4] != MAGIC {
            return Err(FluxError::Corruption(format!(
                "invalid manifest magic: expected FLXM, got {:?}",
                &data[0..4]
            )));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != VERSION {
            return Err(FluxError::Corruption(format!(
                "unsupported manifest version: {}",
                version
            )));
        }

        let payload_len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
        let crc = u32::from_le_bytes([data[10], data[11], data[12], data[13]]);
        let payload = &data[HEADER_SIZE..];
        if payload.len() != payload_len {
            return Err(FluxError::Corruption(format!(
                "manifest payload is {} bytes, header says {}",
                payload.len(),
                payload_len
            )));
        }
        if crc32fast::hash(payload) != crc {
            return Err(FluxError::Corruption("manifest checksum mismatch".into()));
        }

        Ok(bincode::deserialize(payload)?)
    }
}

/// Fsync a directory so renames and deletions inside it are durable
#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

/// Directory handles cannot be fsynced on this platform
#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
