//! Record Module
//!
//! The message entries stored by the engine and their binary encoding.
//!
//! ## Responsibilities
//! - Define the fixed-shape `Record` keyed by a 64-bit ordered id
//! - Enforce the content-length invariant at write time
//! - Encode/decode records in the on-disk layout
//! - Derive wall-clock time from Snowflake-style keys
//!
//! ## Record Layout (little-endian)
//! ```text
//! ┌──────────┬────────────────┬───────────────┬─────────────────┬─────────┬─────────────────┐
//! │ id (8)   │ channel_id (8) │ author_id (8) │ content_len (4) │ content │ created_at (8)  │
//! └──────────┴────────────────┴───────────────┴─────────────────┴─────────┴─────────────────┘
//! ```

mod codec;
mod snowflake;

use bytes::Bytes;

use crate::error::{FluxError, Result};

pub use codec::{decode, decode_from, encode, encode_into, peek_key_and_len, RECORD_FIXED_SIZE};
pub use snowflake::{SnowflakeId, EPOCH_MS};

/// Maximum number of content bytes a record may carry
pub const MAX_CONTENT_LEN: usize = 2000;

/// A single message entry
///
/// `id` is generated externally, is unique per writer and doubles as the sort
/// key. `created_at` is the write timestamp in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub content: Bytes,
    pub created_at: u64,
}

impl Record {
    /// Create a new record
    pub fn new(
        id: u64,
        channel_id: u64,
        author_id: u64,
        content: impl Into<Bytes>,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            channel_id,
            author_id,
            content: content.into(),
            created_at,
        }
    }

    /// Check the write-time invariant: non-empty content of at most
    /// `MAX_CONTENT_LEN` bytes
    ///
    /// Content is expected to be UTF-8 but is stored as opaque bytes.
    pub fn validate(&self) -> Result<()> {
        if self.content.is_empty() {
            return Err(FluxError::InvalidRecord(format!(
                "record {} has empty content",
                self.id
            )));
        }
        if self.content.len() > MAX_CONTENT_LEN {
            return Err(FluxError::InvalidRecord(format!(
                "record {} content is {} bytes (max {})",
                self.id,
                self.content.len(),
                MAX_CONTENT_LEN
            )));
        }
        Ok(())
    }

    /// Content as text, if it is valid UTF-8
    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Size of this record in the segment layout
    pub fn encoded_len(&self) -> usize {
        RECORD_FIXED_SIZE + self.content.len()
    }
}
