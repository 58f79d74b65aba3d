//! Record codec
//!
//! Fixed-width integer fields followed by a length-prefixed content block.
//! Keys and record sizes can be read without touching the content bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FluxError, Result};

use super::{Record, MAX_CONTENT_LEN};

/// Bytes taken by the fixed-width fields: id, channel_id, author_id,
/// content_len and created_at
pub const RECORD_FIXED_SIZE: usize = 8 + 8 + 8 + 4 + 8;

/// Offset of `content_len` inside an encoded record
const CONTENT_LEN_OFFSET: usize = 24;

/// Encode a record into a fresh buffer
///
/// Fails with `InvalidRecord` if the content exceeds `MAX_CONTENT_LEN`.
pub fn encode(record: &Record) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(record.encoded_len());
    encode_into(record, &mut buf)?;
    Ok(buf.freeze())
}

/// Append the encoding of `record` to `buf`
pub fn encode_into(record: &Record, buf: &mut impl BufMut) -> Result<()> {
    if record.content.len() > MAX_CONTENT_LEN {
        return Err(FluxError::InvalidRecord(format!(
            "record {} content is {} bytes (max {})",
            record.id,
            record.content.len(),
            MAX_CONTENT_LEN
        )));
    }

    buf.put_u64_le(record.id);
    buf.put_u64_le(record.channel_id);
    buf.put_u64_le(record.author_id);
    buf.put_u32_le(record.content.len() as u32);
    buf.put_slice(&record.content);
    buf.put_u64_le(record.created_at);
    Ok(())
}

/// Decode exactly one record from `bytes`
///
/// Trailing bytes are treated as corruption.
pub fn decode(bytes: &[u8]) -> Result<Record> {
    let mut buf = bytes;
    let record = decode_from(&mut buf)?;
    if buf.has_remaining() {
        return Err(FluxError::Corruption(format!(
            "{} trailing bytes after record {}",
            buf.remaining(),
            record.id
        )));
    }
    Ok(record)
}

/// Decode the next record from `buf`, advancing it past the record
pub fn decode_from(buf: &mut impl Buf) -> Result<Record> {
    if buf.remaining() < CONTENT_LEN_OFFSET + 4 {
        return Err(truncated(buf.remaining()));
    }

    let id = buf.get_u64_le();
    let channel_id = buf.get_u64_le();
    let author_id = buf.get_u64_le();
    let content_len = buf.get_u32_le() as usize;

    if content_len > MAX_CONTENT_LEN {
        return Err(FluxError::Corruption(format!(
            "record {} claims {} content bytes (max {})",
            id, content_len, MAX_CONTENT_LEN
        )));
    }
    if buf.remaining() < content_len + 8 {
        return Err(truncated(buf.remaining()));
    }

    let content = buf.copy_to_bytes(content_len);
    let created_at = buf.get_u64_le();

    Ok(Record {
        id,
        channel_id,
        author_id,
        content,
        created_at,
    })
}

/// Read the key and total encoded length of the record at the start of
/// `bytes` without decoding its content
///
/// Returns `None` if `bytes` is too short to hold the fixed header.
pub fn peek_key_and_len(bytes: &[u8]) -> Option<(u64, usize)> {
    if bytes.len() < CONTENT_LEN_OFFSET + 4 {
        return None;
    }
    let mut head = &bytes[..CONTENT_LEN_OFFSET + 4];
    let id = head.get_u64_le();
    head.advance(16);
    let content_len = head.get_u32_le() as usize;
    Some((id, RECORD_FIXED_SIZE + content_len))
}

fn truncated(remaining: usize) -> FluxError {
    FluxError::Corruption(format!(
        "truncated record: only {} bytes remaining",
        remaining
    ))
}
