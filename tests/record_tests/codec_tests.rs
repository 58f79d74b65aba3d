//! Tests for the record model and codec
//!
//! These tests verify:
//! - Encode/decode round-trips for arbitrary records
//! - Exact byte layout of the fixed fields
//! - Truncated and oversized input is rejected as corruption
//! - Write-time validation (empty and oversized content)
//! - Snowflake timestamp extraction

use bytes::{Bytes, BytesMut};
use fluxlsm::record::{
    decode, decode_from, encode, encode_into, peek_key_and_len, SnowflakeId, EPOCH_MS,
    MAX_CONTENT_LEN, RECORD_FIXED_SIZE,
};
use fluxlsm::{FluxError, Record};
use proptest::prelude::*;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_record() -> Record {
    Record::new(42, 7, 9, "hello, channel", 1_700_000_000_123)
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_encoded_length_matches_layout() {
    let record = sample_record();
    let bytes = encode(&record).unwrap();

    assert_eq!(bytes.len(), RECORD_FIXED_SIZE + 14);
    assert_eq!(bytes.len(), record.encoded_len());
}

#[test]
fn test_fields_are_little_endian_in_order() {
    let bytes = encode(&sample_record()).unwrap();

    assert_eq!(&bytes[0..8], &42u64.to_le_bytes());
    assert_eq!(&bytes[8..16], &7u64.to_le_bytes());
    assert_eq!(&bytes[16..24], &9u64.to_le_bytes());
    assert_eq!(&bytes[24..28], &14u32.to_le_bytes());
    assert_eq!(&bytes[28..42], b"hello, channel");
    assert_eq!(&bytes[42..50], &1_700_000_000_123u64.to_le_bytes());
}

#[test]
fn test_peek_key_and_len() {
    let bytes = encode(&sample_record()).unwrap();

    assert_eq!(peek_key_and_len(&bytes), Some((42, bytes.len())));
    assert_eq!(peek_key_and_len(&bytes[..27]), None);
}

#[test]
fn test_decode_from_consumes_sequential_records() {
    let mut buf = BytesMut::new();
    encode_into(&Record::new(1, 1, 1, "a", 10), &mut buf).unwrap();
    encode_into(&Record::new(2, 1, 1, "bb", 20), &mut buf).unwrap();

    let mut cursor = buf.freeze();
    let first = decode_from(&mut cursor).unwrap();
    let second = decode_from(&mut cursor).unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(second.content, Bytes::from_static(b"bb"));
    assert!(cursor.is_empty());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_truncated_input_is_corruption() {
    let bytes = encode(&sample_record()).unwrap();

    for len in [0, 10, 27, 28, bytes.len() - 1] {
        let result = decode(&bytes[..len]);
        assert!(
            matches!(result, Err(FluxError::Corruption(_))),
            "length {} should fail",
            len
        );
    }
}

#[test]
fn test_trailing_bytes_are_corruption() {
    let mut bytes = encode(&sample_record()).unwrap().to_vec();
    bytes.push(0);

    assert!(matches!(decode(&bytes), Err(FluxError::Corruption(_))));
}

#[test]
fn test_impossible_content_length_is_corruption() {
    let mut bytes = encode(&sample_record()).unwrap().to_vec();
    bytes[24..28].copy_from_slice(&(MAX_CONTENT_LEN as u32 + 1).to_le_bytes());

    assert!(matches!(decode(&bytes), Err(FluxError::Corruption(_))));
}

#[test]
fn test_encode_rejects_oversized_content() {
    let record = Record::new(1, 1, 1, vec![b'x'; MAX_CONTENT_LEN + 1], 0);
    assert!(matches!(encode(&record), Err(FluxError::InvalidRecord(_))));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_validate_accepts_boundary_lengths() {
    assert!(Record::new(1, 1, 1, "x", 0).validate().is_ok());
    assert!(Record::new(1, 1, 1, vec![b'x'; MAX_CONTENT_LEN], 0)
        .validate()
        .is_ok());
}

#[test]
fn test_validate_rejects_bad_content() {
    let empty = Record::new(1, 1, 1, Bytes::new(), 0);
    let too_long = Record::new(2, 1, 1, vec![b'x'; MAX_CONTENT_LEN + 1], 0);

    for record in [empty, too_long] {
        assert!(matches!(record.validate(), Err(FluxError::InvalidRecord(_))));
    }
}

#[test]
fn test_non_utf8_content_is_stored_as_is() {
    let record = Record::new(3, 1, 1, vec![0xFF, 0xFE, 0x00], 0);

    assert!(record.validate().is_ok());
    assert_eq!(record.content_str(), None);
    assert_eq!(decode(&encode(&record).unwrap()).unwrap(), record);
}

// =============================================================================
// Snowflake Tests
// =============================================================================

#[test]
fn test_snowflake_timestamp_recovery() {
    let ts = EPOCH_MS + 1_234_567;
    let id = SnowflakeId::from_parts(ts, 513, 4095);

    assert_eq!(id.timestamp_millis(), ts);
    assert_eq!(id.machine_id(), 513);
    assert_eq!(id.sequence(), 4095);
}

#[test]
fn test_snowflake_keys_sort_by_time() {
    let earlier = SnowflakeId::from_parts(EPOCH_MS + 1_000, 1023, 4095);
    let later = SnowflakeId::from_parts(EPOCH_MS + 1_001, 0, 0);
    assert!(earlier.value() < later.value());
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_decode_inverts_encode(
        id in any::<u64>(),
        channel_id in any::<u64>(),
        author_id in any::<u64>(),
        content in proptest::collection::vec(any::<u8>(), 0..=MAX_CONTENT_LEN),
        created_at in any::<u64>(),
    ) {
        let record = Record::new(id, channel_id, author_id, content, created_at);
        let bytes = encode(&record).unwrap();
        prop_assert_eq!(decode(&bytes).unwrap(), record);
    }

    #[test]
    fn prop_peek_agrees_with_encoding(
        id in any::<u64>(),
        content in "\\PC{1,200}",
    ) {
        let record = Record::new(id, 0, 0, content, 0);
        let bytes = encode(&record).unwrap();
        prop_assert_eq!(peek_key_and_len(&bytes), Some((id, bytes.len())));
    }
}
