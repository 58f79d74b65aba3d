//! Snowflake key layout
//!
//! Keys come from an external generator. The engine only needs to recover
//! the timestamp bits to place segments into time windows.
//!
//! ```text
//! ┌───────────────────────────┬────────────────┬───────────────┐
//! │ timestamp - EPOCH (41)    │ machine id (10)│ sequence (12) │
//! └───────────────────────────┴────────────────┴───────────────┘
//! ```

/// Custom epoch: 2024-01-01 00:00:00 UTC
pub const EPOCH_MS: u64 = 1_704_067_200_000;

const TIMESTAMP_SHIFT: u32 = 22;
const MACHINE_SHIFT: u32 = 12;
const TIMESTAMP_MASK: u64 = (1 << 41) - 1;
const MACHINE_MASK: u64 = (1 << 10) - 1;
const SEQUENCE_MASK: u64 = (1 << 12) - 1;

/// A 64-bit, time-ordered identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnowflakeId(pub u64);

impl SnowflakeId {
    /// Assemble an id from its parts. Timestamps before `EPOCH_MS` clamp to it.
    pub fn from_parts(timestamp_ms: u64, machine_id: u16, sequence: u16) -> Self {
        let ts = timestamp_ms.saturating_sub(EPOCH_MS) & TIMESTAMP_MASK;
        let machine = machine_id as u64 & MACHINE_MASK;
        let seq = sequence as u64 & SEQUENCE_MASK;
        Self((ts << TIMESTAMP_SHIFT) | (machine << MACHINE_SHIFT) | seq)
    }

    /// Smallest id carrying the given timestamp (useful as a range bound)
    pub fn from_timestamp(timestamp_ms: u64) -> Self {
        Self::from_parts(timestamp_ms, 0, 0)
    }

    /// Wall-clock milliseconds embedded in the id
    pub fn timestamp_millis(self) -> u64 {
        ((self.0 >> TIMESTAMP_SHIFT) & TIMESTAMP_MASK) + EPOCH_MS
    }

    pub fn machine_id(self) -> u16 {
        ((self.0 >> MACHINE_SHIFT) & MACHINE_MASK) as u16
    }

    pub fn sequence(self) -> u16 {
        (self.0 & SEQUENCE_MASK) as u16
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for SnowflakeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SnowflakeId> for u64 {
    fn from(id: SnowflakeId) -> Self {
        id.0
    }
}
