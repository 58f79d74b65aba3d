//! Error types for fluxlsm
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using FluxError
pub type Result<T> = std::result::Result<T, FluxError>;

/// Unified error type for fluxlsm operations
#[derive(Debug, Error)]
pub enum FluxError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    /// Rejected at write time, never persisted
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Normal outcome of a point read that found nothing
    #[error("Key not found: {key}")]
    NotFound { key: u64 },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Compaction Errors
    // -------------------------------------------------------------------------
    #[error("Compaction error: {0}")]
    Compaction(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FluxError {
    /// True for the non-fatal "nothing stored under this key" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, FluxError::NotFound { .. })
    }
}

impl From<bincode::Error> for FluxError {
    fn from(e: bincode::Error) -> Self {
        FluxError::Serialization(e.to_string())
    }
}
