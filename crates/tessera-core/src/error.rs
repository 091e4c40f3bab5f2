//! Error types for core encoding and naming operations.
//!
//! ## Error Categories
//!
//! ### Wire Integrity
//! - `InvalidMagic`: batch stream doesn't start with the expected magic bytes
//! - `UnsupportedVersion`: stream was written by a newer wire version
//! - `CrcMismatch`: frame corruption detected via checksum
//! - `Truncated`: frame or value ended before its declared length
//!
//! ### Decoding
//! - `MalformedBatch`: structurally invalid record batch payload
//!
//! ### Naming
//! - `InvalidTopicName` / `InvalidSequenceName`: resource name violations
//!
//! All fallible functions in this crate return `Result<T>` aliased to
//! `Result<T, Error>` so `?` propagation works throughout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Unsupported wire version: {0}")]
    UnsupportedVersion(u16),

    #[error("CRC mismatch")]
    CrcMismatch,

    #[error("Truncated input: {context}")]
    Truncated { context: &'static str },

    #[error("Malformed record batch: {0}")]
    MalformedBatch(String),

    #[error("Invalid topic name '{0}'")]
    InvalidTopicName(String),

    #[error("Invalid characters '/' in sequence name '{0}'")]
    InvalidSequenceName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
