//! The crate's single error type, composing every component's failure modes.
//!
//! Mirrors the teacher's habit of one `thiserror` enum per crate rather than
//! per-module error types — `Result<T>` below is the alias used everywhere
//! `std::result::Result<T, GbfError>` would otherwise be spelled out.

use crate::json::JsonError;

#[derive(Debug, thiserror::Error)]
pub enum GbfError {
    #[error("magic bytes mismatch: expected {expected:?}, found {found:?}")]
    MagicMismatch { expected: [u8; 8], found: [u8; 8] },

    #[error("header length {0} is invalid (zero, or larger than the file)")]
    HeaderLengthInvalid(u64),

    #[error("header JSON is invalid: {0}")]
    HeaderJsonInvalid(#[from] JsonError),

    #[error("header CRC mismatch: expected {expected}, got {got}")]
    HeaderCrcMismatch { expected: String, got: String },

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported endianness: {0}")]
    UnsupportedEndianness(String),

    #[error("unsupported element order: {0}")]
    UnsupportedOrder(String),

    #[error("field layout is invalid: {0}")]
    FieldLayoutInvalid(String),

    #[error("field '{path}' CRC mismatch: expected {expected:08x}, got {got:08x}")]
    FieldCrcMismatch { path: String, expected: u32, got: u32 },

    #[error("decompression failed for field: {0}")]
    DecompressionFailed(String),

    #[error("variable not found: {path}")]
    VarNotFound { path: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, GbfError>;
