//! Error types for slr

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed vector value: {0}")]
    MalformedVectorValue(String),

    #[error("Truncated record: {len} bytes is not a multiple of {record_size}")]
    TruncatedRecord { len: usize, record_size: usize },

    #[error("Dimension mismatch: expected at most {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Dimension {dimension} out of range for dimensionality {dimensionality}")]
    DimensionOutOfRange { dimension: u64, dimensionality: u32 },

    #[error("Zero activation at dimension {0}")]
    ZeroActivation(u32),

    #[error("Negative activation at dimension {0}")]
    NegativeActivation(u32),

    #[error("Weight overflow: {0}")]
    WeightOverflow(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector source error: {0}")]
    VectorSource(String),

    #[error("Empty document: {0}")]
    EmptyDocument(String),

    #[error("Duplicate document: {0}")]
    DuplicateDocument(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Index corruption: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
