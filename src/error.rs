//! Error types for rust_mpranalyze

use thiserror::Error;

/// Main error type for MPRA analysis operations
#[derive(Error, Debug)]
pub enum MpraError {
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Invalid count matrix: {reason}")]
    InvalidCounts { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Degenerate library '{library}': zero total counts, depth factor undefined")]
    DegenerateLibrary { library: String },

    #[error("Invalid design matrix: {reason}")]
    InvalidDesignMatrix { reason: String },

    #[error("Invalid formula '{formula}': {reason}")]
    InvalidFormula { formula: String, reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for MPRA analysis operations
pub type Result<T> = std::result::Result<T, MpraError>;
