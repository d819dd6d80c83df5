//! Error types for the masking engine.

use dumpmask_core::ConfigError;
use thiserror::Error;

/// Errors that can occur while compiling rules or masking a stream.
#[derive(Debug, Error)]
pub enum MaskError {
    /// Settings or rules file could not be used.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// SQL parsing failed. The rewriter recovers from this by passing the
    /// line through unchanged.
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    /// A template source failed to compile.
    #[error("invalid template for {table}.{column}: {reason}")]
    Template {
        table: String,
        column: String,
        reason: String,
    },

    /// The hashing backend failed.
    #[error("hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// An input line exceeded the configured ceiling.
    #[error("line {line} exceeds the maximum line size of {max_bytes} bytes")]
    LineTooLong { line: u64, max_bytes: usize },

    /// Reading input or writing output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A masking worker panicked or was cancelled.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for MaskError {
    fn from(e: tokio::task::JoinError) -> Self {
        MaskError::Worker(e.to_string())
    }
}
