//! Error types for the persistence module

use std::io;

use thiserror::Error;

/// Error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The save data could not be parsed
    #[error("Corrupt save data at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// Failure injected or reported by a non-file backend
    #[error("{0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn corrupt(line: usize, reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            line,
            reason: reason.into(),
        }
    }
}
