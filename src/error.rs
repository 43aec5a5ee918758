//! Error types for the urlspy crate

use thiserror::Error;

use crate::engine::EngineError;
use crate::fetch::FetchError;
use crate::store::StorageError;

/// Result type for urlspy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for urlspy operations
#[derive(Debug, Error)]
pub enum Error {
    /// A mutation was rejected by the engine
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Fetching a watched page failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Loading or saving persisted state failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
