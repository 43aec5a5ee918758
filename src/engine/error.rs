//! Error types for engine mutations

use thiserror::Error;

/// Errors returned synchronously by [`Engine`](super::Engine) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The URL is malformed or not a web URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL is already being watched
    #[error("{0} is already being watched")]
    AlreadyWatched(String),

    /// The URL is not being watched
    #[error("{0} is not being watched")]
    UnknownUrl(String),

    /// The keyword is empty or contains a reserved character
    #[error("Invalid keyword: {0}")]
    InvalidKeyword(String),

    /// The keyword is already configured for the URL
    #[error("\"{keyword}\" is already a keyword for {url}")]
    DuplicateKeyword { url: String, keyword: String },

    /// The engine has been shut down
    #[error("Engine is stopped")]
    Stopped,
}
