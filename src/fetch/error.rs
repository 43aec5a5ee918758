//! Error types for the fetch module

use thiserror::Error;

/// Error type for page fetches
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The fetch did not complete in time
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    /// Text extraction error
    #[error("Content extraction error: {0}")]
    Extraction(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Classify a reqwest error, separating timeouts from other failures
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Http(err)
        }
    }
}
