//! # Page Fetch Module
//!
//! Retrieves the visible text of a watched page. The engine treats fetching as a
//! black box: a URL goes in, lower-cased page text or a [`FetchError`] comes out.
//!
//! ## Key Components
//!
//! - `PageFetcher`: the trait workers fetch through
//! - `HttpFetcher`: reqwest-based implementation with HTML text extraction
//! - `ScriptedFetcher`: in-memory implementation for tests and demos
//! - `FetcherConfig`: timeout, user agent and excluded elements

mod config;
mod error;
mod extract;
mod http;
mod scripted;

pub use config::{FetcherConfig, FetcherConfigBuilder};
pub use error::FetchError;
pub use extract::visible_text;
pub use http::HttpFetcher;
pub use scripted::ScriptedFetcher;

use std::future::Future;
use std::sync::Arc;

/// Source of page text for workers.
///
/// Implementations must bound how long a single fetch can take and return
/// [`FetchError::Timeout`] when the bound is exceeded.
pub trait PageFetcher: Send + Sync + 'static {
    /// Fetch `url` and return its visible text, lower-cased
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

impl<F: PageFetcher> PageFetcher for Arc<F> {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send {
        self.as_ref().fetch(url)
    }
}
