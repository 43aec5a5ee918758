//! # urlspy - Keyword Watcher for Web Pages
//!
//! This crate watches a set of web pages for new text containing configured
//! keywords. Every page is polled by its own worker task; each distinct
//! occurrence of a keyword is reported exactly once, across restarts.
//!
//! ## Features
//!
//! - One long-lived polling worker per watched URL
//! - Runtime reconfiguration: add or remove URLs and keywords, force a refresh
//! - Baseline scans, so text already on a page when a keyword is added is not reported
//! - Duplicate suppression through content-window fingerprints
//! - Persistent state in a plain text save file
//! - Async API with Tokio
//!
//! ## Example
//!
//! ```rust,no_run
//! use urlspy::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = Engine::start(
//!         HttpFetcher::new()?,
//!         ConsoleNotifier::default(),
//!         FileStore::new(".urlspy/urlspy.txt"),
//!         EngineConfig::default(),
//!     )
//!     .await;
//!
//!     let url = engine.add_url("example.com").await?;
//!     engine.add_keyword(&url, "release").await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;
mod url_format;
mod worker;

pub mod engine;
pub mod fetch;
pub mod notify;
pub mod scan;
pub mod seen;
pub mod store;

pub use engine::{Engine, EngineConfig, EngineError};
pub use error::{Error, Result};
pub use url_format::normalize_url;

/// Re-export of the types most callers need
pub mod prelude {
    pub use crate::engine::{Engine, EngineConfig, EngineError, TargetStatus};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::fetch::{FetchError, HttpFetcher, PageFetcher};
    pub use crate::notify::{ConsoleNotifier, Notifier, TracingNotifier};
    pub use crate::store::{FileStore, PersistenceStore, Snapshot, StorageError};
}
