//! # Monitoring Engine
//!
//! Runs one polling worker per watched URL and turns their scans into
//! notifications, reporting every distinct keyword occurrence exactly once.
//!
//! ## Key Components
//!
//! - `Engine`: cloneable handle used to reconfigure and inspect the engine
//! - `EngineConfig`: poll interval, timeouts and buffer sizes
//! - `EngineError`: validation errors returned by mutating operations
//! - `TargetStatus`: per-URL progress as reported by `Engine::status`
//!
//! ## Architecture
//!
//! A single supervisor task owns the watched targets, the seen set, the match
//! log and the worker registry. `Engine` methods send it commands and await the
//! reply; workers send it scan reports. Because both arrive on one task, a
//! reconfiguration and a report are never applied concurrently. Snapshots of
//! the state are handed to a separate writer task after every change.
//!
//! ## Example
//!
//! ```no_run
//! use urlspy::engine::{Engine, EngineConfig};
//! use urlspy::fetch::HttpFetcher;
//! use urlspy::notify::TracingNotifier;
//! use urlspy::store::FileStore;
//!
//! # async fn run() -> urlspy::Result<()> {
//! let engine = Engine::start(
//!     HttpFetcher::new()?,
//!     TracingNotifier,
//!     FileStore::new(".urlspy/urlspy.txt"),
//!     EngineConfig::default(),
//! )
//! .await;
//!
//! let url = engine.add_url("example.com").await?;
//! engine.add_keyword(&url, "release").await?;
//! // ...
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub(crate) mod config;
mod error;
pub(crate) mod events;
mod state;
mod supervisor;
mod writer;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::EngineError;
pub use events::{Control, KeywordSet, ScanReport, TargetStatus, WorkerId};
pub use state::normalize_keyword;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::fetch::PageFetcher;
use crate::notify::Notifier;
use crate::store::{LogEntry, PersistenceStore, Snapshot, WatchTarget};
use crate::url_format::normalize_url;

use state::EngineState;
use supervisor::Supervisor;

const COMMAND_BUFFER: usize = 64;

/// Requests served by the supervisor task
pub(crate) enum Command {
    AddUrl {
        url: String,
        reply: oneshot::Sender<Result<String, EngineError>>,
    },
    RemoveUrl {
        url: String,
        reply: oneshot::Sender<bool>,
    },
    AddKeyword {
        url: String,
        keyword: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    RemoveKeyword {
        url: String,
        keyword: String,
        reply: oneshot::Sender<bool>,
    },
    RefreshAll,
    ReportError {
        message: String,
    },
    Targets {
        reply: oneshot::Sender<Vec<WatchTarget>>,
    },
    Status {
        reply: oneshot::Sender<Vec<TargetStatus>>,
    },
    Log {
        reply: oneshot::Sender<Vec<LogEntry>>,
    },
    RemoveLogEntry {
        index: usize,
        reply: oneshot::Sender<bool>,
    },
    ClearLog {
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running engine.
///
/// Clones share the same engine. When the last clone is dropped the engine
/// shuts down on its own, the same way [`Engine::shutdown`] does.
#[derive(Debug, Clone)]
pub struct Engine {
    commands: mpsc::Sender<Command>,
}

impl Engine {
    /// Load the saved state and start a worker for every saved target.
    ///
    /// A load failure is reported through the notifier and the engine starts
    /// with no targets.
    pub async fn start<F, N, S>(fetcher: F, notifier: N, store: S, config: EngineConfig) -> Engine
    where
        F: PageFetcher,
        N: Notifier,
        S: PersistenceStore,
    {
        let notifier = Arc::new(notifier);
        let snapshot = match store.load().await {
            Ok(snapshot) => {
                info!(
                    targets = snapshot.targets.len(),
                    seen = snapshot.seen.len(),
                    log = snapshot.log.len(),
                    "Loaded saved state"
                );
                snapshot
            }
            Err(e) => {
                error!(error = %e, "Failed to load saved state");
                notifier.on_error(&format!("Could not load saved state: {}", e));
                Snapshot::default()
            }
        };

        let (persist_tx, snapshots) = mpsc::unbounded_channel();
        let writer = tokio::spawn(writer::run(store, Arc::clone(&notifier), snapshots));

        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let supervisor = Supervisor::new(
            config,
            Arc::new(fetcher),
            notifier,
            EngineState::from_snapshot(snapshot),
            command_rx,
            persist_tx,
            writer,
        );
        tokio::spawn(supervisor.run());

        Engine { commands }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| EngineError::Stopped)?;
        response.await.map_err(|_| EngineError::Stopped)
    }

    /// Start watching a URL with no keywords.
    ///
    /// # Returns
    ///
    /// The normalized URL, which is the key for every other operation
    pub async fn add_url(&self, url: &str) -> Result<String, EngineError> {
        let url = normalize_url(url).map_err(EngineError::InvalidUrl)?;
        self.request(|reply| Command::AddUrl { url, reply }).await?
    }

    /// Stop watching a URL and forget everything seen on it.
    ///
    /// Returns false if the URL was not watched.
    pub async fn remove_url(&self, url: &str) -> bool {
        let Ok(url) = normalize_url(url) else {
            return false;
        };
        self.request(|reply| Command::RemoveUrl { url, reply })
            .await
            .unwrap_or(false)
    }

    /// Add a keyword to a watched URL.
    ///
    /// Occurrences already on the page are taken as known: only text that
    /// appears after the keyword was added is reported.
    pub async fn add_keyword(&self, url: &str, keyword: &str) -> Result<(), EngineError> {
        let url = normalize_url(url).map_err(|_| EngineError::UnknownUrl(url.to_string()))?;
        let keyword = normalize_keyword(keyword)?;
        self.request(|reply| Command::AddKeyword {
            url,
            keyword,
            reply,
        })
        .await?
    }

    /// Remove a keyword from a watched URL and forget its occurrences.
    ///
    /// Returns false if the keyword was not configured.
    pub async fn remove_keyword(&self, url: &str, keyword: &str) -> bool {
        let (Ok(url), Ok(keyword)) = (normalize_url(url), normalize_keyword(keyword)) else {
            return false;
        };
        self.request(|reply| Command::RemoveKeyword {
            url,
            keyword,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Make every worker poll now instead of at the end of its interval
    pub async fn refresh_all(&self) {
        if self.commands.send(Command::RefreshAll).await.is_err() {
            warn!("Refresh requested on a stopped engine");
        }
    }

    /// Forward an error message to the notifier
    pub async fn report_error(&self, message: &str) {
        let command = Command::ReportError {
            message: message.to_string(),
        };
        if self.commands.send(command).await.is_err() {
            warn!(%message, "Error reported on a stopped engine");
        }
    }

    /// Watched targets sorted by URL
    pub async fn targets(&self) -> Result<Vec<WatchTarget>, EngineError> {
        self.request(|reply| Command::Targets { reply }).await
    }

    /// Progress of every watched target, sorted by URL
    pub async fn status(&self) -> Result<Vec<TargetStatus>, EngineError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Reported matches, oldest first
    pub async fn log(&self) -> Result<Vec<LogEntry>, EngineError> {
        self.request(|reply| Command::Log { reply }).await
    }

    /// Remove the log entry at `index`. Returns false if out of range.
    pub async fn remove_log_entry(&self, index: usize) -> bool {
        self.request(|reply| Command::RemoveLogEntry { index, reply })
            .await
            .unwrap_or(false)
    }

    /// Empty the match log. Returns false if it was already empty.
    pub async fn clear_log(&self) -> bool {
        self.request(|reply| Command::ClearLog { reply })
            .await
            .unwrap_or(false)
    }

    /// Stop all workers and wait for the final save.
    ///
    /// Later calls, from this handle or any clone, return immediately.
    pub async fn shutdown(&self) {
        let _ = self.request(|reply| Command::Shutdown { reply }).await;
    }

    /// Whether the engine still accepts commands
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}
