//! # Persistence Module
//!
//! Loads and saves the engine's state: the watched targets with their keywords,
//! the fingerprints already seen, and the log of reported matches.
//!
//! ## Key Components
//!
//! - `PersistenceStore`: trait the engine saves through after every mutation
//! - `Snapshot`: the complete persisted state
//! - `FileStore`: line-oriented text file, see [`file`] for the layout
//! - `MemoryStore`: in-memory store for tests

mod error;
pub mod file;
mod memory;

pub use error::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scan::Fingerprint;

/// A watched URL and its keywords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    /// Normalized URL, unique among targets
    pub url: String,

    /// Lower-cased keywords
    pub keywords: BTreeSet<String>,
}

impl WatchTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            keywords: BTreeSet::new(),
        }
    }
}

/// One reported match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub keyword: String,
}

/// A fingerprint recorded for a target, with the keyword that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRecord {
    pub url: String,
    pub keyword: String,
    pub fingerprint: Fingerprint,
}

/// Everything the engine persists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub targets: Vec<WatchTarget>,
    pub seen: Vec<SeenRecord>,
    pub log: Vec<LogEntry>,
}

/// Storage backend for engine state.
///
/// `load` must be the exact inverse of `save`.
pub trait PersistenceStore: Send + Sync + 'static {
    /// Load the last saved snapshot. A store that was never saved loads empty.
    fn load(&self) -> impl Future<Output = Result<Snapshot, StorageError>> + Send;

    /// Replace the stored state with `snapshot`
    fn save(&self, snapshot: &Snapshot) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<S: PersistenceStore> PersistenceStore for Arc<S> {
    fn load(&self) -> impl Future<Output = Result<Snapshot, StorageError>> + Send {
        self.as_ref().load()
    }

    fn save(&self, snapshot: &Snapshot) -> impl Future<Output = Result<(), StorageError>> + Send {
        self.as_ref().save(snapshot)
    }
}
