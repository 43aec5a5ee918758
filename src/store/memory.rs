//! In-memory store, mainly for tests

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::store::error::StorageError;
use crate::store::{PersistenceStore, Snapshot};

#[derive(Debug, Default)]
struct Inner {
    snapshot: Snapshot,
    saves: usize,
    fail_load: bool,
    fail_saves: bool,
}

/// Store that keeps the last saved snapshot in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that loads `snapshot`
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                snapshot,
                ..Default::default()
            })),
        }
    }

    /// Last saved snapshot
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.lock().await.snapshot.clone()
    }

    /// Number of successful saves
    pub async fn save_count(&self) -> usize {
        self.inner.lock().await.saves
    }

    /// Make `load` fail
    pub async fn set_fail_load(&self, fail: bool) {
        self.inner.lock().await.fail_load = fail;
    }

    /// Make every `save` fail
    pub async fn set_fail_saves(&self, fail: bool) {
        self.inner.lock().await.fail_saves = fail;
    }
}

impl PersistenceStore for MemoryStore {
    async fn load(&self) -> Result<Snapshot, StorageError> {
        let inner = self.inner.lock().await;
        if inner.fail_load {
            return Err(StorageError::Backend("load failed".to_string()));
        }
        Ok(inner.snapshot.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_saves {
            return Err(StorageError::Backend("save failed".to_string()));
        }
        inner.snapshot = snapshot.clone();
        inner.saves += 1;
        Ok(())
    }
}
