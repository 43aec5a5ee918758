//! Background task that saves snapshots.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::notify::Notifier;
use crate::store::{PersistenceStore, Snapshot};

/// Save snapshots until the sending side is dropped.
///
/// Snapshots queued while a save is in progress are coalesced to the newest,
/// so a slow store only ever falls one snapshot behind.
pub(crate) async fn run<S, N>(
    store: S,
    notifier: Arc<N>,
    mut snapshots: mpsc::UnboundedReceiver<Snapshot>,
) where
    S: PersistenceStore,
    N: Notifier,
{
    while let Some(mut snapshot) = snapshots.recv().await {
        let mut skipped = 0;
        while let Ok(newer) = snapshots.try_recv() {
            snapshot = newer;
            skipped += 1;
        }

        match store.save(&snapshot).await {
            Ok(()) => debug!(
                targets = snapshot.targets.len(),
                seen = snapshot.seen.len(),
                skipped,
                "Saved state"
            ),
            Err(e) => {
                error!(error = %e, "Failed to save state");
                notifier.on_error(&format!("Could not save state: {}", e));
            }
        }
    }
    debug!("Persistence writer finished");
}
