//! The incursion check job: snapshot, reconcile, broadcast.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::diff::DiffEngine;
use crate::notify::NotifyBackend;
use crate::render::Renderer;
use crate::snapshot::SnapshotService;

struct WatchState {
    snapshots: SnapshotService,
    diff: DiffEngine,
}

/// Owns the snapshot service and diff engine behind one lock, so overlapping
/// invocations of `check` or `listing` run one after another.
pub struct IncursionWatch {
    state: Mutex<WatchState>,
    renderer: Renderer,
    notifier: Arc<dyn NotifyBackend>,
}

impl IncursionWatch {
    pub fn new(
        snapshots: SnapshotService,
        renderer: Renderer,
        notifier: Arc<dyn NotifyBackend>,
    ) -> Self {
        Self {
            state: Mutex::new(WatchState {
                snapshots,
                diff: DiffEngine::new(renderer),
            }),
            renderer,
            notifier,
        }
    }

    /// Seed the diff engine from the persisted list so the first refresh
    /// after a restart is compared instead of only priming.
    pub async fn restore(&self) -> usize {
        let mut state = self.state.lock().await;
        match state.snapshots.restore().await {
            Some(incursions) => {
                let count = incursions.len();
                state.diff.seed(incursions);
                count
            }
            None => 0,
        }
    }

    /// One scheduled check. Delivery failures are logged, not returned.
    pub async fn check(&self) -> anyhow::Result<()> {
        let message = {
            let mut state = self.state.lock().await;
            let snapshot = state.snapshots.get_snapshot().await;
            if !snapshot.refreshed {
                debug!("Incursion list not refreshed, skipping comparison");
                return Ok(());
            }
            state.diff.reconcile(&snapshot)
        };

        if let Some(message) = message {
            info!(lines = message.lines().count(), "Broadcasting incursion changes");
            if let Err(e) = self.notifier.send(&message).await {
                warn!(error = %e, "Failed to broadcast incursion changes");
            }
        }
        Ok(())
    }

    /// Human-readable listing of current incursions. Honours the staleness
    /// window; a cached answer is still a valid listing.
    ///
    /// A refresh triggered here is never compared. The diff engine keeps its
    /// own `previous`, so the next compared fetch still diffs against the
    /// last compared snapshot.
    pub async fn listing(&self) -> String {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.snapshots.get_snapshot().await
        };
        self.renderer.listing(&snapshot.incursions)
    }
}
