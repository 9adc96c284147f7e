//! Live reload manager.
//!
//! Owns the webroot watcher and is the sole consumer of its changes: each
//! change invalidates the response cache and is then broadcast to browsers.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::hub::{BroadcastHub, ChangeEvent};
use super::watcher::{ChangeWatcher, PathChange, WatchOptions};
use crate::cache::ResponseCache;

/// Running watch → invalidate → broadcast pipeline.
pub(crate) struct LiveReloadManager {
    watcher: ChangeWatcher,
    pipeline: JoinHandle<()>,
}

impl LiveReloadManager {
    /// Start watching `webroot` and processing changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file watcher cannot be created.
    pub(crate) fn start(
        webroot: &Path,
        options: WatchOptions,
        cache: Arc<ResponseCache>,
        hub: Arc<BroadcastHub>,
    ) -> Result<Self, notify::Error> {
        let (watcher, changes) = ChangeWatcher::start(webroot, options)?;
        let pipeline = tokio::spawn(process_changes(changes, cache, hub));

        Ok(Self { watcher, pipeline })
    }

    /// Stop watching. Changes already queued are discarded.
    pub(crate) fn stop(self) {
        self.pipeline.abort();
        self.watcher.stop();
    }
}

async fn process_changes(
    mut changes: mpsc::Receiver<PathChange>,
    cache: Arc<ResponseCache>,
    hub: Arc<BroadcastHub>,
) {
    while let Some(change) = changes.recv().await {
        handle_change(&change, &cache, &hub);
    }
}

/// Apply one change. Invalidation happens before the broadcast so clients
/// reacting to the event re-resolve from disk.
fn handle_change(change: &PathChange, cache: &ResponseCache, hub: &BroadcastHub) {
    let start = Instant::now();

    cache.invalidate(&change.path);
    let clients = hub.broadcast(&ChangeEvent::new(change.relative.clone()));

    tracing::info!(
        path = %change.relative,
        kind = ?change.kind,
        clients,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Live reload event processed"
    );
}
