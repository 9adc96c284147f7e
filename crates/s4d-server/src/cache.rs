//! In-memory response cache.
//!
//! Memoizes [`FileResolver`] results per resolved path. Each key holds a
//! [`OnceCell`], so concurrent requests for the same path wait on a single
//! resolution instead of reading the file again. A failed resolution leaves
//! the cell empty and is retried by the next request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::resolver::{CacheEntry, FileResolver, INDEX_FILE, ResolveError, Target};

type Slot = Arc<OnceCell<CacheEntry>>;

/// Cache of resolved responses keyed by filesystem path.
pub(crate) struct ResponseCache {
    resolver: FileResolver,
    entries: Mutex<HashMap<PathBuf, Slot>>,
    resolutions: AtomicUsize,
}

impl ResponseCache {
    pub(crate) fn new(resolver: FileResolver) -> Self {
        Self {
            resolver,
            entries: Mutex::new(HashMap::new()),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Resolve a request path, applying the SPA fallback on not-found.
    pub(crate) async fn get_or_resolve(
        &self,
        request_path: &str,
    ) -> Result<CacheEntry, ResolveError> {
        let path = match self.resolver.locate(request_path)? {
            Target::Agent => return Ok(self.resolver.agent()),
            Target::File(path) => path,
        };

        match self.load_cached(&path).await {
            Err(err) if err.is_not_found() => match self.resolver.spa_fallback(request_path) {
                Some(index) if index != path => {
                    tracing::debug!(path = %request_path, "Serving SPA fallback");
                    self.load_cached(&index).await
                }
                _ => Err(err),
            },
            result => result,
        }
    }

    async fn load_cached(&self, path: &Path) -> Result<CacheEntry, ResolveError> {
        let slot = {
            let mut entries = self.entries.lock().unwrap();
            Arc::clone(entries.entry(path.to_path_buf()).or_default())
        };

        let result = slot
            .get_or_try_init(|| {
                self.resolutions.fetch_add(1, Ordering::Relaxed);
                self.resolver.load(path)
            })
            .await;

        match result {
            Ok(entry) => Ok(entry.clone()),
            Err(err) => {
                self.forget_failed(path, &slot);
                Err(err)
            }
        }
    }

    /// Drop an empty slot so failed paths do not accumulate.
    fn forget_failed(&self, path: &Path, slot: &Slot) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(current) = entries.get(path)
            && Arc::ptr_eq(current, slot)
            && !current.initialized()
        {
            entries.remove(path);
        }
    }

    /// Invalidate the entry for a filesystem path.
    ///
    /// Also drops the directory key when `path` is an index document, and
    /// every entry below `path` when it was a directory.
    pub(crate) fn invalidate(&self, path: &Path) {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();

        entries.remove(path);
        if path.file_name().is_some_and(|name| name == INDEX_FILE)
            && let Some(dir) = path.parent()
        {
            entries.remove(dir);
        }
        entries.retain(|key, _| !key.starts_with(path));

        tracing::debug!(
            path = %path.display(),
            removed = before - entries.len(),
            "Invalidated cache"
        );
    }
}
