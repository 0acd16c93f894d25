//! Process-wide registry of live file caches.
//!
//! The manager holds caches weakly: the map never extends a cache's
//! lifetime, so the last strong reference dropping still runs the cache's
//! discard callback exactly once. Map mutation is a short critical section
//! distinct from any per-cache lock, and the map lock is never held across
//! an awaited per-cache operation.

use super::{DiscardCallback, FileCache};
use crate::error::FileError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};

/// Weakly-held `id → FileCache` registry.
pub struct FileCacheManager {
    caches: Mutex<HashMap<String, Weak<FileCache>>>,
    closed: AtomicBool,
}

impl FileCacheManager {
    pub fn new() -> Self {
        Self {
            caches: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Return the live cache for `id`, creating one when absent.
    ///
    /// **First writer wins**: when a live cache already exists for `id`, it
    /// is returned unchanged (`created = false`) and the supplied
    /// `cache_path`, `expire_after`, and `discard_callback` are dropped. A
    /// second caller must not assume its own callback will ever run —
    /// exactly one discard callback fires per cache.
    pub fn get_or_create_cache(
        &self,
        id: &str,
        cache_path: PathBuf,
        expire_after: Option<Duration>,
        discard_callback: Option<DiscardCallback>,
        init_active: bool,
    ) -> Result<(Arc<FileCache>, bool), FileError> {
        self.ensure_open()?;
        let cache = {
            let mut caches = self.caches.lock();
            if let Some(existing) = caches.get(id).and_then(Weak::upgrade) {
                debug!(id = %id, "returning existing live cache");
                return Ok((existing, false));
            }
            let cache = FileCache::new(id.to_string(), cache_path, expire_after, discard_callback);
            caches.insert(id.to_string(), Arc::downgrade(&cache));
            cache
        };
        if init_active {
            // Map lock released above; only the cache's own lock is touched.
            cache.activate()?;
        }
        debug!(id = %id, init_active, "created cache");
        Ok((cache, true))
    }

    /// Look up the live cache for `id`.
    ///
    /// Fails with [`FileError::CacheNotFound`] when no cache was ever
    /// registered, when the cache has already been collected, or after
    /// `close()` emptied the map. Dead entries are pruned on the way out.
    pub fn get_cache(&self, id: &str) -> Result<Arc<FileCache>, FileError> {
        let mut caches = self.caches.lock();
        match caches.get(id).and_then(Weak::upgrade) {
            Some(cache) => Ok(cache),
            None => {
                caches.remove(id);
                Err(FileError::CacheNotFound(id.to_string()))
            }
        }
    }

    /// Discard and deregister the cache for `id`, if one is still live.
    pub async fn remove_cache_if_exists(&self, id: &str) -> Result<(), FileError> {
        self.ensure_open()?;
        let cache = self.caches.lock().remove(id).and_then(|weak| weak.upgrade());
        if let Some(cache) = cache {
            cache.discard().await;
            debug!(id = %id, "removed and discarded cache");
        }
        Ok(())
    }

    /// Number of still-live caches in the map.
    pub fn live_count(&self) -> usize {
        self.caches
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Discard every live cache and clear the map. A second `close()` (or
    /// any later mutation) fails fast with [`FileError::ManagerClosed`].
    pub async fn close(&self) -> Result<(), FileError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(FileError::ManagerClosed);
        }
        let live: Vec<Arc<FileCache>> = {
            let mut caches = self.caches.lock();
            let live = caches.values().filter_map(Weak::upgrade).collect();
            caches.clear();
            live
        };
        let discarded = live.len();
        for cache in live {
            cache.discard().await;
        }
        info!(discarded, "file cache manager closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), FileError> {
        if self.is_closed() {
            return Err(FileError::ManagerClosed);
        }
        Ok(())
    }
}

impl Default for FileCacheManager {
    fn default() -> Self {
        Self::new()
    }
}
