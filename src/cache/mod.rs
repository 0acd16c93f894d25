//! Per-file cached-content holder.
//!
//! A [`FileCache`] mirrors the authoritative bytes of one remote file at a
//! local path. It is a single-writer state machine with three states —
//! inactive, active, discarded (terminal) — where "active" means the on-disk
//! bytes are guaranteed to mirror the source as of the last fetch/update.
//! Fetches and updates are serialized by one per-cache async mutex so
//! concurrent callers coalesce onto a single physical fetch; timed expiry is
//! delivered as just another event against the cheap flag lock and only ever
//! deactivates, never discards.

pub mod manager;

pub use manager::FileCacheManager;

use crate::error::FileError;
use parking_lot::Mutex;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Callback invoked exactly once when a cache is discarded, releasing its
/// on-disk footprint.
pub type DiscardCallback = Box<dyn FnOnce() + Send + 'static>;

struct CacheFlags {
    active: bool,
    discarded: bool,
    /// Bumped on every activation, deactivation, and discard; a stale expiry
    /// timer that observes a different epoch does nothing.
    epoch: u64,
    timer: Option<JoinHandle<()>>,
}

/// Cached-content holder for one file id.
pub struct FileCache {
    id: String,
    cache_path: PathBuf,
    expire_after: Option<Duration>,
    /// Cheap state flags; the expiry timer only ever touches these.
    flags: Mutex<CacheFlags>,
    /// Serializes fetch/update I/O. Never taken from the timer task.
    io_lock: tokio::sync::Mutex<()>,
    discard_callback: Mutex<Option<DiscardCallback>>,
}

impl FileCache {
    /// Create an inactive cache. The expiry timer needs a weak self-handle,
    /// so caches always live behind an `Arc`.
    pub fn new(
        id: String,
        cache_path: PathBuf,
        expire_after: Option<Duration>,
        discard_callback: Option<DiscardCallback>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            cache_path,
            expire_after,
            flags: Mutex::new(CacheFlags {
                active: false,
                discarded: false,
                epoch: 0,
                timer: None,
            }),
            io_lock: tokio::sync::Mutex::new(()),
            discard_callback: Mutex::new(discard_callback),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn is_active(&self) -> bool {
        self.flags.lock().active
    }

    pub fn is_discarded(&self) -> bool {
        self.flags.lock().discarded
    }

    /// Mark the on-disk bytes authoritative and (re)arm the expiry timer.
    ///
    /// Any prior timer is cancelled and replaced. Fails with
    /// [`FileError::CacheDiscarded`] once discarded.
    pub fn activate(self: &Arc<Self>) -> Result<(), FileError> {
        let mut flags = self.flags.lock();
        if flags.discarded {
            return Err(FileError::CacheDiscarded(self.id.clone()));
        }
        flags.active = true;
        flags.epoch += 1;
        if let Some(timer) = flags.timer.take() {
            timer.abort();
        }
        if let Some(expire_after) = self.expire_after {
            let weak = Arc::downgrade(self);
            let epoch = flags.epoch;
            flags.timer = Some(tokio::spawn(expiry_timer(weak, epoch, expire_after)));
        }
        Ok(())
    }

    /// Drop the authoritative claim on the on-disk bytes; the file itself is
    /// untouched. Cancels any pending timer. No-op when already inactive.
    pub fn deactivate(&self) {
        let mut flags = self.flags.lock();
        flags.active = false;
        flags.epoch += 1;
        if let Some(timer) = flags.timer.take() {
            timer.abort();
        }
    }

    /// Return the cached bytes, fetching them first if the cache is inactive.
    ///
    /// Under the per-cache mutex: a discarded cache fails immediately; an
    /// active cache serves the on-disk bytes without touching the source; an
    /// inactive cache awaits `reader()` for the authoritative bytes,
    /// persists them atomically, then activates. Concurrent callers against
    /// the same inactive cache block on the mutex and all observe the single
    /// fetch's result. Reader errors propagate unchanged and leave the cache
    /// inactive; activation is the last step, so a cancelled call never
    /// leaves a half-activated cache.
    pub async fn fetch_or_update_contents<F, Fut>(
        self: &Arc<Self>,
        reader: F,
    ) -> Result<Vec<u8>, FileError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FileError>>,
    {
        let _guard = self.io_lock.lock().await;
        if self.is_discarded() {
            return Err(FileError::CacheDiscarded(self.id.clone()));
        }
        if self.is_active() {
            debug!(id = %self.id, "serving contents from active mirror");
            return Ok(tokio::fs::read(&self.cache_path).await?);
        }
        let bytes = reader().await?;
        write_atomic(&self.cache_path, &bytes).await?;
        self.activate()?;
        debug!(id = %self.id, bytes = bytes.len(), "fetched and activated cache");
        Ok(bytes)
    }

    /// Refetch unconditionally, for callers that know the source changed.
    ///
    /// Deactivates, awaits `reader()`, persists, reactivates — even while
    /// active. Fails immediately once discarded.
    pub async fn update_contents<F, Fut>(
        self: &Arc<Self>,
        reader: F,
    ) -> Result<Vec<u8>, FileError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FileError>>,
    {
        let _guard = self.io_lock.lock().await;
        if self.is_discarded() {
            return Err(FileError::CacheDiscarded(self.id.clone()));
        }
        self.deactivate();
        let bytes = reader().await?;
        write_atomic(&self.cache_path, &bytes).await?;
        self.activate()?;
        debug!(id = %self.id, bytes = bytes.len(), "updated and reactivated cache");
        Ok(bytes)
    }

    /// Terminal teardown: cancels the timer, fires the discard callback
    /// exactly once, and flips inactive. Idempotent; every later
    /// state-mutating call fails with [`FileError::CacheDiscarded`].
    pub async fn discard(&self) {
        let _guard = self.io_lock.lock().await;
        self.discard_now();
    }

    /// Flag-level discard shared with the `Drop` leak detector. Does not
    /// take the I/O mutex. Taking the callback out of its slot detaches the
    /// finalizer path, so the two paths cannot both fire it.
    fn discard_now(&self) {
        {
            let mut flags = self.flags.lock();
            if flags.discarded {
                return;
            }
            flags.discarded = true;
            flags.active = false;
            flags.epoch += 1;
            if let Some(timer) = flags.timer.take() {
                timer.abort();
            }
        }
        if let Some(callback) = self.discard_callback.lock().take() {
            callback();
        }
        debug!(id = %self.id, "cache discarded");
    }
}

impl Drop for FileCache {
    /// Leak detector, not the primary teardown mechanism: owners are
    /// expected to call `discard()` explicitly.
    fn drop(&mut self) {
        if !self.flags.get_mut().discarded {
            warn!(id = %self.id, "cache dropped without an explicit discard, discarding now");
            self.discard_now();
        }
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = self.flags.lock();
        f.debug_struct("FileCache")
            .field("id", &self.id)
            .field("cache_path", &self.cache_path)
            .field("active", &flags.active)
            .field("discarded", &flags.discarded)
            .finish_non_exhaustive()
    }
}

/// One-shot expiry. Holds only a weak handle so a pending timer never keeps
/// a cache alive, and re-checks state under the flag lock before flipping
/// `active` off. Deactivates only — never discards, never takes the I/O
/// mutex.
async fn expiry_timer(cache: Weak<FileCache>, epoch: u64, after: Duration) {
    tokio::time::sleep(after).await;
    let Some(cache) = cache.upgrade() else {
        return;
    };
    let mut flags = cache.flags.lock();
    if flags.discarded || flags.epoch != epoch {
        return;
    }
    flags.active = false;
    flags.timer = None;
    debug!(id = %cache.id, "cache expired, deactivated");
}

/// Stage into a uniquely named sibling file, then rename over the target, so
/// a crash mid-write can never leave a cache falsely marked active over
/// half-written bytes.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
    let dir = path.parent().ok_or_else(|| {
        FileError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "cache path has no parent directory",
        ))
    })?;
    let staged = dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
    let mut out = tokio::fs::File::create(&staged).await?;
    out.write_all(bytes).await?;
    out.flush().await?;
    out.sync_all().await?;
    drop(out);
    if let Err(err) = tokio::fs::rename(&staged, path).await {
        let _ = tokio::fs::remove_file(&staged).await;
        return Err(err.into());
    }
    Ok(())
}
