//! Facade binding files, caches, and the registry together.
//!
//! One `FileManager` is constructed by the orchestrating caller and threaded
//! through every component that needs file access; there is no ambient or
//! global instance. The manager owns a lazily created temp directory that
//! holds staged uploads and cache mirror files, and removes it on close.

use crate::cache::{DiscardCallback, FileCacheManager};
use crate::client::RemoteFileClient;
use crate::config::FileManagerOptions;
use crate::error::FileError;
use crate::file::remote::{CachedRemoteFile, RemoteFile};
use crate::file::{File, FileMetadata, LocalFile};
use crate::fileid::{self, FileIdKind};
use crate::registry::FileRegistry;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where `create_file_from_bytes` lands the staged bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDestination {
    Local,
    Remote,
}

/// Facade over the registry, the cache manager, and an optional remote
/// client.
pub struct FileManager {
    registry: FileRegistry,
    caches: FileCacheManager,
    client: Option<Arc<dyn RemoteFileClient>>,
    options: FileManagerOptions,
    temp_dir: Mutex<Option<TempDir>>,
    closed: AtomicBool,
}

impl FileManager {
    /// Manager without a remote backend; remote operations fail with
    /// [`FileError::Unsupported`].
    pub fn new(options: FileManagerOptions) -> Self {
        Self::build(None, options)
    }

    pub fn with_client(client: Arc<dyn RemoteFileClient>, options: FileManagerOptions) -> Self {
        Self::build(Some(client), options)
    }

    fn build(client: Option<Arc<dyn RemoteFileClient>>, options: FileManagerOptions) -> Self {
        Self {
            registry: FileRegistry::new(options.allow_overwrite),
            caches: FileCacheManager::new(),
            client,
            options,
            temp_dir: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Register the file at `path` as a local file.
    ///
    /// A missing or non-regular source fails with
    /// [`FileError::FileNotFound`]; that is fatal and never retried here.
    pub async fn create_local_file_from_path(
        &self,
        path: &Path,
        purpose: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Arc<LocalFile>, FileError> {
        self.ensure_open()?;
        let stat = match tokio::fs::metadata(path).await {
            Ok(stat) => stat,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileError::FileNotFound(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        if !stat.is_file() {
            return Err(FileError::FileNotFound(path.display().to_string()));
        }

        let meta = FileMetadata {
            id: fileid::generate_file_id(FileIdKind::Local),
            filename: file_name_of(path),
            byte_size: stat.len(),
            created_at: Utc::now(),
            purpose: purpose.to_string(),
            metadata,
        };
        let file = Arc::new(LocalFile::new(meta, path.to_path_buf()));
        self.registry.register(file.clone())?;
        debug!(id = %file.id(), path = %path.display(), "registered local file");
        Ok(file)
    }

    /// Upload the file at `path` and register the resulting remote handle,
    /// cache-wrapped when caching is enabled.
    pub async fn create_remote_file_from_path(
        &self,
        path: &Path,
        purpose: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Arc<dyn File>, FileError> {
        self.ensure_open()?;
        let client = Arc::clone(self.remote_client()?);
        let descriptor = client.upload_file(path, purpose, metadata).await?;
        let remote = RemoteFile::new(descriptor.into_metadata(), client);
        let file = self.wrap_remote(remote)?;
        self.registry.register(file.clone())?;
        info!(id = %file.id(), path = %path.display(), "uploaded and registered remote file");
        Ok(file)
    }

    /// Stage `bytes` into the managed temp directory, then register the
    /// staged file locally or upload it, per `destination`.
    pub async fn create_file_from_bytes(
        &self,
        bytes: &[u8],
        filename: &str,
        purpose: &str,
        metadata: HashMap<String, String>,
        destination: FileDestination,
    ) -> Result<Arc<dyn File>, FileError> {
        self.ensure_open()?;
        let staging_dir = self
            .temp_dir_path()?
            .join(format!("staged-{}", Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&staging_dir).await?;
        let staged = staging_dir.join(file_name_of(Path::new(filename)));
        tokio::fs::write(&staged, bytes).await?;
        debug!(path = %staged.display(), bytes = bytes.len(), "staged bytes");

        match destination {
            FileDestination::Local => {
                let file: Arc<dyn File> = self
                    .create_local_file_from_path(&staged, purpose, metadata)
                    .await?;
                Ok(file)
            }
            FileDestination::Remote => {
                self.create_remote_file_from_path(&staged, purpose, metadata)
                    .await
            }
        }
    }

    /// Fetch the descriptor for an already-uploaded file and register a
    /// handle for it, replacing any stale entry under the same id.
    pub async fn retrieve_remote_file_by_id(&self, id: &str) -> Result<Arc<dyn File>, FileError> {
        self.ensure_open()?;
        let client = Arc::clone(self.remote_client()?);
        let descriptor = client.retrieve_file(id).await?;
        let remote = RemoteFile::new(descriptor.into_metadata(), client);
        let file = self.wrap_remote(remote)?;
        self.registry.register_or_replace(file.clone());
        debug!(id = %id, "retrieved and registered remote file");
        Ok(file)
    }

    /// Temporary direct-access URL for a remote file, for callers emitting
    /// `<file>..</file><url>..</url>` references.
    pub async fn create_temporary_url(
        &self,
        id: &str,
        ttl: Duration,
    ) -> Result<String, FileError> {
        self.ensure_open()?;
        self.remote_client()?.create_temporary_url(id, ttl).await
    }

    pub fn register_file(&self, file: Arc<dyn File>) -> Result<(), FileError> {
        self.ensure_open()?;
        self.registry.register(file)
    }

    pub fn unregister_file(&self, id: &str) -> Result<Arc<dyn File>, FileError> {
        self.ensure_open()?;
        self.registry.unregister(id)
    }

    pub fn look_up_file_by_id(&self, id: &str) -> Result<Arc<dyn File>, FileError> {
        self.registry.look_up(id)
    }

    pub fn list_registered_files(&self) -> Vec<Arc<dyn File>> {
        self.registry.list()
    }

    pub fn cache_manager(&self) -> &FileCacheManager {
        &self.caches
    }

    /// Idempotent shutdown: discard every live cache, clear the registry,
    /// and remove the managed temp directory. Later calls do nothing.
    pub async fn close(&self) -> Result<(), FileError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.caches.close().await?;
        self.registry.clear();
        let temp = self.temp_dir.lock().take();
        if let Some(dir) = temp {
            let path = dir.path().to_path_buf();
            dir.close()?;
            debug!(path = %path.display(), "removed managed temp directory");
        }
        info!("file manager closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Bind a cache to a remote file when caching is enabled. The cache
    /// mirror lives inside the managed temp directory and its discard
    /// callback deletes that file.
    fn wrap_remote(&self, remote: RemoteFile) -> Result<Arc<dyn File>, FileError> {
        if !self.options.caching_enabled {
            return Ok(Arc::new(remote));
        }
        let id = remote.metadata().id.clone();
        let cache_path = self.temp_dir_path()?.join(format!("{}.cache", id));
        let callback = remove_file_callback(id.clone(), cache_path.clone());
        let (cache, created) = self.caches.get_or_create_cache(
            &id,
            cache_path,
            self.options.cache_expire_after(),
            Some(callback),
            false,
        )?;
        if !created {
            debug!(id = %id, "reusing live cache for remote file");
        }
        Ok(Arc::new(CachedRemoteFile::new(remote, cache)))
    }

    /// Lazily created scratch directory; removed on close.
    fn temp_dir_path(&self) -> Result<PathBuf, FileError> {
        let mut slot = self.temp_dir.lock();
        if let Some(dir) = slot.as_ref() {
            return Ok(dir.path().to_path_buf());
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix("filestash-");
        let dir = match &self.options.temp_dir_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created managed temp directory");
        *slot = Some(dir);
        Ok(path)
    }

    fn remote_client(&self) -> Result<&Arc<dyn RemoteFileClient>, FileError> {
        self.client
            .as_ref()
            .ok_or_else(|| FileError::Unsupported("no remote file client configured".to_string()))
    }

    fn ensure_open(&self) -> Result<(), FileError> {
        if self.is_closed() {
            return Err(FileError::ManagerClosed);
        }
        Ok(())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

fn remove_file_callback(id: String, path: PathBuf) -> DiscardCallback {
    Box::new(move || {
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(id = %id, error = %err, "failed to remove cache file on discard");
            }
        }
    })
}
