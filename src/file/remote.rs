//! Remote file handles and their cached composition.

use super::{File, FileMetadata};
use crate::cache::FileCache;
use crate::client::RemoteFileClient;
use crate::error::FileError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// File held by a remote backend; content operations delegate to the
/// owning [`RemoteFileClient`].
#[derive(Clone)]
pub struct RemoteFile {
    meta: FileMetadata,
    client: Arc<dyn RemoteFileClient>,
}

impl RemoteFile {
    pub fn new(meta: FileMetadata, client: Arc<dyn RemoteFileClient>) -> Self {
        Self { meta, client }
    }

    pub fn client(&self) -> &Arc<dyn RemoteFileClient> {
        &self.client
    }

    /// Delete the file on the backend. Fails with
    /// [`FileError::Unsupported`] when the backend cannot delete.
    pub async fn delete(&self) -> Result<(), FileError> {
        self.client.delete_file(&self.meta.id).await
    }

    /// Create a URL granting temporary direct access to the contents.
    pub async fn create_temporary_url(&self, ttl: Duration) -> Result<String, FileError> {
        self.client.create_temporary_url(&self.meta.id, ttl).await
    }
}

impl std::fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl File for RemoteFile {
    fn metadata(&self) -> &FileMetadata {
        &self.meta
    }

    async fn read_contents(&self) -> Result<Vec<u8>, FileError> {
        self.client.retrieve_file_contents(&self.meta.id).await
    }
}

/// A remote file composed with a bound cache; reads prefer the local mirror.
pub struct CachedRemoteFile {
    remote: RemoteFile,
    cache: Arc<FileCache>,
}

impl CachedRemoteFile {
    pub fn new(remote: RemoteFile, cache: Arc<FileCache>) -> Self {
        Self { remote, cache }
    }

    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    /// Force a refetch from the backend, for callers that know the source
    /// changed. Always invokes the remote fetch, even while active.
    pub async fn refresh_contents(&self) -> Result<Vec<u8>, FileError> {
        self.cache
            .update_contents(|| self.remote.read_contents())
            .await
    }

    /// Delete the file on the backend and tear down the stale mirror.
    pub async fn delete(&self) -> Result<(), FileError> {
        self.remote.delete().await?;
        self.cache.discard().await;
        Ok(())
    }

    pub async fn create_temporary_url(&self, ttl: Duration) -> Result<String, FileError> {
        self.remote.create_temporary_url(ttl).await
    }
}

impl std::fmt::Debug for CachedRemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRemoteFile")
            .field("meta", self.remote.metadata())
            .field("cache_active", &self.cache.is_active())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl File for CachedRemoteFile {
    fn metadata(&self) -> &FileMetadata {
        self.remote.metadata()
    }

    async fn read_contents(&self) -> Result<Vec<u8>, FileError> {
        match self
            .cache
            .fetch_or_update_contents(|| self.remote.read_contents())
            .await
        {
            Err(FileError::CacheDiscarded(_)) => {
                // Recoverable: bypass the dead cache and hit the source.
                warn!(id = %self.id(), "cache already discarded, reading straight from the remote source");
                self.remote.read_contents().await
            }
            Ok(bytes) => {
                debug!(id = %self.id(), bytes = bytes.len(), "read contents via cache");
                Ok(bytes)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FileDescriptor;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal scripted backend: one file, swappable contents, call counting.
    struct ScriptedClient {
        id: String,
        contents: Mutex<Vec<u8>>,
        content_calls: AtomicUsize,
        supports_delete: bool,
    }

    impl ScriptedClient {
        fn new(id: &str, contents: &[u8]) -> Self {
            Self {
                id: id.to_string(),
                contents: Mutex::new(contents.to_vec()),
                content_calls: AtomicUsize::new(0),
                supports_delete: true,
            }
        }

        fn set_contents(&self, contents: &[u8]) {
            *self.contents.lock() = contents.to_vec();
        }

        fn descriptor(&self) -> FileDescriptor {
            FileDescriptor {
                id: self.id.clone(),
                filename: "scripted.bin".to_string(),
                byte_size: self.contents.lock().len() as u64,
                created_at: Utc::now(),
                purpose: "test".to_string(),
                metadata: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl RemoteFileClient for ScriptedClient {
        async fn upload_file(
            &self,
            _path: &Path,
            _purpose: &str,
            _metadata: HashMap<String, String>,
        ) -> Result<FileDescriptor, FileError> {
            Ok(self.descriptor())
        }

        async fn retrieve_file(&self, id: &str) -> Result<FileDescriptor, FileError> {
            if id == self.id {
                Ok(self.descriptor())
            } else {
                Err(FileError::remote_with_status("no such file", 404))
            }
        }

        async fn retrieve_file_contents(&self, id: &str) -> Result<Vec<u8>, FileError> {
            if id != self.id {
                return Err(FileError::remote_with_status("no such file", 404));
            }
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.contents.lock().clone())
        }

        async fn list_files(&self) -> Result<Vec<FileDescriptor>, FileError> {
            Ok(vec![self.descriptor()])
        }

        async fn delete_file(&self, _id: &str) -> Result<(), FileError> {
            if self.supports_delete {
                Ok(())
            } else {
                Err(FileError::Unsupported("backend cannot delete".to_string()))
            }
        }

        async fn create_temporary_url(
            &self,
            id: &str,
            ttl: Duration,
        ) -> Result<String, FileError> {
            Ok(format!("https://files.test/{}?ttl={}", id, ttl.as_secs()))
        }
    }

    fn cached_file(
        client: Arc<ScriptedClient>,
        dir: &Path,
    ) -> (CachedRemoteFile, Arc<FileCache>) {
        let meta = client.descriptor().into_metadata();
        let cache = FileCache::new(
            meta.id.clone(),
            dir.join(format!("{}.cache", meta.id)),
            None,
            None,
        );
        let remote = RemoteFile::new(meta, client);
        (CachedRemoteFile::new(remote, Arc::clone(&cache)), cache)
    }

    #[tokio::test]
    async fn test_remote_file_delegates_to_client() {
        let client = Arc::new(ScriptedClient::new("file-remote-1-a", b"abc"));
        let remote = RemoteFile::new(client.descriptor().into_metadata(), client.clone());

        assert_eq!(remote.read_contents().await.unwrap(), b"abc");
        assert_eq!(client.content_calls.load(Ordering::SeqCst), 1);
        let url = remote.create_temporary_url(Duration::from_secs(60)).await.unwrap();
        assert!(url.contains("file-remote-1-a"));
    }

    #[tokio::test]
    async fn test_unsupported_delete_fails_loudly() {
        let mut inner = ScriptedClient::new("file-remote-1-a", b"abc");
        inner.supports_delete = false;
        let client = Arc::new(inner);
        let remote = RemoteFile::new(client.descriptor().into_metadata(), client);

        let err = remote.delete().await.unwrap_err();
        assert!(matches!(err, FileError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_cached_reads_hit_the_backend_once() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient::new("file-remote-1-a", b"abc"));
        let (file, _cache) = cached_file(client.clone(), dir.path());

        assert_eq!(file.read_contents().await.unwrap(), b"abc");
        assert_eq!(file.read_contents().await.unwrap(), b"abc");
        assert_eq!(client.content_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_always_refetches() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient::new("file-remote-1-a", b"A"));
        let (file, _cache) = cached_file(client.clone(), dir.path());

        assert_eq!(file.read_contents().await.unwrap(), b"A");
        client.set_contents(b"B");
        assert_eq!(file.refresh_contents().await.unwrap(), b"B");
        // Active again: served from disk, no third backend call.
        assert_eq!(file.read_contents().await.unwrap(), b"B");
        assert_eq!(client.content_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_discarded_cache_falls_back_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient::new("file-remote-1-a", b"abc"));
        let (file, cache) = cached_file(client.clone(), dir.path());

        cache.discard().await;
        assert_eq!(file.read_contents().await.unwrap(), b"abc");
        assert_eq!(file.read_contents().await.unwrap(), b"abc");
        // Every read goes straight to the backend now.
        assert_eq!(client.content_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delete_discards_the_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient::new("file-remote-1-a", b"abc"));
        let (file, cache) = cached_file(client, dir.path());

        file.read_contents().await.unwrap();
        assert!(cache.is_active());
        file.delete().await.unwrap();
        assert!(cache.is_discarded());
    }
}
