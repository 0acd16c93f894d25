//! Shared test fixtures: an in-memory remote backend.

use async_trait::async_trait;
use chrono::Utc;
use filestash::client::{FileDescriptor, RemoteFileClient};
use filestash::error::FileError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory remote backend. Contents can be swapped between calls and
/// content fetches are counted so tests can assert coalescing.
pub struct InMemoryRemoteClient {
    files: Mutex<HashMap<String, (FileDescriptor, Vec<u8>)>>,
    pub content_calls: AtomicUsize,
    pub supports_delete: bool,
    /// Artificial latency on content fetches, to widen race windows.
    pub fetch_delay: Option<Duration>,
    upload_counter: AtomicUsize,
}

impl InMemoryRemoteClient {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            content_calls: AtomicUsize::new(0),
            supports_delete: true,
            fetch_delay: None,
            upload_counter: AtomicUsize::new(0),
        }
    }

    /// Seed a file directly into the backend.
    pub fn insert(&self, id: &str, filename: &str, bytes: &[u8]) {
        let descriptor = FileDescriptor {
            id: id.to_string(),
            filename: filename.to_string(),
            byte_size: bytes.len() as u64,
            created_at: Utc::now(),
            purpose: "test".to_string(),
            metadata: HashMap::new(),
        };
        self.files
            .lock()
            .insert(id.to_string(), (descriptor, bytes.to_vec()));
    }

    /// Swap the authoritative bytes of a seeded file.
    pub fn set_contents(&self, id: &str, bytes: &[u8]) {
        if let Some(entry) = self.files.lock().get_mut(id) {
            entry.1 = bytes.to_vec();
            entry.0.byte_size = bytes.len() as u64;
        }
    }

    pub fn content_call_count(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryRemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFileClient for InMemoryRemoteClient {
    async fn upload_file(
        &self,
        path: &Path,
        purpose: &str,
        metadata: HashMap<String, String>,
    ) -> Result<FileDescriptor, FileError> {
        let bytes = tokio::fs::read(path).await?;
        let n = self.upload_counter.fetch_add(1, Ordering::SeqCst);
        let descriptor = FileDescriptor {
            id: format!("file-remote-upload-{}", n),
            filename: path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unnamed")
                .to_string(),
            byte_size: bytes.len() as u64,
            created_at: Utc::now(),
            purpose: purpose.to_string(),
            metadata,
        };
        self.files
            .lock()
            .insert(descriptor.id.clone(), (descriptor.clone(), bytes));
        Ok(descriptor)
    }

    async fn retrieve_file(&self, id: &str) -> Result<FileDescriptor, FileError> {
        self.files
            .lock()
            .get(id)
            .map(|(descriptor, _)| descriptor.clone())
            .ok_or_else(|| FileError::remote_with_status(format!("no such file: {}", id), 404))
    }

    async fn retrieve_file_contents(&self, id: &str) -> Result<Vec<u8>, FileError> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let bytes = self
            .files
            .lock()
            .get(id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| FileError::remote_with_status(format!("no such file: {}", id), 404))?;
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }

    async fn list_files(&self) -> Result<Vec<FileDescriptor>, FileError> {
        Ok(self
            .files
            .lock()
            .values()
            .map(|(descriptor, _)| descriptor.clone())
            .collect())
    }

    async fn delete_file(&self, id: &str) -> Result<(), FileError> {
        if !self.supports_delete {
            return Err(FileError::Unsupported(
                "backend does not support delete".to_string(),
            ));
        }
        self.files
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| FileError::remote_with_status(format!("no such file: {}", id), 404))
    }

    async fn create_temporary_url(&self, id: &str, ttl: Duration) -> Result<String, FileError> {
        if !self.files.lock().contains_key(id) {
            return Err(FileError::remote_with_status(format!("no such file: {}", id), 404));
        }
        Ok(format!("https://files.test/{}?ttl={}", id, ttl.as_secs()))
    }
}
