//! Remote storage capability surface.
//!
//! A concrete backend owns its own wire protocol (endpoints for upload,
//! metadata, contents, list, temporary URLs); this module only defines the
//! capability trait the rest of the crate programs against, plus the
//! metadata record backends hand back.

use crate::error::FileError;
use crate::file::FileMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Metadata record for a file held by a remote backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: String,
    pub filename: String,
    pub byte_size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl FileDescriptor {
    /// Convert into the crate-internal immutable metadata record.
    pub fn into_metadata(self) -> FileMetadata {
        FileMetadata {
            id: self.id,
            filename: self.filename,
            byte_size: self.byte_size,
            created_at: self.created_at,
            purpose: self.purpose,
            metadata: self.metadata,
        }
    }
}

/// Capabilities a remote file store must implement.
///
/// GET-style operations (`retrieve_file`, `retrieve_file_contents`,
/// `list_files`) must be safely retryable by the caller. Implementations
/// normalize malformed responses and non-success statuses into
/// [`FileError::Remote`] carrying enough context for the caller to decide
/// retry vs. abort; this crate itself never retries.
#[async_trait]
pub trait RemoteFileClient: Send + Sync {
    /// Upload the file at `path` and return the backend's descriptor for it.
    async fn upload_file(
        &self,
        path: &Path,
        purpose: &str,
        metadata: HashMap<String, String>,
    ) -> Result<FileDescriptor, FileError>;

    /// Fetch the descriptor for an already-uploaded file.
    async fn retrieve_file(&self, id: &str) -> Result<FileDescriptor, FileError>;

    /// Fetch the authoritative bytes of an already-uploaded file.
    async fn retrieve_file_contents(&self, id: &str) -> Result<Vec<u8>, FileError>;

    /// List every file the backend holds for this principal.
    async fn list_files(&self) -> Result<Vec<FileDescriptor>, FileError>;

    /// Delete a file. Backends without delete support fail with
    /// [`FileError::Unsupported`] rather than silently no-op-ing.
    async fn delete_file(&self, id: &str) -> Result<(), FileError>;

    /// Create a URL granting temporary direct access to the file's contents.
    async fn create_temporary_url(&self, id: &str, ttl: Duration)
        -> Result<String, FileError>;
}
