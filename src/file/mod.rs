//! File handles.
//!
//! A file is an immutable-metadata handle to byte content, backed either by
//! local disk or a remote service. Identity and equality are by id alone;
//! metadata never changes after creation.

pub mod remote;

use crate::error::FileError;
use crate::fileid;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Immutable metadata shared by every file variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Globally unique, immutable identifier.
    pub id: String,
    pub filename: String,
    pub byte_size: u64,
    pub created_at: DateTime<Utc>,
    pub purpose: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

// Identity and equality are by id alone.
impl PartialEq for FileMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FileMetadata {}

impl std::hash::Hash for FileMetadata {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Content-read contract shared by local and remote files.
#[async_trait]
pub trait File: Send + Sync + std::fmt::Debug {
    fn metadata(&self) -> &FileMetadata;

    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Read the file's bytes from the backing source.
    ///
    /// Fails with [`FileError::FileNotFound`] or [`FileError::Io`] when the
    /// source is gone.
    async fn read_contents(&self) -> Result<Vec<u8>, FileError>;

    /// Write the file's bytes to `dest`.
    ///
    /// The destination handle is scoped to this call: it is flushed and
    /// synced before closing, and `?` propagation closes it on every exit
    /// path.
    async fn write_contents_to(&self, dest: &Path) -> Result<(), FileError> {
        let bytes = self.read_contents().await?;
        let mut out = tokio::fs::File::create(dest).await?;
        out.write_all(&bytes).await?;
        out.flush().await?;
        out.sync_all().await?;
        Ok(())
    }

    /// Canonical inline reference token carrying the id.
    fn file_repr(&self) -> String {
        fileid::file_token(self.id())
    }

    /// Metadata snapshot for serialization into tool results or UIs.
    fn snapshot(&self) -> serde_json::Value {
        let meta = self.metadata();
        json!({
            "id": meta.id,
            "filename": meta.filename,
            "byte_size": meta.byte_size,
            "created_at": meta.created_at.to_rfc3339(),
            "purpose": meta.purpose,
            "metadata": meta.metadata,
        })
    }
}

/// File backed by an owned path on local disk.
#[derive(Debug, Clone)]
pub struct LocalFile {
    meta: FileMetadata,
    path: PathBuf,
}

impl LocalFile {
    pub fn new(meta: FileMetadata, path: PathBuf) -> Self {
        Self { meta, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl File for LocalFile {
    fn metadata(&self) -> &FileMetadata {
        &self.meta
    }

    async fn read_contents(&self) -> Result<Vec<u8>, FileError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(FileError::FileNotFound(self.path.display().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileid::FileIdKind;

    fn test_metadata(id: &str) -> FileMetadata {
        FileMetadata {
            id: id.to_string(),
            filename: "sample.bin".to_string(),
            byte_size: 5,
            created_at: Utc::now(),
            purpose: "test".to_string(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_equality_is_by_id_alone() {
        let mut a = test_metadata("file-local-1-x");
        let b = test_metadata("file-local-1-x");
        let c = test_metadata("file-local-2-y");
        a.filename = "renamed.bin".to_string();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_local_file_reads_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let file = LocalFile::new(test_metadata("file-local-1-x"), path);
        assert_eq!(file.read_contents().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_missing_local_source_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile::new(test_metadata("file-local-1-x"), dir.path().join("gone"));

        let err = file.read_contents().await.unwrap_err();
        assert!(matches!(err, FileError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_write_contents_to_produces_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        tokio::fs::write(&src, b"payload").await.unwrap();

        let file = LocalFile::new(test_metadata("file-local-1-x"), src);
        file.write_contents_to(&dst).await.unwrap();
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"payload");
    }

    #[test]
    fn test_file_repr_and_snapshot_carry_the_id() {
        let id = crate::fileid::generate_file_id(FileIdKind::Local);
        let file = LocalFile::new(test_metadata(&id), PathBuf::from("/tmp/x"));

        assert_eq!(file.file_repr(), format!("<file>{}</file>", id));
        let snapshot = file.snapshot();
        assert_eq!(snapshot["id"], json!(id));
        assert_eq!(snapshot["byte_size"], json!(5));
    }
}
