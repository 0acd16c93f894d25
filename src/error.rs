//! Error types shared across file handles, caches, and the manager facade.

use thiserror::Error;

/// Unified error type for the crate.
///
/// Retry policy lives with the caller: `Remote` failures are normalized here
/// but never retried by this subsystem, `CacheDiscarded` and `CacheNotFound`
/// are recoverable (fall back to the source, or create a cache), while
/// `FileNotFound` at registration time is fatal.
#[derive(Debug, Error)]
pub enum FileError {
    /// The backing local source or registry entry does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Filesystem failure while reading, staging, or removing content.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or non-success response from a remote backend, normalized
    /// by the `RemoteFileClient` implementation.
    #[error("remote file error (status {status:?}): {message}")]
    Remote {
        message: String,
        status: Option<u16>,
    },

    /// Capability the remote backend does not implement. Fails loudly rather
    /// than silently no-op-ing.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// State-mutating operation attempted on a cache after `discard()`.
    #[error("cache for file {0} has been discarded")]
    CacheDiscarded(String),

    /// No live cache is registered for the given file id.
    #[error("no cache registered for file {0}")]
    CacheNotFound(String),

    /// Registry refused to overwrite an existing entry.
    #[error("file {0} is already registered")]
    AlreadyRegistered(String),

    /// Operation attempted on a closed manager.
    #[error("file manager is closed")]
    ManagerClosed,

    /// Invalid or unreadable configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FileError {
    /// Normalize a remote failure without an HTTP-style status code.
    pub fn remote(message: impl Into<String>) -> Self {
        FileError::Remote {
            message: message.into(),
            status: None,
        }
    }

    /// Normalize a remote failure carrying a status code for the caller's
    /// retry-vs-abort decision.
    pub fn remote_with_status(message: impl Into<String>, status: u16) -> Self {
        FileError::Remote {
            message: message.into(),
            status: Some(status),
        }
    }
}
