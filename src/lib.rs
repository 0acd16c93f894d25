//! Filestash: local and remote file handles with a managed on-disk mirror cache.
//!
//! An agent runtime hands out [`file::File`] handles to local and remote byte
//! content. Remote content is mirrored to local disk through per-file
//! [`cache::FileCache`] state machines, held weakly by a process-wide
//! [`cache::FileCacheManager`] and torn down safely under concurrent use,
//! timed expiry, and drop-driven cleanup. The [`manager::FileManager`] facade
//! binds the pieces together and owns a scoped temp directory.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod fileid;
pub mod logging;
pub mod manager;
pub mod registry;
