//! Id → file lookup table, independent of caching.

use crate::error::FileError;
use crate::file::File;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Lookup table from file id to handle. Entries live for the owning
/// manager's session unless explicitly unregistered; the table carries no
/// ownership semantics beyond the map itself.
pub struct FileRegistry {
    files: RwLock<HashMap<String, Arc<dyn File>>>,
    allow_overwrite: bool,
}

impl FileRegistry {
    pub fn new(allow_overwrite: bool) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            allow_overwrite,
        }
    }

    /// Register a file under its id, honoring the overwrite policy.
    pub fn register(&self, file: Arc<dyn File>) -> Result<(), FileError> {
        let id = file.id().to_string();
        let mut files = self.files.write();
        if !self.allow_overwrite && files.contains_key(&id) {
            return Err(FileError::AlreadyRegistered(id));
        }
        files.insert(id.clone(), file);
        debug!(id = %id, "registered file");
        Ok(())
    }

    /// Register a file unconditionally, returning any entry it replaced.
    pub fn register_or_replace(&self, file: Arc<dyn File>) -> Option<Arc<dyn File>> {
        let id = file.id().to_string();
        let replaced = self.files.write().insert(id.clone(), file);
        debug!(id = %id, replaced = replaced.is_some(), "registered file");
        replaced
    }

    /// Remove and return the entry for `id`.
    pub fn unregister(&self, id: &str) -> Result<Arc<dyn File>, FileError> {
        self.files
            .write()
            .remove(id)
            .ok_or_else(|| FileError::FileNotFound(id.to_string()))
    }

    pub fn look_up(&self, id: &str) -> Result<Arc<dyn File>, FileError> {
        self.files
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| FileError::FileNotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<Arc<dyn File>> {
        self.files.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    pub fn clear(&self) {
        self.files.write().clear();
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}
