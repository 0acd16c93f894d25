//! Configuration for the file manager facade.

use crate::error::FileError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options controlling a [`crate::manager::FileManager`] instance.
///
/// Constructed in code or loaded from a TOML file; every field has a
/// default so partial files are fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileManagerOptions {
    /// Wrap remote files with an on-disk mirror cache (default: true).
    #[serde(default = "default_true")]
    pub caching_enabled: bool,

    /// Soft TTL in seconds after which an active cache deactivates on its
    /// own. Unset means caches stay active until explicitly deactivated or
    /// discarded.
    #[serde(default)]
    pub cache_expire_after_secs: Option<u64>,

    /// Allow `register` to replace an existing registry entry with the same
    /// id (default: false).
    #[serde(default)]
    pub allow_overwrite: bool,

    /// Root under which the managed temp directory is created; the platform
    /// default temp location when unset.
    #[serde(default)]
    pub temp_dir_root: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

impl Default for FileManagerOptions {
    fn default() -> Self {
        Self {
            caching_enabled: default_true(),
            cache_expire_after_secs: None,
            allow_overwrite: false,
            temp_dir_root: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl FileManagerOptions {
    pub fn cache_expire_after(&self) -> Option<Duration> {
        self.cache_expire_after_secs.map(Duration::from_secs)
    }

    /// Load options from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, FileError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FileError::Config(format!("failed to read config: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| FileError::Config(format!("failed to parse config: {}", e)))
    }
}
