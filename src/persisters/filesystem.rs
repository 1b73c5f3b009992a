//! File system persister

use std::path::{Path, PathBuf};

use tracing::debug;

use super::Persister;
use crate::Result;

/// Stores cassettes as files under a root directory
#[derive(Debug, Clone)]
pub struct FileSystemPersister {
    storage_location: PathBuf,
}

impl FileSystemPersister {
    /// Create a persister rooted at `storage_location`; nothing is created yet
    pub fn new(storage_location: impl Into<PathBuf>) -> Self {
        Self {
            storage_location: storage_location.into(),
        }
    }

    /// Root directory
    #[must_use]
    pub fn storage_location(&self) -> &Path {
        &self.storage_location
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.storage_location.join(key)
    }
}

impl Persister for FileSystemPersister {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, content: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }

    fn absolute_path_to_file(&self, key: &str) -> Option<PathBuf> {
        let path = self.path_for(key);
        if path.is_absolute() {
            return Some(path);
        }
        let absolute = std::env::current_dir().map_or_else(|_| path.clone(), |cwd| cwd.join(&path));
        Some(absolute)
    }
}
