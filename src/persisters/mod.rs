//! Pluggable byte stores for serialized cassettes

mod filesystem;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::{Result, TapedeckError};

pub use filesystem::FileSystemPersister;
pub use memory::InMemoryPersister;

/// Name the file system persister is registered under
pub const FILE_SYSTEM: &str = "file_system";

/// Byte store keyed by file name
pub trait Persister: Send + Sync {
    /// Read the content stored under `key`, if any
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the content stored under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written
    fn write(&self, key: &str, content: &[u8]) -> Result<()>;

    /// Location of `key` on disk, for stores that have one
    fn absolute_path_to_file(&self, _key: &str) -> Option<PathBuf> {
        None
    }
}

/// Turn a cassette name into a storage key
///
/// Runs of characters other than letters, digits, `_`, `-` and `/` become a
/// single `_`; path separators are kept so names can nest in directories.
/// Leading separators are dropped so keys stay relative.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut replacing = false;
    for c in name.trim_start_matches('/').chars() {
        if c.is_alphanumeric() || c == '_' || c == '-' || c == '/' {
            sanitized.push(c);
            replacing = false;
        } else if !replacing {
            sanitized.push('_');
            replacing = true;
        }
    }
    sanitized
}

/// Named persisters
#[derive(Clone)]
pub struct PersisterRegistry {
    persisters: BTreeMap<String, Arc<dyn Persister>>,
}

impl PersisterRegistry {
    /// Registry with the file system persister rooted at `cassette_library_dir`
    pub fn new(cassette_library_dir: impl Into<PathBuf>) -> Self {
        let mut registry = Self {
            persisters: BTreeMap::new(),
        };
        registry.register(FILE_SYSTEM, FileSystemPersister::new(cassette_library_dir));
        registry
    }

    /// Register a persister under `name`
    pub fn register(&mut self, name: impl Into<String>, persister: impl Persister + 'static) {
        self.register_shared(name, Arc::new(persister));
    }

    /// Register an already shared persister under `name`
    pub fn register_shared(&mut self, name: impl Into<String>, persister: Arc<dyn Persister>) {
        let name = name.into();
        if self.persisters.contains_key(&name) && name != FILE_SYSTEM {
            warn!("Overriding persister {:?}", name);
        }
        self.persisters.insert(name, persister);
    }

    /// Look up a persister
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredPersister` listing the registered names
    pub fn get(&self, name: &str) -> Result<Arc<dyn Persister>> {
        self.persisters
            .get(name)
            .cloned()
            .ok_or_else(|| TapedeckError::UnregisteredPersister {
                name: name.to_string(),
                registered: self.persisters.keys().cloned().collect(),
            })
    }
}

impl fmt::Debug for PersisterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersisterRegistry")
            .field("persisters", &self.persisters.keys().collect::<Vec<_>>())
            .finish()
    }
}
