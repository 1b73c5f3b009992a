//! In-memory persister

use dashmap::DashMap;

use super::Persister;
use crate::Result;

/// Keeps cassettes in a concurrent map; nothing touches disk
#[derive(Debug, Default)]
pub struct InMemoryPersister {
    files: DashMap<String, Vec<u8>>,
}

impl InMemoryPersister {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Stored keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.files.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl Persister for InMemoryPersister {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.get(key).map(|entry| entry.value().clone()))
    }

    fn write(&self, key: &str, content: &[u8]) -> Result<()> {
        self.files.insert(key.to_string(), content.to_vec());
        Ok(())
    }
}
