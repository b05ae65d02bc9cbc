//! Process-wide cache of memory files.

use dashmap::DashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::memory::file::{FileIdentity, MemoryFile};
use crate::observability::metrics;

/// Keyed cache of [`MemoryFile`]s. Entries are never evicted.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: DashMap<String, Arc<MemoryFile>>,
}

static GLOBAL: OnceLock<Arc<MemoryFileStore>> = OnceLock::new();

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store shared by every strategy in the process.
    pub fn global() -> Arc<MemoryFileStore> {
        GLOBAL.get_or_init(|| Arc::new(MemoryFileStore::new())).clone()
    }

    /// Return the file for this identity, creating an empty one on first use.
    pub fn check_and_prepare(&self, path: &Path, name: &str, extension: &str) -> Arc<MemoryFile> {
        let identity = FileIdentity::new(path, name, extension);
        let key = identity.key();
        if let Some(file) = self.files.get(&key) {
            return file.clone();
        }
        let file = self
            .files
            .entry(key)
            .or_insert_with(|| Arc::new(MemoryFile::new(identity)))
            .clone();
        metrics::record_memory_files(self.files.len());
        file
    }

    pub fn get(&self, key: &str) -> Option<Arc<MemoryFile>> {
        self.files.get(key).map(|f| f.clone())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files that have received content at least once.
    pub fn published(&self) -> Vec<Arc<MemoryFile>> {
        self.files
            .iter()
            .filter(|f| f.content().is_some())
            .map(|f| f.value().clone())
            .collect()
    }
}
