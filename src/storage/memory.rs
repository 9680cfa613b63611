//! In-memory storage backend
//!
//! Keeps files in a map keyed by normalized path. Directories exist
//! implicitly as prefixes of stored files or when created explicitly.

use super::{StorageBackend, StorageError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Storage backend holding everything in memory
#[derive(Debug, Default)]
pub struct MemoryStorageBackend {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend prefilled with the given files
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let backend = Self::new();
        if let Ok(mut stored) = backend.files.lock() {
            for (path, content) in files {
                stored.insert(normalize(path.as_ref()), content.into());
            }
        }
        backend
    }

    fn files(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StorageError> {
        self.files
            .lock()
            .map_err(|e| StorageError::BackendError(format!("Memory storage poisoned: {}", e)))
    }

    fn dirs(&self) -> Result<MutexGuard<'_, BTreeSet<String>>, StorageError> {
        self.dirs
            .lock()
            .map_err(|e| StorageError::BackendError(format!("Memory storage poisoned: {}", e)))
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').replace('\\', "/")
}

#[async_trait(?Send)]
impl StorageBackend for MemoryStorageBackend {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files()?
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(path.to_string()))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        self.files()?.insert(normalize(path), content.to_vec());
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let dir = normalize(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };
        let names: BTreeSet<String> = self
            .files()?
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect();
        if names.is_empty() && !dir.is_empty() && !self.dir_exists(&dir).await? {
            return Err(StorageError::DirectoryNotFound(dir));
        }
        Ok(names.into_iter().collect())
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.files()?.contains_key(&normalize(path)))
    }

    async fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        self.files()?
            .remove(&normalize(path))
            .map(|_| ())
            .ok_or_else(|| StorageError::FileNotFound(path.to_string()))
    }

    async fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        self.dirs()?.insert(normalize(path));
        Ok(())
    }

    async fn dir_exists(&self, path: &str) -> Result<bool, StorageError> {
        let dir = normalize(path);
        if dir.is_empty() || self.dirs()?.contains(&dir) {
            return Ok(true);
        }
        let prefix = format!("{}/", dir);
        Ok(self.files()?.keys().any(|key| key.starts_with(&prefix)))
    }
}
