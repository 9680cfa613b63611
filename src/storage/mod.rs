//! Storage layer
//!
//! Everything the mappers talk to:
//! - `StorageBackend`: raw files (native file system, memory)
//! - `formats`: how a file holds a table
//! - `query_builder` and `dialects`: SQL composition
//! - `database`: connections, configuration and registry

use async_trait::async_trait;

pub mod database;
pub mod dialects;
pub mod formats;
pub mod memory;
pub mod query_builder;

#[cfg(feature = "native-fs")]
pub mod filesystem;

pub use memory::MemoryStorageBackend;
pub use query_builder::QueryBuilder;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Trait for storage backends
///
/// File based mappers read and write whole files through this trait, so the
/// same table can live on disk or in memory.
#[async_trait(?Send)]
pub trait StorageBackend: Send + Sync {
    /// Read a file from storage
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write a file to storage
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), StorageError>;

    /// List files in a directory
    async fn list_files(&self, dir: &str) -> Result<Vec<String>, StorageError>;

    /// Check if a file exists
    async fn file_exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Delete a file
    async fn delete_file(&self, path: &str) -> Result<(), StorageError>;

    /// Create a directory
    async fn create_dir(&self, path: &str) -> Result<(), StorageError>;

    /// Check if a directory exists
    async fn dir_exists(&self, path: &str) -> Result<bool, StorageError>;
}

/// Read a file as UTF-8 text, a missing file reads as `None`
pub(crate) async fn read_text(
    storage: &dyn StorageBackend,
    path: &str,
) -> Result<Option<String>, StorageError> {
    match storage.read_file(path).await {
        Ok(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| StorageError::SerializationError(format!("{} is not UTF-8: {}", path, e))),
        Err(StorageError::FileNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
