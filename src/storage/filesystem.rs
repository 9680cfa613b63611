//! Storage over a directory of a KWCMS site
//!
//! Paths are relative to the site root and may never leave it, neither by
//! `..` nor through a symlink. File tables are replaced whole: the new
//! content goes into a hidden sibling first and is renamed over the target,
//! so a reader never sees half of a table.

use super::{StorageBackend, StorageError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Storage backend rooted in one directory
pub struct FileSystemStorageBackend {
    root: PathBuf,
}

fn failure(path: &str, action: &str, error: std::io::Error) -> StorageError {
    match error.kind() {
        ErrorKind::NotFound => StorageError::FileNotFound(path.to_string()),
        ErrorKind::PermissionDenied => {
            StorageError::PermissionDenied(format!("Cannot {} {}", action, path))
        }
        _ => StorageError::IoError(format!("Cannot {} {}: {}", action, path, error)),
    }
}

impl FileSystemStorageBackend {
    /// Backend for the site under `root`
    ///
    /// The directory does not have to exist yet, the first write creates it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kw_mapper::storage::filesystem::FileSystemStorageBackend;
    ///
    /// let backend = FileSystemStorageBackend::new("/var/www/kwcms/data");
    /// assert!(backend.base_path().ends_with("data"));
    /// ```
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.root
    }

    /// Site path to a path on disk
    fn locate(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut located = self.root.clone();
        for component in Path::new(path.trim_start_matches(['/', '\\'])).components() {
            match component {
                Component::Normal(part) => located.push(part),
                Component::CurDir => {}
                _ => {
                    warn!("Rejected path outside of storage: {}", path);
                    return Err(StorageError::PermissionDenied(format!(
                        "{} leaves the storage root",
                        path
                    )));
                }
            }
        }
        self.check_links(&located, path)?;
        Ok(located)
    }

    /// The deepest existing ancestor must still resolve under the root
    fn check_links(&self, located: &Path, path: &str) -> Result<(), StorageError> {
        let Ok(root) = self.root.canonicalize() else {
            // nothing on disk yet, so nothing can link away
            return Ok(());
        };
        let Some(existing) = located.ancestors().find(|ancestor| ancestor.exists()) else {
            return Ok(());
        };
        let resolved = existing
            .canonicalize()
            .map_err(|e| failure(path, "resolve", e))?;
        if resolved.starts_with(&root) {
            Ok(())
        } else {
            warn!("Rejected link outside of storage: {}", path);
            Err(StorageError::PermissionDenied(format!(
                "{} resolves outside of the storage root",
                path
            )))
        }
    }

    async fn file_type(&self, path: &str) -> Result<Option<std::fs::FileType>, StorageError> {
        let located = self.locate(path)?;
        match fs::metadata(&located).await {
            Ok(metadata) => Ok(Some(metadata.file_type())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(failure(path, "inspect", e)),
        }
    }
}

#[async_trait(?Send)]
impl StorageBackend for FileSystemStorageBackend {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let located = self.locate(path)?;
        debug!("Reading {}", located.display());
        fs::read(&located).await.map_err(|e| failure(path, "read", e))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let target = self.locate(path)?;
        let Some(name) = target.file_name().filter(|_| target != self.root) else {
            return Err(StorageError::PermissionDenied(format!(
                "Cannot write into *{}*, it is not a file path",
                path
            )));
        };
        let staged = target.with_file_name(format!(".{}.part", name.to_string_lossy()));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| failure(path, "create directory for", e))?;
        }

        fs::write(&staged, content)
            .await
            .map_err(|e| failure(path, "write", e))?;
        if let Err(e) = fs::rename(&staged, &target).await {
            if let Err(cleanup) = fs::remove_file(&staged).await {
                warn!("Staged file {} left behind: {}", staged.display(), cleanup);
            }
            return Err(failure(path, "replace", e));
        }
        debug!("Stored {} bytes into {}", content.len(), target.display());
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let located = self.locate(dir)?;
        let mut read_dir = fs::read_dir(&located).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::DirectoryNotFound(dir.to_string()),
            _ => failure(dir, "list", e),
        })?;

        let mut names = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| failure(dir, "list", e))?
        {
            let is_file = entry.file_type().await.is_ok_and(|kind| kind.is_file());
            if is_file && let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.file_type(path).await?.is_some_and(|kind| kind.is_file()))
    }

    async fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        let located = self.locate(path)?;
        fs::remove_file(&located)
            .await
            .map_err(|e| failure(path, "delete", e))?;
        debug!("Deleted {}", located.display());
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let located = self.locate(path)?;
        fs::create_dir_all(&located)
            .await
            .map_err(|e| failure(path, "create directory", e))
    }

    async fn dir_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.file_type(path).await?.is_some_and(|kind| kind.is_dir()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_locate() {
        let temp = TempDir::new().unwrap();
        let backend = FileSystemStorageBackend::new(temp.path());

        assert_eq!(
            backend.locate("/conf/./users.txt").unwrap(),
            temp.path().join("conf").join("users.txt")
        );
        assert!(matches!(
            backend.locate("conf/../../users.txt"),
            Err(StorageError::PermissionDenied(_))
        ));
        assert!(matches!(
            backend.locate("/foo/../../../etc/passwd"),
            Err(StorageError::PermissionDenied(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_link_out_of_root() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("out")).unwrap();
        let backend = FileSystemStorageBackend::new(temp.path());

        assert!(matches!(
            block_on(backend.write_file("out/users.txt", b"1|x|")),
            Err(StorageError::PermissionDenied(_))
        ));
        assert!(!outside.path().join("users.txt").exists());
    }

    #[test]
    fn test_write_replaces_whole_file() {
        let temp = TempDir::new().unwrap();
        let backend = FileSystemStorageBackend::new(temp.path().join("site"));

        block_on(backend.write_file("conf/users.txt", b"1|ann|\n2|bob|")).unwrap();
        block_on(backend.write_file("conf/users.txt", b"1|ann|")).unwrap();
        assert_eq!(
            std::fs::read(temp.path().join("site/conf/users.txt")).unwrap(),
            b"1|ann|"
        );
        assert_eq!(
            block_on(backend.list_files("conf")).unwrap(),
            vec!["users.txt".to_string()]
        );
        assert!(block_on(backend.write_file("/", b"x")).is_err());
    }

    #[test]
    fn test_missing_entries() {
        let temp = TempDir::new().unwrap();
        let backend = FileSystemStorageBackend::new(temp.path());

        assert!(matches!(
            block_on(backend.read_file("pages/none.txt")),
            Err(StorageError::FileNotFound(_))
        ));
        assert!(matches!(
            block_on(backend.delete_file("pages/none.txt")),
            Err(StorageError::FileNotFound(_))
        ));
        assert!(matches!(
            block_on(backend.list_files("pages")),
            Err(StorageError::DirectoryNotFound(_))
        ));
        assert!(!block_on(backend.dir_exists("pages")).unwrap());
        block_on(backend.create_dir("pages")).unwrap();
        assert!(block_on(backend.dir_exists("pages")).unwrap());
        assert!(!block_on(backend.file_exists("pages")).unwrap());
    }
}
