//! One file is one record
//!
//! The record holds the path of the file and its whole content, see
//! [`page_record`](crate::records::page_record).

use super::{Mapper, MapperHooks, MapperMap, NoHooks};
use crate::error::MapperError;
use crate::records::{PAGE_CONTENT_KEY, PAGE_PATH_KEY, Record, Value};
use crate::storage::{StorageBackend, StorageError, read_text};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct PageContentMapper {
    map: MapperMap,
    storage: Arc<dyn StorageBackend>,
    hooks: Arc<dyn MapperHooks>,
}

impl PageContentMapper {
    pub fn new(source: impl Into<String>, storage: Arc<dyn StorageBackend>) -> Self {
        let mut map = MapperMap::new(source);
        map.set_relation(PAGE_PATH_KEY, PAGE_PATH_KEY)
            .set_relation(PAGE_CONTENT_KEY, PAGE_CONTENT_KEY)
            .add_primary_key(PAGE_PATH_KEY);
        Self {
            map,
            storage,
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: impl MapperHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    fn path(record: &Record) -> Result<String, MapperError> {
        match record.get(PAGE_PATH_KEY)? {
            Value::Text(path) if !path.is_empty() => Ok(path.clone()),
            _ => Err(MapperError::InvalidValue {
                key: PAGE_PATH_KEY.to_string(),
                reason: "Page record needs a path".to_string(),
            }),
        }
    }

    async fn write(&self, record: &Record) -> Result<bool, MapperError> {
        let path = Self::path(record)?;
        let content = record.get(PAGE_CONTENT_KEY)?.to_text();
        debug!("Writing page {}", path);
        self.storage.write_file(&path, content.as_bytes()).await?;
        Ok(true)
    }
}

#[async_trait(?Send)]
impl Mapper for PageContentMapper {
    fn map(&self) -> &MapperMap {
        &self.map
    }

    fn alias(&self) -> &str {
        self.map.source()
    }

    fn hooks(&self) -> &dyn MapperHooks {
        self.hooks.as_ref()
    }

    async fn insert_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        self.write(record).await
    }

    /// Rewrites an existing file only
    async fn update_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        let path = Self::path(record)?;
        if !self.storage.file_exists(&path).await? {
            return Ok(false);
        }
        self.write(record).await
    }

    async fn load_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        let path = Self::path(record)?;
        let Some(content) = read_text(self.storage.as_ref(), &path).await? else {
            return Ok(false);
        };
        record
            .entry_mut(PAGE_CONTENT_KEY)?
            .set_data(Value::Text(content), true);
        record.entry_mut(PAGE_PATH_KEY)?.mark_from_storage(true);
        Ok(true)
    }

    async fn delete_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        let path = Self::path(record)?;
        match self.storage.delete_file(&path).await {
            Ok(()) => Ok(true),
            Err(StorageError::FileNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn count_record(&self, record: &Record) -> Result<usize, MapperError> {
        let path = Self::path(record)?;
        Ok(usize::from(self.storage.file_exists(&path).await?))
    }

    async fn load_multiple(&self, record: &Record) -> Result<Vec<Record>, MapperError> {
        let mut loaded = record.clone();
        if self.load(&mut loaded).await? {
            Ok(vec![loaded])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::page_record;
    use crate::storage::MemoryStorageBackend;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn setup() -> (Arc<MemoryStorageBackend>, Record) {
        let storage = Arc::new(MemoryStorageBackend::with_files([(
            "pages/home.md",
            "# Welcome",
        )]));
        let mapper = PageContentMapper::new(
            "pages",
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
        );
        (storage, page_record(Arc::new(mapper)).unwrap())
    }

    #[test]
    fn test_load_and_count() {
        let (_, mut page) = setup();
        page.set(PAGE_PATH_KEY, "pages/home.md").unwrap();
        assert_eq!(block_on(page.count()).unwrap(), 1);
        assert!(block_on(page.load()).unwrap());
        assert_eq!(page.get(PAGE_CONTENT_KEY).unwrap().as_str(), Some("# Welcome"));
        assert_eq!(block_on(page.load_multiple()).unwrap().len(), 1);

        let mut missing = page.blank();
        missing.set(PAGE_PATH_KEY, "pages/none.md").unwrap();
        assert_eq!(block_on(missing.count()).unwrap(), 0);
        assert!(!block_on(missing.load()).unwrap());
        assert!(block_on(missing.load_multiple()).unwrap().is_empty());
    }

    #[test]
    fn test_save_writes_content() {
        let (storage, mut page) = setup();
        page.set(PAGE_PATH_KEY, "pages/about.md").unwrap();
        page.set(PAGE_CONTENT_KEY, "About us").unwrap();
        assert!(block_on(page.save(false)).unwrap());
        assert_eq!(
            block_on(storage.read_file("pages/about.md")).unwrap(),
            b"About us".to_vec()
        );

        page.set(PAGE_CONTENT_KEY, "About them").unwrap();
        assert!(block_on(page.save(false)).unwrap());
        assert_eq!(
            block_on(storage.read_file("pages/about.md")).unwrap(),
            b"About them".to_vec()
        );
    }

    #[test]
    fn test_delete_and_missing_path() {
        let (storage, mut page) = setup();
        assert!(matches!(
            block_on(page.load()),
            Err(MapperError::InvalidValue { .. })
        ));
        page.set(PAGE_PATH_KEY, "pages/home.md").unwrap();
        assert!(block_on(page.delete()).unwrap());
        assert!(!block_on(storage.file_exists("pages/home.md")).unwrap());
        assert!(!block_on(page.delete()).unwrap());
    }
}
