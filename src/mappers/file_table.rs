//! Mapper over a table kept in one file
//!
//! The whole file is read on first access and the rows stay cached in the
//! mapper. Every change rewrites the whole file under the write lock.

use super::finder::find_matched;
use super::{Mapper, MapperHooks, MapperMap, NoHooks, mark_stored};
use crate::error::MapperError;
use crate::records::{Record, Value};
use crate::storage::formats::{FileFormat, FileRow};
use crate::storage::{StorageBackend, StorageError, read_text};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as WriteLock;
use tracing::{debug, warn};

pub struct FileTableMapper {
    map: MapperMap,
    storage: Arc<dyn StorageBackend>,
    path: String,
    format: Box<dyn FileFormat>,
    order_from_first: bool,
    cache: Mutex<Option<Vec<Record>>>,
    write_lock: WriteLock<()>,
    hooks: Arc<dyn MapperHooks>,
}

impl FileTableMapper {
    /// Table in `path` of the storage, new rows appended at the end
    pub fn new(
        map: MapperMap,
        storage: Arc<dyn StorageBackend>,
        path: impl Into<String>,
        format: Box<dyn FileFormat>,
    ) -> Self {
        Self {
            map,
            storage,
            path: path.into(),
            format,
            order_from_first: true,
            cache: Mutex::new(None),
            write_lock: WriteLock::new(()),
            hooks: Arc::new(NoHooks),
        }
    }

    /// `false` puts new rows at the beginning of the file
    pub fn order_from_first(mut self, order_from_first: bool) -> Self {
        self.order_from_first = order_from_first;
        self
    }

    pub fn with_hooks(mut self, hooks: impl MapperHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn format(&self) -> &dyn FileFormat {
        self.format.as_ref()
    }

    /// Forget cached rows, next access reads the file again
    pub fn clear_cache(&self) -> Result<(), MapperError> {
        *self.cache()? = None;
        Ok(())
    }

    fn cache(&self) -> Result<MutexGuard<'_, Option<Vec<Record>>>, MapperError> {
        self.cache.lock().map_err(|e| {
            MapperError::Storage(StorageError::BackendError(format!(
                "Table cache poisoned: {}",
                e
            )))
        })
    }

    /// Cached rows, read through `template` entries on first access
    async fn load_source(&self, template: &Record) -> Result<Vec<Record>, MapperError> {
        if let Some(records) = self.cache()?.as_ref() {
            return Ok(records.clone());
        }

        let content = read_text(self.storage.as_ref(), &self.path)
            .await?
            .unwrap_or_default();
        let mut records = Vec::new();
        for row in self.format.unpack(&content)? {
            records.push(self.record_from_row(template, &row)?);
        }
        debug!("Read {} rows from {}", records.len(), self.path);

        *self.cache()? = Some(records.clone());
        Ok(records)
    }

    fn record_from_row(&self, template: &Record, row: &FileRow) -> Result<Record, MapperError> {
        let mut record = template.blank();
        record.clear_mapper();
        for (key, column) in self.map.relations() {
            if let Some(cell) = row.get(column) {
                let entry = record.entry_mut(key)?;
                let value = entry.entry_type().value_from_text(cell);
                entry.set_data(value, true);
            }
        }
        Ok(record)
    }

    /// Primary key values joined by `_`, `None` when all of them are empty
    fn line_key(&self, record: &Record) -> Option<String> {
        let values: Vec<&Value> = self
            .map
            .primary_keys()
            .iter()
            .filter_map(|key| record.get(key).ok())
            .collect();
        if values.iter().all(|value| value.is_empty()) {
            return None;
        }
        Some(
            values
                .iter()
                .map(|value| value.to_text())
                .collect::<Vec<_>>()
                .join("_"),
        )
    }

    async fn save_source(&self, records: Vec<Record>) -> Result<bool, MapperError> {
        let mut lines = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let mut row = FileRow::new();
            for (key, column) in self.map.relations() {
                row.insert(column.clone(), record.get(key)?.to_text());
            }
            let line_key = self.line_key(record).unwrap_or_else(|| index.to_string());
            lines.push((line_key, row));
        }

        let content = self.format.pack(&lines)?;
        self.storage
            .write_file(&self.path, content.as_bytes())
            .await?;
        debug!("Wrote {} rows into {}", lines.len(), self.path);

        *self.cache()? = Some(records);
        Ok(true)
    }

    fn has_mapped_values(&self, record: &Record) -> bool {
        self.map
            .relations()
            .iter()
            .any(|(key, _)| record.get(key).is_ok_and(|value| !value.is_empty()))
    }
}

#[async_trait(?Send)]
impl Mapper for FileTableMapper {
    fn map(&self) -> &MapperMap {
        &self.map
    }

    fn alias(&self) -> &str {
        &self.path
    }

    fn hooks(&self) -> &dyn MapperHooks {
        self.hooks.as_ref()
    }

    async fn insert_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        let _write = self.write_lock.lock().await;
        let mut records = self.load_source(record).await?;
        let use_pks = !self.map.primary_keys().is_empty();
        if !find_matched(&self.map, record, &records, use_pks, false).is_empty() {
            debug!("Record already present in {}", self.path);
            return Ok(false);
        }

        for key in self.map.primary_keys() {
            let entry = record.entry(key)?;
            if !entry.entry_type().is_numeric() || !entry.data().is_empty() {
                continue;
            }
            let next = records
                .iter()
                .filter_map(|known| known.get(key).ok().and_then(Value::as_i64))
                .max()
                .map_or(1, |max| max + 1);
            let entry = record.entry_mut(key)?;
            let value = entry.entry_type().value_from_stored(Value::Int(next));
            entry.set_data(value, false);
        }

        let mut stored = record.clone();
        stored.clear_mapper();
        mark_stored(&self.map, &mut stored);
        if self.order_from_first {
            records.push(stored);
        } else {
            records.insert(0, stored);
        }
        self.save_source(records).await
    }

    async fn update_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        let _write = self.write_lock.lock().await;
        let mut records = self.load_source(record).await?;
        let use_pks = !self.map.primary_keys().is_empty();
        let matches = find_matched(&self.map, record, &records, use_pks, true);
        let Some(&index) = matches.first() else {
            return Ok(false);
        };

        let line = &mut records[index];
        for (key, _) in self.map.relations() {
            if self.map.is_primary_key(key) {
                continue;
            }
            let entry = record.entry(key)?;
            if entry.is_set() {
                line.entry_mut(key)?.set_data(entry.data().clone(), true);
            }
        }
        self.save_source(records).await
    }

    async fn load_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        let records = self.load_source(record).await?;
        let matches = find_matched(&self.map, record, &records, false, false);
        let Some(&index) = matches.first() else {
            return Ok(false);
        };

        for (key, _) in self.map.relations() {
            let value = records[index].get(key)?.clone();
            record.entry_mut(key)?.set_data(value, true);
        }
        Ok(true)
    }

    async fn delete_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        if !self.has_mapped_values(record) {
            warn!("Refusing to delete every row of {}", self.path);
            return Ok(false);
        }
        let _write = self.write_lock.lock().await;
        let records = self.load_source(record).await?;
        let matches = find_matched(&self.map, record, &records, false, false);
        if matches.is_empty() {
            return Ok(false);
        }

        let kept = records
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !matches.contains(index))
            .map(|(_, known)| known)
            .collect();
        self.save_source(kept).await
    }

    async fn count_record(&self, record: &Record) -> Result<usize, MapperError> {
        let records = self.load_source(record).await?;
        Ok(find_matched(&self.map, record, &records, false, false).len())
    }

    async fn load_multiple(&self, record: &Record) -> Result<Vec<Record>, MapperError> {
        let records = self.load_source(record).await?;
        let mapper = record.mapper().ok().cloned();
        Ok(find_matched(&self.map, record, &records, false, false)
            .into_iter()
            .map(|index| {
                let mut found = records[index].clone();
                if let Some(mapper) = &mapper {
                    found.set_mapper(Arc::clone(mapper));
                }
                found
            })
            .collect())
    }
}
