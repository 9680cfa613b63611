//! Mappers
//!
//! A mapper knows where records of one kind live and how to move them there
//! and back. Its [`MapperMap`] lists the relations between record keys and
//! storage keys together with primary and foreign keys.
//!
//! Implementations:
//! - `DatabaseMapper`: table in an SQL database, optionally with separate
//!   read and write connections
//! - `FileTableMapper`: table kept in a single file
//! - `PageContentMapper`: one file is one record
//! - `PresetMapper`: constant rows, read only

pub mod database;
pub mod file_table;
mod finder;
pub mod page_content;
pub mod preset;

pub use database::DatabaseMapper;
pub use file_table::FileTableMapper;
pub use page_content::PageContentMapper;
pub use preset::{PresetMapper, PresetRow};

use crate::error::MapperError;
use crate::records::{Entry, Record, Value};
use crate::storage::database::Database;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a mapper, records keep one
pub type MapperHandle = Arc<dyn Mapper>;

/// Creates an empty record of the remote side of a foreign key
pub type RecordFactory = Arc<dyn Fn() -> Result<Record, MapperError> + Send + Sync>;

/// Link from an array entry of a record to records of another mapper
#[derive(Clone)]
pub struct ForeignKey {
    pub local_entry_key: String,
    pub remote_entry_key: String,
    pub remote_record: RecordFactory,
}

impl ForeignKey {
    pub fn remote_record(&self) -> Result<Record, MapperError> {
        (self.remote_record)()
    }
}

impl fmt::Debug for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignKey")
            .field("local_entry_key", &self.local_entry_key)
            .field("remote_entry_key", &self.remote_entry_key)
            .finish_non_exhaustive()
    }
}

/// Where records are and how their keys translate into storage
#[derive(Debug, Clone, Default)]
pub struct MapperMap {
    source: String,
    relations: Vec<(String, String)>,
    primary_keys: Vec<String>,
    foreign_keys: Vec<(String, ForeignKey)>,
}

impl MapperMap {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn set_source(&mut self, source: impl Into<String>) -> &mut Self {
        self.source = source.into();
        self
    }

    /// Map record key onto storage key; mapping the same record key again replaces it
    pub fn set_relation(
        &mut self,
        record_key: impl Into<String>,
        storage_key: impl Into<String>,
    ) -> &mut Self {
        let record_key = record_key.into();
        let storage_key = storage_key.into();
        match self.relations.iter_mut().find(|(key, _)| *key == record_key) {
            Some((_, existing)) => *existing = storage_key,
            None => self.relations.push((record_key, storage_key)),
        }
        self
    }

    pub fn add_primary_key(&mut self, record_key: impl Into<String>) -> &mut Self {
        let record_key = record_key.into();
        if !self.primary_keys.contains(&record_key) {
            self.primary_keys.push(record_key);
        }
        self
    }

    /// Fill array entry `name` with remote records whose `remote_key` equals `local_key`
    pub fn add_foreign_key<F>(
        &mut self,
        name: impl Into<String>,
        local_key: impl Into<String>,
        remote_key: impl Into<String>,
        remote_record: F,
    ) -> &mut Self
    where
        F: Fn() -> Result<Record, MapperError> + Send + Sync + 'static,
    {
        let name = name.into();
        let foreign_key = ForeignKey {
            local_entry_key: local_key.into(),
            remote_entry_key: remote_key.into(),
            remote_record: Arc::new(remote_record),
        };
        match self.foreign_keys.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = foreign_key,
            None => self.foreign_keys.push((name, foreign_key)),
        }
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn relations(&self) -> &[(String, String)] {
        &self.relations
    }

    /// Storage key of a record key
    pub fn relation(&self, record_key: &str) -> Option<&str> {
        self.relations
            .iter()
            .find(|(key, _)| key == record_key)
            .map(|(_, storage)| storage.as_str())
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn is_primary_key(&self, record_key: &str) -> bool {
        self.primary_keys.iter().any(|key| key == record_key)
    }

    pub fn foreign_keys(&self) -> &[(String, ForeignKey)] {
        &self.foreign_keys
    }

    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, foreign_key)| foreign_key)
    }
}

/// Code run around persistence operations
///
/// Returning `false` from a `before_*` hook stops the operation, which then
/// reports `false`. The `after_*` result becomes the operation result.
pub trait MapperHooks: Send + Sync {
    fn before_save(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Ok(true)
    }

    fn after_save(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Ok(true)
    }

    fn before_load(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Ok(true)
    }

    fn after_load(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Ok(true)
    }

    fn before_delete(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Ok(true)
    }

    fn after_delete(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Ok(true)
    }
}

/// Hooks doing nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl MapperHooks for NoHooks {}

/// Access to the storage of one kind of records
#[async_trait(?Send)]
pub trait Mapper: Send + Sync {
    fn map(&self) -> &MapperMap;

    /// Name the storage is known under: table, file path or source
    fn alias(&self) -> &str;

    fn source(&self) -> &str {
        self.map().source()
    }

    fn relations(&self) -> &[(String, String)] {
        self.map().relations()
    }

    fn primary_keys(&self) -> &[String] {
        self.map().primary_keys()
    }

    fn foreign_keys(&self) -> &[(String, ForeignKey)] {
        self.map().foreign_keys()
    }

    fn hooks(&self) -> &dyn MapperHooks {
        &NoHooks
    }

    /// Connection used for reading, database mappers only
    fn read_database(&self) -> Option<Arc<dyn Database>> {
        None
    }

    async fn insert_record(&self, record: &mut Record) -> Result<bool, MapperError>;

    async fn update_record(&self, record: &mut Record) -> Result<bool, MapperError>;

    async fn load_record(&self, record: &mut Record) -> Result<bool, MapperError>;

    async fn delete_record(&self, record: &mut Record) -> Result<bool, MapperError>;

    async fn count_record(&self, record: &Record) -> Result<usize, MapperError>;

    /// Records matching the values set in `record`
    async fn load_multiple(&self, record: &Record) -> Result<Vec<Record>, MapperError>;

    /// Store the record; without `force_insert` try update first
    async fn save(&self, record: &mut Record, force_insert: bool) -> Result<bool, MapperError> {
        if !self.hooks().before_save(record)? {
            return Ok(false);
        }
        let done = if force_insert {
            self.insert_record(record).await?
        } else if self.update_record(record).await? {
            true
        } else if record.iter().any(|(_, entry)| entry.is_from_storage()) {
            false
        } else {
            self.insert_record(record).await?
        };
        if !done {
            return Ok(false);
        }
        mark_stored(self.map(), record);
        self.hooks().after_save(record)
    }

    /// Fill the record from storage, values already set work as conditions
    async fn load(&self, record: &mut Record) -> Result<bool, MapperError> {
        if !self.hooks().before_load(record)? {
            return Ok(false);
        }
        if !self.load_record(record).await? {
            return Ok(false);
        }
        mark_stored(self.map(), record);
        self.hooks().after_load(record)
    }

    async fn delete(&self, record: &mut Record) -> Result<bool, MapperError> {
        if !self.hooks().before_delete(record)? {
            return Ok(false);
        }
        if !self.delete_record(record).await? {
            return Ok(false);
        }
        self.hooks().after_delete(record)
    }
}

/// Mark assigned mapped entries as matching storage
pub(crate) fn mark_stored(map: &MapperMap, record: &mut Record) {
    for (key, _) in map.relations() {
        if let Ok(entry) = record.entry_mut(key)
            && entry.is_set()
        {
            entry.mark_from_storage(true);
        }
    }
}

/// Whether the entry holds a value usable in storage conditions and properties
pub(crate) fn is_assigned(entry: &Entry) -> bool {
    entry.is_set() && !matches!(entry.data(), Value::Null | Value::Array(_))
}

/// Mapped entries with assigned values in record order: record key, storage key, entry
pub(crate) fn assigned_entries<'a>(
    map: &'a MapperMap,
    record: &'a Record,
) -> impl Iterator<Item = (&'a str, &'a str, &'a Entry)> + 'a {
    record.iter().filter_map(move |(key, entry)| {
        let storage_key = map.relation(key)?;
        is_assigned(entry).then_some((key, storage_key, entry))
    })
}
