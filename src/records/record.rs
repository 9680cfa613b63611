//! Record - named, typed entries bound to a mapper

use super::{Entry, EntryType, Value};
use crate::error::MapperError;
use crate::mappers::{Mapper, MapperHandle};
use std::fmt;
use std::sync::Arc;

/// Record maps entries to their respective values
///
/// Access goes through [`Record::get`] and [`Record::set`] so every value is
/// checked against the type of its entry. Entries can be declared but never
/// removed.
///
/// # Example
///
/// ```rust
/// use kw_mapper::records::{EntryType, Record};
///
/// let mut record = Record::new();
/// record.add_entry("id", EntryType::Integer { max: 65535 }).unwrap();
/// record.add_entry("name", EntryType::String { max_length: 128 }).unwrap();
/// record.set("name", "admin").unwrap();
/// assert_eq!(record.get("name").unwrap().as_str(), Some("admin"));
/// ```
#[derive(Clone, Default)]
pub struct Record {
    entries: Vec<(String, Entry)>,
    mapper: Option<MapperHandle>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapper(mapper: MapperHandle) -> Self {
        Self {
            entries: Vec::new(),
            mapper: Some(mapper),
        }
    }

    pub fn set_mapper(&mut self, mapper: MapperHandle) {
        self.mapper = Some(mapper);
    }

    /// Unbind the mapper, used for copies a mapper keeps itself
    pub(crate) fn clear_mapper(&mut self) {
        self.mapper = None;
    }

    /// Mapper bound to this record
    pub fn mapper(&self) -> Result<&MapperHandle, MapperError> {
        self.mapper.as_ref().ok_or(MapperError::MissingMapper)
    }

    /// Declare an entry; declaring the same name again replaces it
    pub fn add_entry(
        &mut self,
        name: impl Into<String>,
        entry_type: EntryType,
    ) -> Result<&mut Self, MapperError> {
        let name = name.into();
        if let EntryType::Set { allowed } = &entry_type
            && allowed.is_empty()
        {
            return Err(MapperError::InvalidEntry {
                key: name,
                reason: "Set must contain at least one preset value".to_string(),
            });
        }
        let entry = Entry::new(entry_type);
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((name, entry)),
        }
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == key)
    }

    pub fn entry(&self, key: &str) -> Result<&Entry, MapperError> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, entry)| entry)
            .ok_or_else(|| MapperError::UnknownKey(key.to_string()))
    }

    pub fn entry_mut(&mut self, key: &str) -> Result<&mut Entry, MapperError> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == key)
            .map(|(_, entry)| entry)
            .ok_or_else(|| MapperError::UnknownKey(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Result<&Value, MapperError> {
        self.entry(key).map(Entry::data)
    }

    /// Set a value; it must pass the limits of the entry type
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), MapperError> {
        let entry = self.entry_mut(key)?;
        let value = entry.entry_type().check(key, value.into())?;
        entry.set_data(value, false);
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of this record with all values reset, keeps entries and mapper
    pub fn blank(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(name, entry)| (name.clone(), Entry::new(entry.entry_type().clone())))
                .collect(),
            mapper: self.mapper.clone(),
        }
    }

    fn bound_mapper(&self) -> Result<MapperHandle, MapperError> {
        self.mapper().map(Arc::clone)
    }

    /// Save through the bound mapper
    pub async fn save(&mut self, force_insert: bool) -> Result<bool, MapperError> {
        let mapper = self.bound_mapper()?;
        mapper.save(self, force_insert).await
    }

    /// Load through the bound mapper, set values work as conditions
    pub async fn load(&mut self) -> Result<bool, MapperError> {
        let mapper = self.bound_mapper()?;
        mapper.load(self).await
    }

    pub async fn delete(&mut self) -> Result<bool, MapperError> {
        let mapper = self.bound_mapper()?;
        mapper.delete(self).await
    }

    pub async fn count(&self) -> Result<usize, MapperError> {
        let mapper = self.bound_mapper()?;
        mapper.count_record(self).await
    }

    pub async fn load_multiple(&self) -> Result<Vec<Record>, MapperError> {
        let mapper = self.bound_mapper()?;
        mapper.load_multiple(self).await
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((a_key, a), (b_key, b))| a_key == b_key && a.data() == b.data())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Record");
        if let Some(mapper) = &self.mapper {
            debug.field("mapper", &mapper.alias());
        }
        for (name, entry) in &self.entries {
            debug.field(name, entry.data());
        }
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Record {
        let mut record = Record::new();
        record
            .add_entry("id", EntryType::Integer { max: 65535 })
            .unwrap()
            .add_entry("name", EntryType::String { max_length: 8 })
            .unwrap()
            .add_entry("enabled", EntryType::Boolean)
            .unwrap();
        record
    }

    #[test]
    fn test_unknown_key() {
        let mut record = user();
        assert!(matches!(record.get("nope"), Err(MapperError::UnknownKey(_))));
        assert!(matches!(
            record.set("nope", 1),
            Err(MapperError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_marks_entry_as_changed() {
        let mut record = user();
        record.entry_mut("id").unwrap().set_data(Value::Int(5), true);
        assert!(record.entry("id").unwrap().is_from_storage());
        record.set("id", 6).unwrap();
        let entry = record.entry("id").unwrap();
        assert!(entry.is_set());
        assert!(!entry.is_from_storage());
        assert_eq!(entry.data(), &Value::Int(6));
    }

    #[test]
    fn test_rejects_wrong_types() {
        let mut record = user();
        assert!(record.set("enabled", "yes").is_err());
        assert!(record.set("name", "too long name").is_err());
        assert!(record.set("id", 70000).is_err());
        assert!(record.set("name", Value::Null).is_ok());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut record = user();
        record.set("name", "first").unwrap();
        let mut copy = record.clone();
        copy.set("name", "second").unwrap();
        assert_eq!(record.get("name").unwrap().as_str(), Some("first"));
        assert_eq!(copy.get("name").unwrap().as_str(), Some("second"));
    }

    #[test]
    fn test_keeps_declaration_order() {
        let mut record = user();
        record.add_entry("id", EntryType::Integer { max: 10 }).unwrap();
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["id", "name", "enabled"]);
        assert!(record
            .add_entry("color", EntryType::Set { allowed: vec![] })
            .is_err());
    }

    #[test]
    fn test_missing_mapper() {
        let record = user();
        assert!(matches!(record.mapper(), Err(MapperError::MissingMapper)));
    }
}
