//! Constant table defined in code
//!
//! Rows are keyed by storage keys. Records can be looked up and counted but
//! never changed.

use super::finder::find_matched;
use super::{Mapper, MapperMap};
use crate::error::MapperError;
use crate::records::{Record, Value};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One preset row, storage key to value
pub type PresetRow = BTreeMap<String, Value>;

pub struct PresetMapper {
    map: MapperMap,
    rows: Vec<PresetRow>,
}

impl PresetMapper {
    pub fn new(map: MapperMap, rows: Vec<PresetRow>) -> Self {
        Self { map, rows }
    }

    pub fn rows(&self) -> &[PresetRow] {
        &self.rows
    }

    fn records(&self, template: &Record) -> Result<Vec<Record>, MapperError> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = template.blank();
                record.clear_mapper();
                for (key, column) in self.map.relations() {
                    if let Some(value) = row.get(column) {
                        let entry = record.entry_mut(key)?;
                        let value = entry.entry_type().value_from_stored(value.clone());
                        entry.set_data(value, true);
                    }
                }
                Ok(record)
            })
            .collect()
    }

    fn read_only(&self, operation: &str) -> MapperError {
        MapperError::ReadOnly(format!(
            "Cannot {} record in preset {}",
            operation,
            self.map.source()
        ))
    }
}

#[async_trait(?Send)]
impl Mapper for PresetMapper {
    fn map(&self) -> &MapperMap {
        &self.map
    }

    fn alias(&self) -> &str {
        self.map.source()
    }

    async fn insert_record(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Err(self.read_only("insert"))
    }

    async fn update_record(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Err(self.read_only("update"))
    }

    async fn load_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        let records = self.records(record)?;
        let Some(&index) = find_matched(&self.map, record, &records, false, false).first() else {
            return Ok(false);
        };
        for (key, _) in self.map.relations() {
            let value = records[index].get(key)?.clone();
            record.entry_mut(key)?.set_data(value, true);
        }
        Ok(true)
    }

    async fn delete_record(&self, _record: &mut Record) -> Result<bool, MapperError> {
        Err(self.read_only("delete"))
    }

    async fn count_record(&self, record: &Record) -> Result<usize, MapperError> {
        let records = self.records(record)?;
        Ok(find_matched(&self.map, record, &records, false, false).len())
    }

    async fn load_multiple(&self, record: &Record) -> Result<Vec<Record>, MapperError> {
        let mut records = self.records(record)?;
        let mapper = record.mapper().ok().cloned();
        let matched = find_matched(&self.map, record, &records, false, false);
        let mut found = Vec::with_capacity(matched.len());
        for index in matched {
            let mut item = std::mem::take(&mut records[index]);
            if let Some(mapper) = &mapper {
                item.set_mapper(Arc::clone(mapper));
            }
            found.push(item);
        }
        Ok(found)
    }
}
