//! Mapping validation
//!
//! A mapper map is written by hand next to the record declaring its entries,
//! so the two drift apart easily. The validator lists every mismatch instead
//! of stopping at the first one.

use crate::error::MapperError;
use crate::records::{EntryType, Record};
use tracing::warn;

/// Mismatch between a record and the map of its mapper
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingIssue {
    #[error("Relation *{key}* has no entry in the record")]
    RelationWithoutEntry { key: String },
    #[error("Primary key *{key}* has no relation")]
    PrimaryKeyWithoutRelation { key: String },
    #[error("Foreign key *{name}* has no array entry in the record")]
    ForeignKeyWithoutEntry { name: String },
    #[error("Entry for foreign key *{name}* is not an array")]
    ForeignKeyNotArray { name: String },
    #[error("Local key *{key}* of foreign key *{name}* has no relation")]
    LocalKeyWithoutRelation { name: String, key: String },
    #[error("Remote key *{key}* of foreign key *{name}* has no relation")]
    RemoteKeyWithoutRelation { name: String, key: String },
    #[error("Remote record of foreign key *{name}* is unusable: {reason}")]
    RemoteRecord { name: String, reason: String },
}

/// Result of mapping validation
#[derive(Debug, Default)]
pub struct MappingValidationResult {
    pub issues: Vec<MappingIssue>,
}

impl MappingValidationResult {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Mapping validator
pub struct MappingValidator;

impl MappingValidator {
    /// Check the record against its mapper; a record without mapper is an error
    pub fn validate(record: &Record) -> Result<MappingValidationResult, MapperError> {
        let mapper = record.mapper()?;
        let map = mapper.map();
        let mut result = MappingValidationResult::default();

        for (key, _) in map.relations() {
            if !record.contains(key) {
                result
                    .issues
                    .push(MappingIssue::RelationWithoutEntry { key: key.clone() });
            }
        }

        for key in map.primary_keys() {
            if map.relation(key).is_none() {
                result
                    .issues
                    .push(MappingIssue::PrimaryKeyWithoutRelation { key: key.clone() });
            }
        }

        for (name, foreign_key) in map.foreign_keys() {
            match record.entry(name) {
                Ok(entry) if *entry.entry_type() != EntryType::Array => {
                    result
                        .issues
                        .push(MappingIssue::ForeignKeyNotArray { name: name.clone() });
                }
                Ok(_) => {}
                Err(_) => result
                    .issues
                    .push(MappingIssue::ForeignKeyWithoutEntry { name: name.clone() }),
            }

            if map.relation(&foreign_key.local_entry_key).is_none() {
                result.issues.push(MappingIssue::LocalKeyWithoutRelation {
                    name: name.clone(),
                    key: foreign_key.local_entry_key.clone(),
                });
            }

            let remote = foreign_key
                .remote_record()
                .and_then(|remote| remote.mapper().cloned());
            match remote {
                Ok(remote_mapper) => {
                    if remote_mapper
                        .map()
                        .relation(&foreign_key.remote_entry_key)
                        .is_none()
                    {
                        result.issues.push(MappingIssue::RemoteKeyWithoutRelation {
                            name: name.clone(),
                            key: foreign_key.remote_entry_key.clone(),
                        });
                    }
                }
                Err(err) => result.issues.push(MappingIssue::RemoteRecord {
                    name: name.clone(),
                    reason: err.to_string(),
                }),
            }
        }

        if !result.is_valid() {
            warn!(
                "Mapper {} has {} mapping issues",
                mapper.alias(),
                result.issues.len()
            );
        }
        Ok(result)
    }
}
