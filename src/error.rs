//! Error type shared by records, mappers, storages and searches

use crate::storage::StorageError;

/// Error type for mapper operations
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("Unknown key {0}")]
    UnknownKey(String),
    #[error("Invalid value for key {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Invalid entry definition for key {key}: {reason}")]
    InvalidEntry { key: String, reason: String },
    #[error("Unknown entry mapper")]
    MissingMapper,
    #[error("Unknown source *{0}*")]
    UnknownSource(String),
    #[error("Wanted driver {0} not exists")]
    UnknownDriver(String),
    #[error("Unknown dialect {0}")]
    UnknownDialect(String),
    #[error("Unknown relation key *{key}* in mapper for table *{table}*")]
    UnknownRelation { key: String, table: String },
    #[error("Join error: {0}")]
    Join(String),
    #[error("Read-only source: {0}")]
    ReadOnly(String),
    #[error("Dialect error: {0}")]
    Dialect(String),
    #[error("Format error: {0}")]
    Format(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Search error: {0}")]
    Search(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(feature = "duckdb-backend")]
impl From<duckdb::Error> for MapperError {
    fn from(err: duckdb::Error) -> Self {
        MapperError::Database(err.to_string())
    }
}
