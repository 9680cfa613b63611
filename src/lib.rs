//! kw-mapper - Mapper for accessing resources in KWCMS
//!
//! Records declare typed entries, mappers move them to and from storage:
//! - SQL databases through dialect specific queries
//! - tables kept in single files (separated values, CSV, INI, JSON, YAML)
//! - whole files as page records
//! - constant presets
//!
//! Searches run as SQL for database mappers and in memory for the rest.

pub mod error;
pub mod export;
pub mod mappers;
pub mod records;
pub mod search;
pub mod storage;
pub mod validation;

pub use error::MapperError;

// Re-export commonly used types
pub use records::{Entry, EntryType, Record, Value};

pub use mappers::{
    DatabaseMapper, FileTableMapper, Mapper, MapperHandle, MapperHooks, MapperMap,
    PageContentMapper, PresetMapper, PresetRow,
};

pub use search::Search;

pub use storage::{MemoryStorageBackend, QueryBuilder, StorageBackend, StorageError};
#[cfg(feature = "native-fs")]
pub use storage::filesystem::FileSystemStorageBackend;

pub use storage::database::{Config, ConfigStorage, Database, DatabaseRegistry, Driver};
pub use storage::dialects::DialectKind;

pub use export::{ExportResult, SqlSchemaExporter};
pub use validation::{MappingIssue, MappingValidationResult, MappingValidator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
