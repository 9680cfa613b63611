//! Export functionality
//!
//! Renders the storage a mapper expects, so tables for database mappers can
//! be created from their records:
//! - SQL `CREATE TABLE` per dialect

pub mod sql;

/// Result of an export operation
#[derive(Debug)]
pub struct ExportResult {
    /// Exported content
    pub content: String,
    /// Format identifier
    pub format: String,
}

pub use sql::SqlSchemaExporter;
