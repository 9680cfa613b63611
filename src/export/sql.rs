//! SQL exporter for generating CREATE TABLE statements from mapped records.
//!
//! # Security
//!
//! All identifiers are quoted by the target dialect, which doubles quote
//! characters inside them.

use super::ExportResult;
use crate::error::MapperError;
use crate::records::{EntryType, Record};
use crate::storage::dialects::DialectKind;

/// Exporter for SQL CREATE TABLE format.
pub struct SqlSchemaExporter;

impl SqlSchemaExporter {
    /// Table for the mapper of `record`, one column per relation.
    ///
    /// Column types follow the entry types, primary keys become a
    /// `PRIMARY KEY` constraint. Array entries hold joined records and get
    /// no column.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use kw_mapper::export::SqlSchemaExporter;
    /// use kw_mapper::mappers::{MapperMap, PresetMapper};
    /// use kw_mapper::records::{EntryType, Record};
    /// use kw_mapper::storage::dialects::DialectKind;
    ///
    /// let mut map = MapperMap::new("users");
    /// map.set_relation("id", "id").add_primary_key("id");
    /// let mut record = Record::with_mapper(Arc::new(PresetMapper::new(map, Vec::new())));
    /// record.add_entry("id", EntryType::Integer { max: 65535 }).unwrap();
    ///
    /// let sql = SqlSchemaExporter::create_table(&record, DialectKind::Postgres).unwrap();
    /// assert_eq!(sql, "CREATE TABLE \"users\" (\n  \"id\" INTEGER NOT NULL,\n  PRIMARY KEY (\"id\")\n);\n");
    /// ```
    pub fn create_table(record: &Record, dialect: DialectKind) -> Result<String, MapperError> {
        let mapper = record.mapper()?;
        let quoting = dialect.dialect();

        let mut definitions = Vec::new();
        let mut primary = Vec::new();
        for (key, column) in mapper.relations() {
            let entry_type = record.entry(key)?.entry_type();
            let Some(data_type) = Self::column_type(entry_type, dialect) else {
                continue;
            };
            let mut definition = format!("  {} {}", quoting.quote(column), data_type);
            if mapper.primary_keys().iter().any(|pk| pk == key) {
                definition.push_str(" NOT NULL");
                primary.push(quoting.quote(column));
            }
            definitions.push(definition);
        }
        if definitions.is_empty() {
            return Err(MapperError::InvalidEntry {
                key: mapper.alias().to_string(),
                reason: "No columns to create".to_string(),
            });
        }
        if !primary.is_empty() {
            definitions.push(format!("  PRIMARY KEY ({})", primary.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE {} (\n{}\n);\n",
            quoting.quote(mapper.alias()),
            definitions.join(",\n")
        ))
    }

    /// Export tables for all records (SDK interface).
    pub fn export(&self, records: &[Record], dialect: DialectKind) -> Result<ExportResult, MapperError> {
        let mut sql = String::new();
        for record in records {
            sql.push_str(&Self::create_table(record, dialect)?);
            sql.push('\n');
        }
        Ok(ExportResult {
            content: sql,
            format: "sql".to_string(),
        })
    }

    /// SQL type able to hold values of the entry type, `None` for arrays
    fn column_type(entry_type: &EntryType, dialect: DialectKind) -> Option<String> {
        let text = |length: usize| match (dialect, length) {
            (DialectKind::TransactSql, 0) => "NVARCHAR(MAX)".to_string(),
            (DialectKind::TransactSql, length) => format!("NVARCHAR({})", length),
            (_, 0) => "TEXT".to_string(),
            (_, length) => format!("VARCHAR({})", length),
        };

        let data_type = match entry_type {
            EntryType::Boolean => match dialect {
                DialectKind::MySql => "TINYINT(1)".to_string(),
                DialectKind::TransactSql => "BIT".to_string(),
                _ => "BOOLEAN".to_string(),
            },
            EntryType::Integer { max } if *max > i64::from(i32::MAX) => "BIGINT".to_string(),
            EntryType::Integer { .. } => match dialect {
                DialectKind::MySql | DialectKind::TransactSql => "INT".to_string(),
                _ => "INTEGER".to_string(),
            },
            EntryType::Float { .. } => match dialect {
                DialectKind::Postgres => "DOUBLE PRECISION".to_string(),
                DialectKind::Sqlite => "REAL".to_string(),
                DialectKind::TransactSql => "FLOAT".to_string(),
                DialectKind::MySql | DialectKind::DuckDb => "DOUBLE".to_string(),
            },
            EntryType::String { max_length } => text(*max_length),
            EntryType::Set { allowed } => {
                text(allowed.iter().map(|value| value.chars().count()).max().unwrap_or(1))
            }
            EntryType::Object => match dialect {
                DialectKind::Postgres => "JSONB".to_string(),
                DialectKind::MySql | DialectKind::DuckDb => "JSON".to_string(),
                _ => text(0),
            },
            EntryType::Array => return None,
        };
        Some(data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::{Mapper, MapperMap, PresetMapper};
    use std::sync::Arc;

    fn article() -> Record {
        let mut map = MapperMap::new("articles");
        map.set_relation("id", "a_id")
            .set_relation("lang", "a_lang")
            .set_relation("title", "a_title")
            .set_relation("body", "a_body")
            .set_relation("state", "a_state")
            .set_relation("published", "a_published")
            .set_relation("meta", "a_meta")
            .add_primary_key("id")
            .add_primary_key("lang");
        let mapper: Arc<dyn Mapper> = Arc::new(PresetMapper::new(map, Vec::new()));
        let mut record = Record::with_mapper(mapper);
        record
            .add_entry("id", EntryType::Integer { max: 4_000_000_000 })
            .unwrap()
            .add_entry("lang", EntryType::String { max_length: 2 })
            .unwrap()
            .add_entry("title", EntryType::String { max_length: 256 })
            .unwrap()
            .add_entry("body", EntryType::String { max_length: 0 })
            .unwrap()
            .add_entry(
                "state",
                EntryType::Set {
                    allowed: vec!["draft".to_string(), "published".to_string()],
                },
            )
            .unwrap()
            .add_entry("published", EntryType::Boolean)
            .unwrap()
            .add_entry("meta", EntryType::Object)
            .unwrap()
            .add_entry("comments", EntryType::Array)
            .unwrap();
        record
    }

    #[test]
    fn test_postgres_table() {
        let sql = SqlSchemaExporter::create_table(&article(), DialectKind::Postgres).unwrap();
        assert_eq!(
            sql,
            concat!(
                "CREATE TABLE \"articles\" (\n",
                "  \"a_id\" BIGINT NOT NULL,\n",
                "  \"a_lang\" VARCHAR(2) NOT NULL,\n",
                "  \"a_title\" VARCHAR(256),\n",
                "  \"a_body\" TEXT,\n",
                "  \"a_state\" VARCHAR(9),\n",
                "  \"a_published\" BOOLEAN,\n",
                "  \"a_meta\" JSONB,\n",
                "  PRIMARY KEY (\"a_id\", \"a_lang\")\n",
                ");\n"
            )
        );
    }

    #[test]
    fn test_dialect_types() {
        let sql = SqlSchemaExporter::create_table(&article(), DialectKind::TransactSql).unwrap();
        assert!(sql.starts_with("CREATE TABLE [articles] (\n  [a_id] BIGINT NOT NULL,"));
        assert!(sql.contains("[a_body] NVARCHAR(MAX),"));
        assert!(sql.contains("[a_published] BIT,"));

        let sql = SqlSchemaExporter::create_table(&article(), DialectKind::MySql).unwrap();
        assert!(sql.contains("`a_published` TINYINT(1),"));
        assert!(sql.contains("`a_meta` JSON,"));
    }

    #[test]
    fn test_export_requires_mapper_and_columns() {
        let mut record = Record::new();
        record.add_entry("id", EntryType::Integer { max: 1 }).unwrap();
        assert!(matches!(
            SqlSchemaExporter::create_table(&record, DialectKind::Sqlite),
            Err(MapperError::MissingMapper)
        ));

        let exporter = SqlSchemaExporter;
        let result = exporter.export(&[article()], DialectKind::DuckDb).unwrap();
        assert_eq!(result.format, "sql");
        assert!(result.content.contains("\"a_title\" VARCHAR(256)"));
    }
}
