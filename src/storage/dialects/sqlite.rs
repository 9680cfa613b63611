//! SQLite
//!
//! Statements without joins use bare column names; update and delete never
//! get limits because SQLite builds rarely enable them.

use super::{Dialect, DialectKind, JoinSide, enclose, literal};
use crate::error::MapperError;
use crate::storage::query_builder::QueryBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote(&self, identifier: &str) -> String {
        enclose(identifier, '"', '"')
    }

    fn insert(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.quote(query.base_table()),
            self.make_property_list(query),
            self.make_property_entries(query)
        ))
    }

    fn select(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        let full = !query.joins().is_empty();
        Ok(format!(
            "SELECT {} FROM {}{}{}{}{}{}{};",
            self.make_columns(query, full),
            self.quote(query.base_table()),
            self.make_joins(query)?,
            self.make_where(query, full)?,
            self.make_grouping(query, full),
            self.make_having(query, full)?,
            self.make_ordering(query, full),
            self.make_limits(query)
        ))
    }

    fn update(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "UPDATE {} SET {}{};",
            self.quote(query.base_table()),
            self.make_properties(query),
            self.make_where(query, false)?
        ))
    }

    fn delete(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "DELETE FROM {}{};",
            self.quote(query.base_table()),
            self.make_where(query, false)?
        ))
    }

    fn describe(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "SELECT \"sql\" FROM \"sqlite_master\" WHERE \"name\" = {};",
            literal(query.base_table())
        ))
    }

    fn available_joins(&self) -> &'static [JoinSide] {
        &[
            JoinSide::Basic,
            JoinSide::Inner,
            JoinSide::Outer,
            JoinSide::Cross,
            JoinSide::Left,
            JoinSide::LeftOuter,
        ]
    }
}
