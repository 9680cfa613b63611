//! DuckDB, SQLite-like statements with full column names

use super::{Dialect, DialectKind, JoinSide, enclose, literal};
use crate::error::MapperError;
use crate::storage::query_builder::QueryBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDb;

impl Dialect for DuckDb {
    fn kind(&self) -> DialectKind {
        DialectKind::DuckDb
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
        Ok(format!(
            "SELECT {} FROM {}{}{}{}{}{}{};",
            self.make_columns(query, true),
            self.quote(query.base_table()),
            self.make_joins(query)?,
            self.make_where(query, true)?,
            self.make_grouping(query, true),
            self.make_having(query, true)?,
            self.make_ordering(query, true),
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
            "SELECT column_name, data_type FROM information_schema.columns WHERE table_name = {};",
            literal(query.base_table())
        ))
    }

    fn available_joins(&self) -> &'static [JoinSide] {
        &[
            JoinSide::Basic,
            JoinSide::Inner,
            JoinSide::Cross,
            JoinSide::Left,
            JoinSide::Right,
            JoinSide::LeftOuter,
            JoinSide::RightOuter,
            JoinSide::FullOuter,
        ]
    }

    fn regexp(&self, column: &str, key: &str) -> Result<String, MapperError> {
        Ok(format!("regexp_matches({}, {})", column, key))
    }

    fn make_limits(&self, query: &QueryBuilder) -> String {
        match (query.limit(), query.offset()) {
            (None, None) => String::new(),
            (None, Some(offset)) => format!(" OFFSET {}", offset),
            (Some(limit), None) => format!(" LIMIT {}", limit),
            (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
        }
    }
}
