//! Transact-SQL (MS SQL Server)
//!
//! Without offset the limit goes into `TOP(n)`, a zero offset counts as none.
//! With offset the select ends with `OFFSET .. FETCH`, which requires ordering.

use super::{Dialect, DialectKind, JoinSide, enclose, literal};
use crate::error::MapperError;
use crate::storage::query_builder::QueryBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactSql;

impl TransactSql {
    fn top(limit: Option<usize>) -> String {
        limit.map(|limit| format!(" TOP({})", limit)).unwrap_or_default()
    }

    fn offset(query: &QueryBuilder) -> Option<usize> {
        query.offset().filter(|offset| *offset > 0)
    }
}

impl Dialect for TransactSql {
    fn kind(&self) -> DialectKind {
        DialectKind::TransactSql
    }

    fn quote(&self, identifier: &str) -> String {
        enclose(identifier, '[', ']')
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
        let paged = Self::offset(query).is_some();
        let mut ordering = self.make_ordering(query, true);
        if paged && ordering.is_empty() {
            ordering = " ORDER BY (SELECT NULL)".to_string();
        }
        Ok(format!(
            "SELECT{} {} FROM {}{}{}{}{}{}{};",
            if paged { String::new() } else { Self::top(query.limit()) },
            self.make_columns(query, true),
            self.quote(query.base_table()),
            self.make_joins(query)?,
            self.make_where(query, true)?,
            self.make_grouping(query, true),
            self.make_having(query, true)?,
            ordering,
            self.make_limits(query)
        ))
    }

    fn update(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "UPDATE{} {} SET {}{};",
            Self::top(query.limit()),
            self.quote(query.base_table()),
            self.make_properties(query),
            self.make_where(query, true)?
        ))
    }

    fn delete(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "DELETE{} FROM {}{};",
            Self::top(query.limit()),
            self.quote(query.base_table()),
            self.make_where(query, true)?
        ))
    }

    fn describe(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "SELECT * FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = {};",
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

    fn regexp(&self, _column: &str, _key: &str) -> Result<String, MapperError> {
        Err(MapperError::Dialect(
            "Transact-SQL has no regular expression comparison".to_string(),
        ))
    }

    fn make_limits(&self, query: &QueryBuilder) -> String {
        match (Self::offset(query), query.limit()) {
            (None, _) => String::new(),
            (Some(offset), None) => format!(" OFFSET {} ROWS", offset),
            (Some(offset), Some(limit)) => {
                format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
            }
        }
    }
}
