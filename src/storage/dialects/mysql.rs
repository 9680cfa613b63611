//! MySQL / MariaDB

use super::{Dialect, DialectKind, JoinSide, enclose};
use crate::error::MapperError;
use crate::storage::query_builder::QueryBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl MySql {
    fn limit_only(query: &QueryBuilder) -> String {
        query
            .limit()
            .map(|limit| format!(" LIMIT {}", limit))
            .unwrap_or_default()
    }
}

impl Dialect for MySql {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn quote(&self, identifier: &str) -> String {
        enclose(identifier, '`', '`')
    }

    fn insert(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "INSERT INTO {} SET {};",
            self.quote(query.base_table()),
            self.make_properties(query)
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
            "UPDATE {} SET {}{}{};",
            self.quote(query.base_table()),
            self.make_properties(query),
            self.make_where(query, true)?,
            Self::limit_only(query)
        ))
    }

    fn delete(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!(
            "DELETE FROM {}{}{};",
            self.quote(query.base_table()),
            self.make_where(query, true)?,
            Self::limit_only(query)
        ))
    }

    fn describe(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        Ok(format!("DESCRIBE {};", self.quote(query.base_table())))
    }

    fn available_joins(&self) -> &'static [JoinSide] {
        &[
            JoinSide::Basic,
            JoinSide::Inner,
            JoinSide::Cross,
            JoinSide::Left,
            JoinSide::Right,
        ]
    }

    fn make_limits(&self, query: &QueryBuilder) -> String {
        match (query.limit(), query.offset()) {
            (None, _) => String::new(),
            (Some(limit), None) => format!(" LIMIT {}", limit),
            (Some(limit), Some(offset)) => format!(" LIMIT {},{}", offset, limit),
        }
    }
}
