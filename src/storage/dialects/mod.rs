//! SQL dialects
//!
//! Each dialect renders the parts collected in a [`QueryBuilder`] into the
//! SQL its server understands. Identifiers are quoted and quote characters
//! inside them doubled, so table and column names never break out of their
//! enclosure. Values never appear in the SQL, only their placeholders.

mod duckdb;
mod mysql;
mod postgres;
mod sqlite;
mod transact_sql;

pub use self::duckdb::DuckDb;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use transact_sql::TransactSql;

use super::query_builder::{Condition, Operation, ParamKey, QueryBuilder};
use crate::error::MapperError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use super::query_builder::JoinSide;

/// Known dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    MySql,
    Sqlite,
    Postgres,
    TransactSql,
    DuckDb,
}

impl DialectKind {
    /// Dialect by its name or the name of its server
    pub fn from_name(name: &str) -> Result<Self, MapperError> {
        match name.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DialectKind::MySql),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            "postgres" | "postgresql" | "pgsql" => Ok(DialectKind::Postgres),
            "mssql" | "sqlserver" | "transactsql" | "tsql" => Ok(DialectKind::TransactSql),
            "duckdb" => Ok(DialectKind::DuckDb),
            other => Err(MapperError::UnknownDialect(other.to_string())),
        }
    }

    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            DialectKind::MySql => &MySql,
            DialectKind::Sqlite => &Sqlite,
            DialectKind::Postgres => &Postgres,
            DialectKind::TransactSql => &TransactSql,
            DialectKind::DuckDb => &DuckDb,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DialectKind::MySql => "mysql",
            DialectKind::Sqlite => "sqlite",
            DialectKind::Postgres => "postgres",
            DialectKind::TransactSql => "mssql",
            DialectKind::DuckDb => "duckdb",
        })
    }
}

/// Quote identifier with the given enclosure, doubling the closing character inside
pub(crate) fn enclose(identifier: &str, open: char, close: char) -> String {
    let doubled: String = [close, close].iter().collect();
    format!(
        "{}{}{}",
        open,
        identifier.replace(close, &doubled),
        close
    )
}

/// Quote string literal, used only for table names in schema lookups
pub(crate) fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Renders queries for one SQL server
///
/// Only the statements and the quoting are dialect specific; the shared
/// pieces (columns, conditions, joins, ordering) are provided.
pub trait Dialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Quote a single identifier
    fn quote(&self, identifier: &str) -> String;

    fn insert(&self, query: &QueryBuilder) -> Result<String, MapperError>;

    fn select(&self, query: &QueryBuilder) -> Result<String, MapperError>;

    fn update(&self, query: &QueryBuilder) -> Result<String, MapperError>;

    fn delete(&self, query: &QueryBuilder) -> Result<String, MapperError>;

    /// Query describing columns of the base table
    fn describe(&self, query: &QueryBuilder) -> Result<String, MapperError>;

    fn available_joins(&self) -> &'static [JoinSide];

    /// Comparison by regular expression
    fn regexp(&self, column: &str, key: &str) -> Result<String, MapperError> {
        Ok(format!("{} REGEXP {}", column, key))
    }

    /// Column name, prefixed by its table when `full` and the table is known
    fn column_name(&self, table: &str, column: &str, full: bool) -> String {
        if full && !table.is_empty() {
            format!("{}.{}", self.quote(table), self.quote(column))
        } else {
            self.quote(column)
        }
    }

    fn make_columns(&self, query: &QueryBuilder, full: bool) -> String {
        if query.columns().is_empty() {
            return "*".to_string();
        }
        query
            .columns()
            .iter()
            .map(|column| {
                let name = self.column_name(&column.table, &column.column, full);
                let name = match column.aggregate {
                    Some(aggregate) => format!("{}({})", aggregate, name),
                    None => name,
                };
                if column.alias.is_empty() {
                    name
                } else {
                    format!("{} AS {}", name, self.quote(&column.alias))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `column = :key` pairs for updates, `1=1` when nothing is set
    fn make_properties(&self, query: &QueryBuilder) -> String {
        if query.properties().is_empty() {
            return "1=1".to_string();
        }
        query
            .properties()
            .iter()
            .map(|property| format!("{} = {}", self.quote(&property.column), property.key))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn make_property_list(&self, query: &QueryBuilder) -> String {
        query
            .properties()
            .iter()
            .map(|property| self.quote(&property.column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn make_property_entries(&self, query: &QueryBuilder) -> String {
        query
            .properties()
            .iter()
            .map(|property| property.key.clone())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn single_condition(&self, condition: &Condition, full: bool) -> Result<String, MapperError> {
        let (table, column, operation, key) = match condition {
            Condition::Raw(sql) => return Ok(sql.clone()),
            Condition::Column {
                table,
                column,
                operation,
                key,
            } => (table, column, operation, key),
        };
        let name = self.column_name(table, column, full);
        match (operation, key) {
            (Operation::IsNull | Operation::IsNotNull, _) => {
                Ok(format!("{} {}", name, operation.sql()))
            }
            (Operation::In, ParamKey::List(keys)) if keys.is_empty() => Ok("1=0".to_string()),
            (Operation::NotIn, ParamKey::List(keys)) if keys.is_empty() => Ok("1=1".to_string()),
            (Operation::In | Operation::NotIn, ParamKey::List(keys)) => {
                Ok(format!("{} {} ({})", name, operation.sql(), keys.join(", ")))
            }
            (Operation::Regexp, ParamKey::Single(key)) => self.regexp(&name, key),
            (operation, ParamKey::Single(key)) if !operation.is_list() => {
                Ok(format!("{} {} {}", name, operation.sql(), key))
            }
            (operation, _) => Err(MapperError::Dialect(format!(
                "Operation {} has no matching parameter",
                operation.sql()
            ))),
        }
    }

    /// Conditions introduced by `keyword`, empty when there are none
    fn make_conditions(
        &self,
        conditions: &[Condition],
        query: &QueryBuilder,
        keyword: &str,
        full: bool,
    ) -> Result<String, MapperError> {
        if conditions.is_empty() {
            return Ok(String::new());
        }
        let parts = conditions
            .iter()
            .map(|condition| self.single_condition(condition, full))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!(
            " {} {}",
            keyword,
            parts.join(&format!(" {} ", query.relation()))
        ))
    }

    fn make_where(&self, query: &QueryBuilder, full: bool) -> Result<String, MapperError> {
        self.make_conditions(query.conditions(), query, "WHERE", full)
    }

    fn make_having(&self, query: &QueryBuilder, full: bool) -> Result<String, MapperError> {
        self.make_conditions(query.having(), query, "HAVING", full)
    }

    fn make_grouping(&self, query: &QueryBuilder, full: bool) -> String {
        if query.grouping().is_empty() {
            return String::new();
        }
        let groups: Vec<String> = query
            .grouping()
            .iter()
            .map(|group| self.column_name(&group.table, &group.column, full))
            .collect();
        format!(" GROUP BY {}", groups.join(", "))
    }

    fn make_ordering(&self, query: &QueryBuilder, full: bool) -> String {
        if query.ordering().is_empty() {
            return String::new();
        }
        let orders: Vec<String> = query
            .ordering()
            .iter()
            .map(|order| {
                format!(
                    "{} {}",
                    self.column_name(&order.table, &order.column, full),
                    order.direction
                )
            })
            .collect();
        format!(" ORDER BY {}", orders.join(", "))
    }

    fn make_joins(&self, query: &QueryBuilder) -> Result<String, MapperError> {
        let mut sql = String::new();
        for join in query.joins() {
            if !self.available_joins().contains(&join.side) {
                return Err(MapperError::Dialect(format!(
                    "Dialect {} does not support {:?} join",
                    self.kind(),
                    join.side
                )));
            }
            let side = join.side.keyword();
            if !side.is_empty() {
                sql.push(' ');
                sql.push_str(side);
            }
            sql.push_str(" JOIN ");
            sql.push_str(&self.quote(&join.new_table));
            if !join.table_alias.is_empty() {
                sql.push_str(&format!(" AS {}", self.quote(&join.table_alias)));
            }
            sql.push_str(&format!(
                " ON ({} = {})",
                self.column_name(&join.known_table, &join.known_column, true),
                self.column_name(join.table_reference(), &join.new_column, true)
            ));
        }
        Ok(sql)
    }

    /// `LIMIT n OFFSET m`; offset alone is ignored
    fn make_limits(&self, query: &QueryBuilder) -> String {
        match (query.limit(), query.offset()) {
            (None, _) => String::new(),
            (Some(limit), None) => format!(" LIMIT {}", limit),
            (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
        }
    }
}
