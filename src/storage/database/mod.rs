//! Database connections
//!
//! - `Database`: what a mapper needs from a connected server
//! - `config`: source definitions and their storage
//! - `registry`: one shared connection per source
//! - `duckdb`: embedded engine (feature `duckdb-backend`)

pub mod config;
pub mod registry;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, ConfigStorage, Driver};
pub use registry::{Connector, DatabaseRegistry};

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDbDatabase;

use super::dialects::DialectKind;
use super::query_builder::Params;
use crate::error::MapperError;
use crate::records::Value;

/// One row returned by a query, columns in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Value of the first column, used for aggregates
    pub fn first(&self) -> Option<&Value> {
        self.columns.first().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Connected database server
///
/// Statements come with `:name` placeholders and the values bound to them;
/// the implementation passes them the way its driver wants.
pub trait Database: Send + Sync {
    /// Name of the source this connection belongs to
    fn source(&self) -> &str;

    fn dialect(&self) -> DialectKind;

    fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>, MapperError>;

    /// Run a statement, `true` when it went through
    fn exec(&self, sql: &str, params: &Params) -> Result<bool, MapperError>;

    fn is_connected(&self) -> bool;

    fn reconnect(&self) -> Result<(), MapperError>;

    /// Rows changed by the last statement
    fn row_count(&self) -> usize;

    fn begin_transaction(&self) -> Result<bool, MapperError>;

    fn commit(&self) -> Result<bool, MapperError>;

    fn rollback(&self) -> Result<bool, MapperError>;
}
