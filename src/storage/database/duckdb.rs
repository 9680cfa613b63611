//! DuckDB embedded database
//!
//! The connection opens on first use. A location of `""` or `:memory:`
//! keeps the whole database in memory for the lifetime of the connection.

use super::{Config, Database, Row};
use crate::error::MapperError;
use crate::records::Value;
use crate::storage::dialects::DialectKind;
use crate::storage::query_builder::Params;
use ::duckdb::Connection;
use ::duckdb::types::Value as DuckValue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub struct DuckDbDatabase {
    config: Config,
    connection: Mutex<Option<Connection>>,
    row_count: AtomicUsize,
}

impl DuckDbDatabase {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
            row_count: AtomicUsize::new(0),
        }
    }

    fn open(&self) -> Result<Connection, MapperError> {
        let location = self.config.location.as_str();
        debug!("Opening DuckDB source {} at {:?}", self.config.name, location);
        let connection = if location.is_empty() || location == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(location)?
        };
        Ok(connection)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, MapperError> {
        self.connection
            .lock()
            .map_err(|e| MapperError::Database(format!("DuckDB connection poisoned: {}", e)))
    }

    /// Run `action` on the connection, opening it first when needed
    fn with_connection<T>(
        &self,
        action: impl FnOnce(&Connection) -> Result<T, MapperError>,
    ) -> Result<T, MapperError> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        match guard.as_ref() {
            Some(connection) => action(connection),
            None => Err(MapperError::Database("Not connected".to_string())),
        }
    }

    fn batch(&self, sql: &str) -> Result<bool, MapperError> {
        self.with_connection(|connection| {
            connection.execute_batch(sql)?;
            Ok(true)
        })
    }
}

/// Replace `:name` placeholders by positional `?` and collect their values
pub(crate) fn bind_positional(
    sql: &str,
    params: &Params,
) -> Result<(String, Vec<Value>), MapperError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut output = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(open) = quote {
            output.push(c);
            if c == open {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                output.push(c);
                i += 1;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                // cast operator
                output.push_str("::");
                i += 2;
            }
            ':' if chars
                .get(i + 1)
                .is_some_and(|next| next.is_ascii_alphabetic() || *next == '_') =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let key: String = chars[start..i].iter().collect();
                let value = params
                    .get(&key)
                    .ok_or_else(|| MapperError::Database(format!("Missing parameter {}", key)))?;
                values.push(value.clone());
                output.push('?');
            }
            _ => {
                output.push(c);
                i += 1;
            }
        }
    }
    Ok((output, values))
}

fn to_duck(value: Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(b) => DuckValue::Boolean(b),
        Value::Int(n) => DuckValue::BigInt(n),
        Value::Float(f) => DuckValue::Double(f),
        Value::Text(text) => DuckValue::Text(text),
        Value::Object(json) => DuckValue::Text(json.to_string()),
        Value::Array(_) => DuckValue::Null,
    }
}

fn from_duck(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(n) => Value::Int(i64::from(n)),
        DuckValue::SmallInt(n) => Value::Int(i64::from(n)),
        DuckValue::Int(n) => Value::Int(i64::from(n)),
        DuckValue::BigInt(n) => Value::Int(n),
        DuckValue::UTinyInt(n) => Value::Int(i64::from(n)),
        DuckValue::USmallInt(n) => Value::Int(i64::from(n)),
        DuckValue::UInt(n) => Value::Int(i64::from(n)),
        DuckValue::UBigInt(n) => i64::try_from(n)
            .map(Value::Int)
            .unwrap_or(Value::Float(n as f64)),
        DuckValue::HugeInt(n) => i64::try_from(n)
            .map(Value::Int)
            .unwrap_or(Value::Float(n as f64)),
        DuckValue::Float(f) => Value::Float(f64::from(f)),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Text(text) => Value::Text(text),
        other => Value::Text(format!("{:?}", other)),
    }
}

impl Database for DuckDbDatabase {
    fn source(&self) -> &str {
        &self.config.name
    }

    fn dialect(&self) -> DialectKind {
        DialectKind::DuckDb
    }

    fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>, MapperError> {
        let (sql, values) = bind_positional(sql, params)?;
        debug!("DuckDB query: {}", sql);
        self.with_connection(|connection| {
            let mut statement = connection.prepare(&sql)?;
            let mut rows =
                statement.query(::duckdb::params_from_iter(values.into_iter().map(to_duck)))?;

            let column_count = rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
            let column_names: Vec<String> = (0..column_count)
                .map(|i| {
                    rows.as_ref()
                        .and_then(|r| r.column_name(i).ok())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("col{}", i))
                })
                .collect();

            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    let value: DuckValue = row.get(i)?;
                    columns.push((name.clone(), from_duck(value)));
                }
                results.push(Row::new(columns));
            }
            Ok(results)
        })
    }

    fn exec(&self, sql: &str, params: &Params) -> Result<bool, MapperError> {
        let (sql, values) = bind_positional(sql, params)?;
        debug!("DuckDB exec: {}", sql);
        let changed = self.with_connection(|connection| {
            let mut statement = connection.prepare(&sql)?;
            Ok(statement.execute(::duckdb::params_from_iter(values.into_iter().map(to_duck)))?)
        })?;
        self.row_count.store(changed, Ordering::SeqCst);
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn reconnect(&self) -> Result<(), MapperError> {
        let connection = self.open()?;
        *self.lock()? = Some(connection);
        Ok(())
    }

    fn row_count(&self) -> usize {
        self.row_count.load(Ordering::SeqCst)
    }

    fn begin_transaction(&self) -> Result<bool, MapperError> {
        self.batch("BEGIN TRANSACTION;")
    }

    fn commit(&self) -> Result<bool, MapperError> {
        self.batch("COMMIT;")
    }

    fn rollback(&self) -> Result<bool, MapperError> {
        self.batch("ROLLBACK;")
    }
}
