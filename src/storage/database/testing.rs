//! Database double for unit tests, records statements and replays prepared rows

use super::{Database, Row};
use crate::error::MapperError;
use crate::storage::dialects::DialectKind;
use crate::storage::query_builder::Params;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) struct RecordingDatabase {
    source: String,
    dialect: DialectKind,
    pub(crate) statements: Mutex<Vec<(String, Params)>>,
    responses: Mutex<VecDeque<Vec<Row>>>,
}

impl RecordingDatabase {
    pub(crate) fn new(source: &str, dialect: DialectKind) -> Self {
        Self {
            source: source.to_string(),
            dialect,
            statements: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
        }
    }

    /// Rows returned by the next query
    pub(crate) fn respond(&self, rows: Vec<Row>) {
        self.responses.lock().unwrap().push_back(rows);
    }

    pub(crate) fn sql(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub(crate) fn last_params(&self) -> Params {
        self.statements
            .lock()
            .unwrap()
            .last()
            .map(|(_, params)| params.clone())
            .unwrap_or_default()
    }
}

impl Database for RecordingDatabase {
    fn source(&self) -> &str {
        &self.source
    }

    fn dialect(&self) -> DialectKind {
        self.dialect
    }

    fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>, MapperError> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn exec(&self, sql: &str, params: &Params) -> Result<bool, MapperError> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reconnect(&self) -> Result<(), MapperError> {
        Ok(())
    }

    fn row_count(&self) -> usize {
        1
    }

    fn begin_transaction(&self) -> Result<bool, MapperError> {
        Ok(true)
    }

    fn commit(&self) -> Result<bool, MapperError> {
        Ok(true)
    }

    fn rollback(&self) -> Result<bool, MapperError> {
        Ok(true)
    }
}
