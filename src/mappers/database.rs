//! Mapper over a table in an SQL database
//!
//! Reads go through the read connection, writes through the write one; both
//! are the same connection unless the mapper was built for a split source.
//! Operations prefer primary keys and fall back to all assigned entries.

use super::{Mapper, MapperHooks, MapperMap, NoHooks, assigned_entries, is_assigned};
use crate::error::MapperError;
use crate::records::Record;
use crate::storage::database::{Database, DatabaseRegistry, Row};
use crate::storage::dialects::Dialect;
use crate::storage::query_builder::{Aggregate, Operation, QueryBuilder};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DatabaseMapper {
    map: MapperMap,
    table: String,
    read: Arc<dyn Database>,
    write: Arc<dyn Database>,
    hooks: Arc<dyn MapperHooks>,
}

impl DatabaseMapper {
    pub fn new(map: MapperMap, table: impl Into<String>, database: Arc<dyn Database>) -> Self {
        Self {
            map,
            table: table.into(),
            read: Arc::clone(&database),
            write: database,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Mapper reading from one connection and writing into another
    pub fn read_write(
        map: MapperMap,
        table: impl Into<String>,
        read: Arc<dyn Database>,
        write: Arc<dyn Database>,
    ) -> Self {
        Self {
            map,
            table: table.into(),
            read,
            write,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Mapper connected to the source named in its map
    pub fn from_registry(
        registry: &DatabaseRegistry,
        map: MapperMap,
        table: impl Into<String>,
    ) -> Result<Self, MapperError> {
        let database = registry.database(map.source())?;
        Ok(Self::new(map, table, database))
    }

    /// Mapper with separate read and write sources; the map keeps the read source
    pub fn read_write_from_registry(
        registry: &DatabaseRegistry,
        mut map: MapperMap,
        table: impl Into<String>,
        read_source: &str,
        write_source: &str,
    ) -> Result<Self, MapperError> {
        let read = registry.database(read_source)?;
        let write = registry.database(write_source)?;
        map.set_source(read_source);
        Ok(Self::read_write(map, table, read, write))
    }

    pub fn with_hooks(mut self, hooks: impl MapperHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn write_database(&self) -> &Arc<dyn Database> {
        &self.write
    }

    fn query_builder(&self) -> QueryBuilder {
        let mut query = QueryBuilder::new();
        query.set_base_table(self.table.as_str());
        query
    }

    fn read_dialect(&self) -> &'static dyn Dialect {
        self.read.dialect().dialect()
    }

    fn write_dialect(&self) -> &'static dyn Dialect {
        self.write.dialect().dialect()
    }

    fn exec(&self, sql: String, query: &QueryBuilder) -> Result<bool, MapperError> {
        debug!("{}", sql);
        self.write.exec(&sql, query.params())
    }

    fn select(&self, query: &QueryBuilder) -> Result<Vec<Row>, MapperError> {
        let sql = self.read_dialect().select(query)?;
        debug!("{}", sql);
        self.read.query(&sql, query.params())
    }

    /// Equality conditions on primary keys; `false` when no primary key is usable
    fn primary_key_conditions(
        &self,
        query: &mut QueryBuilder,
        record: &Record,
        from_storage_only: bool,
    ) -> Result<bool, MapperError> {
        if self.map.primary_keys().is_empty() {
            return Ok(false);
        }
        for key in self.map.primary_keys() {
            let Some(column) = self.map.relation(key) else {
                continue;
            };
            let entry = record.entry(key)?;
            if is_assigned(entry) && (!from_storage_only || entry.is_from_storage()) {
                query.add_condition(&self.table, column, Operation::Eq, entry.data().clone());
            }
        }
        Ok(!query.conditions().is_empty())
    }

    fn assigned_conditions(&self, query: &mut QueryBuilder, record: &Record) {
        for (_, column, entry) in assigned_entries(&self.map, record) {
            query.add_condition(&self.table, column, Operation::Eq, entry.data().clone());
        }
    }

    fn select_all_relations(&self, query: &mut QueryBuilder) {
        for (record_key, column) in self.map.relations() {
            query.add_column(&self.table, column, record_key, None);
        }
    }

    fn update_by_pk(&self, record: &Record) -> Result<bool, MapperError> {
        let mut query = self.query_builder();
        if !self.primary_key_conditions(&mut query, record, true)? {
            return Ok(false);
        }
        for (key, column, entry) in assigned_entries(&self.map, record) {
            if !self.map.is_primary_key(key) && !entry.is_from_storage() {
                query.add_property(&self.table, column, entry.data().clone());
            }
        }
        if query.properties().is_empty() {
            return Ok(false);
        }
        let sql = self.write_dialect().update(&query)?;
        self.exec(sql, &query)
    }

    fn load_by(&self, record: &mut Record, by_pk: bool) -> Result<bool, MapperError> {
        let mut query = self.query_builder();
        if by_pk {
            if !self.primary_key_conditions(&mut query, record, false)? {
                return Ok(false);
            }
        } else {
            self.assigned_conditions(&mut query, record);
        }
        self.select_all_relations(&mut query);
        query.set_limits(Some(0), Some(1));

        let rows = self.select(&query)?;
        match rows.into_iter().next() {
            Some(row) => {
                fill_record(record, &row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_by_pk(&self, record: &Record) -> Result<bool, MapperError> {
        let mut query = self.query_builder();
        if !self.primary_key_conditions(&mut query, record, false)? {
            return Ok(false);
        }
        let sql = self.write_dialect().delete(&query)?;
        self.exec(sql, &query)
    }
}

/// Put row values into entries named by the column aliases
pub(crate) fn fill_record(record: &mut Record, row: &Row) -> Result<(), MapperError> {
    for (alias, value) in row.iter() {
        let entry = record.entry_mut(alias)?;
        let value = entry.entry_type().value_from_stored(value.clone());
        entry.set_data(value, true);
    }
    Ok(())
}

#[async_trait(?Send)]
impl Mapper for DatabaseMapper {
    fn map(&self) -> &MapperMap {
        &self.map
    }

    fn alias(&self) -> &str {
        &self.table
    }

    fn hooks(&self) -> &dyn MapperHooks {
        self.hooks.as_ref()
    }

    fn read_database(&self) -> Option<Arc<dyn Database>> {
        Some(Arc::clone(&self.read))
    }

    async fn insert_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        let mut query = self.query_builder();
        for (_, column, entry) in assigned_entries(&self.map, record) {
            query.add_property(&self.table, column, entry.data().clone());
        }
        if query.properties().is_empty() {
            return Ok(false);
        }
        let sql = self.write_dialect().insert(&query)?;
        self.exec(sql, &query)
    }

    async fn update_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        if self.update_by_pk(record)? {
            return Ok(true);
        }
        let mut query = self.query_builder();
        for (_, column, entry) in assigned_entries(&self.map, record) {
            if entry.is_from_storage() {
                query.add_condition(&self.table, column, Operation::Eq, entry.data().clone());
            } else {
                query.add_property(&self.table, column, entry.data().clone());
            }
        }
        if query.conditions().is_empty() || query.properties().is_empty() {
            return Ok(false);
        }
        let sql = self.write_dialect().update(&query)?;
        self.exec(sql, &query)
    }

    async fn load_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        if self.load_by(record, true)? {
            return Ok(true);
        }
        self.load_by(record, false)
    }

    async fn delete_record(&self, record: &mut Record) -> Result<bool, MapperError> {
        if self.delete_by_pk(record)? {
            return Ok(true);
        }
        let mut query = self.query_builder();
        self.assigned_conditions(&mut query, record);
        if query.conditions().is_empty() {
            warn!("Refusing to delete everything from {}", self.table);
            return Ok(false);
        }
        let sql = self.write_dialect().delete(&query)?;
        self.exec(sql, &query)
    }

    async fn count_record(&self, record: &Record) -> Result<usize, MapperError> {
        let mut query = self.query_builder();
        self.assigned_conditions(&mut query, record);
        let counted = self
            .map
            .primary_keys()
            .first()
            .and_then(|key| self.map.relation(key))
            .or_else(|| self.map.relations().first().map(|(_, column)| column.as_str()));
        if let Some(column) = counted {
            query.add_column(&self.table, column, "count", Some(Aggregate::Count));
        }

        let rows = self.select(&query)?;
        Ok(rows
            .first()
            .and_then(Row::first)
            .and_then(|value| value.as_i64())
            .map(|count| count.max(0) as usize)
            .unwrap_or(0))
    }

    async fn load_multiple(&self, record: &Record) -> Result<Vec<Record>, MapperError> {
        let mut query = self.query_builder();
        self.assigned_conditions(&mut query, record);
        self.select_all_relations(&mut query);

        let mut results = Vec::new();
        for row in self.select(&query)? {
            let mut loaded = record.clone();
            fill_record(&mut loaded, &row)?;
            results.push(loaded);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{EntryType, Value};
    use crate::storage::database::testing::RecordingDatabase;
    use crate::storage::dialects::DialectKind;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn user_map() -> MapperMap {
        let mut map = MapperMap::new("main");
        map.set_relation("id", "u_id")
            .set_relation("name", "u_name")
            .set_relation("enabled", "u_enabled")
            .add_primary_key("id");
        map
    }

    fn setup() -> (Arc<RecordingDatabase>, Arc<DatabaseMapper>, Record) {
        let database = Arc::new(RecordingDatabase::new("main", DialectKind::Sqlite));
        let mapper = Arc::new(DatabaseMapper::new(
            user_map(),
            "users",
            Arc::clone(&database) as Arc<dyn Database>,
        ));
        let mut record = Record::with_mapper(Arc::clone(&mapper) as Arc<dyn Mapper>);
        record
            .add_entry("id", EntryType::Integer { max: 65535 })
            .unwrap()
            .add_entry("name", EntryType::String { max_length: 64 })
            .unwrap()
            .add_entry("enabled", EntryType::Boolean)
            .unwrap();
        (database, mapper, record)
    }

    #[test]
    fn test_insert_new_record() {
        let (database, _, mut record) = setup();
        record.set("name", "ann").unwrap();
        record.set("enabled", true).unwrap();
        assert!(block_on(record.save(false)).unwrap());
        assert_eq!(
            database.sql(),
            vec!["INSERT INTO \"users\" (\"u_name\", \"u_enabled\") VALUES (:u_name_0, :u_enabled_1);"]
        );
        assert!(record.entry("name").unwrap().is_from_storage());
        assert!(!record.entry("id").unwrap().is_from_storage());
    }

    #[test]
    fn test_update_by_primary_key() {
        let (database, _, mut record) = setup();
        record.entry_mut("id").unwrap().set_data(Value::Int(7), true);
        record.entry_mut("name").unwrap().set_data("ann".into(), true);
        record.set("enabled", false).unwrap();
        assert!(block_on(record.save(false)).unwrap());
        assert_eq!(
            database.sql(),
            vec!["UPDATE \"users\" SET \"u_enabled\" = :u_enabled_1 WHERE \"u_id\" = :u_id_0;"]
        );
        assert_eq!(database.last_params().get(":u_id_0"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_load_by_primary_key() {
        let (database, _, mut record) = setup();
        database.respond(vec![
            [
                ("id", Value::Int(7)),
                ("name", Value::from("ann")),
                ("enabled", Value::Int(1)),
            ]
            .into_iter()
            .collect(),
        ]);
        record.set("id", 7).unwrap();
        assert!(block_on(record.load()).unwrap());
        assert_eq!(
            database.sql(),
            vec![
                "SELECT \"u_id\" AS \"id\", \"u_name\" AS \"name\", \"u_enabled\" AS \"enabled\" FROM \"users\" WHERE \"u_id\" = :u_id_0 LIMIT 1 OFFSET 0;"
            ]
        );
        assert_eq!(record.get("enabled").unwrap(), &Value::Bool(true));
        assert!(record.entry("name").unwrap().is_from_storage());
    }

    #[test]
    fn test_load_falls_back_to_values() {
        let (database, _, mut record) = setup();
        record.set("name", "nobody").unwrap();
        assert!(!block_on(record.load()).unwrap());
        assert_eq!(
            database.sql(),
            vec![
                "SELECT \"u_id\" AS \"id\", \"u_name\" AS \"name\", \"u_enabled\" AS \"enabled\" FROM \"users\" WHERE \"u_name\" = :u_name_0 LIMIT 1 OFFSET 0;"
            ]
        );
    }

    #[test]
    fn test_count_and_delete() {
        let (database, _, mut record) = setup();
        database.respond(vec![[("count", Value::Int(4))].into_iter().collect()]);
        record.set("enabled", true).unwrap();
        assert_eq!(block_on(record.count()).unwrap(), 4);
        assert!(block_on(record.delete()).unwrap());
        assert_eq!(
            database.sql(),
            vec![
                "SELECT COUNT(\"u_id\") AS \"count\" FROM \"users\" WHERE \"u_enabled\" = :u_enabled_0;",
                "DELETE FROM \"users\" WHERE \"u_enabled\" = :u_enabled_0;",
            ]
        );
    }

    #[test]
    fn test_refuses_unconditional_delete() {
        let (database, _, mut record) = setup();
        record.set("name", Value::Null).unwrap();
        assert!(!block_on(record.delete()).unwrap());
        assert!(database.sql().is_empty());
    }

    #[test]
    fn test_read_write_split() {
        let read = Arc::new(RecordingDatabase::new("replica", DialectKind::Postgres));
        let write = Arc::new(RecordingDatabase::new("primary", DialectKind::MySql));
        let mapper = Arc::new(DatabaseMapper::read_write(
            user_map(),
            "users",
            Arc::clone(&read) as Arc<dyn Database>,
            Arc::clone(&write) as Arc<dyn Database>,
        ));
        let mut record = Record::with_mapper(Arc::clone(&mapper) as Arc<dyn Mapper>);
        record
            .add_entry("id", EntryType::Integer { max: 65535 })
            .unwrap()
            .add_entry("name", EntryType::String { max_length: 64 })
            .unwrap();
        record.set("name", "ann").unwrap();
        assert!(block_on(record.save(true)).unwrap());
        assert_eq!(block_on(record.load_multiple()).unwrap().len(), 0);
        assert_eq!(
            write.sql(),
            vec!["INSERT INTO `users` SET `u_name` = :u_name_0;"]
        );
        assert_eq!(
            read.sql(),
            vec!["SELECT \"users\".\"u_id\" AS \"id\", \"users\".\"u_name\" AS \"name\", \"users\".\"u_enabled\" AS \"enabled\" FROM \"users\" WHERE \"users\".\"u_name\" = :u_name_0;"]
        );
        assert_eq!(mapper.read_database().unwrap().source(), "replica");
    }
}
