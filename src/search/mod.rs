//! Search
//!
//! Builds conditions over records of one mapper and its joined children and
//! hands them to a connector which knows how to evaluate them. Records of
//! database mappers are searched by SQL, records of every other mapper are
//! loaded and filtered in memory.
//!
//! Properties are record keys, optionally prefixed by the store key of a
//! joined record: `title` or `items.title`.
//!
//! # Example
//!
//! ```rust,no_run
//! use kw_mapper::records::Record;
//! use kw_mapper::search::Search;
//! use kw_mapper::MapperError;
//!
//! async fn enabled_users(user: &Record) -> Result<Vec<Record>, MapperError> {
//!     let mut search = Search::new(user)?;
//!     search.exact("enabled", true)?.like("name", "a%")?.limit(Some(10));
//!     search.results().await
//! }
//! ```

mod database;
mod joins;
mod records;

use crate::error::MapperError;
use crate::records::{Record, Value};
use crate::storage::query_builder::{Direction, JoinSide, Operation, QueryBuilder, Relation};
use async_trait::async_trait;
use database::DatabaseConnector;
use joins::JoinLookup;
use records::RecordsConnector;

/// Evaluates collected conditions against one kind of source
#[async_trait(?Send)]
pub(crate) trait Connector {
    /// Whether the source understands joins and raw SQL conditions
    fn is_sql(&self) -> bool;

    async fn count(&self, query: &QueryBuilder, joins: &JoinLookup) -> Result<usize, MapperError>;

    async fn results(
        &self,
        query: &QueryBuilder,
        joins: &JoinLookup,
    ) -> Result<Vec<Record>, MapperError>;
}

pub struct Search {
    query: QueryBuilder,
    joins: JoinLookup,
    connector: Box<dyn Connector>,
}

impl Search {
    /// Search over everything the mapper of `record` can reach
    pub fn new(record: &Record) -> Result<Self, MapperError> {
        let connector: Box<dyn Connector> = match record.mapper()?.read_database() {
            Some(database) => Box::new(DatabaseConnector::new(database)),
            None => Box::new(RecordsConnector::new(None)),
        };
        Self::with_connector(record, connector)
    }

    /// Search over the given records only
    pub fn with_records(record: &Record, initial: Vec<Record>) -> Result<Self, MapperError> {
        Self::with_connector(record, Box::new(RecordsConnector::new(Some(initial))))
    }

    fn with_connector(record: &Record, connector: Box<dyn Connector>) -> Result<Self, MapperError> {
        let joins = JoinLookup::new(record)?;
        let mut query = QueryBuilder::new();
        query.set_base_table(joins.base().store_key.as_str());
        Ok(Self {
            query,
            joins,
            connector,
        })
    }

    /// Collected query, as passed to the connector
    pub fn query(&self) -> &QueryBuilder {
        &self.query
    }

    pub fn exact(&mut self, property: &str, value: impl Into<Value>) -> Result<&mut Self, MapperError> {
        self.condition(property, Operation::Eq, value.into())
    }

    pub fn not_exact(
        &mut self,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, MapperError> {
        self.condition(property, Operation::Neq, value.into())
    }

    /// Values above `value`, including it when `inclusive`
    pub fn from(
        &mut self,
        property: &str,
        value: impl Into<Value>,
        inclusive: bool,
    ) -> Result<&mut Self, MapperError> {
        let operation = if inclusive { Operation::Gte } else { Operation::Gt };
        self.condition(property, operation, value.into())
    }

    /// Values below `value`, including it when `inclusive`
    pub fn to(
        &mut self,
        property: &str,
        value: impl Into<Value>,
        inclusive: bool,
    ) -> Result<&mut Self, MapperError> {
        let operation = if inclusive { Operation::Lte } else { Operation::Lt };
        self.condition(property, operation, value.into())
    }

    pub fn like(&mut self, property: &str, pattern: &str) -> Result<&mut Self, MapperError> {
        self.condition(property, Operation::Like, pattern.into())
    }

    pub fn not_like(&mut self, property: &str, pattern: &str) -> Result<&mut Self, MapperError> {
        self.condition(property, Operation::NotLike, pattern.into())
    }

    pub fn regexp(&mut self, property: &str, pattern: &str) -> Result<&mut Self, MapperError> {
        self.condition(property, Operation::Regexp, pattern.into())
    }

    /// Inclusive range
    pub fn between(
        &mut self,
        property: &str,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Result<&mut Self, MapperError> {
        self.condition(property, Operation::Gte, min.into())?;
        self.condition(property, Operation::Lte, max.into())
    }

    pub fn null(&mut self, property: &str) -> Result<&mut Self, MapperError> {
        self.condition(property, Operation::IsNull, Value::Null)
    }

    pub fn not_null(&mut self, property: &str) -> Result<&mut Self, MapperError> {
        self.condition(property, Operation::IsNotNull, Value::Null)
    }

    pub fn in_values(&mut self, property: &str, values: Vec<Value>) -> Result<&mut Self, MapperError> {
        let (table, column) = self.resolve(property)?;
        self.query
            .add_condition_list(&table, &column, Operation::In, values)?;
        Ok(self)
    }

    pub fn not_in(&mut self, property: &str, values: Vec<Value>) -> Result<&mut Self, MapperError> {
        let (table, column) = self.resolve(property)?;
        self.query
            .add_condition_list(&table, &column, Operation::NotIn, values)?;
        Ok(self)
    }

    /// Condition written in SQL, placeholders named by the keys of `params`
    pub fn raw(
        &mut self,
        sql: &str,
        params: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<&mut Self, MapperError> {
        if !self.connector.is_sql() {
            return Err(MapperError::Search(
                "Raw conditions need a database source".to_string(),
            ));
        }
        self.query.add_raw_condition(sql, params);
        Ok(self)
    }

    pub fn use_and(&mut self) -> &mut Self {
        self.query.set_relation(Relation::And);
        self
    }

    pub fn use_or(&mut self) -> &mut Self {
        self.query.set_relation(Relation::Or);
        self
    }

    pub fn limit(&mut self, limit: Option<usize>) -> &mut Self {
        self.query.set_limit(limit);
        self
    }

    pub fn offset(&mut self, offset: Option<usize>) -> &mut Self {
        self.query.set_offset(offset);
        self
    }

    pub fn order_by(
        &mut self,
        property: &str,
        direction: Direction,
    ) -> Result<&mut Self, MapperError> {
        let (table, column) = self.resolve(property)?;
        self.query.add_order_by(&table, &column, direction);
        Ok(self)
    }

    pub fn group_by(&mut self, property: &str) -> Result<&mut Self, MapperError> {
        let (table, column) = self.resolve(property)?;
        self.query.add_group_by(&table, &column);
        Ok(self)
    }

    /// Join records linked by the foreign key `child_alias` of the parent
    ///
    /// The parent is the base record unless `parent_alias` names an already
    /// joined one. `custom_alias` renames the joined table inside the query,
    /// which allows joining the same child twice.
    pub fn child(
        &mut self,
        child_alias: &str,
        side: JoinSide,
        parent_alias: &str,
        custom_alias: &str,
    ) -> Result<&mut Self, MapperError> {
        if !self.connector.is_sql() {
            return Err(MapperError::Search(
                "Joins need a database source".to_string(),
            ));
        }

        let parent_alias = if parent_alias.is_empty() {
            self.joins.base().store_key.clone()
        } else {
            parent_alias.to_string()
        };
        let parent = self
            .joins
            .lookup(&parent_alias, "", None)?
            .ok_or_else(|| {
                MapperError::Join(format!("Unknown record for parent alias *{}*", parent_alias))
            })?
            .record
            .clone();
        let parent_mapper = parent.mapper()?;
        let foreign_key = parent_mapper.map().foreign_key(child_alias).ok_or_else(|| {
            MapperError::Join(format!(
                "Unknown alias *{}* in mapper for parent *{}*",
                child_alias, parent_alias
            ))
        })?;
        let parent_column = parent_mapper
            .map()
            .relation(&foreign_key.local_entry_key)
            .ok_or_else(|| MapperError::UnknownRelation {
                key: foreign_key.local_entry_key.clone(),
                table: parent_alias.clone(),
            })?;

        let table_alias = if custom_alias.is_empty() { child_alias } else { custom_alias };
        let child = self
            .joins
            .lookup(table_alias, child_alias, Some(parent_alias.as_str()))?
            .ok_or_else(|| {
                MapperError::Join(format!("Unknown record for child alias *{}*", child_alias))
            })?;
        let child_mapper = child.record.mapper()?;
        let child_column = child_mapper
            .map()
            .relation(&foreign_key.remote_entry_key)
            .ok_or_else(|| MapperError::UnknownRelation {
                key: foreign_key.remote_entry_key.clone(),
                table: child_alias.to_string(),
            })?;

        if parent_mapper.source() != child_mapper.source() {
            return Err(MapperError::Join(format!(
                "Parent *{}* and child *{}* must both have the same source",
                parent_alias, child_alias
            )));
        }

        let child_table = child_mapper.alias().to_string();
        let child_column = child_column.to_string();
        self.query.add_join(
            child_alias,
            &child_table,
            &child_column,
            &parent_alias,
            parent_column,
            side,
            table_alias,
        );
        Ok(self)
    }

    /// Parents without any child linked by `child_alias`; `property` is a
    /// key of the child which is never empty when the child exists
    pub fn child_not_exist(
        &mut self,
        child_alias: &str,
        property: &str,
    ) -> Result<&mut Self, MapperError> {
        self.child(child_alias, JoinSide::LeftOuter, "", "")?;
        self.null(property)
    }

    /// Number of matching records, limit and offset do not apply
    pub async fn count(&self) -> Result<usize, MapperError> {
        self.connector.count(&self.query, &self.joins).await
    }

    pub async fn results(&self) -> Result<Vec<Record>, MapperError> {
        self.connector.results(&self.query, &self.joins).await
    }

    fn condition(
        &mut self,
        property: &str,
        operation: Operation,
        value: Value,
    ) -> Result<&mut Self, MapperError> {
        let (table, column) = self.resolve(property)?;
        self.query.add_condition(&table, &column, operation, value);
        Ok(self)
    }

    /// Store key and storage column of a property
    fn resolve(&mut self, property: &str) -> Result<(String, String), MapperError> {
        let (table, key) = parse_property(property);
        let table = if table.is_empty() {
            self.joins.base().store_key.clone()
        } else {
            table.to_string()
        };
        let known = self
            .joins
            .lookup(&table, "", None)?
            .ok_or_else(|| MapperError::Join(format!("Unknown relation table *{}*", table)))?;
        let column = known
            .record
            .mapper()?
            .map()
            .relation(key)
            .ok_or_else(|| MapperError::UnknownRelation {
                key: key.to_string(),
                table: table.clone(),
            })?
            .to_string();
        Ok((table, column))
    }
}

/// Split `table.key`; anything without both parts is a key of the base record
fn parse_property(property: &str) -> (&str, &str) {
    match property.split_once('.') {
        Some((table, key)) if !table.is_empty() && !key.is_empty() => (table, key),
        _ => ("", property),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(parse_property("name"), ("", "name"));
        assert_eq!(parse_property("items.name"), ("items", "name"));
        assert_eq!(parse_property("items.sub.name"), ("items", "sub.name"));
        assert_eq!(parse_property(".name"), ("", ".name"));
        assert_eq!(parse_property("items."), ("", "items."));
    }
}
