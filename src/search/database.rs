//! Search evaluated by the database of the base mapper

use super::Connector;
use super::joins::{JoinLookup, RecordInJoin};
use crate::error::MapperError;
use crate::records::{Record, Value};
use crate::storage::database::{Database, Row};
use crate::storage::query_builder::{Aggregate, Direction, QueryBuilder};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Separates store key and record key in column aliases
const ALIAS_SEPARATOR: &str = "____";

pub(crate) struct DatabaseConnector {
    database: Arc<dyn Database>,
}

impl DatabaseConnector {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    fn query(&self, query: &QueryBuilder) -> Result<Vec<Row>, MapperError> {
        let sql = self.database.dialect().dialect().select(query)?;
        debug!("{}", sql);
        self.database.query(&sql, query.params())
    }
}

fn column_alias(store_key: &str, record_key: &str) -> String {
    format!("{}{}{}", store_key, ALIAS_SEPARATOR, record_key)
}

#[async_trait(?Send)]
impl Connector for DatabaseConnector {
    fn is_sql(&self) -> bool {
        true
    }

    async fn count(&self, query: &QueryBuilder, joins: &JoinLookup) -> Result<usize, MapperError> {
        let base = joins.base();
        let mapper = base.record.mapper()?;
        let counted = mapper
            .primary_keys()
            .first()
            .and_then(|key| mapper.map().relation(key))
            .or_else(|| mapper.relations().first().map(|(_, column)| column.as_str()))
            .ok_or_else(|| {
                MapperError::Search(format!("Nothing to count in *{}*", base.store_key))
            })?;

        let mut count_query = query.clone();
        count_query
            .clear_columns()
            .clear_ordering()
            .set_limits(None, None)
            .add_column(&base.store_key, counted, "count", Some(Aggregate::Count));
        let rows = self.query(&count_query)?;
        Ok(rows
            .first()
            .and_then(Row::first)
            .and_then(Value::as_i64)
            .map(|count| count.max(0) as usize)
            .unwrap_or(0))
    }

    async fn results(
        &self,
        query: &QueryBuilder,
        joins: &JoinLookup,
    ) -> Result<Vec<Record>, MapperError> {
        let order = joins.in_join_order(query.joins())?;
        let mut result_query = query.clone();
        result_query.clear_columns();
        for known in &order {
            for (key, column) in known.record.mapper()?.relations() {
                result_query.add_column(
                    &known.store_key,
                    column,
                    &column_alias(&known.store_key, key),
                    None,
                );
            }
        }

        if result_query.ordering().is_empty() {
            let base = joins.base();
            let mapper = base.record.mapper()?;
            for key in mapper.primary_keys() {
                if let Some(column) = mapper.map().relation(key) {
                    result_query.add_order_by(&base.store_key, column, Direction::Asc);
                }
            }
        }

        let mut results = Vec::new();
        for row in self.query(&result_query)? {
            merge_record(&mut results, fill_row(&order, &row)?)?;
        }
        Ok(results)
    }
}

/// Base record of one row with its joined children attached
fn fill_row(order: &[&RecordInJoin], row: &Row) -> Result<Record, MapperError> {
    let mut filled: Vec<Option<Record>> = Vec::with_capacity(order.len());
    for (index, known) in order.iter().enumerate() {
        let mut record = known.record.blank();
        let mut has_values = false;
        for (key, _) in known.record.mapper()?.relations() {
            let Some(value) = row.get(&column_alias(&known.store_key, key)) else {
                continue;
            };
            has_values |= !value.is_null();
            let entry = record.entry_mut(key)?;
            let value = entry.entry_type().value_from_stored(value.clone());
            entry.set_data(value, true);
        }
        // children missing on the outer side of a join come back as nulls
        filled.push((index == 0 || has_values).then_some(record));
    }

    for index in (1..order.len()).rev() {
        let Some(child) = filled[index].take() else {
            continue;
        };
        let parent_index = order
            .iter()
            .position(|known| Some(known.store_key.as_str()) == order[index].parent.as_deref());
        if let Some(parent_index) = parent_index
            && let Some(parent) = filled[parent_index].as_mut()
        {
            attach_child(parent, &order[index].known_as, child)?;
        }
    }

    filled
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| MapperError::Search("Row without base record".to_string()))
}

fn attach_child(parent: &mut Record, entry_key: &str, child: Record) -> Result<(), MapperError> {
    let mut children = parent
        .get(entry_key)?
        .as_records()
        .map(<[Record]>::to_vec)
        .unwrap_or_default();
    children.push(child);
    parent
        .entry_mut(entry_key)?
        .set_data(Value::Array(children), true);
    Ok(())
}

/// Whether both records describe the same stored row
fn same_record(a: &Record, b: &Record) -> bool {
    let keys: Vec<&str> = match a.mapper() {
        Ok(mapper) if !mapper.primary_keys().is_empty() => {
            mapper.primary_keys().iter().map(String::as_str).collect()
        }
        _ => a
            .iter()
            .filter(|(_, entry)| !matches!(entry.data(), Value::Array(_)))
            .map(|(key, _)| key)
            .collect(),
    };
    keys.iter().all(|key| a.get(key).ok() == b.get(key).ok())
}

/// Add record into the list; a record already there gets the children merged instead
fn merge_record(target: &mut Vec<Record>, record: Record) -> Result<(), MapperError> {
    let Some(index) = target.iter().position(|known| same_record(known, &record)) else {
        target.push(record);
        return Ok(());
    };
    let known = &mut target[index];

    let arrays: Vec<(String, Vec<Record>)> = record
        .iter()
        .filter_map(|(key, entry)| {
            entry
                .data()
                .as_records()
                .map(|children| (key.to_string(), children.to_vec()))
        })
        .collect();
    for (key, children) in arrays {
        let mut merged = known
            .get(&key)?
            .as_records()
            .map(<[Record]>::to_vec)
            .unwrap_or_default();
        for child in children {
            merge_record(&mut merged, child)?;
        }
        known.entry_mut(&key)?.set_data(Value::Array(merged), true);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::{DatabaseMapper, Mapper, MapperMap};
    use crate::records::EntryType;
    use crate::search::Search;
    use crate::storage::database::testing::RecordingDatabase;
    use crate::storage::dialects::DialectKind;
    use crate::storage::query_builder::JoinSide;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn chapter(database: Arc<RecordingDatabase>) -> Record {
        let mut map = MapperMap::new("main");
        map.set_relation("id", "c_id")
            .set_relation("book", "c_book")
            .add_primary_key("id");
        let mapper: Arc<dyn Mapper> = Arc::new(DatabaseMapper::new(map, "chapters", database));
        let mut record = Record::with_mapper(mapper);
        record
            .add_entry("id", EntryType::Integer { max: 1000 })
            .unwrap()
            .add_entry("book", EntryType::Integer { max: 1000 })
            .unwrap();
        record
    }

    fn book(database: Arc<RecordingDatabase>) -> Record {
        let mut map = MapperMap::new("main");
        map.set_relation("id", "b_id")
            .set_relation("title", "b_title")
            .set_relation("author", "b_author")
            .add_primary_key("id");
        let chapters_database = Arc::clone(&database);
        map.add_foreign_key("chapters", "id", "book", move || {
            Ok(chapter(Arc::clone(&chapters_database)))
        });
        let mapper: Arc<dyn Mapper> = Arc::new(DatabaseMapper::new(map, "books", database));
        let mut record = Record::with_mapper(mapper);
        record
            .add_entry("id", EntryType::Integer { max: 1000 })
            .unwrap()
            .add_entry("title", EntryType::String { max_length: 128 })
            .unwrap()
            .add_entry("author", EntryType::Integer { max: 1000 })
            .unwrap()
            .add_entry("chapters", EntryType::Array)
            .unwrap();
        record
    }

    fn author(database: Arc<RecordingDatabase>) -> Record {
        let mut map = MapperMap::new("main");
        map.set_relation("id", "a_id")
            .set_relation("name", "a_name")
            .add_primary_key("id");
        let books_database = Arc::clone(&database);
        map.add_foreign_key("books", "id", "author", move || {
            Ok(book(Arc::clone(&books_database)))
        });
        let mapper: Arc<dyn Mapper> = Arc::new(DatabaseMapper::new(map, "authors", database));
        let mut record = Record::with_mapper(mapper);
        record
            .add_entry("id", EntryType::Integer { max: 1000 })
            .unwrap()
            .add_entry("name", EntryType::String { max_length: 128 })
            .unwrap()
            .add_entry("books", EntryType::Array)
            .unwrap();
        record
    }

    fn row(author: (i64, &str), book: Option<(i64, &str)>) -> Row {
        let (book_id, title) = match book {
            Some((id, title)) => (Value::Int(id), Value::from(title)),
            None => (Value::Null, Value::Null),
        };
        let author_ref = if book.is_some() { Value::Int(author.0) } else { Value::Null };
        [
            ("authors____id", Value::Int(author.0)),
            ("authors____name", Value::from(author.1)),
            ("books____id", book_id),
            ("books____title", title),
            ("books____author", author_ref),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_count_query() {
        let database = Arc::new(RecordingDatabase::new("main", DialectKind::MySql));
        database.respond(vec![[("count", Value::Int(12))].into_iter().collect()]);
        let mut search = Search::new(&author(Arc::clone(&database))).unwrap();
        search
            .like("name", "J%")
            .unwrap()
            .order_by("name", Direction::Desc)
            .unwrap()
            .limit(Some(5));
        assert_eq!(block_on(search.count()).unwrap(), 12);
        assert_eq!(
            database.sql(),
            vec!["SELECT COUNT(`authors`.`a_id`) AS `count` FROM `authors` WHERE `authors`.`a_name` LIKE :a_name_0;"]
        );
    }

    #[test]
    fn test_results_with_children() {
        let database = Arc::new(RecordingDatabase::new("main", DialectKind::MySql));
        database.respond(vec![
            row((1, "Jane"), Some((10, "First"))),
            row((1, "Jane"), Some((11, "Second"))),
            row((2, "John"), None),
        ]);
        let mut search = Search::new(&author(Arc::clone(&database))).unwrap();
        search.child("books", JoinSide::Left, "", "").unwrap();
        search.exact("books.title", "First").unwrap().use_or();

        let results = block_on(search.results()).unwrap();
        assert_eq!(
            database.sql(),
            vec![concat!(
                "SELECT `authors`.`a_id` AS `authors____id`, `authors`.`a_name` AS `authors____name`, ",
                "`books`.`b_id` AS `books____id`, `books`.`b_title` AS `books____title`, ",
                "`books`.`b_author` AS `books____author` FROM `authors` ",
                "LEFT JOIN `books` AS `books` ON (`authors`.`a_id` = `books`.`b_author`) ",
                "WHERE `books`.`b_title` = :b_title_0 ORDER BY `authors`.`a_id` ASC;"
            )]
        );

        assert_eq!(results.len(), 2);
        let books = results[0].get("books").unwrap().as_records().unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[1].get("title").unwrap().as_str(), Some("Second"));
        assert!(books[0].entry("title").unwrap().is_from_storage());
        assert_eq!(results[1].get("name").unwrap().as_str(), Some("John"));
        assert!(results[1].get("books").unwrap().is_null());
    }

    #[test]
    fn test_children_go_into_named_parent() {
        let database = Arc::new(RecordingDatabase::new("main", DialectKind::Postgres));
        let mut columns = vec![
            ("authors____id".to_string(), Value::Int(1)),
            ("authors____name".to_string(), Value::from("Jane")),
        ];
        for (alias, id) in [("b1", 10), ("b2", 11)] {
            columns.push((format!("{}____id", alias), Value::Int(id)));
            columns.push((format!("{}____title", alias), Value::from("Tome")));
            columns.push((format!("{}____author", alias), Value::Int(1)));
        }
        columns.push(("c2____id".to_string(), Value::Int(100)));
        columns.push(("c2____book".to_string(), Value::Int(11)));
        database.respond(vec![Row::new(columns)]);

        let mut search = Search::new(&author(Arc::clone(&database))).unwrap();
        search
            .child("books", JoinSide::Left, "", "b1")
            .unwrap()
            .child("books", JoinSide::Left, "", "b2")
            .unwrap()
            .child("chapters", JoinSide::Left, "b2", "c2")
            .unwrap();
        let results = block_on(search.results()).unwrap();
        assert!(database.sql()[0].contains(
            "LEFT JOIN \"chapters\" AS \"c2\" ON (\"b2\".\"b_id\" = \"c2\".\"c_book\")"
        ));

        let books = results[0].get("books").unwrap().as_records().unwrap();
        assert_eq!(books.len(), 2);
        let first = books.iter().find(|book| book.get("id").unwrap() == &Value::Int(10)).unwrap();
        let second = books.iter().find(|book| book.get("id").unwrap() == &Value::Int(11)).unwrap();
        assert!(first.get("chapters").unwrap().as_records().is_none());
        let chapters = second.get("chapters").unwrap().as_records().unwrap();
        assert_eq!(chapters[0].get("id").unwrap(), &Value::Int(100));
    }

    #[test]
    fn test_child_errors() {
        let database = Arc::new(RecordingDatabase::new("main", DialectKind::Sqlite));
        let mut search = Search::new(&author(Arc::clone(&database))).unwrap();
        assert!(matches!(
            search.child("nothing", JoinSide::Left, "", ""),
            Err(MapperError::Join(_))
        ));
        assert!(matches!(
            search.exact("unknown", 1),
            Err(MapperError::UnknownRelation { .. })
        ));

        let mut other = MapperMap::new("other");
        other.set_relation("id", "a_id").add_primary_key("id");
        let shared = Arc::clone(&database);
        other.add_foreign_key("books", "id", "author", move || {
            let mut record = book(Arc::clone(&shared));
            let mut map = MapperMap::new("elsewhere");
            map.set_relation("author", "b_author");
            record.set_mapper(Arc::new(DatabaseMapper::new(
                map,
                "books",
                Arc::clone(&shared) as Arc<dyn Database>,
            )));
            Ok(record)
        });
        let mapper: Arc<dyn Mapper> = Arc::new(DatabaseMapper::new(
            other,
            "authors",
            Arc::clone(&database) as Arc<dyn Database>,
        ));
        let mut record = Record::with_mapper(mapper);
        record.add_entry("id", EntryType::Integer { max: 10 }).unwrap();
        let mut search = Search::new(&record).unwrap();
        assert!(matches!(
            search.child("books", JoinSide::Left, "", ""),
            Err(MapperError::Join(_))
        ));
    }

    #[test]
    fn test_child_not_exist() {
        let database = Arc::new(RecordingDatabase::new("main", DialectKind::Postgres));
        let mut search = Search::new(&author(Arc::clone(&database))).unwrap();
        search.child_not_exist("books", "books.id").unwrap();
        block_on(search.results()).unwrap();
        let sql = database.sql();
        assert!(sql[0].contains(
            "LEFT OUTER JOIN \"books\" AS \"books\" ON (\"authors\".\"a_id\" = \"books\".\"b_author\") WHERE \"books\".\"b_id\" IS NULL"
        ));
    }
}
