//! Search evaluated in memory over records of any mapper

use super::Connector;
use super::joins::JoinLookup;
use crate::error::MapperError;
use crate::mappers::MapperMap;
use crate::records::{Record, Value};
use crate::storage::query_builder::{Condition, Direction, Operation, ParamKey, QueryBuilder, Relation};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::collections::HashSet;

pub(crate) struct RecordsConnector {
    initial: Option<Vec<Record>>,
}

impl RecordsConnector {
    /// Search the given records, or everything the mapper loads when `None`
    pub fn new(initial: Option<Vec<Record>>) -> Self {
        Self { initial }
    }

    async fn source(&self, joins: &JoinLookup) -> Result<Vec<Record>, MapperError> {
        match &self.initial {
            Some(records) => Ok(records.clone()),
            None => joins.base().record.load_multiple().await,
        }
    }

    async fn filtered(
        &self,
        query: &QueryBuilder,
        joins: &JoinLookup,
    ) -> Result<Vec<Record>, MapperError> {
        if !query.joins().is_empty() {
            return Err(MapperError::Search(
                "Records cannot be joined in memory".to_string(),
            ));
        }
        let base = joins.base();
        let map = base.record.mapper()?.map();
        let conditions = query
            .conditions()
            .iter()
            .map(|condition| Matcher::new(condition, query, map, &base.store_key))
            .collect::<Result<Vec<_>, _>>()?;

        let mut found = Vec::new();
        for record in self.source(joins).await? {
            let mut results = conditions.iter().map(|matcher| matcher.matches(&record));
            let passed = match query.relation() {
                Relation::And => results.all(|matched| matched),
                Relation::Or => conditions.is_empty() || results.any(|matched| matched),
            };
            if passed {
                found.push(record);
            }
        }
        Ok(found)
    }
}

#[async_trait(?Send)]
impl Connector for RecordsConnector {
    fn is_sql(&self) -> bool {
        false
    }

    async fn count(&self, query: &QueryBuilder, joins: &JoinLookup) -> Result<usize, MapperError> {
        let found = self.filtered(query, joins).await?;
        if query.grouping().is_empty() {
            return Ok(found.len());
        }

        let map = joins.base().record.mapper()?.map();
        let keys = query
            .grouping()
            .iter()
            .map(|group| record_key(map, &group.column))
            .collect::<Result<Vec<_>, _>>()?;
        let groups: HashSet<Vec<String>> = found
            .iter()
            .map(|record| {
                keys.iter()
                    .map(|key| record.get(key).map(Value::to_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        Ok(groups.len())
    }

    async fn results(
        &self,
        query: &QueryBuilder,
        joins: &JoinLookup,
    ) -> Result<Vec<Record>, MapperError> {
        let mut found = self.filtered(query, joins).await?;

        let map = joins.base().record.mapper()?.map();
        let ordering = query
            .ordering()
            .iter()
            .map(|order| Ok((record_key(map, &order.column)?, order.direction)))
            .collect::<Result<Vec<_>, MapperError>>()?;
        if !ordering.is_empty() {
            found.sort_by(|a, b| {
                ordering
                    .iter()
                    .map(|(key, direction)| {
                        let ordered = compare(a.get(key).ok(), b.get(key).ok());
                        match direction {
                            Direction::Asc => ordered,
                            Direction::Desc => ordered.reverse(),
                        }
                    })
                    .find(|ordered| *ordered != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let offset = query.offset().unwrap_or(0);
        let limit = query.limit().unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }
}

/// Record key mapped onto the storage column
fn record_key<'a>(map: &'a MapperMap, column: &str) -> Result<&'a str, MapperError> {
    map.relations()
        .iter()
        .find(|(_, storage)| storage == column)
        .map(|(key, _)| key.as_str())
        .ok_or_else(|| MapperError::UnknownRelation {
            key: column.to_string(),
            table: map.source().to_string(),
        })
}

/// One condition prepared for evaluation
struct Matcher {
    key: String,
    test: Test,
}

enum Test {
    Compare(Operation, Value),
    Pattern(Regex, bool),
    List(Vec<Value>, bool),
    Null(bool),
}

impl Matcher {
    fn new(
        condition: &Condition,
        query: &QueryBuilder,
        map: &MapperMap,
        base: &str,
    ) -> Result<Self, MapperError> {
        let Condition::Column {
            table,
            column,
            operation,
            key,
        } = condition
        else {
            return Err(MapperError::Search(
                "Raw conditions cannot be evaluated in memory".to_string(),
            ));
        };
        if !table.is_empty() && table != base {
            return Err(MapperError::Search(format!(
                "Unknown table *{}* for search in memory",
                table
            )));
        }

        let param = |name: &String| query.params().get(name).cloned().unwrap_or_default();
        let test = match (operation, key) {
            (Operation::IsNull, _) => Test::Null(true),
            (Operation::IsNotNull, _) => Test::Null(false),
            (Operation::In, ParamKey::List(keys)) => Test::List(keys.iter().map(param).collect(), true),
            (Operation::NotIn, ParamKey::List(keys)) => {
                Test::List(keys.iter().map(param).collect(), false)
            }
            (Operation::Like, ParamKey::Single(name)) => {
                Test::Pattern(like_pattern(&param(name).to_text())?, true)
            }
            (Operation::NotLike, ParamKey::Single(name)) => {
                Test::Pattern(like_pattern(&param(name).to_text())?, false)
            }
            (Operation::Regexp, ParamKey::Single(name)) => {
                let pattern = param(name).to_text();
                let regex = Regex::new(&pattern)
                    .map_err(|e| MapperError::Search(format!("Invalid pattern {}: {}", pattern, e)))?;
                Test::Pattern(regex, true)
            }
            (operation, ParamKey::Single(name)) => Test::Compare(*operation, param(name)),
            (operation, _) => {
                return Err(MapperError::Search(format!(
                    "Operation {} has no matching value",
                    operation.sql()
                )));
            }
        };

        Ok(Self {
            key: record_key(map, column)?.to_string(),
            test,
        })
    }

    fn matches(&self, record: &Record) -> bool {
        let Ok(value) = record.get(&self.key) else {
            return false;
        };
        match &self.test {
            Test::Null(wanted) => value.is_null() == *wanted,
            Test::List(values, wanted) => {
                values
                    .iter()
                    .any(|item| compare(Some(value), Some(item)) == Ordering::Equal)
                    == *wanted
            }
            Test::Pattern(regex, wanted) => {
                !value.is_null() && regex.is_match(&value.to_text()) == *wanted
            }
            Test::Compare(operation, wanted) => {
                if value.is_null() {
                    return false;
                }
                let ordered = compare(Some(value), Some(wanted));
                match operation {
                    Operation::Eq => ordered == Ordering::Equal,
                    Operation::Neq => ordered != Ordering::Equal,
                    Operation::Gt => ordered == Ordering::Greater,
                    Operation::Gte => ordered != Ordering::Less,
                    Operation::Lt => ordered == Ordering::Less,
                    Operation::Lte => ordered != Ordering::Greater,
                    _ => false,
                }
            }
        }
    }
}

/// LIKE pattern as regular expression; without wildcards it matches substrings
fn like_pattern(pattern: &str) -> Result<Regex, MapperError> {
    let expression = if pattern.contains(['%', '_']) {
        let mut expression = String::from("^");
        for c in pattern.chars() {
            match c {
                '%' => expression.push_str(".*"),
                '_' => expression.push('.'),
                other => expression.push_str(&regex::escape(&other.to_string())),
            }
        }
        expression.push('$');
        expression
    } else {
        regex::escape(pattern)
    };
    RegexBuilder::new(&expression)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| MapperError::Search(format!("Invalid pattern {}: {}", pattern, e)))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(_) | Value::Float(_) => value.as_f64(),
        Value::Text(text) if !text.trim().is_empty() => text.trim().parse().ok(),
        _ => None,
    }
}

/// Numbers compare as numbers, everything else by text; missing values first
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(a), Some(b)) => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_text().cmp(&b.to_text()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::{Mapper, PresetMapper};
    use crate::mappers::preset::PresetRow;
    use crate::records::EntryType;
    use crate::search::Search;
    use crate::storage::query_builder::JoinSide;
    use std::sync::Arc;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn row(id: i64, name: &str, size: f64, group: &str) -> PresetRow {
        [
            ("id".to_string(), Value::Int(id)),
            ("name".to_string(), Value::from(name)),
            ("size".to_string(), Value::Float(size)),
            ("grp".to_string(), Value::from(group)),
        ]
        .into_iter()
        .collect()
    }

    fn item() -> Record {
        let mut map = MapperMap::new("items");
        map.set_relation("id", "id")
            .set_relation("name", "name")
            .set_relation("size", "size")
            .set_relation("group", "grp")
            .add_primary_key("id");
        let mapper: Arc<dyn Mapper> = Arc::new(PresetMapper::new(
            map,
            vec![
                row(1, "apple", 1.5, "fruit"),
                row(2, "banana", 12.0, "fruit"),
                row(3, "carrot", 3.0, "vegetable"),
                row(4, "Avocado", 2.5, "fruit"),
                row(5, "beet", 0.0, ""),
            ],
        ));
        let mut record = Record::with_mapper(mapper);
        record
            .add_entry("id", EntryType::Integer { max: 100 })
            .unwrap()
            .add_entry("name", EntryType::String { max_length: 32 })
            .unwrap()
            .add_entry("size", EntryType::Float { max: 100.0 })
            .unwrap()
            .add_entry("group", EntryType::String { max_length: 32 })
            .unwrap();
        record
    }

    fn names(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|record| record.get("name").unwrap().to_text())
            .collect()
    }

    #[test]
    fn test_numeric_and_text_conditions() {
        let mut search = Search::new(&item()).unwrap();
        search.from("size", 2, true).unwrap().to("size", "10", false).unwrap();
        assert_eq!(names(&block_on(search.results()).unwrap()), vec!["carrot", "Avocado"]);

        let mut search = Search::new(&item()).unwrap();
        search.like("name", "a%").unwrap();
        assert_eq!(names(&block_on(search.results()).unwrap()), vec!["apple", "Avocado"]);

        let mut search = Search::new(&item()).unwrap();
        search.like("name", "rro").unwrap();
        assert_eq!(block_on(search.count()).unwrap(), 1);

        let mut search = Search::new(&item()).unwrap();
        search.regexp("name", "^b").unwrap().not_exact("id", 5).unwrap();
        assert_eq!(names(&block_on(search.results()).unwrap()), vec!["banana"]);
    }

    #[test]
    fn test_lists_or_and_paging() {
        let mut search = Search::new(&item()).unwrap();
        search
            .in_values("id", vec![1.into(), 3.into()])
            .unwrap()
            .exact("group", "")
            .unwrap()
            .use_or()
            .order_by("name", Direction::Desc)
            .unwrap();
        assert_eq!(
            names(&block_on(search.results()).unwrap()),
            vec!["carrot", "beet", "apple"]
        );
        search.offset(Some(1)).limit(Some(1));
        assert_eq!(names(&block_on(search.results()).unwrap()), vec!["beet"]);
        assert_eq!(block_on(search.count()).unwrap(), 3);
    }

    #[test]
    fn test_grouped_count() {
        let mut search = Search::new(&item()).unwrap();
        search.group_by("group").unwrap();
        assert_eq!(block_on(search.count()).unwrap(), 3);

        let mut search = Search::new(&item()).unwrap();
        search.not_in("group", vec!["fruit".into()]).unwrap().group_by("group").unwrap();
        assert_eq!(block_on(search.count()).unwrap(), 2);
    }

    #[test]
    fn test_given_records_and_unsupported() {
        let template = item();
        let mut only = template.blank();
        only.set("name", "plum").unwrap();
        let mut search = Search::with_records(&template, vec![only]).unwrap();
        search.not_null("name").unwrap();
        assert_eq!(names(&block_on(search.results()).unwrap()), vec!["plum"]);

        assert!(matches!(
            search.raw("1=1", Vec::new()),
            Err(MapperError::Search(_))
        ));
        assert!(matches!(
            search.child("anything", JoinSide::Left, "", ""),
            Err(MapperError::Search(_))
        ));
        let mut search = Search::with_records(&template, Vec::new()).unwrap();
        search.null("size").unwrap();
        assert!(block_on(search.results()).unwrap().is_empty());
    }
}
