//! Query builder
//!
//! Collects the parts of one query and the values bound to it. Dialects turn
//! the collected parts into SQL, the database receives the parameters.
//!
//! Every bound value gets its own key `:<column>_<counter>`. The counter
//! belongs to the builder, so two builders never influence each other's keys.

use crate::error::MapperError;
use crate::records::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// Values bound to a query, by placeholder key
pub type Params = BTreeMap<String, Value>;

static KEY_SANITIZER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

/// Comparison operation of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    Regexp,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operation {
    /// SQL operator, regexp differs per dialect
    pub fn sql(&self) -> &'static str {
        match self {
            Operation::Eq => "=",
            Operation::Neq => "!=",
            Operation::Gt => ">",
            Operation::Gte => ">=",
            Operation::Lt => "<",
            Operation::Lte => "<=",
            Operation::Like => "LIKE",
            Operation::NotLike => "NOT LIKE",
            Operation::Regexp => "REGEXP",
            Operation::In => "IN",
            Operation::NotIn => "NOT IN",
            Operation::IsNull => "IS NULL",
            Operation::IsNotNull => "IS NOT NULL",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Operation::In | Operation::NotIn)
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Operation::IsNull | Operation::IsNotNull)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        })
    }
}

/// Side of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinSide {
    /// Plain `JOIN`
    #[default]
    Basic,
    Inner,
    Outer,
    Cross,
    Left,
    Right,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl JoinSide {
    /// Keyword written before `JOIN`, empty for the plain join
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinSide::Basic => "",
            JoinSide::Inner => "INNER",
            JoinSide::Outer => "OUTER",
            JoinSide::Cross => "CROSS",
            JoinSide::Left => "LEFT",
            JoinSide::Right => "RIGHT",
            JoinSide::LeftOuter => "LEFT OUTER",
            JoinSide::RightOuter => "RIGHT OUTER",
            JoinSide::FullOuter => "FULL OUTER",
        }
    }
}

/// How conditions are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Relation {
    #[default]
    And,
    Or,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::And => "AND",
            Relation::Or => "OR",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub table: String,
    pub column: String,
    pub alias: String,
    pub aggregate: Option<Aggregate>,
}

/// Placeholder(s) a condition refers to
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKey {
    None,
    Single(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Column {
        table: String,
        column: String,
        operation: Operation,
        key: ParamKey,
    },
    /// Condition written directly in SQL
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub table: String,
    pub column: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Name the joined record is known under in results
    pub alias: String,
    pub new_table: String,
    pub new_column: String,
    pub known_table: String,
    pub known_column: String,
    pub side: JoinSide,
    pub table_alias: String,
}

impl Join {
    /// Name of the joined table inside the query
    pub fn table_reference(&self) -> &str {
        if self.table_alias.is_empty() {
            &self.new_table
        } else {
            &self.table_alias
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub table: String,
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub table: String,
    pub column: String,
}

/// Parts of a query together with its bound parameters
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    base_table: String,
    columns: Vec<Column>,
    conditions: Vec<Condition>,
    having: Vec<Condition>,
    properties: Vec<Property>,
    joins: Vec<Join>,
    ordering: Vec<Order>,
    grouping: Vec<Group>,
    relation: Relation,
    limit: Option<usize>,
    offset: Option<usize>,
    params: Params,
    counter: usize,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_base_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.base_table = table.into();
        self
    }

    pub fn base_table(&self) -> &str {
        &self.base_table
    }

    pub fn set_relation(&mut self, relation: Relation) -> &mut Self {
        self.relation = relation;
        self
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn add_column(
        &mut self,
        table: &str,
        column: &str,
        alias: &str,
        aggregate: Option<Aggregate>,
    ) -> &mut Self {
        self.columns.push(Column {
            table: table.to_string(),
            column: column.to_string(),
            alias: alias.to_string(),
            aggregate,
        });
        self
    }

    /// Add condition comparing a column with one value
    ///
    /// `IS NULL` and `IS NOT NULL` ignore the value, `IN` and `NOT IN` take
    /// it as a list of one.
    pub fn add_condition(
        &mut self,
        table: &str,
        column: &str,
        operation: Operation,
        value: impl Into<Value>,
    ) -> &mut Self {
        let condition = self.make_condition(table, column, operation, vec![value.into()]);
        self.conditions.push(condition);
        self
    }

    /// Add `IN` or `NOT IN` condition with a list of values
    pub fn add_condition_list(
        &mut self,
        table: &str,
        column: &str,
        operation: Operation,
        values: Vec<Value>,
    ) -> Result<&mut Self, MapperError> {
        if !operation.is_list() {
            return Err(MapperError::Dialect(format!(
                "Operation {} does not accept list of values",
                operation.sql()
            )));
        }
        let condition = self.make_condition(table, column, operation, values);
        self.conditions.push(condition);
        Ok(self)
    }

    /// Add condition written in SQL; placeholders inside must match the given keys
    pub fn add_raw_condition(
        &mut self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = (String, Value)>,
    ) -> &mut Self {
        for (key, value) in params {
            let key = if key.starts_with(':') {
                key
            } else {
                format!(":{}", key)
            };
            self.params.insert(key, value);
        }
        self.conditions.push(Condition::Raw(sql.into()));
        self
    }

    pub fn add_having_condition(
        &mut self,
        table: &str,
        column: &str,
        operation: Operation,
        value: impl Into<Value>,
    ) -> &mut Self {
        let condition = self.make_condition(table, column, operation, vec![value.into()]);
        self.having.push(condition);
        self
    }

    /// Add column to write the value into
    pub fn add_property(&mut self, table: &str, column: &str, value: impl Into<Value>) -> &mut Self {
        let key = self.bind(column, value.into());
        self.properties.push(Property {
            table: table.to_string(),
            column: column.to_string(),
            key,
        });
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_join(
        &mut self,
        alias: &str,
        new_table: &str,
        new_column: &str,
        known_table: &str,
        known_column: &str,
        side: JoinSide,
        table_alias: &str,
    ) -> &mut Self {
        self.joins.push(Join {
            alias: alias.to_string(),
            new_table: new_table.to_string(),
            new_column: new_column.to_string(),
            known_table: known_table.to_string(),
            known_column: known_column.to_string(),
            side,
            table_alias: table_alias.to_string(),
        });
        self
    }

    pub fn add_order_by(&mut self, table: &str, column: &str, direction: Direction) -> &mut Self {
        self.ordering.push(Order {
            table: table.to_string(),
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn add_group_by(&mut self, table: &str, column: &str) -> &mut Self {
        self.grouping.push(Group {
            table: table.to_string(),
            column: column.to_string(),
        });
        self
    }

    pub fn set_limit(&mut self, limit: Option<usize>) -> &mut Self {
        self.limit = limit;
        self
    }

    pub fn set_offset(&mut self, offset: Option<usize>) -> &mut Self {
        self.offset = offset;
        self
    }

    pub fn set_limits(&mut self, offset: Option<usize>, limit: Option<usize>) -> &mut Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn having(&self) -> &[Condition] {
        &self.having
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn ordering(&self) -> &[Order] {
        &self.ordering
    }

    pub fn grouping(&self) -> &[Group] {
        &self.grouping
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn clear_columns(&mut self) -> &mut Self {
        self.columns.clear();
        self
    }

    pub fn clear_ordering(&mut self) -> &mut Self {
        self.ordering.clear();
        self
    }

    /// Reset everything, including the placeholder counter
    pub fn clear(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    fn make_condition(
        &mut self,
        table: &str,
        column: &str,
        operation: Operation,
        values: Vec<Value>,
    ) -> Condition {
        let key = if operation.is_unary() {
            ParamKey::None
        } else if operation.is_list() {
            ParamKey::List(
                values
                    .into_iter()
                    .map(|value| self.bind(column, value))
                    .collect(),
            )
        } else {
            let value = values.into_iter().next().unwrap_or_default();
            ParamKey::Single(self.bind(column, value))
        };
        Condition::Column {
            table: table.to_string(),
            column: column.to_string(),
            operation,
            key,
        }
    }

    fn bind(&mut self, column: &str, value: Value) -> String {
        let sanitized = KEY_SANITIZER.replace_all(column, "_");
        let key = format!(":{}_{}", sanitized, self.counter);
        self.counter += 1;
        self.params.insert(key.clone(), value);
        key
    }
}
