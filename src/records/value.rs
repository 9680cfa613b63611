//! Entry types and the values they hold

use super::Record;
use crate::error::MapperError;
use serde::{Deserialize, Serialize};

/// Type of an entry together with its limits
///
/// The limits are checked every time a value is set through [`Record::set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryType {
    /// Elementary content - boolean
    Boolean,
    /// Whole number, must not exceed `max`
    Integer { max: i64 },
    /// Decimal number, must not exceed `max`
    Float { max: f64 },
    /// Text, must not be longer than `max_length` characters (0 = unlimited)
    String { max_length: usize },
    /// Text limited to one of preset values
    Set { allowed: Vec<String> },
    /// Links to other records, usually filled through foreign keys
    Array,
    /// Complex content stored as JSON
    Object,
}

impl EntryType {
    /// Whether the type holds a number
    pub fn is_numeric(&self) -> bool {
        matches!(self, EntryType::Integer { .. } | EntryType::Float { .. })
    }

    /// Check the value against this type and return it in its normalized form
    pub fn check(&self, key: &str, value: Value) -> Result<Value, MapperError> {
        let invalid = |reason: String| MapperError::InvalidValue {
            key: key.to_string(),
            reason,
        };

        if value.is_null() && !matches!(self, EntryType::Array) {
            return Ok(Value::Null);
        }

        match self {
            EntryType::Boolean => match value {
                Value::Bool(_) => Ok(value),
                _ => Err(invalid("Try to set something other than boolean".to_string())),
            },
            EntryType::Integer { max } => {
                let number = match value.numeric() {
                    Some(Value::Int(n)) => n,
                    Some(Value::Float(f)) if f.fract() == 0.0 => f as i64,
                    _ => return Err(invalid("Try to set something other than number".to_string())),
                };
                if number > *max {
                    return Err(invalid(format!(
                        "Try to set number larger than allowed size ({} > {})",
                        number, max
                    )));
                }
                Ok(Value::Int(number))
            }
            EntryType::Float { max } => {
                let number = match value.numeric() {
                    Some(Value::Int(n)) => n as f64,
                    Some(Value::Float(f)) => f,
                    _ => return Err(invalid("Try to set something other than number".to_string())),
                };
                if number > *max {
                    return Err(invalid(format!(
                        "Try to set number larger than allowed size ({:.4} > {:.4})",
                        number, max
                    )));
                }
                Ok(Value::Float(number))
            }
            EntryType::String { max_length } => match value {
                Value::Text(ref text) => {
                    let size = text.chars().count();
                    if *max_length > 0 && size > *max_length {
                        return Err(invalid(format!(
                            "Try to set string longer than allowed size ({} > {})",
                            size, max_length
                        )));
                    }
                    Ok(value)
                }
                _ => Err(invalid("Try to set something other than string".to_string())),
            },
            EntryType::Set { allowed } => match value {
                Value::Text(ref text) if allowed.contains(text) => Ok(value),
                other => Err(invalid(format!(
                    "Try to set *{}* that is not in preset values",
                    other.to_text()
                ))),
            },
            EntryType::Array => match value {
                Value::Array(_) => Ok(value),
                _ => Err(invalid("You must set array of records".to_string())),
            },
            EntryType::Object => match value {
                Value::Object(_) => Ok(value),
                Value::Text(text) => Ok(Value::Object(
                    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
                )),
                _ => Err(invalid("You must set object representation".to_string())),
            },
        }
    }

    /// Convert a cell read from a text based storage into a typed value
    pub fn value_from_text(&self, text: &str) -> Value {
        match self {
            EntryType::Boolean => match text.trim().to_lowercase().as_str() {
                "" => Value::Null,
                "1" | "true" | "yes" | "on" => Value::Bool(true),
                _ => Value::Bool(false),
            },
            EntryType::Integer { .. } => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .map(Value::Int)
                    .or_else(|_| trimmed.parse::<f64>().map(|f| Value::Int(f as i64)))
                    .unwrap_or(Value::Null)
            }
            EntryType::Float { .. } => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::Null),
            EntryType::String { .. } | EntryType::Set { .. } => Value::Text(text.to_string()),
            EntryType::Array => Value::Null,
            EntryType::Object => {
                if text.is_empty() {
                    Value::Null
                } else {
                    Value::Object(
                        serde_json::from_str(text)
                            .unwrap_or_else(|_| serde_json::Value::String(text.to_string())),
                    )
                }
            }
        }
    }

    /// Convert a value returned by a database into the form this type holds
    pub fn value_from_stored(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (EntryType::Boolean, Value::Int(n)) => Value::Bool(n != 0),
            (EntryType::Boolean, Value::Float(f)) => Value::Bool(f != 0.0),
            (EntryType::Integer { .. }, Value::Float(f)) => Value::Int(f as i64),
            (EntryType::Integer { .. }, Value::Bool(b)) => Value::Int(i64::from(b)),
            (EntryType::Float { .. }, Value::Int(n)) => Value::Float(n as f64),
            (EntryType::String { .. } | EntryType::Set { .. }, value @ Value::Int(_))
            | (EntryType::String { .. } | EntryType::Set { .. }, value @ Value::Float(_)) => {
                Value::Text(value.to_text())
            }
            (entry_type, Value::Text(text)) => entry_type.value_from_text(&text),
            (EntryType::Object, Value::Object(json)) => Value::Object(json),
            (_, value) => value,
        }
    }
}

/// Value stored in an entry
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Array(Vec<Record>),
    Object(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value counts as "nothing set" when looking for matches
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(n) => *n == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(text) => text.is_empty() || text == "0",
            Value::Array(items) => items.is_empty(),
            Value::Object(json) => json.is_null(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Object(json) => Some(json),
            _ => None,
        }
    }

    /// Numeric reading of the value, numbers and numeric texts only
    fn numeric(&self) -> Option<Value> {
        match self {
            Value::Int(_) | Value::Float(_) => Some(self.clone()),
            Value::Text(text) => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .map(Value::Int)
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().map(Value::Float))
            }
            _ => None,
        }
    }

    /// Text form of the value as written into text storages and compared by finders
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => "0".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(text) => text.clone(),
            Value::Array(_) => String::new(),
            Value::Object(json) => json.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Object(value)
    }
}

impl From<Vec<Record>> for Value {
    fn from(value: Vec<Record>) -> Self {
        Value::Array(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
