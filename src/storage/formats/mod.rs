//! File formats
//!
//! A file table is stored as a list of rows; every row maps storage keys to
//! cells. Formats only move text around, typing is done by the mappers
//! through the entry types.

mod csv;
mod ini;
mod json;
mod separated;
mod yaml;

pub use csv::Csv;
pub use ini::Ini;
pub use json::Json;
pub use separated::SeparatedElements;
pub use yaml::Yaml;

use crate::error::MapperError;
use std::collections::BTreeMap;

/// One row of a file table, storage key to cell
pub type FileRow = BTreeMap<String, String>;

/// Packs rows into file content and back
pub trait FileFormat: Send + Sync {
    /// Name the format is known under
    fn name(&self) -> &'static str;

    fn unpack(&self, content: &str) -> Result<Vec<FileRow>, MapperError>;

    /// Pack rows, each paired with its line key
    fn pack(&self, lines: &[(String, FileRow)]) -> Result<String, MapperError>;
}

/// Format by its name: `csv`, `ini`, `json`, `yaml` or `separated`
pub fn by_name(name: &str) -> Result<Box<dyn FileFormat>, MapperError> {
    match name.to_lowercase().as_str() {
        "csv" => Ok(Box::new(Csv::default())),
        "ini" | "inf" => Ok(Box::new(Ini)),
        "json" => Ok(Box::new(Json)),
        "yaml" | "yml" => Ok(Box::new(Yaml)),
        "separated" | "txt" => Ok(Box::new(SeparatedElements::default())),
        other => Err(MapperError::Format(format!("Unknown format {}", other))),
    }
}

/// Backslashes doubled first, then newlines written as `\n`
pub(crate) fn escape_nl(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

/// Reverse of [`escape_nl`] in one pass, unknown escapes stay as they are
pub(crate) fn unescape_nl(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('\\') => output.push('\\'),
            Some(other) => {
                output.push(c);
                output.push(other);
            }
            None => output.push(c),
        }
    }
    output
}

/// Cells of a positional row ordered by their numeric keys
pub(crate) fn positional_cells(row: &FileRow) -> Vec<&str> {
    let mut cells: Vec<(&String, &String)> = row.iter().collect();
    cells.sort_by(|(a, _), (b, _)| match (a.parse::<usize>(), b.parse::<usize>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    cells.into_iter().map(|(_, cell)| cell.as_str()).collect()
}

pub(crate) fn positional_row<I: IntoIterator<Item = String>>(cells: I) -> FileRow {
    cells
        .into_iter()
        .enumerate()
        .map(|(i, cell)| (i.to_string(), cell))
        .collect()
}

/// Text form of a scalar read from a structured document
pub(crate) fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Bool(true) => "1".to_string(),
        serde_json::Value::Bool(false) => "0".to_string(),
        other => other.to_string(),
    }
}

/// Rows of a structured document, either a list or a map of objects
pub(crate) fn rows_from_json(document: serde_json::Value) -> Result<Vec<FileRow>, MapperError> {
    let items: Vec<serde_json::Value> = match document {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => map.into_iter().map(|(_, item)| item).collect(),
        _ => {
            return Err(MapperError::Format(
                "Document must contain a list of rows".to_string(),
            ));
        }
    };
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(map) => Ok(map
                .iter()
                .map(|(key, value)| (key.clone(), scalar_text(value)))
                .collect()),
            _ => Err(MapperError::Format("Row must be a map of cells".to_string())),
        })
        .collect()
}
