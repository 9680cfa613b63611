//! JSON table, array of objects

use super::{FileFormat, FileRow, rows_from_json};
use crate::error::MapperError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl FileFormat for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn unpack(&self, content: &str) -> Result<Vec<FileRow>, MapperError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let document: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| MapperError::Format(format!("Cannot parse JSON input: {}", e)))?;
        rows_from_json(document)
    }

    fn pack(&self, lines: &[(String, FileRow)]) -> Result<String, MapperError> {
        let rows: Vec<&FileRow> = lines.iter().map(|(_, row)| row).collect();
        serde_json::to_string_pretty(&rows)
            .map_err(|e| MapperError::Format(format!("Cannot pack JSON output: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rows() {
        let mut row = FileRow::new();
        row.insert("id".to_string(), "5".to_string());
        row.insert("name".to_string(), "Ann".to_string());
        let packed = Json.pack(&[("5".to_string(), row.clone())]).unwrap();
        assert_eq!(Json.unpack(&packed).unwrap(), vec![row]);
    }

    #[test]
    fn test_json_scalars_become_text() {
        let rows = Json
            .unpack(r#"{"a": {"id": 3, "on": true, "none": null}}"#)
            .unwrap();
        assert_eq!(rows[0].get("id").map(String::as_str), Some("3"));
        assert_eq!(rows[0].get("on").map(String::as_str), Some("1"));
        assert_eq!(rows[0].get("none").map(String::as_str), Some(""));
        assert!(Json.unpack("asdfgjkl?{}|&~![()^").is_err());
        assert!(Json.unpack("[1, 2]").is_err());
    }
}
