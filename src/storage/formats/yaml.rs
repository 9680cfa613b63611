//! YAML table, sequence of mappings

use super::{FileFormat, FileRow, rows_from_json};
use crate::error::MapperError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

impl FileFormat for Yaml {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn unpack(&self, content: &str) -> Result<Vec<FileRow>, MapperError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let document: serde_json::Value = serde_yaml::from_str(content)
            .map_err(|e| MapperError::Format(format!("Cannot parse YAML input: {}", e)))?;
        rows_from_json(document)
    }

    fn pack(&self, lines: &[(String, FileRow)]) -> Result<String, MapperError> {
        let rows: Vec<&FileRow> = lines.iter().map(|(_, row)| row).collect();
        serde_yaml::to_string(&rows)
            .map_err(|e| MapperError::Format(format!("Cannot pack YAML output: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_rows() {
        let mut row = FileRow::new();
        row.insert("id".to_string(), "1".to_string());
        row.insert("title".to_string(), "multi\nline".to_string());
        let packed = Yaml.pack(&[("1".to_string(), row.clone())]).unwrap();
        assert_eq!(Yaml.unpack(&packed).unwrap(), vec![row]);
        assert!(Yaml.unpack("- just\n- strings\n").is_err());
    }
}
