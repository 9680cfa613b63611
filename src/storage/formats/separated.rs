//! Table made of separated elements
//!
//! Each line is one row, cells are split by the element delimiter.
//! Delimiters inside cells are not escaped, only newlines are.

use super::{FileFormat, FileRow, escape_nl, positional_cells, positional_row, unescape_nl};
use crate::error::MapperError;

#[derive(Debug, Clone)]
pub struct SeparatedElements {
    element_delimiter: String,
    line_delimiter: String,
}

impl Default for SeparatedElements {
    fn default() -> Self {
        Self::new("|", "\n")
    }
}

impl SeparatedElements {
    pub fn new(element_delimiter: impl Into<String>, line_delimiter: impl Into<String>) -> Self {
        Self {
            element_delimiter: element_delimiter.into(),
            line_delimiter: line_delimiter.into(),
        }
    }
}

impl FileFormat for SeparatedElements {
    fn name(&self) -> &'static str {
        "separated"
    }

    fn unpack(&self, content: &str) -> Result<Vec<FileRow>, MapperError> {
        Ok(content
            .split(self.line_delimiter.as_str())
            .filter(|line| !line.is_empty())
            .map(|line| {
                let mut cells: Vec<&str> = line.split(self.element_delimiter.as_str()).collect();
                // line ends with a delimiter
                if cells.len() > 1 && cells.last() == Some(&"") {
                    cells.pop();
                }
                positional_row(cells.into_iter().map(unescape_nl))
            })
            .collect())
    }

    fn pack(&self, lines: &[(String, FileRow)]) -> Result<String, MapperError> {
        let packed: Vec<String> = lines
            .iter()
            .map(|(_, row)| {
                positional_cells(row)
                    .into_iter()
                    .map(|cell| format!("{}{}", escape_nl(cell), self.element_delimiter))
                    .collect::<String>()
            })
            .collect();
        Ok(packed.join(&self.line_delimiter))
    }
}
