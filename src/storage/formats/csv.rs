//! CSV table
//!
//! Cells are always enclosed in double quotes and every line ends with an
//! empty separator cell, which is skipped when reading.

use super::{FileFormat, FileRow, escape_nl, positional_cells, positional_row, unescape_nl};
use crate::error::MapperError;

const SEPARATOR: char = ',';
const ENCLOSURE: char = '"';
const ESCAPE: char = '\\';

#[derive(Debug, Clone)]
pub struct Csv {
    line_delimiter: String,
}

impl Default for Csv {
    fn default() -> Self {
        Self {
            line_delimiter: "\n".to_string(),
        }
    }
}

impl Csv {
    pub fn with_line_delimiter(line_delimiter: impl Into<String>) -> Self {
        Self {
            line_delimiter: line_delimiter.into(),
        }
    }

    /// Split one line into cells; the flag tells whether the cell was enclosed
    fn parse_line(line: &str) -> Result<Vec<(String, bool)>, MapperError> {
        let mut cells = Vec::new();
        let mut current = String::new();
        let mut enclosed = false;
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    // pair stays whole, cells are unescaped after the split
                    ESCAPE => {
                        current.push(c);
                        if let Some(next) = chars.next() {
                            current.push(next);
                        }
                    }
                    ENCLOSURE if chars.peek() == Some(&ENCLOSURE) => {
                        chars.next();
                        current.push(ENCLOSURE);
                    }
                    ENCLOSURE => in_quotes = false,
                    _ => current.push(c),
                }
            } else {
                match c {
                    SEPARATOR => {
                        cells.push((std::mem::take(&mut current), enclosed));
                        enclosed = false;
                    }
                    ENCLOSURE if current.is_empty() && !enclosed => {
                        in_quotes = true;
                        enclosed = true;
                    }
                    _ => current.push(c),
                }
            }
        }
        if in_quotes {
            return Err(MapperError::Format(format!(
                "Unterminated enclosure in CSV line: {}",
                line
            )));
        }
        cells.push((current, enclosed));
        Ok(cells)
    }
}

impl FileFormat for Csv {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn unpack(&self, content: &str) -> Result<Vec<FileRow>, MapperError> {
        let mut rows = Vec::new();
        for line in content.split(self.line_delimiter.as_str()) {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let mut cells = Self::parse_line(line)?;
            if matches!(cells.last(), Some((cell, false)) if cell.is_empty()) {
                cells.pop();
            }
            rows.push(positional_row(
                cells.into_iter().map(|(cell, _)| unescape_nl(&cell)),
            ));
        }
        Ok(rows)
    }

    fn pack(&self, lines: &[(String, FileRow)]) -> Result<String, MapperError> {
        let packed: Vec<String> = lines
            .iter()
            .map(|(_, row)| {
                let mut line: String = positional_cells(row)
                    .into_iter()
                    .map(|cell| {
                        let cell = escape_nl(cell).replace(ENCLOSURE, "\"\"");
                        format!("{}{}{}{}", ENCLOSURE, cell, ENCLOSURE, SEPARATOR)
                    })
                    .collect();
                if line.is_empty() {
                    line.push(SEPARATOR);
                }
                line
            })
            .collect();
        Ok(packed.join(&self.line_delimiter))
    }
}
