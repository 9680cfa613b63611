//! INI table, one section per row

use super::{FileFormat, FileRow, escape_nl, unescape_nl};
use crate::error::MapperError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ini;

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.trim() == text && text.parse::<f64>().is_ok()
}

fn quote(text: &str) -> String {
    let text = escape_nl(text);
    if is_numeric(&text) {
        text
    } else {
        format!("\"{}\"", text.replace('"', "\\\""))
    }
}

fn unquote(text: &str) -> String {
    let text = text.trim();
    let Some(inner) = text.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) else {
        return unescape_nl(text);
    };
    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unquoted.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => unquoted.push('"'),
            Some(other) => {
                unquoted.push(c);
                unquoted.push(other);
            }
            None => unquoted.push(c),
        }
    }
    unescape_nl(&unquoted)
}

impl FileFormat for Ini {
    fn name(&self) -> &'static str {
        "ini"
    }

    fn unpack(&self, content: &str) -> Result<Vec<FileRow>, MapperError> {
        let mut rows: Vec<FileRow> = Vec::new();
        let mut current: Option<FileRow> = None;

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                if let Some(row) = current.take() {
                    rows.push(row);
                }
                current = Some(FileRow::new());
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(MapperError::Format(format!(
                    "Cannot parse INI input at line {}",
                    number + 1
                )));
            };
            let row = current.as_mut().ok_or_else(|| {
                MapperError::Format(format!(
                    "Value outside of section at line {}",
                    number + 1
                ))
            })?;
            row.insert(key.trim().to_string(), unquote(value));
        }
        if let Some(row) = current {
            rows.push(row);
        }
        Ok(rows.into_iter().filter(|row| !row.is_empty()).collect())
    }

    fn pack(&self, lines: &[(String, FileRow)]) -> Result<String, MapperError> {
        let mut output = String::new();
        for (line_key, row) in lines {
            if line_key.contains(['[', ']', '\n']) {
                return Err(MapperError::Format(format!(
                    "Cannot use *{}* as INI section",
                    line_key
                )));
            }
            output.push_str(&format!("[{}]\n", line_key));
            for (key, value) in row {
                output.push_str(&format!("{} = {}\n", key, quote(value)));
            }
            output.push('\n');
        }
        Ok(output)
    }
}
