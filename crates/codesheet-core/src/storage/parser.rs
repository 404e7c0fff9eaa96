//! Parser for the native save file format

use std::fs;
use std::path::Path;

use codesheet_engine::engine::{Key, Shape};

use super::literal::{parse_indices, parse_literal, parse_pairs};
use super::{FORMAT_VERSION, Section};
use crate::attributes::{AttrDict, AttrEntry};
use crate::data_array::SheetData;
use crate::error::{CodesheetError, Result};
use crate::selection::Selection;

/// Parse a save file
pub fn parse_sheet(path: &Path) -> Result<SheetData> {
    let content = fs::read_to_string(path)?;
    parse_sheet_content(&content)
}

/// Parse save file content from a string
pub fn parse_sheet_content(content: &str) -> Result<SheetData> {
    let mut data = SheetData::new(Shape::new(1, 1, 1));
    let mut section: Option<Section> = None;
    let mut seen_shape = false;
    let mut offset = 0;

    for (line_num, raw) in content.split_inclusive('\n').enumerate() {
        let line_num = line_num + 1;
        offset += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);

        if let Some(next) = Section::from_header(line) {
            if next == Section::Macros {
                data.macros = content[offset..].to_string();
                break;
            }
            section = Some(next);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let Some(current) = section else {
            return Err(parse_error(line_num, "content before the first section header"));
        };
        match current {
            Section::Version => {
                if line.trim() != FORMAT_VERSION {
                    return Err(parse_error(
                        line_num,
                        &format!("unsupported file version {}", line.trim()),
                    ));
                }
            }
            Section::Shape => {
                let fields = split_fields(line, 3, line_num)?;
                data.shape = Shape::new(
                    parse_usize(fields[0], line_num)?,
                    parse_usize(fields[1], line_num)?,
                    parse_usize(fields[2], line_num)?,
                );
                seen_shape = true;
            }
            Section::Grid => {
                let fields: Vec<&str> = line.splitn(4, '\t').collect();
                let [row, col, table, code] = fields.as_slice() else {
                    return Err(parse_error(line_num, "expected row, col, table and code"));
                };
                let key = Key::new(
                    parse_usize(row, line_num)?,
                    parse_usize(col, line_num)?,
                    parse_usize(table, line_num)?,
                );
                let code = unescape_code(code);
                if !code.is_empty() {
                    data.grid.insert(key, code);
                }
            }
            Section::Attributes => data.attributes.push(parse_attr_line(line, line_num)?),
            Section::RowHeights | Section::ColWidths => {
                let fields = split_fields(line, 3, line_num)?;
                let index = parse_usize(fields[0], line_num)?;
                let table = parse_usize(fields[1], line_num)?;
                let size: f64 = fields[2]
                    .trim()
                    .parse()
                    .map_err(|_| parse_error(line_num, &format!("invalid size {}", fields[2])))?;
                let sizes = if current == Section::RowHeights {
                    &mut data.row_heights
                } else {
                    &mut data.col_widths
                };
                sizes.insert((index, table), size);
            }
            Section::Macros => {}
        }
    }

    if !seen_shape {
        return Err(parse_error(0, "missing [shape] section"));
    }
    Ok(data)
}

fn parse_attr_line(line: &str, line_num: usize) -> Result<AttrEntry> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 6 || (fields.len() - 6) % 2 != 0 {
        return Err(parse_error(
            line_num,
            "expected five selection fields, a table and key/value pairs",
        ));
    }
    let at_line = |e: CodesheetError| parse_error(line_num, &e.to_string());
    let selection = Selection::new(
        parse_pairs(fields[0]).map_err(at_line)?,
        parse_pairs(fields[1]).map_err(at_line)?,
        parse_indices(fields[2]).map_err(at_line)?,
        parse_indices(fields[3]).map_err(at_line)?,
        parse_pairs(fields[4]).map_err(at_line)?,
    );
    let table = parse_usize(fields[5], line_num)?;

    let mut attrs = AttrDict::new();
    for pair in fields[6..].chunks(2) {
        let name = match parse_literal(pair[0]) {
            Ok(value) => value.as_str().map(str::to_owned),
            Err(_) => None,
        }
        .unwrap_or_else(|| pair[0].trim().to_string());
        let value = parse_literal(pair[1]).map_err(at_line)?;
        attrs.insert(name, value);
    }
    Ok(AttrEntry::new(selection, table, attrs))
}

fn split_fields(line: &str, count: usize, line_num: usize) -> Result<Vec<&str>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != count {
        return Err(parse_error(
            line_num,
            &format!("expected {} tab-separated fields, found {}", count, fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_usize(field: &str, line_num: usize) -> Result<usize> {
    field
        .trim()
        .parse()
        .map_err(|_| parse_error(line_num, &format!("invalid index {}", field)))
}

fn parse_error(line: usize, message: &str) -> CodesheetError {
    CodesheetError::Parse {
        line,
        message: message.to_string(),
    }
}

fn unescape_code(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}
