//! Writer for the native save file format

use std::fs;
use std::path::Path;

use super::{FORMAT_VERSION, Section};
use crate::attributes::AttrValue;
use crate::data_array::SheetData;
use crate::error::Result;
use crate::selection::Selection;

/// Write a snapshot to a save file
pub fn write_sheet(path: &Path, data: &SheetData) -> Result<()> {
    fs::write(path, write_sheet_content(data))?;
    Ok(())
}

/// Write a snapshot to a save file string
pub fn write_sheet_content(data: &SheetData) -> String {
    fn header(out: &mut String, section: Section) {
        out.push_str(section.header());
        out.push('\n');
    }

    let mut out = String::new();

    header(&mut out, Section::Version);
    out.push_str(FORMAT_VERSION);
    out.push('\n');

    header(&mut out, Section::Shape);
    let shape = data.shape;
    out.push_str(&format!("{}\t{}\t{}\n", shape.rows, shape.cols, shape.tables));

    // BTreeMap keys keep the output sorted by (row, col, table)
    header(&mut out, Section::Grid);
    for (key, code) in &data.grid {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            key.row,
            key.col,
            key.table,
            escape_code(code)
        ));
    }

    header(&mut out, Section::Attributes);
    for entry in &data.attributes {
        let mut fields = selection_fields(&entry.selection);
        fields.push(entry.table.to_string());
        for (name, value) in &entry.attrs {
            fields.push(AttrValue::from(name.as_str()).to_string());
            fields.push(value.to_string());
        }
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }

    header(&mut out, Section::RowHeights);
    for ((row, table), height) in &data.row_heights {
        out.push_str(&format!("{}\t{}\t{}\n", row, table, height));
    }

    header(&mut out, Section::ColWidths);
    for ((col, table), width) in &data.col_widths {
        out.push_str(&format!("{}\t{}\t{}\n", col, table, width));
    }

    header(&mut out, Section::Macros);
    out.push_str(&data.macros);
    out
}

fn selection_fields(selection: &Selection) -> Vec<String> {
    let pairs = |items: Vec<(usize, usize)>| {
        let parts: Vec<String> = items.iter().map(|(a, b)| format!("({}, {})", a, b)).collect();
        format!("[{}]", parts.join(", "))
    };
    let singles = |items: Vec<usize>| {
        let parts: Vec<String> = items.iter().map(usize::to_string).collect();
        format!("[{}]", parts.join(", "))
    };
    vec![
        pairs(selection.block_tl()),
        pairs(selection.block_br()),
        singles(selection.selected_rows().iter().copied().collect()),
        singles(selection.selected_cols().iter().copied().collect()),
        pairs(selection.selected_cells().iter().copied().collect()),
    ]
}

fn escape_code(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}
