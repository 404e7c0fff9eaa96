//! Native save file format.
//!
//! Plain text, one bracketed header per section, tab-separated fields:
//!
//! ```text
//! [codesheet save file version]
//! 1.0
//! [shape]
//! rows\tcols\ttables
//! [grid]
//! row\tcol\ttable\tcode
//! [attributes]
//! block_tl\tblock_br\trows\tcols\tcells\ttable\tkey\tvalue...
//! [row_heights]
//! row\ttable\theight
//! [col_widths]
//! col\ttable\twidth
//! [macros]
//! raw text until the end of the file
//! ```

mod literal;
mod parser;
mod writer;

pub use literal::parse_literal;
pub use parser::{parse_sheet, parse_sheet_content};
pub use writer::{write_sheet, write_sheet_content};

pub(crate) const FORMAT_VERSION: &str = "1.0";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Section {
    Version,
    Shape,
    Grid,
    Attributes,
    RowHeights,
    ColWidths,
    Macros,
}

impl Section {
    const ALL: [Section; 7] = [
        Section::Version,
        Section::Shape,
        Section::Grid,
        Section::Attributes,
        Section::RowHeights,
        Section::ColWidths,
        Section::Macros,
    ];

    pub(crate) fn header(self) -> &'static str {
        match self {
            Section::Version => "[codesheet save file version]",
            Section::Shape => "[shape]",
            Section::Grid => "[grid]",
            Section::Attributes => "[attributes]",
            Section::RowHeights => "[row_heights]",
            Section::ColWidths => "[col_widths]",
            Section::Macros => "[macros]",
        }
    }

    pub(crate) fn from_header(line: &str) -> Option<Section> {
        let line = line.trim_end();
        Section::ALL.into_iter().find(|s| s.header() == line)
    }
}
