//! Minimal OOXML spreadsheet package handling
//!
//! A workbook is a ZIP archive of XML parts:
//!
//! ```text
//! {name}.dsff (ZIP archive)
//! ├── [Content_Types].xml
//! ├── _rels/.rels
//! ├── docProps/core.xml          # document properties
//! ├── docProps/app.xml
//! └── xl/
//!     ├── workbook.xml           # sheet list, in order
//!     ├── _rels/workbook.xml.rels
//!     ├── styles.xml             # style 1 = bold centred header
//!     └── worksheets/sheet{N}.xml
//! ```
//!
//! The writer only emits inline strings; the reader also resolves the
//! shared-string table so that workbooks saved by spreadsheet software open.

mod reader;
mod writer;

pub(crate) use reader::read_workbook;
pub(crate) use writer::write_workbook;

use super::{DocumentProperties, Sheet};

/// Decoded workbook: ordered sheets and document properties
#[derive(Debug, Default)]
pub(crate) struct Workbook {
    pub sheets: Vec<Sheet>,
    pub properties: DocumentProperties,
}

pub(crate) const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub(crate) const NS_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(crate) const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub(crate) const PART_WORKBOOK: &str = "xl/workbook.xml";
pub(crate) const PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";
pub(crate) const PART_CORE: &str = "docProps/core.xml";

/// Worksheet bounds of the spreadsheet format
pub(crate) const MAX_ROWS: usize = 1_048_576;
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Spreadsheet column letters for a zero-based index (0 → `A`, 26 → `AA`)
pub(crate) fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Zero-based (row, column) of a cell reference such as `B12`
pub(crate) fn parse_reference(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || letters.len() > 3 || !letters.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let column = letters
        .bytes()
        .try_fold(0usize, |acc, b| acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize))?
        - 1;
    if column >= MAX_COLUMNS {
        return None;
    }
    let row: usize = digits.parse().ok()?;
    let row = row.checked_sub(1)?;
    if row >= MAX_ROWS {
        return None;
    }
    Some((row, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse_reference("A1"), Some((0, 0)));
        assert_eq!(parse_reference("AB12"), Some((11, 27)));
        assert_eq!(parse_reference("12"), None);
        assert_eq!(parse_reference("A0"), None);
        for i in [0, 5, 26, 300, 702] {
            let r = format!("{}7", column_letters(i));
            assert_eq!(parse_reference(&r), Some((6, i)));
        }
    }

    #[test]
    fn test_parse_reference_out_of_range() {
        assert_eq!(parse_reference("AAAAAAAAAAAAAAAAAAAA1"), None);
        assert_eq!(parse_reference("XFD1"), Some((0, MAX_COLUMNS - 1)));
        assert_eq!(parse_reference("XFE1"), None);
        assert_eq!(parse_reference("ZZZ1"), None);
        assert_eq!(parse_reference("A1048577"), None);
        assert_eq!(parse_reference("A99999999999999999999999"), None);
    }
}
