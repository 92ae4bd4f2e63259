//! Semicolon-delimited text.
//!
//! Loading keeps every cell as text; the first row is the header and every
//! non-excluded header gets an empty feature description. Dumping writes
//! the evaluated cells, so textual literals are written unquoted.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;

use super::{deliver, CodecOptions, Input, Payload, Sink};
use crate::constants::CSV_DELIMITER;
use crate::error::Result;
use crate::model::{Cell, Dataset, Features, Metadata};

/// Candidate delimiters, in tie-breaking order
const DELIMITERS: [u8; 5] = [b',', b';', b'\t', b'|', b':'];

/// Lines inspected by the sniffer
const SNIFF_LINES: usize = 20;

/// Parse semicolon-delimited rows from a reader
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Vec<Cell>>> {
    let mut csv = ::csv::ReaderBuilder::new()
        .delimiter(CSV_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in csv.records() {
        rows.push(record?.iter().map(Cell::text).collect());
    }
    Ok(rows)
}

/// Render rows as semicolon-delimited text
pub fn write_rows<'a, I>(rows: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Vec<Cell>>,
{
    let mut csv = ::csv::WriterBuilder::new()
        .delimiter(CSV_DELIMITER)
        .terminator(::csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        csv.write_record(row.iter().map(|c| c.to_string()))?;
    }
    let bytes = csv
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Load a semicolon-delimited file
pub fn load(path: &Path, options: &CodecOptions) -> Result<Dataset> {
    let data = read_rows(File::open(path)?)?;
    let features: Features = data
        .first()
        .map(|header| {
            header
                .iter()
                .map(|c| c.to_string())
                .filter(|h| !options.is_excluded(h))
                .map(|h| (h, String::new()))
                .collect()
        })
        .unwrap_or_default();
    debug!("loaded {} CSV rows from {}", data.len(), path.display());
    Ok(Dataset::new(data, features, Metadata::new()))
}

/// Dump the evaluated data rows
pub fn dump(dataset: &Dataset, sink: Sink<'_>, _options: &CodecOptions) -> Result<Option<Payload>> {
    let text = write_rows(dataset.evaluated_data().iter())?;
    deliver(sink, Payload::Text(text))
}

/// Count `delimiter` outside double-quoted sections of `line`
fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    line.bytes()
        .filter(|&b| {
            if b == b'"' {
                quoted = !quoted;
            }
            !quoted && b == delimiter
        })
        .count()
}

/// Guess the delimiter of a text sample: the first candidate found the same
/// non-zero number of times on every sampled line
pub fn sniff_delimiter(text: &str) -> Option<u8> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if lines.is_empty() {
        return None;
    }
    DELIMITERS.into_iter().find(|&d| {
        let first = count_unquoted(lines[0], d);
        first > 0 && lines.iter().all(|l| count_unquoted(l, d) == first)
    })
}

/// Whether the first row looks like a header: some column has a non-numeric
/// first cell and a numeric cell further down
pub fn has_header(rows: &[Vec<String>]) -> bool {
    let Some((header, body)) = rows.split_first() else {
        return false;
    };
    let numeric = |s: &str| s.trim().parse::<f64>().is_ok();
    header.iter().enumerate().any(|(i, h)| {
        !numeric(h.as_str()) && body.iter().any(|r| r.get(i).map_or(false, |c| numeric(c.as_str())))
    })
}

/// Sniff the dialect, then check the sample parses into equal-length rows
pub fn detect(input: &Input, _options: &CodecOptions) -> bool {
    let Some(text) = input.text() else {
        return false;
    };
    let Some(delimiter) = sniff_delimiter(text) else {
        return false;
    };
    let sample: String = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_reader(sample.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(r) => rows.push(r.iter().map(str::to_string).collect::<Vec<_>>()),
            Err(_) => return false,
        }
    }
    let Some(width) = rows.first().map(Vec::len) else {
        return false;
    };
    if rows.iter().any(|r| r.len() != width) {
        return false;
    }
    debug!(
        "CSV dialect: delimiter {:?}, header {}",
        delimiter as char,
        has_header(&rows)
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row;

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), Some(b';'));
        assert_eq!(sniff_delimiter("a,b\n1,2\n"), Some(b','));
        assert_eq!(sniff_delimiter("a\tb\n1\t2"), Some(b'\t'));
        // quoted delimiters do not count
        assert_eq!(sniff_delimiter("a;b\n\"x;y\";2\n"), Some(b';'));
        assert_eq!(sniff_delimiter("no delimiter here\n"), None);
        assert_eq!(sniff_delimiter(""), None);
    }

    #[test]
    fn test_has_header() {
        let rows = |v: Vec<[&str; 2]>| -> Vec<Vec<String>> {
            v.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
        };
        assert!(has_header(&rows(vec![["x", "y"], ["1", "2"]])));
        assert!(!has_header(&rows(vec![["1", "2"], ["3", "4"]])));
    }

    #[test]
    fn test_detect() {
        let opts = CodecOptions::default();
        assert!(detect(&Input::from(&b"h1;h2\n1;true\n"[..]), &opts));
        assert!(!detect(&Input::from(&b"single column\nvalue\n"[..]), &opts));
        assert!(!detect(&Input::from(&b"\xff\xfe;\x00"[..]), &opts));
        assert!(!detect(&Input::from(&b""[..]), &opts));
    }

    #[test]
    fn test_write_rows_evaluated() {
        let ds = Dataset::new(
            vec![row(["a", "b"]), row(["12", "True"]), vec![Cell::Empty, Cell::text("x;y")]],
            Features::new(),
            Metadata::new(),
        );
        let text = dump(&ds, Sink::Text, &CodecOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(text.as_text(), Some("a;b\n12;True\n;\"x;y\"\n"));
        let back = read_rows(text.as_bytes()).unwrap();
        assert_eq!(back[2], vec![Cell::text(""), Cell::text("x;y")]);
    }
}
