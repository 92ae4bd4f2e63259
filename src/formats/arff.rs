//! Attribute-relation text (Weka ARFF).
//!
//! Parsing is a line-oriented state machine, `RELATION → ATTRIBUTES → DATA`:
//!
//! ```text
//! # comments are allowed before the relation only
//! @RELATION "name"
//!
//! @ATTRIBUTE field1 NUMERIC
//! @ATTRIBUTE class  NUMERIC      <- renamed to the target column
//!                                <- blank line closes the attribute block
//! @DATA
//! 0.5,  1
//!
//! % metadata: {"key": "value"}   <- literal mapping
//! % field1: description of field1
//! ```
//!
//! Every violation is reported as a [`DsffError::Parse`] with the 1-based
//! line number.

use std::fs;
use std::path::Path;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{deliver, CodecOptions, Input, Payload, Sink};
use crate::error::{DsffError, Result};
use crate::model::{parse_literal, Cell, Dataset, Features, Metadata};

static RELATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^@RELATION\s+('[^']*'|"[^"]*")$"#).expect("valid pattern"));
static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@ATTRIBUTE\s+(\S+)\s+[A-Z]+$").expect("valid pattern"));
static METADATA_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%\s+metadata\s*:\s*(\{.*\})$").expect("valid pattern"));
static FEATURE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%\s+(.*?)\s*:\s*(.*?)$").expect("valid pattern"));
static FIELD_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s+").expect("valid pattern"));

/// Column name of the target in the attribute list
const CLASS_ATTRIBUTE: &str = "class";
/// Token standing for an empty string
const EMPTY_TOKEN: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Relation,
    Attributes,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Pending,
    Open,
    Closed,
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '\'' || c == '"')
}

/// Parse attribute-relation text into a dataset
pub fn parse(text: &str, options: &CodecOptions) -> Result<Dataset> {
    let mut state = State::Relation;
    let mut block = Block::Pending;
    let mut title = String::new();
    let mut header: Vec<String> = Vec::new();
    let mut columns = 0usize;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut features = Features::new();
    let mut metadata = Metadata::new();
    let mut last_line = 0usize;

    for (index, raw) in text.lines().enumerate() {
        let n = index + 1;
        last_line = n;
        let line = raw.trim();

        if state == State::Relation {
            if line.starts_with('#') {
                continue;
            }
            if !line.starts_with("@RELATION") {
                return Err(DsffError::parse(n, "did not find @RELATION"));
            }
            let caps = RELATION
                .captures(line)
                .ok_or_else(|| DsffError::parse(n, "failed on @RELATION (bad name)"))?;
            title = strip_quotes(&caps[1]).to_string();
            state = State::Attributes;
            continue;
        }

        if line.starts_with('%') {
            if let Some(caps) = METADATA_COMMENT.captures(line) {
                match parse_literal(&caps[1]) {
                    Some(Value::Object(map)) => metadata = map,
                    _ => return Err(DsffError::parse(n, "metadata is not a literal mapping")),
                }
            } else if let Some(caps) = FEATURE_COMMENT.captures(line) {
                features.insert(&caps[1], &caps[2]);
            } else {
                debug!("line {}: ignored comment", n);
            }
            continue;
        }

        if line.is_empty() {
            if block == Block::Open {
                block = Block::Closed;
                columns = header.len();
            }
            continue;
        }

        if line.starts_with("@ATTRIBUTE") {
            if block == Block::Closed {
                return Err(DsffError::parse(n, "found @ATTRIBUTE out of the attributes block"));
            }
            block = Block::Open;
            let caps = ATTRIBUTE
                .captures(line)
                .ok_or_else(|| DsffError::parse(n, "failed on @ATTRIBUTE (bad type)"))?;
            let name = &caps[1];
            header.push(if name == CLASS_ATTRIBUTE {
                options.target.clone()
            } else {
                name.to_string()
            });
            continue;
        }

        if state != State::Data {
            if line != "@DATA" {
                return Err(DsffError::parse(n, "did not find @DATA where expected"));
            }
            if block != Block::Closed {
                block = Block::Closed;
                columns = header.len();
            }
            state = State::Data;
            continue;
        }

        let row: Vec<String> = FIELD_SEPARATOR
            .split(line)
            .map(|t| strip_quotes(t).to_string())
            .collect();
        if row.len() != columns {
            return Err(DsffError::parse(
                n,
                format!(
                    "this row does not match the number of columns ({} instead of {})",
                    row.len(),
                    columns
                ),
            ));
        }
        rows.push(row);
    }

    if state == State::Relation {
        return Err(DsffError::parse(last_line.max(1), "did not find @RELATION"));
    }
    if title.is_empty() {
        warn!("attribute-relation text without a relation name");
    }

    let mut data: Vec<Vec<Cell>> = Vec::with_capacity(rows.len() + 1);
    data.push(header.iter().map(Cell::text).collect());
    let mut typed: Vec<Vec<Cell>> = rows
        .iter()
        .map(|r| r.iter().map(|v| substitute(v, options)).collect())
        .collect();
    for column in 0..columns {
        let mut distinct = rows
            .iter()
            .map(|r| r[column].as_str())
            .filter(|v| *v != EMPTY_TOKEN && *v != options.missing);
        let boolean = distinct.clone().next().is_some() && distinct.all(|v| v == "0" || v == "1");
        if boolean {
            for row in typed.iter_mut() {
                if let Cell::Text(v) = &row[column] {
                    let flag = match v.as_str() {
                        "0" => "False",
                        "1" => "True",
                        _ => continue,
                    };
                    row[column] = Cell::text(flag);
                }
            }
        }
    }
    data.append(&mut typed);

    let mut dataset = Dataset::new(data, features, metadata);
    if !title.is_empty() {
        dataset.title = Some(title);
    }
    Ok(dataset)
}

/// Map the placeholder tokens of a raw value
fn substitute(value: &str, options: &CodecOptions) -> Cell {
    if value == EMPTY_TOKEN {
        Cell::text("")
    } else if value == options.missing {
        Cell::Empty
    } else {
        Cell::text(value)
    }
}

/// Load an attribute-relation file
pub fn load(path: &Path, options: &CodecOptions) -> Result<Dataset> {
    let text = fs::read_to_string(path)?;
    parse(&text, options)
}

/// Whether `input` parses as attribute-relation text
pub fn detect(input: &Input, options: &CodecOptions) -> bool {
    input.text().map_or(false, |t| parse(t, options).is_ok())
}

/// Textual form of a cell on export
fn encode(cell: &Cell, options: &CodecOptions) -> String {
    match cell {
        Cell::Empty => options.missing.clone(),
        Cell::Bool(false) => "0".to_string(),
        Cell::Bool(true) => "1".to_string(),
        Cell::Text(s) if s.is_empty() => EMPTY_TOKEN.to_string(),
        Cell::Text(s) if s == "False" => "0".to_string(),
        Cell::Text(s) if s == "True" => "1".to_string(),
        other => other.to_string(),
    }
}

fn sanitize_name(cell: &Cell, options: &CodecOptions) -> String {
    encode(cell, options).replace('<', "[lt]").replace('>', "[gt]")
}

/// Unwrap the `="…"` spreadsheet escape
fn sanitize_value(cell: &Cell, options: &CodecOptions) -> String {
    let v = encode(cell, options);
    match v.strip_prefix('=') {
        Some(rest) => strip_quotes(rest).to_string(),
        None => v,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeType {
    Numeric,
    String,
}

impl AttributeType {
    fn of(value: &str) -> Self {
        if value.trim().parse::<f64>().is_ok() {
            Self::Numeric
        } else {
            Self::String
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Numeric => "NUMERIC",
            Self::String => "STRING",
        }
    }
}

/// Render a dataset as attribute-relation text under `relation`
pub fn render(dataset: &Dataset, relation: &str, options: &CodecOptions) -> String {
    let headers: Vec<String> = dataset
        .data
        .first()
        .map(|h| h.iter().map(|c| sanitize_name(c, options)).collect())
        .unwrap_or_default();

    let target = headers.iter().position(|h| *h == options.target);
    let mut kept: Vec<usize> = (0..headers.len())
        .filter(|&i| Some(i) != target && !options.is_excluded(&headers[i]))
        .collect();
    let name_width = kept.iter().map(|&i| headers[i].chars().count()).max().unwrap_or(0);
    if let Some(t) = target {
        kept.push(t);
    }

    debug!("computing attribute types...");
    let types: Vec<AttributeType> = match dataset.rows().first() {
        Some(first) => kept
            .iter()
            .map(|&i| AttributeType::of(&first.get(i).map(|c| sanitize_value(c, options)).unwrap_or_default()))
            .collect(),
        None => vec![AttributeType::String; kept.len()],
    };
    let attributes: Vec<String> = kept
        .iter()
        .zip(&types)
        .map(|(&i, t)| {
            let name = if Some(i) == target {
                CLASS_ATTRIBUTE
            } else {
                headers[i].as_str()
            };
            format!("@ATTRIBUTE {:<width$} {}", name, t.keyword(), width = name_width)
        })
        .collect();

    debug!("computing data...");
    let rows: Vec<Vec<String>> = dataset
        .rows()
        .iter()
        .map(|r| {
            kept.iter()
                .map(|&i| r.get(i).map(|c| sanitize_value(c, options)).unwrap_or_default())
                .collect()
        })
        .collect();
    let mut widths = vec![0usize; kept.len()];
    for row in &rows {
        for (k, value) in row.iter().enumerate() {
            let len = value.chars().count();
            let len = match types[k] {
                AttributeType::Numeric => len,
                AttributeType::String => len + 2,
            };
            widths[k] = widths[k].max(len);
        }
    }
    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(k, x)| {
                    let value = if types[k] == AttributeType::Numeric || *x == options.missing {
                        format!("{},", x)
                    } else {
                        format!("'{}',", x)
                    };
                    format!("{:<width$}", value, width = widths[k] + 1)
                })
                .collect();
            cells.join(" ").trim_end_matches([' ', ',']).to_string()
        })
        .collect();

    let metadata_line = if dataset.metadata.is_empty() {
        String::new()
    } else {
        format!(
            "% metadata: {}",
            serde_json::to_string(&dataset.metadata).unwrap_or_else(|_| "{}".to_string())
        )
    };
    let feature_lines: Vec<String> = dataset
        .features
        .iter()
        .map(|(name, description)| format!("% {}: {}", name, description))
        .collect();

    format!(
        "@RELATION \"{}\"\n\n{}\n\n@DATA\n{}\n\n{}\n\n{}",
        relation,
        attributes.join("\n"),
        lines.join("\n"),
        metadata_line,
        feature_lines.join("\n")
    )
}

/// Dump as attribute-relation text; the relation is named after the destination file
pub fn dump(dataset: &Dataset, sink: Sink<'_>, options: &CodecOptions) -> Result<Option<Payload>> {
    let relation = match sink {
        Sink::Path(path) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| dataset.name().to_string()),
        Sink::Text => dataset.name().to_string(),
    };
    deliver(sink, Payload::Text(render(dataset, &relation, options)))
}
