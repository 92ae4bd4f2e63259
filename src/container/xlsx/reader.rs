use std::collections::HashMap;
use std::io::{Read, Seek};

use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{parse_reference, Workbook, MAX_COLUMNS, MAX_ROWS, PART_CORE, PART_SHARED_STRINGS, PART_WORKBOOK, PART_WORKBOOK_RELS};
use crate::container::properties::parse_timestamp;
use crate::container::{DocumentProperties, Sheet};
use crate::error::{DsffError, Result};
use crate::model::Cell;

/// Decode every worksheet and the document properties of a workbook package
pub(crate) fn read_workbook<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Workbook> {
    let workbook = read_part(archive, PART_WORKBOOK)?
        .ok_or_else(|| DsffError::InvalidContainer(format!("missing {}", PART_WORKBOOK)))?;
    let rels = match read_part(archive, PART_WORKBOOK_RELS)? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };
    let shared = match read_part(archive, PART_SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut sheets = Vec::new();
    for (index, (name, rel_id)) in parse_sheet_list(&workbook)?.into_iter().enumerate() {
        let part = rel_id
            .and_then(|id| rels.get(&id))
            .map(|target| resolve_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));
        let xml = read_part(archive, &part)?.ok_or_else(|| {
            DsffError::InvalidContainer(format!("worksheet '{}' has no part {}", name, part))
        })?;
        let sheet = parse_worksheet(&name, &xml, &shared)?;
        debug!("read worksheet '{}' ({} rows)", name, sheet.row_count());
        sheets.push(sheet);
    }

    let properties = match read_part(archive, PART_CORE)? {
        Some(xml) => parse_core_properties(&xml)?,
        None => DocumentProperties::default(),
    };

    Ok(Workbook { sheets, properties })
}

/// Read a part as UTF-8 text; `None` when the archive lacks it
fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// Get an (unescaped) attribute value by local name
fn get_attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn xml_reader(xml: &str) -> Reader<&[u8]> {
    Reader::from_reader(xml.as_bytes())
}

/// `(sheet name, relationship id)` in workbook order
fn parse_sheet_list(xml: &str) -> Result<Vec<(String, Option<String>)>> {
    let mut reader = xml_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                let name = get_attribute(e, "name")?.unwrap_or_default();
                sheets.push((name, get_attribute(e, "id")?));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = xml_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) =
                    (get_attribute(e, "Id")?, get_attribute(e, "Target")?)
                {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Shared-string table; phonetic runs are skipped
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let (mut in_text, mut in_phonetic) = (false, false);
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::CData(t) if in_text => current.push_str(&String::from_utf8_lossy(&t)),
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Padded cells allowed regardless of how many cells are present
const SPARSE_EXTENT_FLOOR: usize = 1 << 22;
/// Padded cells allowed per cell present beyond the floor
const SPARSE_EXTENT_RATIO: usize = 64;

/// Rows × columns spanned so far, checked against the cells actually present
#[derive(Default)]
struct Extent {
    rows: usize,
    columns: usize,
    present: usize,
}

impl Extent {
    fn grow(&mut self, name: &str, rows: usize, columns: usize, present: usize) -> Result<()> {
        self.rows = self.rows.max(rows);
        self.columns = self.columns.max(columns);
        self.present += present;
        let area = self.rows.saturating_mul(self.columns.max(1));
        let limit = SPARSE_EXTENT_FLOOR.max(self.present.saturating_mul(SPARSE_EXTENT_RATIO));
        if area > limit {
            return Err(DsffError::InvalidContainer(format!(
                "worksheet '{}' spans {} x {} cells but holds only {}",
                name, self.rows, self.columns, self.present
            )));
        }
        Ok(())
    }
}

fn cell_position(name: &str, reference: Option<String>, row: usize, next_column: usize) -> Result<(usize, usize)> {
    match reference {
        Some(reference) => parse_reference(&reference)
            .map(|(_, c)| (row, c))
            .ok_or_else(|| {
                DsffError::InvalidContainer(format!(
                    "worksheet '{}' has a bad cell reference '{}'",
                    name, reference
                ))
            }),
        None if next_column >= MAX_COLUMNS => Err(DsffError::InvalidContainer(format!(
            "worksheet '{}' column {} out of range",
            name,
            next_column + 1
        ))),
        None => Ok((row, next_column)),
    }
}

/// Cell being assembled while its children are read
#[derive(Default)]
struct PendingCell {
    position: (usize, usize),
    kind: Option<String>,
    value: String,
    inline: String,
}

/// Decode a worksheet; rows are padded with missing cells to a rectangle
fn parse_worksheet(name: &str, xml: &str, shared: &[String]) -> Result<Sheet> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut sheet = Sheet::new(name);
    let mut row: Option<usize> = None;
    let mut next_column = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut extent = Extent::default();
    let (mut in_value, mut in_text, mut in_phonetic) = (false, false, false);

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                let index = match get_attribute(e, "r")? {
                    Some(r) => r.parse::<usize>().ok().and_then(|r| r.checked_sub(1)),
                    None => None,
                }
                .unwrap_or_else(|| row.map_or(0, |r| r + 1));
                if index >= MAX_ROWS {
                    return Err(DsffError::InvalidContainer(format!(
                        "worksheet '{}' row {} out of range",
                        name,
                        index + 1
                    )));
                }
                extent.grow(name, index + 1, 0, 0)?;
                sheet.ensure_rows(index + 1);
                row = Some(index);
                next_column = 0;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"c" => {
                let r = row.unwrap_or(0);
                let position = cell_position(name, get_attribute(e, "r")?, r, next_column)?;
                extent.grow(name, r + 1, position.1 + 1, 1)?;
                next_column = position.1 + 1;
                cell = Some(PendingCell {
                    position,
                    kind: get_attribute(e, "t")?,
                    ..Default::default()
                });
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                let r = row.unwrap_or(0);
                next_column = cell_position(name, get_attribute(e, "r")?, r, next_column)?.1 + 1;
            }
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"v" => in_value = true,
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Text(t) => {
                if let Some(pending) = cell.as_mut() {
                    if in_value {
                        pending.value.push_str(&t.unescape()?);
                    } else if in_text {
                        pending.inline.push_str(&t.unescape()?);
                    }
                }
            }
            Event::CData(t) => {
                if let Some(pending) = cell.as_mut() {
                    let text = String::from_utf8_lossy(&t);
                    if in_value {
                        pending.value.push_str(&text);
                    } else if in_text {
                        pending.inline.push_str(&text);
                    }
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let (r, c) = pending.position;
                        sheet.set_cell(r, c, resolve_cell(pending, shared)?);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    sheet.make_rectangular();
    Ok(sheet)
}

fn resolve_cell(pending: PendingCell, shared: &[String]) -> Result<Cell> {
    let PendingCell {
        kind, value, inline, ..
    } = pending;
    Ok(match kind.as_deref() {
        Some("s") => {
            let index: usize = value.trim().parse().map_err(|_| {
                DsffError::InvalidContainer(format!("bad shared string index '{}'", value))
            })?;
            let text = shared.get(index).ok_or_else(|| {
                DsffError::InvalidContainer(format!("shared string {} out of range", index))
            })?;
            Cell::Text(text.clone())
        }
        Some("inlineStr") => Cell::Text(inline),
        Some("str") | Some("e") => Cell::Text(value),
        Some("b") => Cell::Bool(value.trim() == "1"),
        _ => numeric_cell(&value),
    })
}

fn numeric_cell(value: &str) -> Cell {
    let value = value.trim();
    if value.is_empty() {
        return Cell::Empty;
    }
    if !value.contains(['.', 'e', 'E']) {
        if let Ok(i) = value.parse::<i64>() {
            return Cell::Int(i);
        }
    }
    match value.parse::<f64>() {
        Ok(f) => Cell::Float(f),
        Err(_) => {
            warn!("non-numeric value '{}' in a numeric cell, kept as text", value);
            Cell::Text(value.to_string())
        }
    }
}

fn parse_core_properties(xml: &str) -> Result<DocumentProperties> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut props = DocumentProperties::default();
    let mut current: Option<String> = None;
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                current = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                text.clear();
            }
            Event::Text(t) if current.is_some() => text.push_str(&t.unescape()?),
            Event::CData(t) if current.is_some() => text.push_str(&String::from_utf8_lossy(&t)),
            Event::End(_) => {
                if let Some(name) = current.take() {
                    let value = std::mem::take(&mut text);
                    match name.as_str() {
                        "created" => props.created = parse_timestamp(&value),
                        "modified" => props.modified = parse_timestamp(&value),
                        "lastPrinted" => props.last_printed = parse_timestamp(&value),
                        other => {
                            props.set(other, &serde_json::Value::String(value))?;
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(props)
}
