//! SQLite database with three tables:
//!
//! - `data`: one column per header, typed from the first data row
//! - `features(name TEXT PRIMARY KEY, description TEXT)`
//! - `metadata(key TEXT PRIMARY KEY, value JSON)`, values JSON-encoded

use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;

use log::{debug, warn};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, ToSql};
use serde_json::Value;

use super::{deliver, CodecOptions, Input, Payload, Sink};
use crate::error::{DsffError, Result};
use crate::model::{format_float, Cell, Dataset, Features, Metadata};

/// Leading bytes of every SQLite 3 database file
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

const TABLES: [&str; 3] = ["data", "features", "metadata"];

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Empty => ToSqlOutput::Owned(SqlValue::Null),
            Cell::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Cell::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Cell::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Cell::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn cell_from_sql(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Empty,
        ValueRef::Integer(i) => Cell::Int(i),
        ValueRef::Real(f) => Cell::Float(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
    }
}

/// Double-quote an SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL literal of a stored value
fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) if f.is_finite() => format_float(f),
        ValueRef::Real(_) => "NULL".to_string(),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t).replace('\'', "''")),
        ValueRef::Blob(b) => {
            let mut hex = String::with_capacity(b.len() * 2 + 3);
            hex.push_str("X'");
            for byte in b {
                let _ = write!(hex, "{:02X}", byte);
            }
            hex.push('\'');
            hex
        }
    }
}

fn sql_type(cell: &Cell) -> &'static str {
    match cell {
        Cell::Int(_) | Cell::Bool(_) => "INTEGER",
        Cell::Float(_) => "REAL",
        _ => "TEXT",
    }
}

/// `CREATE TABLE` statement of the data table
fn data_table_sql(headers: &[String], first: Option<&Vec<Cell>>, primary_index: usize) -> String {
    let fields: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let dtype = first.and_then(|r| r.get(i)).map_or("TEXT", sql_type);
            let key = if i == primary_index { " PRIMARY KEY" } else { "" };
            format!("{} {}{}", quote_ident(h), dtype, key)
        })
        .collect();
    format!("CREATE TABLE IF NOT EXISTS data ({});", fields.join(",\n    "))
}

/// Create and fill the three tables
fn populate(conn: &mut Connection, dataset: &Dataset, options: &CodecOptions) -> Result<()> {
    dataset.validate()?;
    let headers = dataset.headers();
    if headers.is_empty() {
        return Err(DsffError::BadInputData("no header row to build the data table".to_string()));
    }
    let data = dataset.evaluated_data();
    let rows = &data[1..];

    debug!("creating tables...");
    conn.execute_batch(&data_table_sql(&headers, rows.first(), options.primary_index))?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS features (name TEXT PRIMARY KEY, description TEXT);
         CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value JSON);",
    )?;

    let tx = conn.transaction()?;
    {
        let columns: Vec<String> = headers.iter().map(|h| quote_ident(h)).collect();
        let tokens: Vec<String> = (1..=headers.len()).map(|i| format!("?{}", i)).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO data ({}) VALUES ({})",
            columns.join(","),
            tokens.join(",")
        ))?;
        for row in rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }

        let mut stmt = tx.prepare("INSERT INTO features (name, description) VALUES (?1, ?2)")?;
        for (name, description) in dataset.features.iter() {
            stmt.execute(params![name, description])?;
        }

        let mut stmt = tx.prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")?;
        for (key, value) in dataset.metadata.iter() {
            stmt.execute(params![key, serde_json::to_string(value)?])?;
        }
    }
    tx.commit()?;
    debug!("inserted {} data rows", rows.len());
    Ok(())
}

/// SQL script recreating the three tables and their rows
fn render_sql(conn: &Connection) -> Result<String> {
    let mut lines = Vec::new();
    let mut stmt = conn.prepare("SELECT sql FROM sqlite_master WHERE type='table' ORDER BY rowid")?;
    let schema = stmt.query_map([], |r| r.get::<_, String>(0))?;
    for sql in schema {
        let sql = sql?;
        lines.push(if sql.ends_with(';') { sql } else { format!("{};", sql) });
    }
    for table in TABLES {
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let count = stmt.column_count();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..count)
                .map(|i| row.get_ref(i).map(sql_literal))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            lines.push(format!("INSERT INTO {} VALUES ({});", table, values.join(", ")));
        }
    }
    Ok(lines.join("\n"))
}

/// Dump to a database file, or to SQL text for the text sink
pub fn dump(dataset: &Dataset, sink: Sink<'_>, options: &CodecOptions) -> Result<Option<Payload>> {
    match sink {
        Sink::Path(path) => {
            if path.exists() {
                fs::remove_file(path)?;
            } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut conn = Connection::open(path)?;
            populate(&mut conn, dataset, options)?;
            Ok(None)
        }
        Sink::Text => {
            let mut conn = Connection::open_in_memory()?;
            populate(&mut conn, dataset, options)?;
            deliver(sink, Payload::Text(render_sql(&conn)?))
        }
    }
}

fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Load a three-table database
pub fn load(path: &Path, _options: &CodecOptions) -> Result<Dataset> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let tables = table_names(&conn)?;
    let missing: Vec<&str> = TABLES
        .iter()
        .copied()
        .filter(|t| !tables.iter().any(|n| n == t))
        .collect();
    if !missing.is_empty() {
        return Err(DsffError::BadInputData(format!(
            "the database does not have the right format (missing tables: {})",
            missing.join(", ")
        )));
    }

    let headers = conn
        .prepare("PRAGMA table_info('data')")?
        .query_map([], |r| r.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let mut data = vec![headers.iter().map(Cell::text).collect::<Vec<_>>()];
    {
        let mut stmt = conn.prepare("SELECT * FROM data")?;
        let count = stmt.column_count();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let cells = (0..count)
                .map(|i| row.get_ref(i).map(cell_from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            data.push(cells);
        }
    }

    let mut features = Features::new();
    {
        let mut stmt = conn.prepare("SELECT name, description FROM features")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name = cell_from_sql(row.get_ref(0)?).to_string();
            let description = cell_from_sql(row.get_ref(1)?).to_string();
            features.insert(name, description);
        }
    }

    let mut metadata = Metadata::new();
    {
        let mut stmt = conn.prepare("SELECT key, value FROM metadata")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let key = cell_from_sql(row.get_ref(0)?).to_string();
            let value = match row.get_ref(1)? {
                ValueRef::Text(t) => {
                    let text = String::from_utf8_lossy(t);
                    serde_json::from_str(&text).unwrap_or_else(|_| {
                        warn!("metadata '{}' is not JSON, kept as text", key);
                        Value::String(text.into_owned())
                    })
                }
                other => cell_from_sql(other).to_json(),
            };
            metadata.insert(key, value);
        }
    }

    debug!("loaded {} rows from {}", data.len(), path.display());
    Ok(Dataset::new(data, features, metadata))
}

/// Magic header check, then a schema query on a read-only connection
pub fn detect(input: &Input, _options: &CodecOptions) -> bool {
    let Some(bytes) = input.bytes() else {
        return false;
    };
    if !bytes.starts_with(SQLITE_MAGIC) {
        return false;
    }
    let probe = || -> Result<()> {
        let mut tmp = tempfile::Builder::new().suffix(".db").tempfile()?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        let conn = Connection::open_with_flags(tmp.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.query_row("PRAGMA schema_version", [], |r| r.get::<_, i64>(0))?;
        Ok(())
    };
    probe().is_ok()
}
