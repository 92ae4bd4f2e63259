//! Optimized row columnar (ORC) files.
//!
//! Reading covers flat files: a root struct of boolean, integer, floating
//! point and string columns, any number of stripes, RLE versions 1 and 2,
//! direct and dictionary strings, and NONE/ZLIB/SNAPPY/ZSTD compression.
//! Integers widen to 64 bits.
//!
//! Writing produces one uncompressed stripe with RLE version 1 streams.
//! Schema metadata travels as footer user metadata, one item per key;
//! field metadata is gathered as JSON under the item `__fields__`.

mod proto;
mod rle;

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int64Array, StringArray};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use flate2::read::DeflateDecoder;
use log::debug;

use self::proto::{Fields, Message};
use super::columnar::Table;
use crate::error::{DsffError, Result};

/// Leading and trailing magic
pub(crate) const MAGIC: &[u8] = b"ORC";

/// User metadata item holding per-field metadata as JSON
const FIELDS_ITEM: &str = "__fields__";

const DEFAULT_BLOCK_SIZE: u64 = 256 * 1024;
const FILE_VERSION: [u64; 2] = [0, 12];

// Type kinds
const BOOLEAN: u64 = 0;
const BYTE: u64 = 1;
const SHORT: u64 = 2;
const INT: u64 = 3;
const LONG: u64 = 4;
const FLOAT: u64 = 5;
const DOUBLE: u64 = 6;
const STRING: u64 = 7;
const STRUCT: u64 = 12;
const VARCHAR: u64 = 16;
const CHAR: u64 = 17;

// Stream kinds
const PRESENT: u64 = 0;
const DATA: u64 = 1;
const LENGTH: u64 = 2;
const DICTIONARY_DATA: u64 = 3;

// Column encodings
const DIRECT: u64 = 0;
const DICTIONARY: u64 = 1;
const DIRECT_V2: u64 = 2;
const DICTIONARY_V2: u64 = 3;

pub(super) fn corrupt(reason: &str) -> DsffError {
    DsffError::Columnar(format!("ORC: {}", reason))
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| corrupt(what))
}

fn slice<'a>(bytes: &'a [u8], start: u64, len: u64, what: &str) -> Result<&'a [u8]> {
    let start = to_usize(start, what)?;
    let end = start
        .checked_add(to_usize(len, what)?)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| corrupt(&format!("{} lies outside the file", what)))?;
    Ok(&bytes[start..end])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Zlib,
    Snappy,
    Zstd,
}

impl Compression {
    fn from_kind(kind: u64) -> Result<Self> {
        match kind {
            0 => Ok(Self::None),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::Snappy),
            5 => Ok(Self::Zstd),
            3 => Err(DsffError::Unsupported("LZO compressed ORC files".to_string())),
            4 => Err(DsffError::Unsupported("LZ4 compressed ORC files".to_string())),
            other => Err(corrupt(&format!("compression kind {}", other))),
        }
    }
}

/// Undo the chunked compression of one stream or tail section
fn decompress(compression: Compression, block_size: u64, bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if compression == Compression::None {
        return Ok(Cow::Borrowed(bytes));
    }
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let header = bytes
            .get(pos..pos + 3)
            .ok_or_else(|| corrupt("truncated chunk header"))?;
        let header = u32::from(header[0]) | u32::from(header[1]) << 8 | u32::from(header[2]) << 16;
        let chunk = slice(bytes, pos as u64 + 3, u64::from(header >> 1), "compressed chunk")?;
        pos += 3 + chunk.len();
        if header & 1 == 1 {
            out.extend_from_slice(chunk);
            continue;
        }
        let before = out.len();
        match compression {
            Compression::None => out.extend_from_slice(chunk),
            Compression::Zlib => {
                DeflateDecoder::new(chunk)
                    .take(block_size.saturating_add(1))
                    .read_to_end(&mut out)?;
            }
            Compression::Zstd => {
                zstd::stream::read::Decoder::new(chunk)?
                    .take(block_size.saturating_add(1))
                    .read_to_end(&mut out)?;
            }
            Compression::Snappy => {
                let len = snap::raw::decompress_len(chunk).map_err(|e| corrupt(&e.to_string()))?;
                if len as u64 > block_size {
                    return Err(corrupt("chunk larger than the compression block"));
                }
                let decoded = snap::raw::Decoder::new()
                    .decompress_vec(chunk)
                    .map_err(|e| corrupt(&e.to_string()))?;
                out.extend_from_slice(&decoded);
            }
        }
        if (out.len() - before) as u64 > block_size {
            return Err(corrupt("chunk larger than the compression block"));
        }
    }
    Ok(Cow::Owned(out))
}

/// Column type of a flat file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Boolean,
    Byte,
    Integer,
    Float,
    Double,
    String,
}

impl Kind {
    fn from_orc(kind: u64) -> Result<Self> {
        match kind {
            BOOLEAN => Ok(Self::Boolean),
            BYTE => Ok(Self::Byte),
            SHORT | INT | LONG => Ok(Self::Integer),
            FLOAT => Ok(Self::Float),
            DOUBLE => Ok(Self::Double),
            STRING | VARCHAR | CHAR => Ok(Self::String),
            other => Err(DsffError::Unsupported(format!("ORC column type kind {}", other))),
        }
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::Byte | Self::Integer => DataType::Int64,
            Self::Float => DataType::Float32,
            Self::Double => DataType::Float64,
            Self::String => DataType::Utf8,
        }
    }
}

/// Streams of one stripe, keyed by column id and stream kind
struct Stripe<'a> {
    rows: usize,
    streams: HashMap<(u64, u64), Cow<'a, [u8]>>,
    encodings: Vec<(u64, u64)>,
}

impl<'a> Stripe<'a> {
    fn parse(file: &'a [u8], info: &[u8], compression: Compression, block_size: u64) -> Result<Self> {
        let info = Fields::parse(info)?;
        let offset = info.uint(1).unwrap_or(0);
        let index_length = info.uint(2).unwrap_or(0);
        let data_length = info.uint(3).unwrap_or(0);
        let footer_length = info.uint(4).unwrap_or(0);
        let rows = to_usize(info.uint(5).unwrap_or(0), "stripe row count")?;

        let body_length = index_length
            .checked_add(data_length)
            .ok_or_else(|| corrupt("stripe length"))?;
        let body = slice(file, offset, body_length, "stripe")?;
        let footer_start = offset
            .checked_add(body_length)
            .ok_or_else(|| corrupt("stripe footer offset"))?;
        let footer = slice(file, footer_start, footer_length, "stripe footer")?;
        let footer = decompress(compression, block_size, footer)?;
        let footer = Fields::parse(&footer)?;

        let mut streams = HashMap::new();
        let mut position = 0u64;
        for stream in footer.all_bytes(1) {
            let stream = Fields::parse(stream)?;
            let kind = stream.uint(1).unwrap_or(0);
            let column = stream.uint(2).unwrap_or(0);
            let length = stream.uint(3).unwrap_or(0);
            let bytes = slice(body, position, length, "stream")?;
            position += length;
            if matches!(kind, PRESENT | DATA | LENGTH | DICTIONARY_DATA) {
                streams.insert((column, kind), decompress(compression, block_size, bytes)?);
            }
        }
        let encodings = footer
            .all_bytes(2)
            .map(|e| {
                let e = Fields::parse(e)?;
                Ok((e.uint(1).unwrap_or(DIRECT), e.uint(2).unwrap_or(0)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rows,
            streams,
            encodings,
        })
    }

    fn stream(&self, column: u64, kind: u64) -> Result<&[u8]> {
        self.streams
            .get(&(column, kind))
            .map(|s| &s[..])
            .ok_or_else(|| corrupt(&format!("column {} lacks stream kind {}", column, kind)))
    }

    fn ints(&self, column: u64, kind: u64, count: usize, signed: bool) -> Result<Vec<i64>> {
        let data = self.stream(column, kind)?;
        let (encoding, _) = self.encoding(column);
        if matches!(encoding, DIRECT_V2 | DICTIONARY_V2) {
            rle::decode_ints_v2(data, count, signed)
        } else {
            rle::decode_ints_v1(data, count, signed)
        }
    }

    fn encoding(&self, column: u64) -> (u64, u64) {
        usize::try_from(column)
            .ok()
            .and_then(|c| self.encodings.get(c))
            .copied()
            .unwrap_or((DIRECT, 0))
    }

    fn strings(&self, column: u64, count: usize) -> Result<Vec<String>> {
        let (encoding, dictionary_size) = self.encoding(column);
        if matches!(encoding, DICTIONARY | DICTIONARY_V2) {
            let dictionary_size = to_usize(dictionary_size, "dictionary size")?;
            let words = split_strings(
                self.stream(column, DICTIONARY_DATA)?,
                &self.ints(column, LENGTH, dictionary_size, false)?,
            )?;
            self.ints(column, DATA, count, false)?
                .into_iter()
                .map(|i| {
                    usize::try_from(i)
                        .ok()
                        .and_then(|i| words.get(i).cloned())
                        .ok_or_else(|| corrupt("dictionary index out of range"))
                })
                .collect()
        } else {
            split_strings(
                self.stream(column, DATA)?,
                &self.ints(column, LENGTH, count, false)?,
            )
        }
    }

    /// Decode one column of `kind` into an Arrow array
    fn column(&self, column: u64, kind: Kind) -> Result<ArrayRef> {
        let present = match self.streams.get(&(column, PRESENT)) {
            Some(bits) => Some(rle::decode_bools(bits, self.rows)?),
            None => None,
        };
        let count = present
            .as_ref()
            .map_or(self.rows, |p| p.iter().filter(|b| **b).count());

        let array: ArrayRef = match kind {
            Kind::Boolean => {
                let values = rle::decode_bools(self.stream(column, DATA)?, count)?;
                Arc::new(BooleanArray::from(spread(values, present.as_deref())))
            }
            Kind::Byte => {
                let values: Vec<i64> = rle::decode_bytes(self.stream(column, DATA)?, count)?
                    .into_iter()
                    .map(|b| i64::from(b as i8))
                    .collect();
                Arc::new(Int64Array::from(spread(values, present.as_deref())))
            }
            Kind::Integer => {
                let values = self.ints(column, DATA, count, true)?;
                Arc::new(Int64Array::from(spread(values, present.as_deref())))
            }
            Kind::Float => {
                let mut cursor = Cursor::new(fixed_width(self.stream(column, DATA)?, count, 4)?);
                let values = (0..count)
                    .map(|_| cursor.read_f32::<LittleEndian>())
                    .collect::<std::io::Result<Vec<_>>>()?;
                Arc::new(Float32Array::from(spread(values, present.as_deref())))
            }
            Kind::Double => {
                let mut cursor = Cursor::new(fixed_width(self.stream(column, DATA)?, count, 8)?);
                let values = (0..count)
                    .map(|_| cursor.read_f64::<LittleEndian>())
                    .collect::<std::io::Result<Vec<_>>>()?;
                Arc::new(Float64Array::from(spread(values, present.as_deref())))
            }
            Kind::String => {
                let values = self.strings(column, count)?;
                Arc::new(StringArray::from(spread(values, present.as_deref())))
            }
        };
        Ok(array)
    }
}

/// Leading `count * width` bytes of a fixed-width stream
fn fixed_width(data: &[u8], count: usize, width: usize) -> Result<&[u8]> {
    count
        .checked_mul(width)
        .and_then(|n| data.get(..n))
        .ok_or_else(|| corrupt("fixed-width stream ended early"))
}

fn split_strings(data: &[u8], lengths: &[i64]) -> Result<Vec<String>> {
    let mut pos = 0u64;
    lengths
        .iter()
        .map(|len| {
            let len = u64::try_from(*len).map_err(|_| corrupt("negative string length"))?;
            let bytes = slice(data, pos, len, "string")?;
            pos += len;
            Ok(String::from_utf8_lossy(bytes).into_owned())
        })
        .collect()
}

/// Interleave non-null values with the nulls of the presence mask
fn spread<T>(values: Vec<T>, present: Option<&[bool]>) -> Vec<Option<T>> {
    match present {
        None => values.into_iter().map(Some).collect(),
        Some(present) => {
            let mut values = values.into_iter();
            present
                .iter()
                .map(|p| if *p { values.next() } else { None })
                .collect()
        }
    }
}

/// Decode an ORC file into a table
pub(crate) fn read_table(bytes: Bytes) -> Result<Table> {
    let file: &[u8] = &bytes;
    if !file.starts_with(MAGIC) || file.len() < MAGIC.len() + 1 {
        return Err(corrupt("missing magic"));
    }
    let ps_length = u64::from(file[file.len() - 1]);
    let ps_start = (file.len() as u64 - 1)
        .checked_sub(ps_length)
        .ok_or_else(|| corrupt("postscript length"))?;
    let postscript = Fields::parse(slice(file, ps_start, ps_length, "postscript")?)?;
    if let Some(magic) = postscript.bytes(8000) {
        if magic != MAGIC {
            return Err(corrupt("postscript magic"));
        }
    }
    let compression = Compression::from_kind(postscript.uint(2).unwrap_or(0))?;
    let block_size = postscript.uint(3).unwrap_or(DEFAULT_BLOCK_SIZE);
    let footer_length = postscript.uint(1).unwrap_or(0);
    let footer_start = ps_start
        .checked_sub(footer_length)
        .ok_or_else(|| corrupt("footer length"))?;
    let footer = decompress(compression, block_size, slice(file, footer_start, footer_length, "footer")?)?;
    let footer = Fields::parse(&footer)?;

    let types = footer
        .all_bytes(4)
        .map(Fields::parse)
        .collect::<Result<Vec<_>>>()?;
    let root = types.first().ok_or_else(|| corrupt("no type tree"))?;
    if root.uint(1).unwrap_or(0) != STRUCT {
        return Err(DsffError::Unsupported("ORC files whose root type is not a struct".to_string()));
    }
    let children = root.all_uints(2)?;
    let names: Vec<String> = root
        .all_bytes(3)
        .map(|n| String::from_utf8_lossy(n).into_owned())
        .collect();
    if names.len() != children.len() {
        return Err(corrupt("field names do not match the struct children"));
    }

    let user_metadata: HashMap<String, String> = footer
        .all_bytes(5)
        .map(|item| {
            let item = Fields::parse(item)?;
            Ok((
                item.string(1).unwrap_or_default(),
                item.string(2).unwrap_or_default(),
            ))
        })
        .collect::<Result<_>>()?;
    let mut schema_metadata = user_metadata;
    let mut field_metadata: HashMap<String, HashMap<String, String>> = match schema_metadata.remove(FIELDS_ITEM) {
        Some(raw) => serde_json::from_str(&raw)?,
        None => HashMap::new(),
    };

    let mut columns = Vec::with_capacity(children.len());
    let mut fields = Vec::with_capacity(children.len());
    for (id, name) in children.iter().zip(names) {
        let kind = to_usize(*id, "type id")
            .ok()
            .and_then(|i| types.get(i))
            .ok_or_else(|| corrupt("dangling type id"))?
            .uint(1)
            .unwrap_or(0);
        let kind = Kind::from_orc(kind)?;
        let field = Field::new(name.as_str(), kind.data_type(), true)
            .with_metadata(field_metadata.remove(&name).unwrap_or_default());
        fields.push(field);
        columns.push((*id, kind));
    }
    let schema = Arc::new(Schema::new(fields).with_metadata(schema_metadata));

    let mut batches = Vec::new();
    if !columns.is_empty() {
        for info in footer.all_bytes(3) {
            let stripe = Stripe::parse(file, info, compression, block_size)?;
            let arrays = columns
                .iter()
                .map(|(id, kind)| stripe.column(*id, *kind))
                .collect::<Result<Vec<_>>>()?;
            batches.push(RecordBatch::try_new(schema.clone(), arrays)?);
        }
    }
    debug!("decoded {} ORC stripes", batches.len());
    Ok(Table { schema, batches })
}

/// One column ready for the stripe: type kind, encoding and streams
struct EncodedColumn {
    kind: u64,
    encoding: u64,
    dictionary_size: u64,
    streams: Vec<(u64, Vec<u8>)>,
    values: u64,
    has_null: bool,
}

fn encode_column(array: &ArrayRef) -> Result<EncodedColumn> {
    let data_type = array.data_type();
    let mut streams = Vec::new();
    if array.null_count() > 0 {
        let present: Vec<bool> = (0..array.len()).map(|i| array.is_valid(i)).collect();
        streams.push((PRESENT, rle::encode_bools(&present)));
    }
    let kind = if *data_type == DataType::Boolean {
        let values: Vec<bool> = array.as_boolean().iter().flatten().collect();
        streams.push((DATA, rle::encode_bools(&values)));
        BOOLEAN
    } else if data_type.is_integer() {
        let values: Vec<i64> = cast(array, &DataType::Int64)?
            .as_primitive::<Int64Type>()
            .iter()
            .flatten()
            .collect();
        streams.push((DATA, rle::encode_ints_v1(&values, true)));
        LONG
    } else if data_type.is_floating() {
        let mut data = Vec::new();
        for v in cast(array, &DataType::Float64)?.as_primitive::<Float64Type>().iter().flatten() {
            data.write_f64::<LittleEndian>(v)?;
        }
        streams.push((DATA, data));
        DOUBLE
    } else {
        let strings = cast(array, &DataType::Utf8)?;
        let mut data = Vec::new();
        let mut lengths = Vec::new();
        for s in strings.as_string::<i32>().iter().flatten() {
            data.extend_from_slice(s.as_bytes());
            lengths.push(s.len() as i64);
        }
        streams.push((DATA, data));
        streams.push((LENGTH, rle::encode_ints_v1(&lengths, false)));
        STRING
    };
    Ok(EncodedColumn {
        kind,
        encoding: DIRECT,
        dictionary_size: 0,
        streams,
        values: (array.len() - array.null_count()) as u64,
        has_null: array.null_count() > 0,
    })
}

fn user_item(name: &str, value: &str) -> Message {
    let mut item = Message::new();
    item.bytes(1, name.as_bytes()).bytes(2, value.as_bytes());
    item
}

/// Encode a table as a single-stripe uncompressed ORC file
pub(crate) fn write_table(table: &Table) -> Result<Vec<u8>> {
    let schema = &table.schema;
    let batch = if table.batches.is_empty() {
        RecordBatch::new_empty(schema.clone())
    } else {
        concat_batches(schema, &table.batches)?
    };
    let columns = batch
        .columns()
        .iter()
        .map(encode_column)
        .collect::<Result<Vec<_>>>()?;
    assemble(schema, &columns, batch.num_rows() as u64)
}

/// Lay out the stripe, footer and postscript of a single-stripe file
fn assemble(schema: &Schema, columns: &[EncodedColumn], rows: u64) -> Result<Vec<u8>> {
    let mut buf = MAGIC.to_vec();
    let stripe_offset = buf.len() as u64;
    let mut stripe_footer = Message::new();
    for (j, column) in columns.iter().enumerate() {
        for (kind, bytes) in &column.streams {
            let mut stream = Message::new();
            stream.uint(1, *kind).uint(2, j as u64 + 1).uint(3, bytes.len() as u64);
            stripe_footer.message(1, &stream);
            buf.extend_from_slice(bytes);
        }
    }
    let data_length = buf.len() as u64 - stripe_offset;
    let mut root_encoding = Message::new();
    root_encoding.uint(1, DIRECT);
    stripe_footer.message(2, &root_encoding);
    for column in columns {
        let mut encoding = Message::new();
        encoding.uint(1, column.encoding);
        if column.dictionary_size > 0 {
            encoding.uint(2, column.dictionary_size);
        }
        stripe_footer.message(2, &encoding);
    }
    let stripe_footer = stripe_footer.finish();
    buf.extend_from_slice(&stripe_footer);

    let mut footer = Message::new();
    footer.uint(1, stripe_offset).uint(2, buf.len() as u64 - stripe_offset);
    let mut stripe = Message::new();
    stripe
        .uint(1, stripe_offset)
        .uint(2, 0)
        .uint(3, data_length)
        .uint(4, stripe_footer.len() as u64)
        .uint(5, rows);
    footer.message(3, &stripe);

    let mut root = Message::new();
    root.uint(1, STRUCT)
        .packed(2, &(1..=columns.len() as u64).collect::<Vec<_>>());
    for field in schema.fields() {
        root.bytes(3, field.name().as_bytes());
    }
    footer.message(4, &root);
    for column in columns {
        let mut child = Message::new();
        child.uint(1, column.kind);
        footer.message(4, &child);
    }

    let mut keys: Vec<&String> = schema.metadata().keys().collect();
    keys.sort();
    for key in keys {
        footer.message(5, &user_item(key, &schema.metadata()[key]));
    }
    let described: HashMap<&String, &HashMap<String, String>> = schema
        .fields()
        .iter()
        .filter(|f| !f.metadata().is_empty())
        .map(|f| (f.name(), f.metadata()))
        .collect();
    if !described.is_empty() {
        footer.message(5, &user_item(FIELDS_ITEM, &serde_json::to_string(&described)?));
    }

    footer.uint(6, rows);
    let mut root_stats = Message::new();
    root_stats.uint(1, rows);
    footer.message(7, &root_stats);
    for column in columns {
        let mut stats = Message::new();
        stats.uint(1, column.values).uint(10, u64::from(column.has_null));
        footer.message(7, &stats);
    }
    let footer = footer.finish();
    buf.extend_from_slice(&footer);

    let mut postscript = Message::new();
    postscript
        .uint(1, footer.len() as u64)
        .uint(2, 0)
        .uint(3, DEFAULT_BLOCK_SIZE)
        .packed(4, &FILE_VERSION)
        .uint(5, 0)
        .bytes(8000, MAGIC);
    let postscript = postscript.finish();
    let ps_length = u8::try_from(postscript.len()).map_err(|_| corrupt("postscript too long"))?;
    buf.extend_from_slice(&postscript);
    buf.push(ps_length);
    debug!("encoded {} rows in {} ORC bytes", rows, buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests;
