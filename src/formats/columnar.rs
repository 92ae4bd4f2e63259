//! Columnar binary formats: Feather (Arrow IPC file), Parquet and ORC.
//!
//! The three formats share one implementation parameterized by a
//! [`Backend`] holding the format's read and write entry points. A
//! dataset maps to a single Arrow table:
//!
//! - schema field names are the header row
//! - a field described in the features carries the field metadata
//!   `description`
//! - the schema metadata key `__metadata__` holds the JSON-encoded metadata
//!
//! Each column gets one Arrow type inferred from its evaluated cells;
//! empty cells and cells equal to the missing token become nulls.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde_json::Value;

use super::{deliver, orc, Codec, CodecOptions, Format, Input, Payload, Sink};
use crate::constants::{DESCRIPTION_FIELD_KEY, METADATA_SCHEMA_KEY};
use crate::error::{DsffError, Result};
use crate::model::{parse_literal, Cell, Dataset, Features, Metadata};

/// An Arrow schema with its record batches
#[derive(Debug, Clone)]
pub struct Table {
    /// Schema, metadata included
    pub schema: SchemaRef,
    /// Row batches
    pub batches: Vec<RecordBatch>,
}

impl Table {
    /// Total number of rows
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Decode a table from file bytes
pub type ReadFn = fn(Bytes) -> Result<Table>;
/// Encode a table to file bytes
pub type WriteFn = fn(&Table) -> Result<Vec<u8>>;

/// Read and write entry points of one columnar format
///
/// `write_table` is the generic table writer; `write_native` is a writer
/// dedicated to the format. Dumping uses the first available.
#[derive(Debug, Clone, Copy)]
pub struct Backend {
    /// Format served
    pub format: Format,
    /// Leading bytes of a valid file
    pub magic: &'static [u8],
    /// Table reader
    pub read_table: ReadFn,
    /// Generic table writer
    pub write_table: Option<WriteFn>,
    /// Format-specific writer
    pub write_native: Option<WriteFn>,
}

/// Arrow IPC file
pub const FEATHER: Backend = Backend {
    format: Format::Feather,
    magic: b"ARROW1",
    read_table: read_feather,
    write_table: Some(write_feather),
    write_native: None,
};

/// Parquet file
pub const PARQUET: Backend = Backend {
    format: Format::Parquet,
    magic: b"PAR1",
    read_table: read_parquet,
    write_table: Some(write_parquet),
    write_native: None,
};

/// ORC file
pub const ORC: Backend = Backend {
    format: Format::Orc,
    magic: orc::MAGIC,
    read_table: orc::read_table,
    write_table: None,
    write_native: Some(orc::write_table),
};

impl Backend {
    /// Codec table entry of this backend
    pub fn codec(&self) -> Codec {
        match self.format {
            Format::Feather => Codec {
                format: Format::Feather,
                detect: detect_feather,
                load: load_feather,
                dump: dump_feather,
            },
            Format::Orc => Codec {
                format: Format::Orc,
                detect: detect_orc,
                load: load_orc,
                dump: dump_orc,
            },
            _ => Codec {
                format: Format::Parquet,
                detect: detect_parquet,
                load: load_parquet,
                dump: dump_parquet,
            },
        }
    }

    /// Whether the bytes carry the format's magic and decode as a table
    pub fn detect(&self, input: &Input, _options: &CodecOptions) -> bool {
        match input.bytes() {
            Some(bytes) if bytes.starts_with(self.magic) => {
                (self.read_table)(Bytes::copy_from_slice(bytes)).is_ok()
            }
            _ => false,
        }
    }

    /// Read a file into a dataset
    pub fn load(&self, path: &Path, _options: &CodecOptions) -> Result<Dataset> {
        let table = (self.read_table)(Bytes::from(fs::read(path)?))?;
        debug!("read {} {} rows from {}", table.num_rows(), self.format, path.display());
        from_table(&table)
    }

    /// Write a dataset with whichever writer the format offers
    pub fn dump(&self, dataset: &Dataset, sink: Sink<'_>, options: &CodecOptions) -> Result<Option<Payload>> {
        let write = self.write_table.or(self.write_native).ok_or_else(|| {
            DsffError::Unsupported(format!("no writer available for {}", self.format))
        })?;
        let table = to_table(dataset, options)?;
        deliver(sink, Payload::Binary(write(&table)?))
    }
}

fn detect_feather(input: &Input, options: &CodecOptions) -> bool {
    FEATHER.detect(input, options)
}

fn load_feather(path: &Path, options: &CodecOptions) -> Result<Dataset> {
    FEATHER.load(path, options)
}

fn dump_feather(dataset: &Dataset, sink: Sink<'_>, options: &CodecOptions) -> Result<Option<Payload>> {
    FEATHER.dump(dataset, sink, options)
}

fn detect_orc(input: &Input, options: &CodecOptions) -> bool {
    ORC.detect(input, options)
}

fn load_orc(path: &Path, options: &CodecOptions) -> Result<Dataset> {
    ORC.load(path, options)
}

fn dump_orc(dataset: &Dataset, sink: Sink<'_>, options: &CodecOptions) -> Result<Option<Payload>> {
    ORC.dump(dataset, sink, options)
}

fn detect_parquet(input: &Input, options: &CodecOptions) -> bool {
    PARQUET.detect(input, options)
}

fn load_parquet(path: &Path, options: &CodecOptions) -> Result<Dataset> {
    PARQUET.load(path, options)
}

fn dump_parquet(dataset: &Dataset, sink: Sink<'_>, options: &CodecOptions) -> Result<Option<Payload>> {
    PARQUET.dump(dataset, sink, options)
}

fn read_feather(bytes: Bytes) -> Result<Table> {
    let reader = FileReader::try_new(Cursor::new(bytes), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Table { schema, batches })
}

fn write_feather(table: &Table) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buf, &table.schema)?;
        for batch in &table.batches {
            writer.write(batch)?;
        }
        writer.finish()?;
    }
    Ok(buf)
}

fn read_parquet(bytes: Bytes) -> Result<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Table { schema, batches })
}

fn write_parquet(table: &Table) -> Result<Vec<u8>> {
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();
    let mut buf = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buf, table.schema.clone(), Some(props))?;
        for batch in &table.batches {
            writer.write(batch)?;
        }
        writer.close()?;
    }
    Ok(buf)
}

/// Arrow type inferred from the non-null cells of a column
fn infer_type(cells: &[Option<&Cell>]) -> DataType {
    let present: Vec<&Cell> = cells.iter().flatten().copied().collect();
    if present.is_empty() {
        DataType::Utf8
    } else if present.iter().all(|c| matches!(c, Cell::Bool(_))) {
        DataType::Boolean
    } else if present.iter().all(|c| matches!(c, Cell::Int(_))) {
        DataType::Int64
    } else if present.iter().all(|c| matches!(c, Cell::Int(_) | Cell::Float(_))) {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

fn build_array(cells: &[Option<&Cell>], data_type: &DataType) -> ArrayRef {
    match data_type {
        DataType::Boolean => Arc::new(BooleanArray::from(
            cells
                .iter()
                .map(|c| match c {
                    Some(Cell::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Int64 => Arc::new(Int64Array::from(
            cells
                .iter()
                .map(|c| match c {
                    Some(Cell::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            cells
                .iter()
                .map(|c| c.and_then(Cell::as_f64))
                .collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            cells
                .iter()
                .map(|c| c.map(|c| c.to_string()))
                .collect::<Vec<_>>(),
        )),
    }
}

/// Assemble the dataset into a single Arrow table
pub fn to_table(dataset: &Dataset, options: &CodecOptions) -> Result<Table> {
    dataset.validate()?;
    let headers = dataset.headers();
    if headers.is_empty() {
        return Err(DsffError::BadInputData("no header row to build the table schema".to_string()));
    }
    let evaluated = dataset.evaluated_data();
    let rows = &evaluated[1..];

    let mut fields = Vec::with_capacity(headers.len());
    let mut columns = Vec::with_capacity(headers.len());
    for (j, name) in headers.iter().enumerate() {
        let cells: Vec<Option<&Cell>> = rows
            .iter()
            .map(|r| match &r[j] {
                Cell::Empty => None,
                Cell::Text(s) if *s == options.missing => None,
                c => Some(c),
            })
            .collect();
        let data_type = infer_type(&cells);
        columns.push(build_array(&cells, &data_type));
        let mut field = Field::new(name.as_str(), data_type, true);
        if let Some(description) = dataset.features.get(name) {
            field = field.with_metadata(HashMap::from([(
                DESCRIPTION_FIELD_KEY.to_string(),
                description.to_string(),
            )]));
        }
        fields.push(field);
    }

    let metadata = HashMap::from([(
        METADATA_SCHEMA_KEY.to_string(),
        serde_json::to_string(&dataset.metadata)?,
    )]);
    let schema = Arc::new(Schema::new(fields).with_metadata(metadata));
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    Ok(Table {
        schema,
        batches: vec![batch],
    })
}

/// Cells of one Arrow column
fn column_cells(array: &ArrayRef) -> Result<Vec<Cell>> {
    let data_type = array.data_type();
    let cells = if *data_type == DataType::Boolean {
        array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(Cell::Empty, Cell::Bool))
            .collect()
    } else if data_type.is_integer() {
        cast(array, &DataType::Int64)?
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map_or(Cell::Empty, Cell::Int))
            .collect()
    } else if data_type.is_floating() {
        cast(array, &DataType::Float64)?
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map_or(Cell::Empty, Cell::Float))
            .collect()
    } else {
        cast(array, &DataType::Utf8)?
            .as_string::<i32>()
            .iter()
            .map(|v| v.map_or(Cell::Empty, Cell::text))
            .collect()
    };
    Ok(cells)
}

/// Decode the metadata mapping stored under `__metadata__`
fn decode_metadata(raw: &str) -> Result<Metadata> {
    let value = serde_json::from_str::<Value>(raw)
        .ok()
        .or_else(|| parse_literal(raw))
        .ok_or_else(|| DsffError::BadInputData("schema metadata is not a literal".to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DsffError::BadInputData("schema metadata is not a mapping".to_string())),
    }
}

/// Rebuild a dataset from an Arrow table
pub fn from_table(table: &Table) -> Result<Dataset> {
    let schema = &table.schema;
    let mut data = vec![schema
        .fields()
        .iter()
        .map(|f| Cell::text(f.name().as_str()))
        .collect::<Vec<_>>()];
    let features: Features = schema
        .fields()
        .iter()
        .filter_map(|f| {
            f.metadata()
                .get(DESCRIPTION_FIELD_KEY)
                .map(|d| (f.name().clone(), d.clone()))
        })
        .collect();
    let metadata = match schema.metadata().get(METADATA_SCHEMA_KEY) {
        Some(raw) => decode_metadata(raw)?,
        None => Metadata::new(),
    };

    for batch in &table.batches {
        let columns = batch
            .columns()
            .iter()
            .map(column_cells)
            .collect::<Result<Vec<_>>>()?;
        for i in 0..batch.num_rows() {
            data.push(columns.iter().map(|c| c[i].clone()).collect());
        }
    }
    Ok(Dataset::new(data, features, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> Dataset {
        let mut features = Features::new();
        features.insert("x", "a measure");
        features.insert("ok", "");
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("survey"));
        metadata.insert("counts".into(), json!({"a": 1, "b": [true, null]}));
        Dataset::new(
            vec![
                row(["name", "x", "n", "ok"]),
                row(["a", "1.5", "1", "True"]),
                row(["?", "2", "2", "False"]),
            ],
            features,
            metadata,
        )
    }

    fn expected_rows() -> Vec<Vec<Cell>> {
        vec![
            row(["name", "x", "n", "ok"]),
            vec![Cell::text("a"), Cell::Float(1.5), Cell::Int(1), Cell::Bool(true)],
            vec![Cell::Empty, Cell::Float(2.0), Cell::Int(2), Cell::Bool(false)],
        ]
    }

    #[test]
    fn test_type_inference() {
        let table = to_table(&sample(), &CodecOptions::default()).unwrap();
        let types: Vec<DataType> = table
            .schema
            .fields()
            .iter()
            .map(|f| f.data_type().clone())
            .collect();
        assert_eq!(types, vec![DataType::Utf8, DataType::Float64, DataType::Int64, DataType::Boolean]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.batches[0].column(0).null_count(), 1);
        assert!(table.schema.field(2).metadata().is_empty());
        assert_eq!(
            table.schema.field(1).metadata().get(DESCRIPTION_FIELD_KEY).map(String::as_str),
            Some("a measure")
        );
    }

    #[test]
    fn test_mixed_column_is_text() {
        let ds = Dataset::new(
            vec![row(["v"]), row(["1"]), row(["x"]), row(["True"])],
            Features::new(),
            Metadata::new(),
        );
        let table = to_table(&ds, &CodecOptions::default()).unwrap();
        assert_eq!(table.schema.field(0).data_type(), &DataType::Utf8);
        let back = from_table(&table).unwrap();
        assert_eq!(back.data[3], vec![Cell::text("True")]);
    }

    #[test]
    fn test_feather_round_trip() {
        let ds = sample();
        let payload = FEATHER
            .dump(&ds, Sink::Text, &CodecOptions::default())
            .unwrap()
            .unwrap();
        assert!(payload.as_text().is_none());
        let input = Input::Bytes(payload.as_bytes().to_vec());
        assert!(FEATHER.detect(&input, &CodecOptions::default()));
        assert!(!PARQUET.detect(&input, &CodecOptions::default()));

        let back = from_table(&read_feather(Bytes::from(payload.into_bytes())).unwrap()).unwrap();
        assert_eq!(back.data, expected_rows());
        assert_eq!(back.features, ds.features);
        assert_eq!(back.metadata, ds.metadata);
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.parquet");
        let ds = sample();
        assert!(PARQUET
            .dump(&ds, Sink::Path(&path), &CodecOptions::default())
            .unwrap()
            .is_none());
        let back = PARQUET.load(&path, &CodecOptions::default()).unwrap();
        assert_eq!(back.data, expected_rows());
        assert_eq!(back.features, ds.features);
        assert_eq!(back.metadata, ds.metadata);
        assert!(PARQUET.detect(&Input::from_path(&path).unwrap(), &CodecOptions::default()));
    }

    #[test]
    fn test_literal_metadata() {
        let meta = decode_metadata("{'a': (1, 2), 'b': None}").unwrap();
        assert_eq!(Value::Object(meta), json!({"a": [1, 2], "b": null}));
        assert!(decode_metadata("[1, 2]").unwrap_err().is_bad_input());
    }

    #[test]
    fn test_detect_rejects_magic_only() {
        let opts = CodecOptions::default();
        assert!(!PARQUET.detect(&Input::from(&b"PAR1 not really"[..]), &opts));
        assert!(!FEATHER.detect(&Input::from(&b"ARROW1"[..]), &opts));
        assert!(!ORC.detect(&Input::from(&b"a;b\n1;2\n"[..]), &opts));
        assert!(!ORC.detect(&Input::from(&b"ORC"[..]), &opts));
    }

    #[test]
    fn test_orc_round_trip() {
        let ds = sample();
        let payload = ORC
            .dump(&ds, Sink::Text, &CodecOptions::default())
            .unwrap()
            .unwrap();
        let input = Input::Bytes(payload.as_bytes().to_vec());
        assert!(ORC.detect(&input, &CodecOptions::default()));
        assert!(!FEATHER.detect(&input, &CodecOptions::default()));

        let back = from_table(&(ORC.read_table)(Bytes::from(payload.into_bytes())).unwrap()).unwrap();
        assert_eq!(back.data, expected_rows());
        assert_eq!(back.features, ds.features);
        assert_eq!(back.metadata, ds.metadata);
    }
}
