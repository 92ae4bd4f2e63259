use std::io::Write;

use arrow::array::{Float32Array, StringArray};
use flate2::write::DeflateEncoder;

use super::*;

fn sample_table() -> Table {
    let fields = vec![
        Field::new("name", DataType::Utf8, true)
            .with_metadata(HashMap::from([("description".to_string(), "who".to_string())])),
        Field::new("n", DataType::Int64, true),
        Field::new("x", DataType::Float64, true),
        Field::new("ok", DataType::Boolean, true),
    ];
    let schema = Arc::new(
        Schema::new(fields)
            .with_metadata(HashMap::from([("__metadata__".to_string(), "{\"a\": 1}".to_string())])),
    );
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![Some("alpha"), None, Some(""), Some("δέλτα")])),
        Arc::new(Int64Array::from(vec![Some(-3), Some(i64::MAX), None, Some(0)])),
        Arc::new(Float64Array::from(vec![Some(1.5), Some(-0.25), Some(f64::MAX), None])),
        Arc::new(BooleanArray::from(vec![None, Some(true), Some(false), Some(true)])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    Table {
        schema,
        batches: vec![batch],
    }
}

/// Wrap `data` in one compressed chunk with a 3-byte header
fn chunk(data: &[u8], original: bool) -> Vec<u8> {
    let header = ((data.len() as u32) << 1) | u32::from(original);
    let mut out = header.to_le_bytes()[..3].to_vec();
    out.extend_from_slice(data);
    out
}

#[test]
fn test_round_trip_keeps_metadata() {
    let table = sample_table();
    let bytes = write_table(&table).unwrap();
    assert!(bytes.starts_with(MAGIC));

    let back = read_table(Bytes::from(bytes)).unwrap();
    assert_eq!(back.schema.metadata(), table.schema.metadata());
    assert_eq!(
        back.schema.field(0).metadata().get("description").map(String::as_str),
        Some("who")
    );
    assert!(back.schema.field(1).metadata().is_empty());
    assert_eq!(back.num_rows(), 4);

    let batch = &back.batches[0];
    for (j, original) in table.batches[0].columns().iter().enumerate() {
        assert_eq!(batch.column(j).as_ref(), original.as_ref(), "column {}", j);
    }
}

#[test]
fn test_batches_merge_into_one_stripe() {
    let table = sample_table();
    let twice = Table {
        schema: table.schema.clone(),
        batches: vec![table.batches[0].clone(), table.batches[0].slice(1, 2)],
    };
    let back = read_table(Bytes::from(write_table(&twice).unwrap())).unwrap();
    assert_eq!(back.batches.len(), 1);
    assert_eq!(back.num_rows(), 6);
    assert_eq!(back.batches[0].column(1).null_count(), 2);
}

#[test]
fn test_empty_table() {
    let table = sample_table();
    let empty = Table {
        schema: table.schema.clone(),
        batches: Vec::new(),
    };
    let back = read_table(Bytes::from(write_table(&empty).unwrap())).unwrap();
    assert_eq!(back.num_rows(), 0);
    assert_eq!(back.schema.fields().len(), 4);
}

#[test]
fn test_reads_v2_and_dictionary_columns() {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("word", DataType::Utf8, true),
        Field::new("ratio", DataType::Float32, true),
    ]);
    let mut ratios = Vec::new();
    for v in [0.5f32, 2.0, -1.0, 8.0, 0.125] {
        ratios.write_f32::<LittleEndian>(v).unwrap();
    }
    let columns = [
        EncodedColumn {
            kind: INT,
            encoding: DIRECT_V2,
            dictionary_size: 0,
            // SHORT_REPEAT of zigzag(10000) = 20000, five times
            streams: vec![(DATA, vec![0x0a, 0x4e, 0x20])],
            values: 5,
            has_null: false,
        },
        EncodedColumn {
            kind: STRING,
            encoding: DICTIONARY_V2,
            dictionary_size: 2,
            streams: vec![
                (PRESENT, rle::encode_bools(&[true, true, false, true, true])),
                (DATA, vec![0x5e, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01]),
                (DICTIONARY_DATA, b"yesno".to_vec()),
                // DELTA: base 3, delta -1
                (LENGTH, vec![0xc0, 0x01, 0x03, 0x01]),
            ],
            values: 4,
            has_null: true,
        },
        EncodedColumn {
            kind: FLOAT,
            encoding: DIRECT,
            dictionary_size: 0,
            streams: vec![(DATA, ratios)],
            values: 5,
            has_null: false,
        },
    ];
    let bytes = assemble(&schema, &columns, 5).unwrap();
    let back = read_table(Bytes::from(bytes)).unwrap();
    assert_eq!(back.schema.field(2).data_type(), &DataType::Float32);

    let batch = &back.batches[0];
    assert_eq!(batch.column(0).as_primitive::<Int64Type>().values().to_vec(), vec![10000; 5]);
    let words: Vec<Option<&str>> = batch.column(1).as_string::<i32>().iter().collect();
    assert_eq!(words, vec![Some("yes"), Some("no"), None, Some("yes"), Some("no")]);
    assert_eq!(
        batch.column(2).as_ref(),
        &Float32Array::from(vec![0.5, 2.0, -1.0, 8.0, 0.125]) as &dyn Array
    );
}

#[test]
fn test_decompress_chunks() {
    let text = b"the quick brown fox jumps over the lazy dog, twice: the quick brown fox";

    let mut deflate = DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    deflate.write_all(text).unwrap();
    let zlib = [chunk(&deflate.finish().unwrap(), false), chunk(b"!", true)].concat();
    assert_eq!(
        &*decompress(Compression::Zlib, DEFAULT_BLOCK_SIZE, &zlib).unwrap(),
        [&text[..], &b"!"[..]].concat().as_slice()
    );

    let snappy = chunk(&snap::raw::Encoder::new().compress_vec(text).unwrap(), false);
    assert_eq!(
        &*decompress(Compression::Snappy, DEFAULT_BLOCK_SIZE, &snappy).unwrap(),
        &text[..]
    );

    let zstd = chunk(&zstd::stream::encode_all(&text[..], 0).unwrap(), false);
    assert_eq!(
        &*decompress(Compression::Zstd, DEFAULT_BLOCK_SIZE, &zstd).unwrap(),
        &text[..]
    );

    // a chunk inflating past the block size is refused
    assert!(decompress(Compression::Zstd, 16, &zstd).is_err());
    assert!(decompress(Compression::Zlib, DEFAULT_BLOCK_SIZE, &[0x10, 0x00]).is_err());
}

#[test]
fn test_unsupported_compression() {
    assert!(matches!(Compression::from_kind(3), Err(DsffError::Unsupported(_))));
    assert!(matches!(Compression::from_kind(4), Err(DsffError::Unsupported(_))));
    assert!(Compression::from_kind(9).is_err());
}

#[test]
fn test_damaged_files_fail_cleanly() {
    assert!(read_table(Bytes::from_static(b"ORC")).is_err());
    assert!(read_table(Bytes::from_static(b"ORC\x00")).is_err());
    assert!(read_table(Bytes::from_static(b"ORC\xff")).is_err());
    assert!(read_table(Bytes::from_static(b"PAR1")).is_err());

    let bytes = write_table(&sample_table()).unwrap();
    for end in 0..bytes.len() {
        let _ = read_table(Bytes::copy_from_slice(&bytes[..end]));
    }
    for i in 0..bytes.len() {
        for flip in [0x01u8, 0x80, 0xff] {
            let mut damaged = bytes.clone();
            damaged[i] ^= flip;
            let _ = read_table(Bytes::from(damaged));
        }
    }
}
