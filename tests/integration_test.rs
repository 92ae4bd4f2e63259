//! End-to-end conversion tests: external formats through a DSFF container
//! and back.

use dsff::formats::{arff, Input};
use dsff::model::{row, Cell};
use dsff::{detect_format, CodecOptions, Dsff, DsffError, Format, Mode};
use rusqlite::Connection;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const IRIS_CSV: &str = "\
hash;sepal_length;species;label
a1;5.1;setosa;1
b2;4.9;?;0
c3;6.3;virginica;1
";

fn write_iris(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("iris.csv");
    fs::write(&path, IRIS_CSV).unwrap();
    path
}

fn iris_container(dir: &Path) -> Dsff {
    let mut ds = Dsff::open(dir.join("iris.dsff"), Mode::Create).unwrap();
    ds.from_csv(write_iris(dir)).unwrap();
    ds.set("source", json!("UCI")).unwrap();
    ds.save().unwrap();
    ds
}

#[test]
fn test_csv_import_promotes_literals() {
    let dir = tempdir().unwrap();
    let ds = iris_container(dir.path());
    assert_eq!(ds.name(), "iris");
    assert_eq!(ds.row_count(), 4);
    let data = ds.data();
    assert_eq!(
        data[1],
        vec![Cell::text("a1"), Cell::Float(5.1), Cell::text("setosa"), Cell::Int(1)]
    );
    // excluded columns get no feature description
    let features = ds.features();
    assert!(!features.contains("hash"));
    assert_eq!(features.get("species"), Some(""));
}

#[test]
fn test_round_trip_every_format() {
    let dir = tempdir().unwrap();
    let ds = iris_container(dir.path());
    let expected = ds.data();

    for format in [
        Format::Csv,
        Format::Db,
        Format::Feather,
        Format::Orc,
        Format::Parquet,
        Format::Folder,
    ] {
        let out = dir.path().join(format!("out-{}", format.name()));
        let out = match format.extension() {
            "" => out,
            ext => out.with_extension(ext),
        };
        ds.export(format, Some(out.as_path())).unwrap();

        let mut back = Dsff::in_memory();
        back.import(format, &out).unwrap();
        let data = back.data();
        assert_eq!(data[0], expected[0], "{}", format);
        for (got, want) in data.iter().zip(&expected).skip(1) {
            // columnar formats keep the missing token as null
            let want: Vec<Cell> = want
                .iter()
                .map(|c| match c {
                    Cell::Text(s) if s == "?" && format.is_binary() => Cell::Empty,
                    other => other.clone(),
                })
                .collect();
            assert_eq!(got, &want, "{}", format);
        }
        if format != Format::Csv {
            assert_eq!(back.metadata().get("source"), Some(&json!("UCI")), "{}", format);
            assert_eq!(back.features(), ds.features(), "{}", format);
        }
    }
}

#[test]
fn test_arff_export_moves_target_last() {
    let dir = tempdir().unwrap();
    let ds = iris_container(dir.path());
    let text = ds.export_text(Format::Arff).unwrap();
    let text = text.as_text().unwrap();
    assert!(text.starts_with("@RELATION \"iris\""));
    assert!(!text.contains("@ATTRIBUTE hash"));
    assert!(text.contains("@ATTRIBUTE class"));
    assert!(text.contains("% metadata: {\"source\":\"UCI\"}"));

    let back = arff::parse(text, &CodecOptions::default()).unwrap();
    assert_eq!(back.headers(), vec!["sepal_length", "species", "label"]);
    assert_eq!(back.data[2], vec![Cell::text("4.9"), Cell::Empty, Cell::text("False")]);
}

#[test]
fn test_header_only_export_fails() {
    let dir = tempdir().unwrap();
    let mut ds = Dsff::open(dir.path().join("empty"), Mode::Write).unwrap();
    ds.write(Some(vec![row(["a", "b"])]), None, None).unwrap();
    for format in Format::ALL {
        let err = ds.export(format, Some(dir.path().join("x").as_path())).unwrap_err();
        assert!(matches!(err, DsffError::EmptyDataset), "{}", format);
    }
    assert!(matches!(ds.export_text(Format::Arff), Err(DsffError::EmptyDataset)));
}

#[test]
fn test_arff_errors_carry_line_numbers() {
    let opts = CodecOptions::default();
    let mismatch = "@RELATION \"t\"\n\n@ATTRIBUTE a NUMERIC\n@ATTRIBUTE b NUMERIC\n\n@DATA\n1, 2\n3\n";
    match arff::parse(mismatch, &opts) {
        Err(DsffError::Parse { line, .. }) => assert_eq!(line, 8),
        other => panic!("unexpected {:?}", other),
    }

    let late = "@RELATION \"t\"\n\n@ATTRIBUTE a NUMERIC\n\n@ATTRIBUTE b NUMERIC\n@DATA\n";
    match arff::parse(late, &opts) {
        Err(DsffError::Parse { line, reason }) => {
            assert_eq!(line, 5);
            assert!(reason.contains("@ATTRIBUTE"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_hand_made_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hand.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE data (zeta TEXT, alpha INTEGER, mid REAL);
         CREATE TABLE features (name TEXT PRIMARY KEY, description TEXT);
         CREATE TABLE metadata (key TEXT PRIMARY KEY, value JSON);
         INSERT INTO data VALUES ('z', 3, 0.25);
         INSERT INTO features VALUES ('alpha', 'first letter');
         INSERT INTO metadata VALUES ('tags', '[\"a\", \"b\"]');",
    )
    .unwrap();
    drop(conn);

    let bytes = fs::read(&path).unwrap();
    assert_eq!(
        detect_format(&Input::Bytes(bytes), &CodecOptions::default()),
        Some(Format::Db)
    );

    let mut ds = Dsff::in_memory();
    ds.from_db(&path).unwrap();
    assert_eq!(ds.headers(), vec!["zeta", "alpha", "mid"]);
    assert_eq!(ds.data()[1], vec![Cell::text("z"), Cell::Int(3), Cell::Float(0.25)]);
    assert_eq!(ds.features().get("alpha"), Some("first letter"));
    assert_eq!(ds.metadata().get("tags"), Some(&json!(["a", "b"])));
    assert_eq!(ds.name(), "hand");
}

#[test]
fn test_sql_text_export() {
    let dir = tempdir().unwrap();
    let ds = iris_container(dir.path());
    let sql = ds.export_text(Format::Db).unwrap();
    let sql = sql.as_text().unwrap();
    assert!(sql.contains("CREATE TABLE data (\"hash\" TEXT PRIMARY KEY"));
    assert!(sql.contains("INSERT INTO data VALUES ('a1', 5.1, 'setosa', 1);"));

    // the script rebuilds an equivalent database
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(sql).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM data", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn test_import_into_read_only() {
    let dir = tempdir().unwrap();
    let csv = write_iris(dir.path());
    let mut ds = iris_container(dir.path());
    ds.save().unwrap();
    drop(ds);

    let mut ro = Dsff::open(dir.path().join("iris.dsff"), Mode::Read).unwrap();
    assert!(matches!(ro.from_csv(&csv), Err(DsffError::ReadOnly)));
    assert_eq!(ro.get("source").unwrap().to_json(), json!("UCI"));
}
