//! Integration tests for the .dsff container format
//!
//! These tests verify:
//! 1. The workbook package layout of a saved container
//! 2. Rejection of archives breaking the two-sheet invariants
//! 3. Metadata carried by the document description
//! 4. Save idempotence

use dsff::container::Container;
use dsff::model::row;
use dsff::{Dsff, DsffError, Mode};
use serde_json::json;
use std::fs;
use std::io::{Cursor, Read, Write};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn sample_bytes() -> Vec<u8> {
    let mut c = Container::create(None);
    c.write_data(vec![row(["a", "b"]), row(["1", "x"])]).unwrap();
    c.set_property("source", json!("bench")).unwrap();
    c.to_bytes().unwrap()
}

/// Copy an archive, editing one part on the way
fn rewrite(bytes: &[u8], part: &str, edit: impl Fn(String) -> String) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let name = file.name().to_string();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        if name == part {
            content = edit(content);
        }
        out.start_file(name, SimpleFileOptions::default()).unwrap();
        out.write_all(content.as_bytes()).unwrap();
    }
    out.finish().unwrap().into_inner()
}

#[test]
fn test_package_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("layout.dsff");
    let mut ds = Dsff::open(&path, Mode::Write).unwrap();
    ds.write(Some(vec![row(["a"]), row(["1"])]), None, None).unwrap();
    ds.close().unwrap();

    let archive = ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    for part in [
        "[Content_Types].xml",
        "_rels/.rels",
        "docProps/core.xml",
        "docProps/app.xml",
        "xl/workbook.xml",
        "xl/_rels/workbook.xml.rels",
        "xl/styles.xml",
        "xl/worksheets/sheet1.xml",
        "xl/worksheets/sheet2.xml",
    ] {
        assert!(names.contains(&part), "missing part {}", part);
    }
}

#[test]
fn test_rewritten_archive_still_opens() {
    let bytes = rewrite(&sample_bytes(), "", |s| s);
    let c = Container::from_bytes(&bytes).unwrap();
    assert_eq!(c.row_count(), 2);
    assert_eq!(c.metadata().get("source"), Some(&json!("bench")));
}

#[test]
fn test_missing_features_sheet() {
    let bytes = rewrite(&sample_bytes(), "xl/workbook.xml", |s| {
        s.replace(r#"<sheet name="features" sheetId="2" r:id="rId2"/>"#, "")
    });
    let err = Container::from_bytes(&bytes).unwrap_err();
    assert!(err.is_invalid_container(), "{}", err);
}

#[test]
fn test_renamed_sheet() {
    let bytes = rewrite(&sample_bytes(), "xl/workbook.xml", |s| {
        s.replace(r#"name="features""#, r#"name="feats""#)
    });
    assert!(Container::from_bytes(&bytes).unwrap_err().is_invalid_container());
}

#[test]
fn test_features_header_mismatch() {
    let mut c = Container::create(None);
    c.write_data(vec![row(["a"]), row(["1"])]).unwrap();
    let mut features = dsff::model::Features::new();
    features.insert("a", "first");
    c.write_features(&features).unwrap();
    let bytes = rewrite(&c.to_bytes().unwrap(), "xl/worksheets/sheet2.xml", |s| {
        s.replacen(">name<", ">key<", 1)
    });
    assert!(Container::from_bytes(&bytes).unwrap_err().is_invalid_container());
}

#[test]
fn test_not_an_archive() {
    let err = Container::from_bytes(b"a;b\n1;2\n").unwrap_err();
    assert!(matches!(err, DsffError::InvalidContainer(_)));

    let dir = tempdir().unwrap();
    let path = dir.path().join("fake.dsff");
    fs::write(&path, "not a zip").unwrap();
    assert!(Dsff::open(&path, Mode::Read).unwrap_err().is_invalid_container());
}

#[test]
fn test_description_holds_metadata() {
    let bytes = sample_bytes();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut core = String::new();
    archive
        .by_name("docProps/core.xml")
        .unwrap()
        .read_to_string(&mut core)
        .unwrap();
    assert!(core.contains("source"));
    assert!(core.contains("bench"));
}

#[test]
fn test_save_idempotence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("once.dsff");
    let mut ds = Dsff::open(&path, Mode::Create).unwrap();
    ds.write(Some(vec![row(["a"]), row(["1"])]), None, None).unwrap();
    assert!(ds.save().unwrap());
    let modified = fs::metadata(&path).unwrap().modified().unwrap();
    assert!(!ds.save().unwrap());
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);

    ds.set("keywords", json!("iris")).unwrap();
    assert!(ds.save().unwrap());
    let reopened = Dsff::open(&path, Mode::ReadWrite).unwrap();
    assert_eq!(reopened.get("keywords").unwrap().as_str(), Some("iris"));
}
