//! Dataset folder: three loose files side by side.
//!
//! ```text
//! name/
//!  +-- data.csv        semicolon-delimited, evaluated cells
//!  +-- features.json   {"column": "description", ...}
//!  +-- metadata.json   {"key": value, ...}
//! ```

use std::fs::{self, File};
use std::path::Path;

use log::debug;
use serde_json::Value;

use super::{csv, CodecOptions, Input, Payload, Sink};
use crate::error::{DsffError, Result};
use crate::model::{Cell, Dataset, Features, Metadata};

/// Data file name
pub const DATA_FILE: &str = "data.csv";
/// Features file name
pub const FEATURES_FILE: &str = "features.json";
/// Metadata file name
pub const METADATA_FILE: &str = "metadata.json";

const FILES: [&str; 3] = [DATA_FILE, FEATURES_FILE, METADATA_FILE];

/// Check that `path` is a folder holding the three files
fn check_folder(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(DsffError::BadInputData(format!("{} is not a folder", path.display())));
    }
    let missing: Vec<&str> = FILES
        .iter()
        .copied()
        .filter(|f| !path.join(f).is_file())
        .collect();
    if !missing.is_empty() {
        return Err(DsffError::BadInputData(format!(
            "not a valid dataset folder (missing: {})",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Rows of a `data.csv` file
pub fn read_data(path: &Path) -> Result<Vec<Vec<Cell>>> {
    csv::read_rows(File::open(path)?)
}

/// Feature descriptions of a `features.json` file
pub fn read_features(path: &Path) -> Result<Features> {
    let value: Value = serde_json::from_reader(File::open(path)?)?;
    Features::from_json(&value)
}

/// Metadata mapping of a `metadata.json` file
pub fn read_metadata(path: &Path) -> Result<Metadata> {
    match serde_json::from_reader::<_, Value>(File::open(path)?)? {
        Value::Object(map) => Ok(map),
        _ => Err(DsffError::BadInputData(format!(
            "{} does not hold a mapping",
            path.display()
        ))),
    }
}

/// Whether the input is a directory holding the three files
pub fn detect(input: &Input, _options: &CodecOptions) -> bool {
    match input {
        Input::Directory(path) => check_folder(path).is_ok(),
        Input::Bytes(_) => false,
    }
}

/// Load the three files of a folder
pub fn load(path: &Path, _options: &CodecOptions) -> Result<Dataset> {
    check_folder(path)?;
    let data = read_data(&path.join(DATA_FILE))?;
    let features = read_features(&path.join(FEATURES_FILE))?;
    let metadata = read_metadata(&path.join(METADATA_FILE))?;
    Ok(Dataset::new(data, features, metadata))
}

/// Write the three files into `path`, creating it if needed
pub fn dump(dataset: &Dataset, sink: Sink<'_>, _options: &CodecOptions) -> Result<Option<Payload>> {
    let Sink::Path(path) = sink else {
        return Err(DsffError::Unsupported(
            "a dataset folder cannot be rendered as text".to_string(),
        ));
    };
    fs::create_dir_all(path)?;
    debug!("making {}...", DATA_FILE);
    fs::write(path.join(DATA_FILE), csv::write_rows(dataset.evaluated_data().iter())?)?;
    debug!("making {}...", FEATURES_FILE);
    fs::write(
        path.join(FEATURES_FILE),
        serde_json::to_string_pretty(&dataset.features)?,
    )?;
    debug!("making {}...", METADATA_FILE);
    fs::write(
        path.join(METADATA_FILE),
        serde_json::to_string_pretty(&dataset.metadata)?,
    )?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_folder_round_trip() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("iris");
        let mut features = Features::new();
        features.insert("a", "first");
        let mut metadata = Metadata::new();
        metadata.insert("k".into(), json!([1, 2]));
        let ds = Dataset::new(vec![row(["a", "b"]), row(["1", "'x'"])], features, metadata);

        dump(&ds, Sink::Path(&target), &CodecOptions::default()).unwrap();
        assert!(detect(&Input::Directory(target.clone()), &CodecOptions::default()));
        assert_eq!(
            fs::read_to_string(target.join(FEATURES_FILE)).unwrap(),
            "{\n  \"a\": \"first\"\n}"
        );

        let back = load(&target, &CodecOptions::default()).unwrap();
        assert_eq!(back.data, vec![row(["a", "b"]), row(["1", "x"])]);
        assert_eq!(back.features, ds.features);
        assert_eq!(back.metadata, ds.metadata);
    }

    #[test]
    fn test_incomplete_folder() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(DATA_FILE), "a;b\n").unwrap();
        assert!(!detect(&Input::Directory(dir.path().to_path_buf()), &CodecOptions::default()));
        let err = load(dir.path(), &CodecOptions::default()).unwrap_err();
        assert!(err.to_string().contains("features.json, metadata.json"));
    }

    #[test]
    fn test_text_sink_unsupported() {
        let err = dump(&Dataset::default(), Sink::Text, &CodecOptions::default()).unwrap_err();
        assert!(matches!(err, DsffError::Unsupported(_)));
    }

    #[test]
    fn test_metadata_must_be_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);
        fs::write(&path, "[1]").unwrap();
        assert!(read_metadata(&path).unwrap_err().is_bad_input());
    }
}
