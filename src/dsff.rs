//! # Dataset Facade
//!
//! [`Dsff`] is the object users interact with: it opens or creates a
//! container according to a [`Mode`], writes datasets into it, and
//! converts it from and to every registered [`Format`].
//!
//! ```rust,no_run
//! use dsff::{Dsff, Mode};
//!
//! let mut ds = Dsff::open("iris.dsff", Mode::Write)?;
//! ds.from_csv("iris.csv")?;
//! ds.to_arff(None)?;
//! ds.close()?;
//! # Ok::<(), dsff::DsffError>(())
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info};
use serde_json::Value;

use crate::constants::DSFF_EXTENSION;
use crate::container::{is_in_memory, Container, Property};
use crate::error::{DsffError, Result};
use crate::formats::{folder, CodecOptions, Format, Payload, Sink};
use crate::model::{Cell, Dataset, Features, Metadata};

/// Lifecycle mode of a [`Dsff`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// `r`: existing file, no mutation
    Read,
    /// `r+`: existing file, read-write
    ReadWrite,
    /// `w`: create, deleting any existing file right away
    Write,
    /// `w+`: create, replacing any existing file on save
    Create,
}

impl Mode {
    /// Mode string
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::ReadWrite => "r+",
            Self::Write => "w",
            Self::Create => "w+",
        }
    }

    /// Whether the mode opens an existing file
    pub fn requires_existing(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = DsffError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(Self::Read),
            "r+" => Ok(Self::ReadWrite),
            "w" => Ok(Self::Write),
            "w+" => Ok(Self::Create),
            other => Err(DsffError::InvalidMode(format!(
                "'{}' (expected r, r+, w or w+)",
                other
            ))),
        }
    }
}

/// Append the container extension when missing
fn with_dsff_extension(path: &Path) -> PathBuf {
    if path.extension().map_or(false, |e| e == DSFF_EXTENSION) {
        return path.to_path_buf();
    }
    let mut raw = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(DSFF_EXTENSION);
    PathBuf::from(raw)
}

/// A DSFF dataset bound to a container
#[derive(Debug)]
pub struct Dsff {
    container: Container,
    mode: Mode,
    options: CodecOptions,
}

macro_rules! format_methods {
    ($($format:expr => $from:ident, $to:ident;)*) => {
        impl Dsff {
            $(
                #[doc = concat!("Import a `", stringify!($format), "` source (see [`Dsff::import`])")]
                pub fn $from(&mut self, path: impl AsRef<Path>) -> Result<()> {
                    self.import($format, path)
                }

                #[doc = concat!("Export as `", stringify!($format), "` (see [`Dsff::export`])")]
                pub fn $to(&self, path: Option<&Path>) -> Result<PathBuf> {
                    self.export($format, path)
                }
            )*
        }
    };
}

format_methods! {
    Format::Arff => from_arff, to_arff;
    Format::Csv => from_csv, to_csv;
    Format::Db => from_db, to_db;
    Format::Feather => from_feather, to_feather;
    Format::Orc => from_orc, to_orc;
    Format::Parquet => from_parquet, to_parquet;
    Format::Folder => from_dataset, to_dataset;
}

impl Dsff {
    /// Open `path` (`<memory>` for an in-memory dataset) in `mode`
    ///
    /// Paths get the `.dsff` extension appended when missing.
    pub fn open(path: impl AsRef<Path>, mode: Mode) -> Result<Self> {
        Self::new(Some(path.as_ref()), mode)
    }

    /// Parse the mode string first, then open
    pub fn open_with_mode(path: Option<&Path>, mode: &str) -> Result<Self> {
        let mode = mode.parse()?;
        Self::new(path, mode)
    }

    /// In-memory dataset that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            container: Container::create(None),
            mode: Mode::Write,
            options: CodecOptions::default(),
        }
    }

    /// Open or create a dataset; `None` and `<memory>` are in-memory
    pub fn new(path: Option<&Path>, mode: Mode) -> Result<Self> {
        let path = path
            .filter(|p| !is_in_memory(Some(p)))
            .map(with_dsff_extension);
        let container = match (mode, path) {
            (Mode::Read | Mode::ReadWrite, None) => {
                return Err(DsffError::InvalidMode(format!(
                    "mode '{}' needs the path of an existing file",
                    mode
                )))
            }
            (Mode::Read | Mode::ReadWrite, Some(path)) => {
                let mut container = Container::open(path)?;
                container.set_read_only(mode == Mode::Read);
                container
            }
            (Mode::Write, Some(path)) => {
                if path.exists() {
                    debug!("removing {}", path.display());
                    fs::remove_file(&path)?;
                }
                Container::create(Some(path))
            }
            (_, path) => Container::create(path),
        };
        Ok(Self {
            container,
            mode,
            options: CodecOptions::default(),
        })
    }

    /// Use these codec options for imports and exports
    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Codec options in use
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Mode the dataset was opened in
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Underlying container
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Backing file, `None` when in-memory
    pub fn path(&self) -> Option<&Path> {
        self.container.path()
    }

    /// Dataset name
    pub fn name(&self) -> String {
        self.container.name()
    }

    /// Rename the dataset
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.check_writable()?;
        self.container.set_name(name);
        Ok(())
    }

    /// Rows of the `data` worksheet, header included
    pub fn row_count(&self) -> usize {
        self.container.row_count()
    }

    /// Evaluated data rows, header included
    pub fn data(&self) -> Vec<Vec<Cell>> {
        self.container.data()
    }

    /// Column names
    pub fn headers(&self) -> Vec<String> {
        self.container.data_sheet().header_names()
    }

    /// Feature descriptions
    pub fn features(&self) -> Features {
        self.container.features()
    }

    /// User metadata
    pub fn metadata(&self) -> Metadata {
        self.container.metadata()
    }

    /// Resolve a worksheet, document property or metadata key
    pub fn get(&self, name: &str) -> Result<Property<'_>> {
        self.container.get_property(name)
    }

    /// Set a document property and/or metadata key
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        self.container.set_property(name, value)
    }

    fn check_writable(&self) -> Result<()> {
        if self.mode == Mode::Read {
            return Err(DsffError::ReadOnly);
        }
        Ok(())
    }

    /// Replace any of the three parts; `None` leaves a part untouched
    pub fn write(
        &mut self,
        data: Option<Vec<Vec<Cell>>>,
        features: Option<&Features>,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        self.check_writable()?;
        if let Some(rows) = data {
            debug!("writing data to DSFF...");
            self.container.write_data(rows)?;
        }
        if let Some(features) = features {
            debug!("writing features to DSFF...");
            self.container.write_features(features)?;
        }
        if let Some(metadata) = metadata {
            debug!("writing metadata to DSFF...");
            self.container.write_metadata(metadata)?;
        }
        Ok(())
    }

    /// Write the three parts of a dataset
    pub fn write_dataset(&mut self, dataset: &Dataset) -> Result<()> {
        self.write(
            Some(dataset.data.clone()),
            Some(&dataset.features),
            Some(dataset.metadata.clone()),
        )
    }

    /// Write from files: a dataset folder, a `data.csv`, a `features.json`
    /// or a `metadata.json`
    pub fn write_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DsffError::NotFound(path.to_path_buf()));
        }
        if path.is_dir() {
            let dataset = Format::Folder.codec().load(path, &self.options)?;
            return self.write_dataset(&dataset);
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(folder::DATA_FILE) => self.write(Some(folder::read_data(path)?), None, None),
            Some(folder::FEATURES_FILE) => self.write(None, Some(&folder::read_features(path)?), None),
            Some(folder::METADATA_FILE) => self.write(None, None, Some(folder::read_metadata(path)?)),
            _ => Err(DsffError::BadInputData(format!(
                "{} is neither a dataset folder nor one of its files",
                path.display()
            ))),
        }
    }

    /// Load `path` as `format` and write it into the container
    ///
    /// A title carried by the source (the ARFF relation) becomes the name;
    /// otherwise an in-memory dataset without a name adopts the file stem.
    pub fn import(&mut self, format: Format, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.check_writable()?;
        let dataset = format.codec().load(path, &self.options)?;
        self.write_dataset(&dataset)?;
        if let Some(title) = dataset.title.as_deref().filter(|t| !t.is_empty()) {
            self.container.set_name(title);
        } else if self.container.path().is_none() && self.container.has_default_name() {
            if let Some(stem) = path.file_stem() {
                self.container.set_name(stem.to_string_lossy());
            }
        }
        info!("imported {} rows from {}", dataset.row_count(), path.display());
        Ok(())
    }

    fn check_not_empty(&self) -> Result<()> {
        if self.row_count() <= 1 {
            return Err(DsffError::EmptyDataset);
        }
        Ok(())
    }

    /// Default export destination: the name plus the format extension
    pub fn fix_path(&self, format: Format) -> PathBuf {
        let name = self.name();
        match format.extension() {
            "" => PathBuf::from(name),
            ext => PathBuf::from(format!("{}.{}", name, ext)),
        }
    }

    /// Export to `path` (or [`Dsff::fix_path`]) and return the destination
    pub fn export(&self, format: Format, path: Option<&Path>) -> Result<PathBuf> {
        self.check_not_empty()?;
        let destination = path.map_or_else(|| self.fix_path(format), Path::to_path_buf);
        format
            .codec()
            .dump(&self.container.to_dataset(), Sink::Path(&destination), &self.options)?;
        info!("exported {} to {}", format, destination.display());
        Ok(destination)
    }

    /// Export as an in-memory payload
    pub fn export_text(&self, format: Format) -> Result<Payload> {
        self.check_not_empty()?;
        format
            .codec()
            .dump(&self.container.to_dataset(), Sink::Text, &self.options)?
            .ok_or_else(|| DsffError::Unsupported(format!("{} has no text rendering", format)))
    }

    /// Persist pending changes; `false` when nothing was written
    pub fn save(&mut self) -> Result<bool> {
        self.container.save()
    }

    /// Save, then release the container
    pub fn close(mut self) -> Result<()> {
        self.save()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_mode_strings() {
        for mode in [Mode::Read, Mode::ReadWrite, Mode::Write, Mode::Create] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        assert!(matches!("a".parse::<Mode>(), Err(DsffError::InvalidMode(_))));
    }

    #[test]
    fn test_invalid_mode_fails_before_storage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.dsff");
        assert!(Dsff::open_with_mode(Some(path.as_path()), "rw").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_read_modes_need_existing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(Dsff::new(None, Mode::Read), Err(DsffError::InvalidMode(_))));
        assert!(matches!(
            Dsff::new(Some(Path::new("<memory>")), Mode::ReadWrite),
            Err(DsffError::InvalidMode(_))
        ));
        let err = Dsff::open(dir.path().join("absent"), Mode::Read).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_extension_appended() {
        assert_eq!(with_dsff_extension(Path::new("a/b")), PathBuf::from("a/b.dsff"));
        assert_eq!(with_dsff_extension(Path::new("a/b.csv")), PathBuf::from("a/b.csv.dsff"));
        assert_eq!(with_dsff_extension(Path::new("b.dsff")), PathBuf::from("b.dsff"));
    }

    #[test]
    fn test_write_then_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.dsff");
        let mut ds = Dsff::open(&path, Mode::Write).unwrap();
        let mut features = Features::new();
        features.insert("h1", "first");
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("test"));
        ds.write(
            Some(vec![row(["h1", "h2"]), row(["1", "true"])]),
            Some(&features),
            Some(metadata.clone()),
        )
        .unwrap();
        ds.close().unwrap();

        let ds = Dsff::open(&path, Mode::Read).unwrap();
        assert_eq!(ds.name(), "sample");
        assert_eq!(ds.data()[1], vec![Cell::Int(1), Cell::Bool(true)]);
        assert_eq!(ds.features(), features);
        assert_eq!(ds.metadata(), metadata);
        assert!(matches!(ds.get("source").unwrap().to_json(), Value::String(s) if s == "test"));
    }

    #[test]
    fn test_read_mode_refuses_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ro.dsff");
        let mut ds = Dsff::open(&path, Mode::Write).unwrap();
        ds.write(Some(vec![row(["a"]), row(["1"])]), None, None).unwrap();
        ds.close().unwrap();

        let mut ds = Dsff::open(&path, Mode::Read).unwrap();
        assert!(matches!(ds.write(None, None, Some(Metadata::new())), Err(DsffError::ReadOnly)));
        assert!(matches!(ds.set("title", json!("x")), Err(DsffError::ReadOnly)));
        assert!(matches!(ds.import(Format::Csv, &path), Err(DsffError::ReadOnly)));
        assert!(!ds.save().unwrap());
    }

    #[test]
    fn test_write_mode_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dsff");
        let mut ds = Dsff::open(&path, Mode::Write).unwrap();
        ds.write(Some(vec![row(["a"]), row(["1"])]), None, None).unwrap();
        ds.close().unwrap();
        assert!(path.exists());

        let ds = Dsff::open(&path, Mode::Write).unwrap();
        assert!(!path.exists());
        assert_eq!(ds.row_count(), 0);

        let ds = Dsff::open(&path, Mode::Create).unwrap();
        assert_eq!(ds.row_count(), 0);
    }

    #[test]
    fn test_empty_dataset_export() {
        let mut ds = Dsff::in_memory();
        assert!(matches!(ds.export_text(Format::Csv), Err(DsffError::EmptyDataset)));
        ds.write(Some(vec![row(["a", "b"])]), None, None).unwrap();
        for format in Format::ALL {
            assert!(matches!(ds.export(format, None), Err(DsffError::EmptyDataset)));
        }
    }

    #[test]
    fn test_import_adopts_name() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("iris.csv");
        fs::write(&csv, "a;b\n1;x\n").unwrap();

        let mut ds = Dsff::in_memory();
        assert_eq!(ds.name(), "undefined");
        ds.from_csv(&csv).unwrap();
        assert_eq!(ds.name(), "iris");
        assert_eq!(ds.fix_path(Format::Arff), PathBuf::from("iris.arff"));
        assert_eq!(ds.fix_path(Format::Folder), PathBuf::from("iris"));

        let mut named = Dsff::in_memory();
        named.set_name("kept").unwrap();
        named.from_csv(&csv).unwrap();
        assert_eq!(named.name(), "kept");
    }

    #[test]
    fn test_arff_relation_names_the_dataset() {
        let dir = tempdir().unwrap();
        let arff = dir.path().join("x.arff");
        fs::write(&arff, "@RELATION \"iris\"\n\n@ATTRIBUTE a NUMERIC\n\n@DATA\n1\n2\n").unwrap();

        let mut ds = Dsff::in_memory();
        ds.from_arff(&arff).unwrap();
        assert_eq!(ds.name(), "iris");
        assert!(!ds.metadata().contains_key("title"));

        // the relation wins over the container file stem too
        let mut stored = Dsff::open(dir.path().join("other"), Mode::Create).unwrap();
        stored.from_arff(&arff).unwrap();
        stored.close().unwrap();
        let reopened = Dsff::open(dir.path().join("other.dsff"), Mode::Read).unwrap();
        assert_eq!(reopened.name(), "iris");
    }

    #[test]
    fn test_export_and_text() {
        let dir = tempdir().unwrap();
        let mut ds = Dsff::in_memory();
        ds.write(Some(vec![row(["h1", "h2"]), row(["1", "true"])]), None, None)
            .unwrap();
        let out = ds.to_csv(Some(dir.path().join("out.csv").as_path())).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "h1;h2\n1;True\n");
        let text = ds.export_text(Format::Csv).unwrap();
        assert_eq!(text.as_text(), Some("h1;h2\n1;True\n"));
        assert!(matches!(ds.export_text(Format::Folder), Err(DsffError::Unsupported(_))));
    }

    #[test]
    fn test_write_path() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("set");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("data.csv"), "a;b\n1;2\n").unwrap();
        fs::write(folder.join("features.json"), "{\"a\": \"first\"}").unwrap();
        fs::write(folder.join("metadata.json"), "{\"k\": [1]}").unwrap();

        let mut ds = Dsff::in_memory();
        ds.write_path(&folder).unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.features().get("a"), Some("first"));
        assert_eq!(ds.metadata().get("k"), Some(&json!([1])));

        let mut ds = Dsff::in_memory();
        ds.write_path(folder.join("metadata.json")).unwrap();
        assert_eq!(ds.row_count(), 0);
        assert_eq!(ds.metadata().get("k"), Some(&json!([1])));

        let other = dir.path().join("notes.txt");
        fs::write(&other, "x").unwrap();
        assert!(ds.write_path(&other).unwrap_err().is_bad_input());
        assert!(ds.write_path(dir.path().join("nope")).unwrap_err().is_not_found());
    }
}
