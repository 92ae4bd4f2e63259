//! # DSFF Container
//!
//! A DSFF file is a spreadsheet workbook with exactly two worksheets,
//! `data` and `features`, whose document `description` property carries
//! the JSON-encoded metadata mapping.
//!
//! [`Container`] owns the decoded workbook: it enforces the structural
//! invariants on open, resolves properties (worksheet, document property,
//! then metadata), tracks unsaved changes and writes the package back.
//!
//! ```rust,no_run
//! use dsff::container::Container;
//! use dsff::model::row;
//!
//! let mut container = Container::create(Some("iris.dsff".into()));
//! container.write_data(vec![row(["a", "b"]), row(["1", "2"])])?;
//! container.set_property("source", "field survey".into())?;
//! container.save()?;
//! # Ok::<(), dsff::DsffError>(())
//! ```

mod properties;
mod sheet;
pub(crate) mod xlsx;


pub use properties::{DocumentProperties, Property, PropertyValue, DOCUMENT_PROPERTY_NAMES};
pub use sheet::Sheet;

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info};
use serde_json::Value;
use zip::ZipArchive;

use crate::constants::{
    DEFAULT_CREATOR, DESCRIPTION_FIELD_KEY, FEATURES_HEADER, IN_MEMORY, RESERVED_METADATA_KEYS,
    SHEET_NAMES, UNDEFINED_NAME,
};
use crate::error::{DsffError, Result};
use crate::model::{row, validate_rows, Cell, Dataset, Features, Metadata};

/// Creator recorded by the spreadsheet library the format originated with
const FOREIGN_DEFAULT_CREATOR: &str = "openpyxl";

/// Name of the user running the process, for the `creator` property
fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| DEFAULT_CREATOR.to_string())
}

/// Whether `path` designates no file at all
pub fn is_in_memory(path: Option<&Path>) -> bool {
    path.map_or(true, |p| p.as_os_str() == IN_MEMORY)
}

/// A decoded DSFF workbook
#[derive(Debug, Clone)]
pub struct Container {
    path: Option<PathBuf>,
    read_only: bool,
    data: Sheet,
    features: Sheet,
    properties: DocumentProperties,
    metadata: Metadata,
    name: Option<String>,
    dirty: bool,
}

impl Container {
    /// Create an empty container bound to `path` (`None` or `<memory>` for in-memory)
    ///
    /// Both worksheets start with empty header rows.
    pub fn create(path: Option<PathBuf>) -> Self {
        let properties = DocumentProperties {
            created: Some(Utc::now()),
            ..Default::default()
        };
        Self {
            path: path.filter(|p| !is_in_memory(Some(p))),
            read_only: false,
            data: Sheet::new(SHEET_NAMES[0]),
            features: Sheet::new(SHEET_NAMES[1]),
            properties,
            metadata: Metadata::new(),
            name: None,
            dirty: false,
        }
    }

    /// Open and validate the container stored at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DsffError::NotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let mut container = Self::from_bytes(&bytes)?;
        container.path = Some(path.to_path_buf());
        info!(
            "opened DSFF container {} ({} data rows)",
            path.display(),
            container.row_count().saturating_sub(1)
        );
        Ok(container)
    }

    /// Decode and validate an in-memory container
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DsffError::InvalidContainer(format!("not a workbook archive ({})", e)))?;
        let workbook = xlsx::read_workbook(&mut archive).map_err(|e| match e {
            DsffError::InvalidContainer(_) => e,
            other => DsffError::InvalidContainer(other.to_string()),
        })?;

        let names: Vec<&str> = workbook.sheets.iter().map(Sheet::name).collect();
        if names != SHEET_NAMES {
            return Err(DsffError::InvalidContainer(format!(
                "expected worksheets {:?}, found {:?}",
                SHEET_NAMES, names
            )));
        }
        let mut sheets = workbook.sheets.into_iter();
        let (Some(data), Some(features)) = (sheets.next(), sheets.next()) else {
            return Err(DsffError::InvalidContainer("missing worksheets".to_string()));
        };
        if features.header().is_some() && features.header_names() != FEATURES_HEADER {
            return Err(DsffError::InvalidContainer(format!(
                "features header must be {:?}, found {:?}",
                FEATURES_HEADER,
                features.header_names()
            )));
        }

        let metadata = match workbook.properties.description.as_deref().map(str::trim) {
            None | Some("") => Metadata::new(),
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                _ => {
                    return Err(DsffError::InvalidContainer(
                        "the description property does not hold a JSON object".to_string(),
                    ))
                }
            },
        };

        Ok(Self {
            path: None,
            read_only: false,
            data,
            features,
            properties: workbook.properties,
            metadata,
            name: None,
            dirty: false,
        })
    }

    /// Encode the container; the description property carries the metadata
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut properties = self.properties.clone();
        properties.description = Some(serde_json::to_string(&self.metadata)?);
        let out = xlsx::write_workbook(
            Cursor::new(Vec::new()),
            &[&self.data, &self.features],
            &properties,
        )?;
        Ok(out.into_inner())
    }

    /// Backing file, `None` when in-memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rebind the container to another file
    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path.filter(|p| !is_in_memory(Some(p)));
    }

    /// Whether mutations are refused
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Refuse (or allow) mutations and saves
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the container as modified
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(DsffError::ReadOnly);
        }
        Ok(())
    }

    /// Name: explicit override, else title, else file stem, else `undefined`
    pub fn name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.properties.title.clone().filter(|t| !t.is_empty()))
            .or_else(|| {
                self.path
                    .as_ref()
                    .and_then(|p| p.file_stem())
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| UNDEFINED_NAME.to_string())
    }

    /// Override the name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
        self.dirty = true;
    }

    /// Whether the name still falls back to the path or `undefined`
    pub fn has_default_name(&self) -> bool {
        self.name.is_none() && self.properties.title.as_deref().map_or(true, str::is_empty)
    }

    /// Document properties
    pub fn properties(&self) -> &DocumentProperties {
        &self.properties
    }

    /// The `data` worksheet
    pub fn data_sheet(&self) -> &Sheet {
        &self.data
    }

    /// The `features` worksheet
    pub fn features_sheet(&self) -> &Sheet {
        &self.features
    }

    /// Number of rows of the `data` worksheet, header included
    pub fn row_count(&self) -> usize {
        self.data.row_count()
    }

    /// Resolve a property: worksheet, then document property, then metadata
    ///
    /// `description` is never resolved as a document property since it
    /// holds the serialized metadata.
    pub fn get_property(&self, name: &str) -> Result<Property<'_>> {
        if name == SHEET_NAMES[0] {
            return Ok(Property::Sheet(&self.data));
        }
        if name == SHEET_NAMES[1] {
            return Ok(Property::Sheet(&self.features));
        }
        if name != DESCRIPTION_FIELD_KEY {
            if let Some(value) = self.properties.get(name) {
                return Ok(Property::Document(value));
            }
        }
        self.metadata
            .get(name)
            .cloned()
            .map(Property::Metadata)
            .ok_or_else(|| DsffError::KeyNotFound(name.to_string()))
    }

    /// Set a property; document properties are mirrored into the metadata
    pub fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        self.check_writable()?;
        if SHEET_NAMES.contains(&name) {
            return Err(DsffError::ReservedName(name.to_string()));
        }
        if name != DESCRIPTION_FIELD_KEY {
            self.properties.set(name, &value)?;
        }
        self.metadata.insert(name.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    /// Replace the `data` worksheet; the first row is the header
    pub fn write_data(&mut self, rows: Vec<Vec<Cell>>) -> Result<()> {
        self.check_writable()?;
        validate_rows(&rows)?;
        debug!("writing {} rows to the data worksheet", rows.len());
        self.data.set_rows(rows);
        self.dirty = true;
        Ok(())
    }

    /// Replace the `features` worksheet
    pub fn write_features(&mut self, features: &Features) -> Result<()> {
        self.check_writable()?;
        let mut rows = vec![row(FEATURES_HEADER)];
        rows.extend(features.iter().map(|(name, description)| row([name, description])));
        self.features.set_rows(rows);
        self.dirty = true;
        Ok(())
    }

    /// Replace the metadata mapping
    pub fn write_metadata(&mut self, metadata: Metadata) -> Result<()> {
        self.check_writable()?;
        self.metadata = metadata;
        self.dirty = true;
        Ok(())
    }

    /// Data rows with text cells promoted through the literal grammar
    pub fn data(&self) -> Vec<Vec<Cell>> {
        self.data
            .rows()
            .iter()
            .map(|r| r.iter().map(Cell::evaluated).collect())
            .collect()
    }

    /// Feature descriptions, from the `features` worksheet rows after its header
    pub fn features(&self) -> Features {
        self.features
            .rows()
            .iter()
            .skip(1)
            .filter_map(|r| {
                let name = r.first().filter(|c| !c.is_empty())?.to_string();
                let description = r.get(1).map(|c| c.to_string()).unwrap_or_default();
                Some((name, description))
            })
            .collect()
    }

    /// User metadata, without the bookkeeping keys
    pub fn metadata(&self) -> Metadata {
        self.metadata
            .iter()
            .filter(|(k, _)| !RESERVED_METADATA_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Full metadata mapping as stored
    pub fn raw_metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Snapshot as a dataset (stored cells, user metadata, name as title)
    pub fn to_dataset(&self) -> Dataset {
        Dataset::new(self.data.rows().to_vec(), self.features(), self.metadata()).with_title(self.name())
    }

    /// Persist pending changes to the backing file
    ///
    /// Stamps `creator`, `title` and `modified`, then rewrites the file
    /// from scratch. Returns `false` when nothing was written: no pending
    /// change, read-only, or in-memory.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty || self.read_only {
            return Ok(false);
        }
        let Some(path) = self.path.clone() else {
            debug!("in-memory container, nothing to save");
            return Ok(false);
        };

        let default_creator = self
            .properties
            .creator
            .as_deref()
            .map_or(true, |c| c == DEFAULT_CREATOR || c == FOREIGN_DEFAULT_CREATOR);
        if default_creator {
            self.properties.creator = Some(current_user());
        }
        self.properties.title = Some(self.name());
        self.properties.modified = Some(Utc::now());

        let bytes = self.to_bytes()?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        info!("saved DSFF container to {}", path.display());
        self.dirty = false;
        Ok(true)
    }
}
