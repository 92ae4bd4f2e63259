//! Format codecs and the registry that dispatches to them.
//!
//! Every supported external format exposes the same three entry points,
//! gathered in a [`Codec`]:
//!
//! - `detect`: best-effort sniff of raw bytes (or a directory); never fails
//! - `load`: parse a file into a canonical [`Dataset`]
//! - `dump`: serialize a [`Dataset`] to a file, or to an in-memory [`Payload`]
//!
//! | Format | Module | Payload |
//! |---|---|---|
//! | `arff` | [`arff`] | text |
//! | `csv` | [`csv`] | text |
//! | `db` | [`db`] | SQL text / SQLite file |
//! | `feather`, `orc`, `parquet` | [`columnar`] (ORC codec in `orc`) | binary |
//! | dataset folder | [`folder`] | directory only |
//!
//! [`detect_format`] tries every codec in a fixed order and returns the first
//! match.

pub mod arff;
pub mod columnar;
pub mod csv;
pub mod db;
pub mod folder;
mod options;
mod orc;


pub use options::CodecOptions;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;

use crate::error::{DsffError, Result};
use crate::model::Dataset;

/// A supported external format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Attribute-relation text (Weka)
    Arff,
    /// Semicolon-delimited text
    Csv,
    /// SQLite database file
    Db,
    /// Arrow IPC file
    Feather,
    /// Optimized row columnar file
    Orc,
    /// Parquet file
    Parquet,
    /// `data.csv` + `features.json` + `metadata.json` folder
    Folder,
}

impl Format {
    /// Every format, in detection order
    pub const ALL: [Format; 7] = [
        Format::Folder,
        Format::Db,
        Format::Parquet,
        Format::Feather,
        Format::Orc,
        Format::Arff,
        Format::Csv,
    ];

    /// Lowercase identifier
    pub fn name(self) -> &'static str {
        match self {
            Self::Arff => "arff",
            Self::Csv => "csv",
            Self::Db => "db",
            Self::Feather => "feather",
            Self::Orc => "orc",
            Self::Parquet => "parquet",
            Self::Folder => "dataset",
        }
    }

    /// File extension without the dot; empty for the folder format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Folder => "",
            other => other.name(),
        }
    }

    /// Format for a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "sqlite" | "sqlite3" => Some(Self::Db),
            "" => None,
            _ => Self::ALL.into_iter().find(|f| f.extension() == ext),
        }
    }

    /// Format suggested by a path: existing directories are folders, files go by extension
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.is_dir() {
            return Some(Self::Folder);
        }
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the format produces binary payloads
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Feather | Self::Orc | Self::Parquet)
    }

    /// Codec implementing the format
    pub fn codec(self) -> Codec {
        match self {
            Self::Arff => Codec {
                format: self,
                detect: arff::detect,
                load: arff::load,
                dump: arff::dump,
            },
            Self::Csv => Codec {
                format: self,
                detect: csv::detect,
                load: csv::load,
                dump: csv::dump,
            },
            Self::Db => Codec {
                format: self,
                detect: db::detect,
                load: db::load,
                dump: db::dump,
            },
            Self::Feather => columnar::FEATHER.codec(),
            Self::Orc => columnar::ORC.codec(),
            Self::Parquet => columnar::PARQUET.codec(),
            Self::Folder => Codec {
                format: self,
                detect: folder::detect,
                load: folder::load,
                dump: folder::dump,
            },
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = DsffError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        if lower == "folder" {
            return Ok(Self::Folder);
        }
        Self::ALL
            .into_iter()
            .find(|f| f.name() == lower)
            .or_else(|| Self::from_extension(&lower))
            .ok_or_else(|| DsffError::Unsupported(format!("unknown format '{}'", s)))
    }
}

/// Probe input: raw bytes, or a directory for the folder format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// File content or literal payload
    Bytes(Vec<u8>),
    /// An existing directory
    Directory(PathBuf),
}

/// Characters that rule a string out as a path
const NON_PATH_CHARS: [char; 6] = ['<', '>', '"', '|', '?', '*'];

impl Input {
    /// Interpret `text` as a path when it plausibly is one and exists, else as the payload itself
    pub fn from_text_or_path(text: &str) -> Self {
        let plausible = !text.is_empty()
            && !text.contains(|c: char| c.is_control() || NON_PATH_CHARS.contains(&c));
        if plausible {
            let path = Path::new(text);
            if path.is_dir() {
                return Self::Directory(path.to_path_buf());
            }
            if path.is_file() {
                if let Ok(bytes) = fs::read(path) {
                    return Self::Bytes(bytes);
                }
            }
        }
        Self::Bytes(text.as_bytes().to_vec())
    }

    /// Read a file (or take a directory) as probe input
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        if !path.exists() {
            return Err(DsffError::NotFound(path.to_path_buf()));
        }
        Ok(Self::Bytes(fs::read(path)?))
    }

    /// Raw bytes, if any
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Directory(_) => None,
        }
    }

    /// Bytes decoded as UTF-8, if valid
    pub fn text(&self) -> Option<&str> {
        self.bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Input {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// Serialized dataset returned by a text-sink dump
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Textual formats
    Text(String),
    /// Binary formats
    Binary(Vec<u8>),
}

impl Payload {
    /// Raw bytes of the payload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(t) => t.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// Text of the payload, if textual
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Binary(_) => None,
        }
    }

    /// Consume into raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(t) => t.into_bytes(),
            Self::Binary(b) => b,
        }
    }
}

/// Destination of a dump
#[derive(Debug, Clone, Copy)]
pub enum Sink<'a> {
    /// Write to this file (or folder)
    Path(&'a Path),
    /// Return the payload instead of writing it
    Text,
}

/// Detection function of a codec
pub type DetectFn = fn(&Input, &CodecOptions) -> bool;
/// Load function of a codec
pub type LoadFn = fn(&Path, &CodecOptions) -> Result<Dataset>;
/// Dump function of a codec
pub type DumpFn = fn(&Dataset, Sink<'_>, &CodecOptions) -> Result<Option<Payload>>;

/// The `{detect, load, dump}` entry points of one format
#[derive(Clone, Copy)]
pub struct Codec {
    /// Format implemented
    pub format: Format,
    /// Best-effort sniff
    pub detect: DetectFn,
    /// File → dataset
    pub load: LoadFn,
    /// Dataset → file or payload
    pub dump: DumpFn,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("format", &self.format).finish()
    }
}

impl Codec {
    /// Run the detector on `input`
    pub fn detect(&self, input: &Input, options: &CodecOptions) -> bool {
        (self.detect)(input, options)
    }

    /// Load `path`, failing with `NotFound` when it does not exist
    pub fn load(&self, path: &Path, options: &CodecOptions) -> Result<Dataset> {
        if !path.exists() {
            return Err(DsffError::NotFound(path.to_path_buf()));
        }
        debug!("loading {} from {}", self.format, path.display());
        (self.load)(path, options)
    }

    /// Dump `dataset`
    pub fn dump(&self, dataset: &Dataset, sink: Sink<'_>, options: &CodecOptions) -> Result<Option<Payload>> {
        debug!("dumping dataset '{}' as {}", dataset.name(), self.format);
        (self.dump)(dataset, sink, options)
    }
}

/// First format (in [`Format::ALL`] order) whose detector accepts `input`
pub fn detect_format(input: &Input, options: &CodecOptions) -> Option<Format> {
    Format::ALL
        .into_iter()
        .find(|f| f.codec().detect(input, options))
}

/// Every format whose detector accepts `input`
pub fn detect_formats(input: &Input, options: &CodecOptions) -> Vec<Format> {
    Format::ALL
        .into_iter()
        .filter(|f| f.codec().detect(input, options))
        .collect()
}

/// Write a text or binary payload to `path`, replacing any previous file
pub(crate) fn write_payload(path: &Path, payload: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, payload)?;
    Ok(())
}

/// Deliver a serialized payload to `sink`
pub(crate) fn deliver(sink: Sink<'_>, payload: Payload) -> Result<Option<Payload>> {
    match sink {
        Sink::Text => Ok(Some(payload)),
        Sink::Path(path) => {
            write_payload(path, payload.as_bytes())?;
            Ok(None)
        }
    }
}
