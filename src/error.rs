use std::path::PathBuf;

/// Errors that can occur while handling DSFF containers and converting datasets
#[derive(Debug, thiserror::Error)]
pub enum DsffError {
    /// The file is not a valid DSFF container (undecodable archive or broken invariants)
    #[error("Invalid DSFF container: {0}")]
    InvalidContainer(String),

    /// Malformed payload supplied to a write or load operation
    #[error("Bad input data: {0}")]
    BadInputData(String),

    /// Export attempted on a dataset without any data row
    #[error("Empty dataset: nothing to export")]
    EmptyDataset,

    /// Property or metadata lookup miss
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Attempt to set a worksheet name as a property
    #[error("'{0}' is a name reserved for a worksheet")]
    ReservedName(String),

    /// Required input path does not exist
    #[error("No such file or directory: {}", .0.display())]
    NotFound(PathBuf),

    /// Attribute-relation parsing failure
    #[error("Line {line}: {reason}")]
    Parse {
        /// 1-based line number of the offending line
        line: usize,
        /// Human-readable reason
        reason: String,
    },

    /// A format lacks a usable entry point
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Illegal mode string, or a mode that needs a path
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// Mutation attempted on a dataset opened read-only
    #[error("Dataset is opened read-only")]
    ReadOnly,

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the ZIP container library
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error while reading workbook XML parts
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Error serializing/deserializing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Error reported by a columnar backend without a dedicated variant
    #[error("Columnar backend error: {0}")]
    Columnar(String),
}

impl DsffError {
    /// Build a parse error for a 1-based line number
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Whether the error means a required path was missing
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Whether the error is an invalid-container failure
    pub fn is_invalid_container(&self) -> bool {
        matches!(self, Self::InvalidContainer(_))
    }

    /// Whether the error is a bad-input failure (including attribute-relation parse errors)
    pub fn is_bad_input(&self) -> bool {
        matches!(self, Self::BadInputData(_) | Self::Parse { .. })
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, DsffError>;
