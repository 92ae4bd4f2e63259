//! # DSFF - DataSet File Format
//!
//! `dsff` bundles a tabular dataset, the descriptions of its features and a
//! free-form metadata mapping into a single file, and converts it to and
//! from common interchange formats.
//!
//! ## Key Features
//!
//! - **Single-file container**: a two-worksheet spreadsheet workbook
//!   (`data`, `features`) whose document description carries the metadata
//!   as JSON.
//!
//! - **Canonical model**: every codec exchanges the same
//!   `{data, features, metadata}` triple ([`model::Dataset`]), with cells
//!   re-typed through a small literal grammar on the way out.
//!
//! - **Codecs**: semicolon-delimited text, attribute-relation text (ARFF),
//!   SQLite databases, Feather, Parquet, ORC and dataset
//!   folders, each with `detect`, `load` and `dump`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dsff::{Dsff, Format, Mode};
//!
//! // Build a container from a CSV file
//! let mut ds = Dsff::open("iris.dsff", Mode::Write)?;
//! ds.from_csv("iris.csv")?;
//! ds.set("source", "UCI repository".into())?;
//! ds.save()?;
//!
//! // Convert it back to other formats
//! ds.to_parquet(None)?;
//! let arff = ds.export_text(Format::Arff)?;
//! println!("{}", arff.as_text().unwrap_or_default());
//! # Ok::<(), dsff::DsffError>(())
//! ```
//!
//! ## Modules
//!
//! - [`model`]: cells, features, metadata, datasets and the literal grammar
//! - [`container`]: the `.dsff` workbook and its invariants
//! - [`formats`]: the codec registry and every codec
//! - [`mod@dsff`]: the [`Dsff`] facade and its [`Mode`]s

#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod constants;
pub mod container;
pub mod dsff;
pub mod error;
pub mod formats;
pub mod model;

pub use crate::dsff::{Dsff, Mode};
pub use error::{DsffError, Result};
pub use formats::{detect_format, CodecOptions, Format};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::container::{Container, Property, PropertyValue, Sheet};
    pub use crate::dsff::{Dsff, Mode};
    pub use crate::error::{DsffError, Result};
    pub use crate::formats::{detect_format, detect_formats, CodecOptions, Format, Input, Payload, Sink};
    pub use crate::model::{eval_cell, row, Cell, Dataset, Features, Metadata};
}
