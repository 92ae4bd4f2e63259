//! # Canonical Model
//!
//! The in-memory representation every codec produces and consumes:
//!
//! - [`Cell`]: a scalar cell (missing, boolean, integer, float or text)
//! - [`Features`]: ordered column name → description mapping
//! - [`Metadata`]: JSON-compatible key → value mapping
//! - [`Dataset`]: the `{data, features, metadata}` triple
//!
//! Cells persisted as text are re-typed on the way out with [`eval_cell`],
//! a small literal grammar documented in [`literal`].

mod cell;
mod dataset;
mod features;
pub mod literal;

#[cfg(test)]
mod tests;

pub use cell::Cell;
pub(crate) use cell::format_float;
pub use dataset::Dataset;
pub(crate) use dataset::validate_rows;
pub use features::Features;
pub use literal::{eval_cell, parse_literal};

/// Dataset metadata: string keys to arbitrary JSON values, in insertion order
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Convenience constructor for a row of cells
///
/// ```
/// use dsff::model::{row, Cell};
///
/// let r = row(["a", "b"]);
/// assert_eq!(r, vec![Cell::text("a"), Cell::text("b")]);
/// ```
pub fn row<I, T>(cells: I) -> Vec<Cell>
where
    I: IntoIterator<Item = T>,
    T: Into<Cell>,
{
    cells.into_iter().map(Into::into).collect()
}
