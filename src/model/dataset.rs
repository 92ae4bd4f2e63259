use std::collections::HashSet;

use crate::constants::UNDEFINED_NAME;
use crate::error::{DsffError, Result};

use super::{Cell, Features, Metadata};

/// The canonical `{data, features, metadata}` triple exchanged by every codec
///
/// `data[0]` is the header row; subsequent rows are aligned with it by
/// position. Cells are kept as stored; use [`Dataset::evaluated_data`] for
/// the literal-promoted view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Header row followed by data rows
    pub data: Vec<Vec<Cell>>,
    /// Feature descriptions
    pub features: Features,
    /// Dataset metadata
    pub metadata: Metadata,
    /// Title carried by the source format, if any
    pub title: Option<String>,
}

impl Dataset {
    /// Create a dataset from its three parts
    pub fn new(data: Vec<Vec<Cell>>, features: Features, metadata: Metadata) -> Self {
        Self {
            data,
            features,
            metadata,
            title: None,
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Name of the dataset: its title, else `"undefined"`
    pub fn name(&self) -> &str {
        self.title.as_deref().unwrap_or(UNDEFINED_NAME)
    }

    /// Column names of the header row
    pub fn headers(&self) -> Vec<String> {
        self.data
            .first()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default()
    }

    /// Position of a column in the header row
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers().iter().position(|h| h == name)
    }

    /// Number of rows, header included
    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    /// Rows after the header
    pub fn rows(&self) -> &[Vec<Cell>] {
        self.data.get(1..).unwrap_or(&[])
    }

    /// Whether there is no data row beyond the header
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    /// All rows with text cells promoted through the literal grammar
    pub fn evaluated_data(&self) -> Vec<Vec<Cell>> {
        self.data
            .iter()
            .map(|row| row.iter().map(Cell::evaluated).collect())
            .collect()
    }

    /// Check the table shape: named, unique headers and rows aligned with them
    pub fn validate(&self) -> Result<()> {
        validate_rows(&self.data)
    }
}

/// Check that `rows` form a well-shaped table (see [`Dataset::validate`])
pub(crate) fn validate_rows(rows: &[Vec<Cell>]) -> Result<()> {
    let Some(header) = rows.first() else {
        return Ok(());
    };
    if header.is_empty() {
        return Err(DsffError::BadInputData("header row is empty".to_string()));
    }
    let mut seen = HashSet::new();
    for (i, cell) in header.iter().enumerate() {
        if cell.is_empty() {
            return Err(DsffError::BadInputData(format!("header cell {} is missing", i)));
        }
        let name = cell.to_string();
        if !seen.insert(name.clone()) {
            return Err(DsffError::BadInputData(format!("duplicate column name '{}'", name)));
        }
    }
    for (i, row) in rows.iter().enumerate().skip(1) {
        if row.len() != header.len() {
            return Err(DsffError::BadInputData(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                header.len()
            )));
        }
    }
    Ok(())
}
