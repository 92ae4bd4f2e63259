use crate::model::Cell;

/// A named worksheet: a header row followed by data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Create an empty worksheet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Create a worksheet holding `rows`
    pub fn with_rows(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Worksheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All rows, header included
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Header row, if any
    pub fn header(&self) -> Option<&[Cell]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Header row rendered as strings
    pub fn header_names(&self) -> Vec<String> {
        self.header()
            .map(|h| h.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default()
    }

    /// Number of rows, header included
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell at a zero-based position
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Set a cell, growing the sheet as needed
    pub fn set_cell(&mut self, row: usize, column: usize, cell: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let r = &mut self.rows[row];
        if r.len() <= column {
            r.resize(column + 1, Cell::Empty);
        }
        r[column] = cell;
    }

    /// Replace every row
    pub fn set_rows(&mut self, rows: Vec<Vec<Cell>>) {
        self.rows = rows;
    }

    /// Grow the sheet to at least `count` rows
    pub(crate) fn ensure_rows(&mut self, count: usize) {
        if self.rows.len() < count {
            self.rows.resize_with(count, Vec::new);
        }
    }

    /// Pad every row with missing cells up to the widest one
    pub(crate) fn make_rectangular(&mut self) {
        let width = self.column_count();
        for row in &mut self.rows {
            row.resize(width, Cell::Empty);
        }
    }

    /// Display width of each column: the longest rendered cell
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.column_count()];
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.to_string().chars().count());
            }
        }
        widths
    }
}
