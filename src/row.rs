use allocative::Allocative;

use crate::error::{DbError, Result};

/// Cell separator in the row file.
pub const CELL_SEPARATOR: char = '\t';

/// One line of a table: cell values in attribute order, `id` first.
///
/// Cells are kept as the exact text that was inserted, so a string literal
/// still carries its quotes.
#[derive(Debug, Clone, PartialEq, Eq, Allocative)]
pub struct Row {
    cells: Vec<String>,
}

impl Row {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    /// Splits one line of the row file into cells.
    pub fn from_line(line: &str) -> Self {
        Self {
            cells: line.split(CELL_SEPARATOR).map(str::to_string).collect(),
        }
    }

    /// Joins the cells back into one row-file line, without a trailing separator.
    pub fn to_line(&self) -> String {
        self.cells.join("\t")
    }

    /// The `id` cell, always the first one.
    pub fn id(&self) -> &str {
        self.cells.first().map(String::as_str).unwrap_or_default()
    }

    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Returns the number of cells in the row.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the row has no cell at all, else false.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn push_cell(&mut self, value: String) {
        self.cells.push(value);
    }

    /// Removes the cell at `index` and returns it.
    ///
    /// # Errors
    /// Returns [DbError::WidthMismatch] if the row is too short.
    pub fn remove_cell(&mut self, index: usize) -> Result<String> {
        if index >= self.len() {
            return Err(DbError::WidthMismatch {
                expected: index + 1,
                found: self.len(),
            });
        }
        Ok(self.cells.remove(index))
    }

    /// Replaces the cell at `index`.
    ///
    /// # Errors
    /// Returns [DbError::WidthMismatch] if the row is too short.
    pub fn set(&mut self, index: usize, value: &str) -> Result<()> {
        let found = self.len();
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(DbError::WidthMismatch {
                expected: index + 1,
                found,
            })?;
        value.clone_into(cell);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> Row {
        Row::new(vec!["1".into(), "'Ann'".into(), "20".into()])
    }

    // ─────────────────────────────────────────────────────────────
    // Test 1 : line codec
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_line_codec() {
        let row = Row::from_line("1\t'Ann Lee'\t20");
        assert_eq!(row.len(), 3);
        assert_eq!(row.id(), "1");
        assert_eq!(row.cell(1), Some("'Ann Lee'"));
        assert_eq!(row.to_line(), "1\t'Ann Lee'\t20");
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : empty placeholder cells survive the codec
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_placeholder_cells() {
        let row = Row::from_line("4\t''\t''");
        assert_eq!(row.cells(), &["4", "''", "''"]);
        assert_eq!(row.to_line(), "4\t''\t''");
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : push and remove keep cell order
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_push_and_remove() {
        let mut row = ann();
        row.push_cell("true".into());
        assert_eq!(row.len(), 4);

        assert_eq!(row.remove_cell(2).unwrap(), "20");
        assert_eq!(row.cells(), &["1", "'Ann'", "true"]);

        assert!(matches!(
            row.remove_cell(3),
            Err(DbError::WidthMismatch { expected: 4, found: 3 })
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 4 : set
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_set() {
        let mut row = ann();
        row.set(2, "22").unwrap();
        assert_eq!(row.cell(2), Some("22"));

        assert!(row.set(9, "x").is_err());
        assert_eq!(row.len(), 3);
        assert!(!row.is_empty());
    }
}
