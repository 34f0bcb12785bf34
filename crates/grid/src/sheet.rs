/// Local sheet model with structural (shape-changing) mutations.
/// Row/column insert and delete are index-based read-modify-write over
/// the whole cell map, which is why callers must serialize them.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{CellId, CellValue, GridError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    rows: u32,
    cols: u32,
    cells: HashMap<CellId, CellValue>,
}

impl Sheet {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            cells: HashMap::new(),
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Content of a cell; absent entries read as Empty.
    pub fn value(&self, cell: CellId) -> CellValue {
        self.cells.get(&cell).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, cell: CellId, value: CellValue) -> Result<(), GridError> {
        if cell.row >= self.rows || cell.col >= self.cols {
            return Err(GridError::OutOfBounds(cell, self.rows, self.cols));
        }
        if value.is_empty() {
            self.cells.remove(&cell);
        } else {
            self.cells.insert(cell, value);
        }
        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Insert an empty row before `at`, shifting rows >= `at` down.
    pub fn insert_row(&mut self, at: u32) -> Result<(), GridError> {
        if at > self.rows {
            return Err(GridError::RowOutOfRange(at));
        }
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .map(|(mut id, v)| {
                if id.row >= at {
                    id.row += 1;
                }
                (id, v)
            })
            .collect();
        self.rows += 1;
        Ok(())
    }

    /// Delete row `at`, dropping its cells and shifting rows > `at` up.
    pub fn delete_row(&mut self, at: u32) -> Result<(), GridError> {
        if at >= self.rows {
            return Err(GridError::RowOutOfRange(at));
        }
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .filter(|(id, _)| id.row != at)
            .map(|(mut id, v)| {
                if id.row > at {
                    id.row -= 1;
                }
                (id, v)
            })
            .collect();
        self.rows -= 1;
        Ok(())
    }

    /// Insert an empty column before `at`, shifting columns >= `at` right.
    pub fn insert_col(&mut self, at: u32) -> Result<(), GridError> {
        if at > self.cols {
            return Err(GridError::ColOutOfRange(at));
        }
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .map(|(mut id, v)| {
                if id.col >= at {
                    id.col += 1;
                }
                (id, v)
            })
            .collect();
        self.cols += 1;
        Ok(())
    }

    /// Delete column `at`, dropping its cells and shifting columns > `at` left.
    pub fn delete_col(&mut self, at: u32) -> Result<(), GridError> {
        if at >= self.cols {
            return Err(GridError::ColOutOfRange(at));
        }
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .filter(|(id, _)| id.col != at)
            .map(|(mut id, v)| {
                if id.col > at {
                    id.col -= 1;
                }
                (id, v)
            })
            .collect();
        self.cols -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_with_values() -> Sheet {
        let mut sheet = Sheet::new(3, 3);
        sheet.set(CellId::new(0, 0), CellValue::text("a")).unwrap();
        sheet.set(CellId::new(1, 1), CellValue::text("b")).unwrap();
        sheet.set(CellId::new(2, 2), CellValue::text("c")).unwrap();
        sheet
    }

    #[test]
    fn test_set_and_read_back() {
        let mut sheet = Sheet::new(2, 2);
        let cell = CellId::new(0, 1);

        sheet.set(cell, CellValue::number(42.0)).unwrap();
        assert_eq!(sheet.value(cell), CellValue::number(42.0));

        // Writing Empty removes the entry
        sheet.set(cell, CellValue::Empty).unwrap();
        assert_eq!(sheet.value(cell), CellValue::Empty);
        assert_eq!(sheet.cell_count(), 0);
    }

    #[test]
    fn test_set_out_of_bounds() {
        let mut sheet = Sheet::new(2, 2);
        let result = sheet.set(CellId::new(5, 0), CellValue::text("x"));
        assert!(matches!(result, Err(GridError::OutOfBounds(..))));
    }

    #[test]
    fn test_insert_row_shifts_down() {
        let mut sheet = sheet_with_values();
        sheet.insert_row(1).unwrap();

        assert_eq!(sheet.rows(), 4);
        // Row 0 untouched, rows 1 and 2 moved to 2 and 3
        assert_eq!(sheet.value(CellId::new(0, 0)), CellValue::text("a"));
        assert_eq!(sheet.value(CellId::new(1, 1)), CellValue::Empty);
        assert_eq!(sheet.value(CellId::new(2, 1)), CellValue::text("b"));
        assert_eq!(sheet.value(CellId::new(3, 2)), CellValue::text("c"));
    }

    #[test]
    fn test_delete_row_drops_and_shifts_up() {
        let mut sheet = sheet_with_values();
        sheet.delete_row(1).unwrap();

        assert_eq!(sheet.rows(), 2);
        assert_eq!(sheet.value(CellId::new(0, 0)), CellValue::text("a"));
        // "b" lived on the deleted row
        assert_eq!(sheet.cell_count(), 2);
        assert_eq!(sheet.value(CellId::new(1, 2)), CellValue::text("c"));
    }

    #[test]
    fn test_insert_col_shifts_right() {
        let mut sheet = sheet_with_values();
        sheet.insert_col(0).unwrap();

        assert_eq!(sheet.cols(), 4);
        assert_eq!(sheet.value(CellId::new(0, 1)), CellValue::text("a"));
        assert_eq!(sheet.value(CellId::new(1, 2)), CellValue::text("b"));
        assert_eq!(sheet.value(CellId::new(2, 3)), CellValue::text("c"));
    }

    #[test]
    fn test_delete_col_drops_and_shifts_left() {
        let mut sheet = sheet_with_values();
        sheet.delete_col(2).unwrap();

        assert_eq!(sheet.cols(), 2);
        assert_eq!(sheet.cell_count(), 2);
        assert_eq!(sheet.value(CellId::new(0, 0)), CellValue::text("a"));
        assert_eq!(sheet.value(CellId::new(1, 1)), CellValue::text("b"));
    }

    #[test]
    fn test_structural_bounds_checks() {
        let mut sheet = Sheet::new(2, 2);
        assert!(sheet.insert_row(3).is_err());
        assert!(sheet.delete_row(2).is_err());
        assert!(sheet.insert_col(3).is_err());
        assert!(sheet.delete_col(2).is_err());
    }
}
