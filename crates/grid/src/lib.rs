/// Cell addressing and content types for a two-dimensional grid
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod sheet;
pub use sheet::*;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("invalid cell id: {0}")]
    InvalidCellId(String),
    #[error("cell {0} is outside the grid ({1} rows x {2} cols)")]
    OutOfBounds(CellId, u32, u32),
    #[error("row index {0} out of range")]
    RowOutOfRange(u32),
    #[error("column index {0} out of range")]
    ColOutOfRange(u32),
}

/// Zero-based cell coordinate, rendered as "row:col"
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub row: u32,
    pub col: u32,
}

impl CellId {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

impl FromStr for CellId {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, col) = s
            .split_once(':')
            .ok_or_else(|| GridError::InvalidCellId(s.to_string()))?;
        let row = row
            .parse()
            .map_err(|_| GridError::InvalidCellId(s.to_string()))?;
        let col = col
            .parse()
            .map_err(|_| GridError::InvalidCellId(s.to_string()))?;
        Ok(Self { row, col })
    }
}

/// Scalar content of a cell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn number(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Empty => Ok(()),
        }
    }
}
