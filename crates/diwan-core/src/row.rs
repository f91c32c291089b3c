//! Raw cell and row types for externally-sourced tabular data.
//!
//! Source workbooks are heterogeneous: the same column can hold text in one
//! revision and numbers in the next. Everything read from a sheet lands in
//! [`CellValue`] first, and business logic only ever reaches into a [`RawRow`]
//! through a column index resolved by the column mapper.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── CellValue ───────────────────────────────────────────────────────────────

/// One spreadsheet cell, decoded into one of four shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
  Text(String),
  Number(f64),
  Date(NaiveDate),
  Empty,
}

impl CellValue {
  /// True for [`CellValue::Empty`] and for text that is blank after trimming.
  pub fn is_blank(&self) -> bool {
    match self {
      Self::Empty => true,
      Self::Text(s) => s.trim().is_empty(),
      Self::Number(_) | Self::Date(_) => false,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }
}

impl fmt::Display for CellValue {
  /// Renders the cell the way an operator typed it: integral numbers without
  /// a trailing `.0`, empty cells as the empty string.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Text(s) => f.write_str(s),
      Self::Number(n) if n.fract() == 0.0 && n.is_finite() => {
        write!(f, "{n:.0}")
      }
      Self::Number(n) => write!(f, "{n}"),
      Self::Date(d) => write!(f, "{d}"),
      Self::Empty => Ok(()),
    }
  }
}

// ─── RawRow ──────────────────────────────────────────────────────────────────

/// An ordered sequence of raw cells as read from one sheet row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
  cells: Vec<CellValue>,
}

impl RawRow {
  pub fn new(cells: Vec<CellValue>) -> Self {
    Self { cells }
  }

  /// Cell at `index`. Out-of-range reads yield [`CellValue::Empty`] — short
  /// rows are routine in real exports and must behave like blank cells.
  pub fn get(&self, index: usize) -> &CellValue {
    self.cells.get(index).unwrap_or(&CellValue::Empty)
  }

  pub fn cells(&self) -> &[CellValue] {
    &self.cells
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  /// True when every cell is blank — a structural/spacer row.
  pub fn is_blank(&self) -> bool {
    self.cells.iter().all(CellValue::is_blank)
  }
}

impl From<Vec<CellValue>> for RawRow {
  fn from(cells: Vec<CellValue>) -> Self {
    Self::new(cells)
  }
}
