//! Excel workbook reading over in-memory bytes.
//!
//! The payroll system exports `.xls` and `.xlsx` interchangeably, so format
//! detection is automatic. Cells are mapped straight into the core
//! [`CellValue`] union; nothing downstream ever sees a calamine type.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use tracing::debug;

use diwan_core::row::{CellValue, RawRow};

use crate::{Error, Result};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Which worksheet to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
  Index(usize),
  Name(String),
}

impl Default for SheetSelector {
  fn default() -> Self {
    Self::Index(0)
  }
}

/// Worksheet selection plus the header position. Source files sometimes
/// carry a title row above the headers, so the header row is configurable.
#[derive(Debug, Clone, Default)]
pub struct SheetOptions {
  pub sheet:      SheetSelector,
  pub header_row: usize,
}

/// A worksheet split into its header row and the data rows below it. Rows
/// above the header (title rows) are discarded.
#[derive(Debug, Clone)]
pub struct SheetRows {
  pub header: RawRow,
  pub rows:   Vec<RawRow>,
}

// ─── Workbook ────────────────────────────────────────────────────────────────

/// An open workbook over uploaded bytes.
pub struct Workbook {
  inner: Sheets<Cursor<Vec<u8>>>,
  names: Vec<String>,
}

impl Workbook {
  pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
    let inner = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let names = inner.sheet_names().to_vec();
    debug!(sheets = names.len(), "workbook opened");
    Ok(Self { inner, names })
  }

  pub fn sheet_names(&self) -> &[String] {
    &self.names
  }

  /// Read one worksheet into raw rows.
  pub fn read_sheet(&mut self, options: &SheetOptions) -> Result<SheetRows> {
    let name = match &options.sheet {
      SheetSelector::Name(name) => {
        if !self.names.iter().any(|n| n == name) {
          return Err(Error::SheetNotFound(name.clone()));
        }
        name.clone()
      }
      SheetSelector::Index(index) => self
        .names
        .get(*index)
        .cloned()
        .ok_or_else(|| Error::SheetNotFound(format!("#{index}")))?,
    };

    let range = self.inner.worksheet_range(&name)?;
    let mut all: Vec<RawRow> = range
      .rows()
      .map(|cells| RawRow::new(cells.iter().map(cell_value).collect()))
      .collect();

    if options.header_row >= all.len() {
      return Err(Error::HeaderRowMissing {
        sheet: name,
        row:   options.header_row,
      });
    }

    let rows = all.split_off(options.header_row + 1);
    let header = all.pop().unwrap_or_default();
    debug!(sheet = %name, rows = rows.len(), "worksheet read");
    Ok(SheetRows { header, rows })
  }
}

/// Decode one calamine cell. Dates keep their calendar value; booleans
/// become 0/1 figures; cell-level errors read as empty, like a blank cell.
fn cell_value(data: &Data) -> CellValue {
  match data {
    Data::Empty | Data::Error(_) => CellValue::Empty,
    Data::String(s) => CellValue::Text(s.clone()),
    Data::Float(f) => CellValue::Number(*f),
    Data::Int(i) => CellValue::Number(*i as f64),
    Data::Bool(b) => CellValue::Number(f64::from(*b)),
    Data::DateTime(dt) => match dt.as_datetime() {
      Some(naive) => CellValue::Date(naive.date()),
      None => CellValue::Number(dt.as_f64()),
    },
    Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scalar_cells_map_to_the_core_union() {
    assert_eq!(
      cell_value(&Data::String("علي".into())),
      CellValue::Text("علي".into())
    );
    assert_eq!(cell_value(&Data::Float(500_000.0)), CellValue::Number(500_000.0));
    assert_eq!(cell_value(&Data::Int(42)), CellValue::Number(42.0));
    assert_eq!(cell_value(&Data::Bool(true)), CellValue::Number(1.0));
    assert_eq!(cell_value(&Data::Empty), CellValue::Empty);
  }

  #[test]
  fn error_cells_read_as_empty() {
    assert_eq!(
      cell_value(&Data::Error(calamine::CellErrorType::Div0)),
      CellValue::Empty
    );
  }

  #[test]
  fn iso_datetime_strings_stay_text() {
    assert_eq!(
      cell_value(&Data::DateTimeIso("2024-06-01T00:00:00".into())),
      CellValue::Text("2024-06-01T00:00:00".into())
    );
  }
}
