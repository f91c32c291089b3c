//! Error types for `diwan-sheets`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("workbook error: {0}")]
  Workbook(#[from] calamine::Error),

  #[error("worksheet {0:?} not found")]
  SheetNotFound(String),

  #[error("worksheet {sheet:?} has no row {row} to use as a header")]
  HeaderRowMissing { sheet: String, row: usize },

  #[error("xml error: {0}")]
  Xml(String),

  #[error("unknown text encoding label {0:?}")]
  UnknownEncoding(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
