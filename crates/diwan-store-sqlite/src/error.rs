//! Error type for `diwan-store-sqlite`.

use diwan_core::store::{ErrorKind, StoreFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] diwan_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A relation or column name unfit for dynamic SQL. Names come from
  /// internal constants and vetted configuration, so this indicates a bug
  /// or a hostile profile.
  #[error("invalid identifier {0:?} in dynamic sql")]
  InvalidIdentifier(String),

  #[error("value cannot be stored in a sqlite column: {0}")]
  Unencodable(serde_json::Value),
}

impl StoreFailure for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(e, _),
      )) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
        ErrorKind::Constraint
      }
      _ => ErrorKind::Other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
