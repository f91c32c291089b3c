//! Error types for `diwan-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A field marked required in its spec matched no header cell.
  /// Fatal: the run must be rejected before any write.
  #[error("required field {0:?} matched no header column")]
  RequiredColumnMissing(String),

  /// No job-number, card-number, or name binding survived column
  /// resolution, so no row could ever be matched.
  #[error("no match-key column is mapped; refusing to start the run")]
  NoMatchKey,

  #[error("record for relation {relation:?} is missing field {field:?}")]
  MissingField {
    relation: &'static str,
    field:    &'static str,
  },

  #[error("value does not serialize to a record row: {0}")]
  NotARecord(serde_json::Value),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
