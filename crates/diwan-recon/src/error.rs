//! Error types for `diwan-recon`.
//!
//! Per-row write failures are not here — they are data, carried in the run
//! summary. These variants cover only what aborts a run before it writes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] diwan_core::Error),

  /// The plan contradicts itself (e.g. a patch pass with two bindings).
  #[error("import plan is not runnable: {0}")]
  Plan(String),

  /// A store failure outside the per-row write path, e.g. loading the
  /// roster at the start of a pass.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(error))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
