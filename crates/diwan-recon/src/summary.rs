//! What a run reports back to the operator.
//!
//! The three non-write outcomes mean three different corrective actions:
//! not-found means fix the source data, ambiguous means disambiguate
//! manually, a store rejection means fix the schema or permissions. The
//! summary keeps them distinguishable instead of folding them into one
//! "errors" number.

use diwan_core::row::RawRow;

// ─── Unresolved rows ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
  /// No roster entry satisfied any tier.
  NotFound,
  /// More than one entry satisfied a tier; writing would guess.
  Ambiguous { candidates: usize },
}

/// A row the run classified but refused to write, kept whole for review.
#[derive(Debug, Clone)]
pub struct Unresolved {
  pub row_index: usize,
  /// The extracted match key, as the operator would recognize it.
  pub key:       String,
  pub reason:    UnresolvedReason,
  pub payload:   RawRow,
}

// ─── Failed writes ───────────────────────────────────────────────────────────

/// A store-rejected write, with enough context to find the row again.
#[derive(Debug, Clone)]
pub struct RowFailure {
  pub row_index:  Option<usize>,
  pub key:        String,
  pub relation:   String,
  pub message:    String,
  /// True when the store reported a constraint violation rather than a
  /// connectivity or internal failure.
  pub constraint: bool,
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Counters and retained context for one complete pass. A run always returns
/// one of these, even when a fraction of its rows failed.
#[derive(Debug, Default)]
pub struct RunSummary {
  pub rows:       usize,
  pub created:    usize,
  pub updated:    usize,
  /// Resolved rows whose write would have changed nothing.
  pub unchanged:  usize,
  /// Blank or keyless rows; structural, not failures.
  pub skipped:    usize,
  /// Rows shadowed by a later row for the same identity in the same file.
  /// Only the last mention of an identity is written.
  pub superseded: usize,
  /// Non-blank cells that failed numeric coercion and defaulted to zero.
  pub defaulted_numbers: usize,
  pub unresolved: Vec<Unresolved>,
  pub failures:   Vec<RowFailure>,
}

impl RunSummary {
  pub fn not_found(&self) -> usize {
    self
      .unresolved
      .iter()
      .filter(|u| u.reason == UnresolvedReason::NotFound)
      .count()
  }

  pub fn ambiguous(&self) -> usize {
    self.unresolved.len() - self.not_found()
  }

  pub fn failed(&self) -> usize {
    self.failures.len()
  }

  /// True when every row either landed or was structurally skipped.
  pub fn is_clean(&self) -> bool {
    self.unresolved.is_empty() && self.failures.is_empty()
  }
}
