//! The `RecordStore` trait and supporting filter types.
//!
//! The trait is implemented by storage backends (e.g. `diwan-store-sqlite`).
//! The reconciliation engine and the CLI depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use serde_json::Value;

/// One stored row: column name → JSON value.
pub type Row = serde_json::Map<String, Value>;

// ─── Filter ──────────────────────────────────────────────────────────────────

/// A conjunction of column-equality terms. The empty filter matches
/// every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
  terms: Vec<(String, Value)>,
}

impl Filter {
  /// Matches every row in the relation.
  pub fn all() -> Self {
    Self::default()
  }

  pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::default().and(column, value)
  }

  pub fn and(
    mut self,
    column: impl Into<String>,
    value: impl Into<Value>,
  ) -> Self {
    self.terms.push((column.into(), value.into()));
    self
  }

  pub fn terms(&self) -> &[(String, Value)] {
    &self.terms
  }

  pub fn is_empty(&self) -> bool {
    self.terms.is_empty()
  }

  /// Row-side evaluation of the same predicate the store applies.
  /// An absent column never equals anything except JSON null.
  pub fn matches(&self, row: &Row) -> bool {
    self
      .terms
      .iter()
      .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
  }
}

// ─── Failure classification ──────────────────────────────────────────────────

/// Broad classification of a store failure. Per-row write errors are policy
/// decisions for the caller: a constraint violation means the row conflicts
/// with existing data, anything else means the store itself misbehaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A uniqueness or referential constraint rejected the write.
  Constraint,
  /// Connectivity, serialization, corruption — not the row's fault.
  Other,
}

/// Implemented by backend error types so callers can classify failures
/// without knowing the backend.
pub trait StoreFailure {
  fn kind(&self) -> ErrorKind;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a relational record store.
///
/// Relations are addressed by name, rows are JSON maps, and filters are
/// conjunctions of column equalities — the narrow surface the reconciliation
/// pipeline actually needs.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tasks in multi-threaded async runtimes.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + StoreFailure + Send + Sync + 'static;

  /// Rows matching `filter`, projected to `columns` (empty slice = all
  /// columns). Row order is unspecified.
  fn select<'a>(
    &'a self,
    relation: &'a str,
    filter: Filter,
    columns: &'a [&'a str],
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + 'a;

  fn insert<'a>(
    &'a self,
    relation: &'a str,
    rows: Vec<Row>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Apply `patch` to every row matching `filter`; returns the affected
  /// row count.
  fn update<'a>(
    &'a self,
    relation: &'a str,
    patch: Row,
    filter: Filter,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Delete every row matching `filter`; returns the affected row count.
  fn delete<'a>(
    &'a self,
    relation: &'a str,
    filter: Filter,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Insert rows, replacing the non-key columns of any existing row that
  /// collides on `conflict_key` (comma-separated column list). Requires a
  /// matching uniqueness constraint in the backend.
  fn upsert<'a>(
    &'a self,
    relation: &'a str,
    rows: Vec<Row>,
    conflict_key: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
