//! Declarative description of one import pass.
//!
//! The original system grew one hand-written script per source file, each
//! reimplementing the same match-then-upsert pattern. Here a pass is a value:
//! an [`ImportPlan`] names the match-key columns, the field bindings, and the
//! entity's write policy, and the engine is the only code that executes one.

use std::ops::RangeInclusive;

use serde_json::Value;

use diwan_core::{
  columns::ColumnMap,
  extract::CARD_LEN_RANGE,
  store::Row,
};

use crate::{Error, Result};

// ─── Modes and policies ──────────────────────────────────────────────────────

/// What kind of pass this is. Affects validation and reporting, not the
/// per-row write path — all three funnel into the same classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
  /// Many columns → many fields, whole file.
  FullSync,
  /// One column → one field, whole file.
  SingleFieldPatch,
  /// One identity, operator-supplied field values.
  ManualEdit,
}

/// How writes land when a dependent record already exists for the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
  /// Delete every row for the identity, then insert one fresh row.
  /// Used for salary snapshots, where exactly one row is authoritative.
  Replace,
  /// Update the existing row in place; insert only when none exists.
  Merge,
}

/// Where and how one entity's rows are written.
#[derive(Debug, Clone)]
pub struct EntityPolicy {
  pub relation: String,
  pub write:    WritePolicy,
  /// Fixed key columns beyond `employee_id` that scope a row, e.g.
  /// `("year", 2024)` for yearly records. Applied to both the existence
  /// filter and fresh rows.
  pub scope:    Vec<(String, Value)>,
  /// Column values a fresh row starts from before bindings are applied.
  pub defaults: Row,
  /// Column stamped with the run's start time on every insert.
  pub stamp:    Option<String>,
  /// Whether a [`WritePolicy::Merge`] entity may insert when no row exists
  /// for the identity. The single-field patch tool turns this off: patching
  /// a record that was never imported must not conjure one.
  pub insert_missing: bool,
}

impl EntityPolicy {
  pub fn new(relation: impl Into<String>, write: WritePolicy) -> Self {
    Self {
      relation: relation.into(),
      write,
      scope: vec![],
      defaults: Row::new(),
      stamp: None,
      insert_missing: true,
    }
  }

  pub fn update_only(mut self) -> Self {
    self.insert_missing = false;
    self
  }

  pub fn scoped(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.scope.push((column.into(), value.into()));
    self
  }

  pub fn with_defaults(mut self, defaults: Row) -> Self {
    self.defaults = defaults;
    self
  }

  pub fn stamped(mut self, column: impl Into<String>) -> Self {
    self.stamp = Some(column.into());
    self
  }
}

// ─── Bindings ────────────────────────────────────────────────────────────────

/// How a bound cell is coerced before it lands in the target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
  /// Financial figure; total coercion, blank and unparseable become 0.
  Number,
  /// Small integer counter.
  Count,
  /// Free text; blank becomes null.
  Text,
  /// Digit-string key; canonicalized, blank becomes null.
  Identifier,
}

/// One logical field → one store column, by way of the column map.
///
/// The logical name doubles as the column-map key and the store column name.
/// A binding whose field is absent from the map is skipped for every row —
/// "column absent" is not "value absent".
#[derive(Debug, Clone)]
pub struct FieldBinding {
  pub field: String,
  pub kind:  BindingKind,
}

impl FieldBinding {
  pub fn number(field: impl Into<String>) -> Self {
    Self { field: field.into(), kind: BindingKind::Number }
  }

  pub fn count(field: impl Into<String>) -> Self {
    Self { field: field.into(), kind: BindingKind::Count }
  }

  pub fn text(field: impl Into<String>) -> Self {
    Self { field: field.into(), kind: BindingKind::Text }
  }

  pub fn identifier(field: impl Into<String>) -> Self {
    Self { field: field.into(), kind: BindingKind::Identifier }
  }
}

/// Which logical fields carry the match key, and whether the card-number
/// fallback scan across the whole row is allowed.
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
  pub name:        Option<String>,
  pub job_number:  Option<String>,
  pub card_number: Option<String>,
  /// Scan the whole row for a card-like token when the declared column
  /// yields nothing. Heuristic; hits outside the declared column are logged.
  pub card_scan:   bool,
}

// ─── Plan ────────────────────────────────────────────────────────────────────

/// Everything the engine needs to run one pass. Former import scripts are
/// now functions that build one of these.
#[derive(Debug, Clone)]
pub struct ImportPlan {
  pub mode:       RunMode,
  pub entity:     EntityPolicy,
  pub columns:    ColumnMap,
  pub keys:       KeyBindings,
  pub bindings:   Vec<FieldBinding>,
  pub card_range: RangeInclusive<usize>,
  /// Writes in flight at once; a chunk completes before the next starts.
  pub chunk_size: usize,
}

impl ImportPlan {
  pub fn new(mode: RunMode, entity: EntityPolicy, columns: ColumnMap) -> Self {
    Self {
      mode,
      entity,
      columns,
      keys: KeyBindings::default(),
      bindings: vec![],
      card_range: CARD_LEN_RANGE,
      chunk_size: 16,
    }
  }

  pub fn keys(mut self, keys: KeyBindings) -> Self {
    self.keys = keys;
    self
  }

  pub fn bindings(mut self, bindings: Vec<FieldBinding>) -> Self {
    self.bindings = bindings;
    self
  }

  pub fn chunked(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size.max(1);
    self
  }

  /// Fatal-configuration check, run before any store mutation.
  pub fn validate(&self) -> Result<()> {
    let key_mapped = [&self.keys.name, &self.keys.job_number, &self.keys.card_number]
      .into_iter()
      .flatten()
      .any(|field| self.columns.contains(field));
    if !key_mapped && !self.keys.card_scan {
      return Err(Error::Core(diwan_core::Error::NoMatchKey));
    }

    if self.mode == RunMode::SingleFieldPatch && self.bindings.len() != 1 {
      return Err(Error::Plan(format!(
        "single-field patch needs exactly one binding, got {}",
        self.bindings.len()
      )));
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use diwan_core::{
    columns::{resolve_columns, FieldSpec},
    row::{CellValue, RawRow},
  };

  use super::*;

  fn mapped_columns() -> ColumnMap {
    let header = RawRow::new(vec![
      CellValue::Text("الاسم".into()),
      CellValue::Text("الراتب الاسمي".into()),
    ]);
    resolve_columns(
      &header,
      &[
        FieldSpec::new("full_name", &["الاسم"]),
        FieldSpec::new("nominal_salary", &["الراتب الاسمي"]),
      ],
    )
    .unwrap()
  }

  fn snapshot_entity() -> EntityPolicy {
    EntityPolicy::new("salary_snapshots", WritePolicy::Replace)
  }

  #[test]
  fn plan_without_any_key_binding_is_rejected() {
    let plan = ImportPlan::new(RunMode::FullSync, snapshot_entity(), mapped_columns());
    assert!(matches!(
      plan.validate(),
      Err(Error::Core(diwan_core::Error::NoMatchKey))
    ));
  }

  #[test]
  fn plan_with_a_mapped_name_key_passes() {
    let plan = ImportPlan::new(RunMode::FullSync, snapshot_entity(), mapped_columns())
      .keys(KeyBindings { name: Some("full_name".into()), ..KeyBindings::default() });
    assert!(plan.validate().is_ok());
  }

  #[test]
  fn key_binding_pointing_at_an_unmapped_field_is_rejected() {
    let plan = ImportPlan::new(RunMode::FullSync, snapshot_entity(), mapped_columns())
      .keys(KeyBindings { job_number: Some("job_number".into()), ..KeyBindings::default() });
    assert!(plan.validate().is_err());
  }

  #[test]
  fn patch_mode_requires_exactly_one_binding() {
    let keys = KeyBindings { name: Some("full_name".into()), ..KeyBindings::default() };
    let plan = ImportPlan::new(
      RunMode::SingleFieldPatch,
      snapshot_entity(),
      mapped_columns(),
    )
    .keys(keys)
    .bindings(vec![
      FieldBinding::number("nominal_salary"),
      FieldBinding::number("net_salary"),
    ]);
    assert!(matches!(plan.validate(), Err(Error::Plan(_))));
  }
}
