//! Field-level change auditing.
//!
//! Every tracked update appends old and new value to `field_changes`. The
//! append is best-effort: a history failure is logged and swallowed, never
//! allowed to block or roll back the primary write it accompanies.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use diwan_core::{
  model::{FieldChange, Record},
  store::{Filter, RecordStore},
};

/// Render a column value the way an operator typed it: integral numbers
/// without a trailing `.0`, null as absent.
pub fn display_value(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => match n.as_f64() {
      Some(f) if f.fract() == 0.0 && f.is_finite() => Some(format!("{f:.0}")),
      _ => Some(n.to_string()),
    },
    other => Some(other.to_string()),
  }
}

/// Appends [`FieldChange`] rows on behalf of one actor.
pub struct HistoryRecorder<S> {
  store: Arc<S>,
  actor: String,
}

impl<S> Clone for HistoryRecorder<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), actor: self.actor.clone() }
  }
}

impl<S: RecordStore> HistoryRecorder<S> {
  pub fn new(store: Arc<S>, actor: impl Into<String>) -> Self {
    Self { store, actor: actor.into() }
  }

  /// Fire-and-forget append. `record_id` is the owning identity, which stays
  /// stable across delete-then-insert replacement of the underlying row.
  pub async fn record(
    &self,
    table: &str,
    record_id: Uuid,
    field: &str,
    old_value: Option<String>,
    new_value: Option<String>,
  ) {
    let entry = FieldChange {
      id: Uuid::new_v4(),
      table_name: table.to_owned(),
      record_id,
      field: field.to_owned(),
      old_value,
      new_value,
      actor: self.actor.clone(),
      changed_at: Utc::now(),
    };

    let row = match entry.to_row() {
      Ok(row) => row,
      Err(error) => {
        warn!(%table, %field, %error, "unrecordable field change");
        return;
      }
    };

    if let Err(error) = self.store.insert(FieldChange::RELATION, vec![row]).await
    {
      warn!(%table, %record_id, %field, %error, "failed to append field change");
    }
  }

  /// All entries for one (table, record, field), newest first.
  pub async fn changes_for(
    &self,
    table: &str,
    record_id: Uuid,
    field: &str,
  ) -> Result<Vec<FieldChange>, S::Error> {
    let filter = Filter::eq("table_name", table)
      .and("record_id", record_id.to_string())
      .and("field", field);
    let rows = self.store.select(FieldChange::RELATION, filter, &[]).await?;

    let mut entries: Vec<FieldChange> = rows
      .into_iter()
      .filter_map(|row| FieldChange::from_row(row).ok())
      .collect();
    entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
    Ok(entries)
  }
}
