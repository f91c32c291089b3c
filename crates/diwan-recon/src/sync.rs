//! Roster synchronization from the legacy employee feed.
//!
//! The feed is authoritative for external keys: an existing identity gains
//! its job or card number when the stored value is absent, and is attached to
//! a department when one resolves uniquely. Names already on file are never
//! overwritten — manual corrections outlive a reimport. Identities are
//! created for unmatched feed entries only when the operator opted in.

use tracing::debug;

use diwan_core::{
  extract::canonical_identifier,
  matcher::{DepartmentIndex, MatchKey, MatchOutcome, Roster},
  model::{Employee, Record},
  row::{CellValue, RawRow},
  store::{Filter, RecordStore, Row, StoreFailure},
};
use serde_json::Value;

use crate::{
  history::HistoryRecorder,
  summary::{RowFailure, RunSummary, Unresolved, UnresolvedReason},
  Error, Result,
};

/// One feed entry, already decoded from the wire format.
#[derive(Debug, Clone, Default)]
pub struct RosterEntry {
  pub job_number:  Option<String>,
  pub card_number: Option<String>,
  pub full_name:   String,
  pub role:        Option<String>,
  pub department:  Option<String>,
}

impl RosterEntry {
  fn match_key(&self) -> MatchKey {
    MatchKey {
      job_number:  self.job_number.as_deref().and_then(canonical_identifier),
      card_number: self.card_number.as_deref().and_then(canonical_identifier),
      name:        (!self.full_name.trim().is_empty())
        .then(|| self.full_name.trim().to_owned()),
    }
  }

  /// The entry rendered as a raw row, so unresolved feed entries carry the
  /// same reviewable payload as unresolved spreadsheet rows.
  fn payload(&self) -> RawRow {
    let cell = |text: &Option<String>| match text {
      Some(t) => CellValue::Text(t.clone()),
      None => CellValue::Empty,
    };
    RawRow::new(vec![
      cell(&self.job_number),
      CellValue::Text(self.full_name.clone()),
      cell(&self.card_number),
      cell(&self.department),
    ])
  }
}

/// Reconcile feed entries into the `employees` relation.
///
/// Writes are sequential — the feed arrives once and is small next to the
/// monthly workbooks. Per-entry store rejections land in the summary like any
/// other row failure.
pub async fn sync_roster<S: RecordStore>(
  store: &S,
  history: &HistoryRecorder<S>,
  entries: &[RosterEntry],
  roster: &Roster,
  departments: &DepartmentIndex,
  create_missing: bool,
) -> Result<RunSummary> {
  let mut summary =
    RunSummary { rows: entries.len(), ..RunSummary::default() };

  for (index, entry) in entries.iter().enumerate() {
    let key = entry.match_key();
    if key.is_blank() {
      summary.skipped += 1;
      continue;
    }

    let department_id = entry.department.as_deref().and_then(|name| {
      match departments.resolve(name) {
        MatchOutcome::Unique(id) => Some(id),
        outcome => {
          debug!(row = index, department = %name, ?outcome, "department did not resolve uniquely");
          None
        }
      }
    });

    match roster.resolve(&key) {
      MatchOutcome::Unique(employee_id) => {
        let result = refresh_identity(
          store,
          history,
          employee_id,
          entry,
          &key,
          department_id.map(|id| id.to_string()),
        )
        .await;
        match result {
          Ok(true) => summary.updated += 1,
          Ok(false) => summary.unchanged += 1,
          Err(failure) => summary.failures.push(RowFailure {
            row_index: Some(index),
            ..failure
          }),
        }
      }
      MatchOutcome::NotFound if create_missing => {
        let mut employee = Employee::new(entry.full_name.trim());
        employee.job_number = key.job_number.clone();
        employee.card_number = key.card_number.clone();
        if let Some(role) = &entry.role {
          employee.role = role.clone();
        }
        employee.department_id = department_id;

        let row = employee.to_row().map_err(Error::from)?;
        match store.insert(Employee::RELATION, vec![row]).await {
          Ok(()) => summary.created += 1,
          Err(error) => summary.failures.push(RowFailure {
            row_index:  Some(index),
            key:        entry.full_name.clone(),
            relation:   Employee::RELATION.to_owned(),
            message:    error.to_string(),
            constraint: error.kind()
              == diwan_core::store::ErrorKind::Constraint,
          }),
        }
      }
      MatchOutcome::NotFound => summary.unresolved.push(Unresolved {
        row_index: index,
        key:       entry.full_name.clone(),
        reason:    UnresolvedReason::NotFound,
        payload:   entry.payload(),
      }),
      MatchOutcome::Ambiguous(candidates) => summary.unresolved.push(Unresolved {
        row_index: index,
        key:       entry.full_name.clone(),
        reason:    UnresolvedReason::Ambiguous { candidates: candidates.len() },
        payload:   entry.payload(),
      }),
    }
  }

  Ok(summary)
}

/// Fill absent external keys and the department link on a matched identity.
/// Returns whether anything was written.
async fn refresh_identity<S: RecordStore>(
  store: &S,
  history: &HistoryRecorder<S>,
  employee_id: uuid::Uuid,
  entry: &RosterEntry,
  key: &MatchKey,
  department_id: Option<String>,
) -> std::result::Result<bool, RowFailure> {
  let fail = |error: &S::Error| RowFailure {
    row_index:  None,
    key:        entry.full_name.clone(),
    relation:   Employee::RELATION.to_owned(),
    message:    error.to_string(),
    constraint: error.kind() == diwan_core::store::ErrorKind::Constraint,
  };

  let rows = store
    .select(
      Employee::RELATION,
      Filter::eq("id", employee_id.to_string()),
      &[],
    )
    .await
    .map_err(|e| fail(&e))?;
  let Some(current) = rows.into_iter().next() else {
    return Ok(false);
  };

  let absent = |column: &str| {
    current
      .get(column)
      .is_none_or(|v| v.is_null() || v.as_str().is_some_and(str::is_empty))
  };

  let mut patch = Row::new();
  if let Some(job) = &key.job_number
    && absent("job_number")
  {
    patch.insert("job_number".into(), Value::String(job.clone()));
  }
  if let Some(card) = &key.card_number
    && absent("card_number")
  {
    patch.insert("card_number".into(), Value::String(card.clone()));
  }
  if let Some(department) = department_id
    && current.get("department_id").map(|v| v.as_str())
      != Some(Some(department.as_str()))
  {
    patch.insert("department_id".into(), Value::String(department));
  }

  if patch.is_empty() {
    return Ok(false);
  }

  store
    .update(
      Employee::RELATION,
      patch.clone(),
      Filter::eq("id", employee_id.to_string()),
    )
    .await
    .map_err(|e| fail(&e))?;

  for (field, new_value) in &patch {
    let old_value = current.get(field).unwrap_or(&Value::Null);
    history
      .record(
        Employee::RELATION,
        employee_id,
        field,
        crate::history::display_value(old_value),
        crate::history::display_value(new_value),
      )
      .await;
  }
  Ok(true)
}
