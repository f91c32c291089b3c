//! The reconciliation engine: one parameterized import pass.
//!
//! Per row: extract the match key, resolve it against the roster, and apply
//! the entity's write policy for the resolved identity. Classification is
//! synchronous and sequential; writes go out in bounded concurrent chunks,
//! each chunk fully awaited before the next starts. At most one write task
//! exists per resolved identity — when a file mentions an identity twice,
//! the later row wins and the earlier ones are reported as superseded.
//!
//! A run always completes. Per-row store rejections are captured in the
//! summary with their row context; only a fatal plan-configuration error
//! propagates, and it does so before any store mutation.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use diwan_core::{
  extract::{find_card_like_token, parse_identifier, parse_number, try_parse_number},
  matcher::{MatchKey, MatchOutcome, Roster},
  row::{CellValue, RawRow},
  store::{Filter, RecordStore, Row, StoreFailure},
};

use crate::{
  history::{display_value, HistoryRecorder},
  plan::{BindingKind, EntityPolicy, ImportPlan, WritePolicy},
  summary::{RowFailure, RunSummary, Unresolved, UnresolvedReason},
  Result,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What one applied write did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
  Created,
  Updated,
  /// The record already held exactly these values; nothing was written.
  Unchanged,
}

/// One resolved row, queued for its write chunk.
#[derive(Debug, Clone)]
struct RowTask {
  index:    Option<usize>,
  employee: Uuid,
  key:      String,
  patch:    Row,
  /// Bound fields whose column is absent from this file. Under a replace
  /// policy their stored values are carried over into the fresh row instead
  /// of falling back to entity defaults — "column absent" must never zero a
  /// field that "value absent" would have filled.
  preserve: Vec<String>,
}

// ─── Importer ────────────────────────────────────────────────────────────────

/// Executes [`ImportPlan`]s against one store.
pub struct Importer<S> {
  store:   Arc<S>,
  history: HistoryRecorder<S>,
}

impl<S: RecordStore + 'static> Importer<S> {
  pub fn new(store: Arc<S>, history: HistoryRecorder<S>) -> Self {
    Self { store, history }
  }

  /// Run one full pass over `rows`. `roster` is read once by the caller and
  /// stays read-only for the run's duration.
  pub async fn run(
    &self,
    rows: &[RawRow],
    plan: &ImportPlan,
    roster: &Roster,
  ) -> Result<RunSummary> {
    plan.validate()?;

    let mut summary = RunSummary { rows: rows.len(), ..RunSummary::default() };
    let mut work: Vec<RowTask> = Vec::new();
    let preserve: Vec<String> = plan
      .bindings
      .iter()
      .filter(|binding| !plan.columns.contains(&binding.field))
      .map(|binding| binding.field.clone())
      .collect();

    for (index, row) in rows.iter().enumerate() {
      if row.is_blank() {
        summary.skipped += 1;
        continue;
      }

      let (key, label) = extract_key(row, plan);
      if key.is_blank() {
        debug!(row = index, "no match key extracted, skipping row");
        summary.skipped += 1;
        continue;
      }

      match roster.resolve(&key) {
        MatchOutcome::Unique(employee) => {
          let patch = extract_patch(row, plan, &mut summary);
          work.push(RowTask {
            index: Some(index),
            employee,
            key: label,
            patch,
            preserve: preserve.clone(),
          });
        }
        MatchOutcome::Ambiguous(candidates) => {
          debug!(row = index, key = %label, candidates = candidates.len(), "ambiguous match");
          summary.unresolved.push(Unresolved {
            row_index: index,
            key:       label,
            reason:    UnresolvedReason::Ambiguous { candidates: candidates.len() },
            payload:   row.clone(),
          });
        }
        MatchOutcome::NotFound => {
          debug!(row = index, key = %label, "no roster match");
          summary.unresolved.push(Unresolved {
            row_index: index,
            key:       label,
            reason:    UnresolvedReason::NotFound,
            payload:   row.clone(),
          });
        }
      }
    }

    // One write task per identity. Two replace tasks for the same identity
    // in one chunk would interleave their delete-then-insert and leave a
    // second row behind; the later file row wins, exactly as it would under
    // a sequential pass over the same file.
    let resolved = work.len();
    work.reverse();
    let mut seen = HashSet::new();
    work.retain(|task| seen.insert(task.employee));
    work.reverse();
    summary.superseded = resolved - work.len();
    if summary.superseded > 0 {
      debug!(
        count = summary.superseded,
        "duplicate identities in one file, later rows win"
      );
    }

    let started = Utc::now();
    for chunk in work.chunks(plan.chunk_size) {
      let mut batch = JoinSet::new();
      for task in chunk {
        let store = Arc::clone(&self.store);
        let history = self.history.clone();
        let entity = plan.entity.clone();
        let task = task.clone();
        batch.spawn(async move {
          apply(store, history, entity, started, task).await
        });
      }

      while let Some(joined) = batch.join_next().await {
        match joined {
          Ok(Ok(WriteOutcome::Created)) => summary.created += 1,
          Ok(Ok(WriteOutcome::Updated)) => summary.updated += 1,
          Ok(Ok(WriteOutcome::Unchanged)) => summary.unchanged += 1,
          Ok(Err(failure)) => {
            warn!(
              row = ?failure.row_index,
              key = %failure.key,
              relation = %failure.relation,
              message = %failure.message,
              "row write failed"
            );
            summary.failures.push(failure);
          }
          Err(join_error) => summary.failures.push(RowFailure {
            row_index:  None,
            key:        String::new(),
            relation:   plan.entity.relation.clone(),
            message:    join_error.to_string(),
            constraint: false,
          }),
        }
      }
      debug!(size = chunk.len(), "write chunk complete");
    }

    info!(
      rows = summary.rows,
      created = summary.created,
      updated = summary.updated,
      unchanged = summary.unchanged,
      skipped = summary.skipped,
      superseded = summary.superseded,
      not_found = summary.not_found(),
      ambiguous = summary.ambiguous(),
      failed = summary.failed(),
      defaulted = summary.defaulted_numbers,
      relation = %plan.entity.relation,
      "import pass complete"
    );
    Ok(summary)
  }

  /// Apply one operator-supplied patch to one already-resolved identity —
  /// the manual-edit path. Same write policy and history as a full pass.
  pub async fn apply_one(
    &self,
    employee: Uuid,
    entity: &EntityPolicy,
    patch: Row,
  ) -> std::result::Result<WriteOutcome, RowFailure> {
    let task = RowTask {
      index: None,
      employee,
      key: employee.to_string(),
      patch,
      preserve: vec![],
    };
    apply(
      Arc::clone(&self.store),
      self.history.clone(),
      entity.clone(),
      Utc::now(),
      task,
    )
    .await
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Pull the match key out of one row, plus a display label for reporting.
fn extract_key(row: &RawRow, plan: &ImportPlan) -> (MatchKey, String) {
  let mut key = MatchKey::default();

  if let Some(field) = &plan.keys.job_number
    && let Some(column) = plan.columns.get(field)
  {
    key.job_number = parse_identifier(row.get(column));
  }

  let declared_card = plan
    .keys
    .card_number
    .as_ref()
    .and_then(|field| plan.columns.get(field));
  if let Some(column) = declared_card {
    key.card_number = parse_identifier(row.get(column));
  }
  if key.card_number.is_none()
    && plan.keys.card_scan
    && let Some(hit) = find_card_like_token(row, declared_card, &plan.card_range)
  {
    if hit.from_fallback(declared_card) {
      debug!(column = hit.column, token = %hit.token, "card token found by fallback row scan");
    }
    key.card_number = Some(hit.token);
  }

  if let Some(field) = &plan.keys.name
    && let Some(column) = plan.columns.get(field)
  {
    let text = row.get(column).to_string();
    let text = text.trim();
    if !text.is_empty() {
      key.name = Some(text.to_owned());
    }
  }

  let label = key
    .name
    .clone()
    .or_else(|| key.job_number.clone())
    .or_else(|| key.card_number.clone())
    .unwrap_or_default();
  (key, label)
}

/// Coerce every bound, mapped cell into the write patch. Bindings whose field
/// is absent from the column map are skipped for the whole run — the column
/// is not in this file, which is different from a blank cell.
fn extract_patch(
  row: &RawRow,
  plan: &ImportPlan,
  summary: &mut RunSummary,
) -> Row {
  let mut patch = Row::new();
  for binding in &plan.bindings {
    let Some(column) = plan.columns.get(&binding.field) else {
      continue;
    };
    let cell = row.get(column);
    let value = match binding.kind {
      BindingKind::Number => {
        Value::from(coerce_number(cell, &binding.field, summary))
      }
      BindingKind::Count => {
        Value::from(coerce_number(cell, &binding.field, summary) as i64)
      }
      BindingKind::Text => {
        let text = cell.to_string();
        let text = text.trim();
        if text.is_empty() {
          Value::Null
        } else {
          Value::String(text.to_owned())
        }
      }
      BindingKind::Identifier => parse_identifier(cell)
        .map(Value::String)
        .unwrap_or(Value::Null),
    };
    patch.insert(binding.field.clone(), value);
  }
  patch
}

/// Total numeric coercion with the defaulted-to-zero counter bumped for
/// every non-blank cell the parser could not read.
fn coerce_number(
  cell: &CellValue,
  field: &str,
  summary: &mut RunSummary,
) -> f64 {
  if !cell.is_blank() && try_parse_number(cell).is_none() {
    debug!(field = %field, cell = %cell, "unparseable number defaulted to 0");
    summary.defaulted_numbers += 1;
  }
  parse_number(cell)
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Column equality across numeric representations: the store may hand back an
/// integer where the patch carries a float of the same magnitude.
fn values_equal(a: &Value, b: &Value) -> bool {
  match (a.as_f64(), b.as_f64()) {
    (Some(x), Some(y)) => x == y,
    _ => a == b,
  }
}

fn identity_filter(entity: &EntityPolicy, employee: Uuid) -> Filter {
  let mut filter = Filter::eq("employee_id", employee.to_string());
  for (column, value) in &entity.scope {
    filter = filter.and(column.clone(), value.clone());
  }
  filter
}

/// A fresh row for this identity: defaults, then scope, then identity and
/// stamp columns, then the extracted patch on top.
fn fresh_row(
  entity: &EntityPolicy,
  employee: Uuid,
  stamp: DateTime<Utc>,
  patch: &Row,
) -> Row {
  let mut row = entity.defaults.clone();
  for (column, value) in &entity.scope {
    row.insert(column.clone(), value.clone());
  }
  row.insert("id".to_owned(), Value::String(Uuid::new_v4().to_string()));
  row.insert("employee_id".to_owned(), Value::String(employee.to_string()));
  if let Some(column) = &entity.stamp {
    row.insert(column.clone(), Value::String(stamp.to_rfc3339()));
  }
  for (column, value) in patch {
    row.insert(column.clone(), value.clone());
  }
  row
}

fn store_failure<E>(task: &RowTask, relation: &str, error: &E) -> RowFailure
where
  E: std::error::Error + StoreFailure,
{
  RowFailure {
    row_index:  task.index,
    key:        task.key.clone(),
    relation:   relation.to_owned(),
    message:    error.to_string(),
    constraint: error.kind() == diwan_core::store::ErrorKind::Constraint,
  }
}

/// Execute one row's write under the entity policy. History entries are
/// recorded for every field whose stored value actually changed.
async fn apply<S: RecordStore>(
  store: Arc<S>,
  history: HistoryRecorder<S>,
  entity: EntityPolicy,
  stamp: DateTime<Utc>,
  task: RowTask,
) -> std::result::Result<WriteOutcome, RowFailure> {
  let relation = entity.relation.clone();
  let filter = identity_filter(&entity, task.employee);

  let existing = store
    .select(&relation, filter.clone(), &[])
    .await
    .map_err(|e| store_failure(&task, &relation, &e))?;
  let old = existing.into_iter().next();

  match entity.write {
    WritePolicy::Replace => {
      store
        .delete(&relation, filter)
        .await
        .map_err(|e| store_failure(&task, &relation, &e))?;
      let mut row = fresh_row(&entity, task.employee, stamp, &task.patch);
      if let Some(old) = &old {
        for field in &task.preserve {
          if let Some(value) = old.get(field) {
            row.insert(field.clone(), value.clone());
          }
        }
      }
      store
        .insert(&relation, vec![row])
        .await
        .map_err(|e| store_failure(&task, &relation, &e))?;

      match old {
        Some(old) => {
          record_changes(&history, &relation, task.employee, &old, &task.patch)
            .await;
          Ok(WriteOutcome::Updated)
        }
        None => Ok(WriteOutcome::Created),
      }
    }
    WritePolicy::Merge => match old {
      Some(old) => {
        let mut changed = Row::new();
        for (field, value) in &task.patch {
          if !values_equal(old.get(field).unwrap_or(&Value::Null), value) {
            changed.insert(field.clone(), value.clone());
          }
        }
        if changed.is_empty() {
          return Ok(WriteOutcome::Unchanged);
        }

        // Target the concrete row, not the identity filter — scoped
        // relations can in principle hold strays.
        let row_filter = match old.get("id") {
          Some(id) => Filter::eq("id", id.clone()),
          None => identity_filter(&entity, task.employee),
        };
        store
          .update(&relation, changed.clone(), row_filter)
          .await
          .map_err(|e| store_failure(&task, &relation, &e))?;
        record_changes(&history, &relation, task.employee, &old, &changed).await;
        Ok(WriteOutcome::Updated)
      }
      None if entity.insert_missing => {
        let row = fresh_row(&entity, task.employee, stamp, &task.patch);
        store
          .insert(&relation, vec![row])
          .await
          .map_err(|e| store_failure(&task, &relation, &e))?;
        Ok(WriteOutcome::Created)
      }
      // Update-only entity with nothing to update.
      None => Ok(WriteOutcome::Unchanged),
    },
  }
}

async fn record_changes<S: RecordStore>(
  history: &HistoryRecorder<S>,
  relation: &str,
  employee: Uuid,
  old: &Row,
  patch: &Row,
) {
  for (field, new_value) in patch {
    let old_value = old.get(field).unwrap_or(&Value::Null);
    if !values_equal(old_value, new_value) {
      history
        .record(
          relation,
          employee,
          field,
          display_value(old_value),
          display_value(new_value),
        )
        .await;
    }
  }
}
