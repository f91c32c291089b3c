//! Engine integration tests against the in-memory SQLite store.

use std::sync::Arc;

use diwan_core::{
  columns::{resolve_columns, ColumnMap, FieldSpec},
  matcher::Roster,
  model::{Employee, Record, SalarySnapshot, YearlyRecord},
  row::{CellValue, RawRow},
  store::{Filter, RecordStore, Row},
};
use diwan_store_sqlite::SqliteStore;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  engine::{Importer, WriteOutcome},
  history::HistoryRecorder,
  plan::{EntityPolicy, FieldBinding, ImportPlan, KeyBindings, RunMode, WritePolicy},
  summary::UnresolvedReason,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn text(s: &str) -> CellValue {
  CellValue::Text(s.to_owned())
}

fn row(cells: Vec<CellValue>) -> RawRow {
  RawRow::new(cells)
}

fn employee(name: &str, job: Option<&str>) -> Employee {
  let mut e = Employee::new(name);
  e.job_number = job.map(str::to_owned);
  e
}

async fn harness(staff: &[Employee]) -> (Arc<SqliteStore>, Importer<SqliteStore>, Roster) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  for member in staff {
    store
      .insert(Employee::RELATION, vec![member.to_row().unwrap()])
      .await
      .unwrap();
  }
  let history = HistoryRecorder::new(Arc::clone(&store), "test-operator");
  let importer = Importer::new(Arc::clone(&store), history);
  (store, importer, Roster::build(staff))
}

fn history(store: &Arc<SqliteStore>) -> HistoryRecorder<SqliteStore> {
  HistoryRecorder::new(Arc::clone(store), "test-operator")
}

/// Header + specs for a typical monthly salary workbook.
fn salary_columns(headers: &[&str]) -> ColumnMap {
  let header = row(headers.iter().map(|h| text(h)).collect());
  resolve_columns(
    &header,
    &[
      FieldSpec::new("full_name", &["اسم الموظف"]),
      FieldSpec::new("job_number", &["الرقم الوظيفي"]),
      FieldSpec::new("nominal_salary", &["الراتب الاسمي"]),
      FieldSpec::new("tax_deduction", &["الضريبة"]),
    ],
  )
  .unwrap()
}

fn salary_entity() -> EntityPolicy {
  EntityPolicy::new(SalarySnapshot::RELATION, WritePolicy::Replace)
    .stamped("imported_at")
}

fn salary_plan(columns: ColumnMap) -> ImportPlan {
  ImportPlan::new(RunMode::FullSync, salary_entity(), columns)
    .keys(KeyBindings {
      name:       Some("full_name".into()),
      job_number: Some("job_number".into()),
      ..KeyBindings::default()
    })
    .bindings(vec![
      FieldBinding::number("nominal_salary"),
      FieldBinding::number("tax_deduction"),
    ])
}

fn yearly_plan(columns: ColumnMap, year: i32) -> ImportPlan {
  let entity = EntityPolicy::new(YearlyRecord::RELATION, WritePolicy::Merge)
    .scoped("year", year);
  ImportPlan::new(RunMode::FullSync, entity, columns)
    .keys(KeyBindings { name: Some("full_name".into()), ..KeyBindings::default() })
    .bindings(vec![
      FieldBinding::count("thanks_count"),
      FieldBinding::count("committees_count"),
    ])
}

async fn snapshots_for(store: &SqliteStore, employee: Uuid) -> Vec<Row> {
  store
    .select(
      SalarySnapshot::RELATION,
      Filter::eq("employee_id", employee.to_string()),
      &[],
    )
    .await
    .unwrap()
}

// ─── End-to-end scenario ─────────────────────────────────────────────────────

#[tokio::test]
async fn job_number_resolves_before_name_and_reruns_replace_the_snapshot() {
  let staff = [employee("علي عباس الصباغ", Some("266772"))];
  let (store, importer, roster) = harness(&staff).await;
  let columns =
    salary_columns(&["اسم الموظف", "الرقم الوظيفي", "الراتب الاسمي"]);

  let first = row(vec![text("علي عباس"), text("266772"), text("500,000")]);
  let summary = importer
    .run(&[first], &salary_plan(columns.clone()), &roster)
    .await
    .unwrap();
  assert_eq!(summary.created, 1);
  assert!(summary.is_clean());

  let snapshots = snapshots_for(&store, staff[0].id).await;
  assert_eq!(snapshots.len(), 1);
  assert_eq!(snapshots[0]["nominal_salary"], 500_000.0);

  // Re-run with a new figure: the snapshot is replaced, never duplicated,
  // and the change is audited.
  let second = row(vec![text("علي عباس"), text("266772"), text("520,000")]);
  let summary = importer
    .run(&[second], &salary_plan(columns), &roster)
    .await
    .unwrap();
  assert_eq!(summary.updated, 1);

  let snapshots = snapshots_for(&store, staff[0].id).await;
  assert_eq!(snapshots.len(), 1);
  assert_eq!(snapshots[0]["nominal_salary"], 520_000.0);

  let changes = history(&store)
    .changes_for(SalarySnapshot::RELATION, staff[0].id, "nominal_salary")
    .await
    .unwrap();
  assert_eq!(changes.len(), 1);
  assert_eq!(changes[0].old_value.as_deref(), Some("500000"));
  assert_eq!(changes[0].new_value.as_deref(), Some("520000"));
  assert_eq!(changes[0].actor, "test-operator");
}

#[tokio::test]
async fn importing_the_same_file_twice_converges() {
  let staff = [
    employee("علي عباس الصباغ", Some("266772")),
    employee("سارة محمود", Some("300101")),
  ];
  let (store, importer, roster) = harness(&staff).await;
  let columns =
    salary_columns(&["اسم الموظف", "الرقم الوظيفي", "الراتب الاسمي"]);
  let rows = vec![
    row(vec![text("علي عباس الصباغ"), text("266772"), text("500,000")]),
    row(vec![text("سارة محمود"), text("300101"), text("750,000")]),
  ];

  importer
    .run(&rows, &salary_plan(columns.clone()), &roster)
    .await
    .unwrap();
  importer
    .run(&rows, &salary_plan(columns), &roster)
    .await
    .unwrap();

  for member in &staff {
    assert_eq!(snapshots_for(&store, member.id).await.len(), 1);
  }
}

#[tokio::test]
async fn duplicate_rows_for_one_identity_keep_a_single_snapshot() {
  let staff = [employee("علي عباس الصباغ", Some("266772"))];
  let (store, importer, roster) = harness(&staff).await;
  let columns =
    salary_columns(&["اسم الموظف", "الرقم الوظيفي", "الراتب الاسمي"]);

  // The same identity on two rows of one file, both inside one write
  // chunk. Only the later row may land.
  let rows = vec![
    row(vec![text("علي عباس الصباغ"), text("266772"), text("500,000")]),
    row(vec![text("علي عباس الصباغ"), text("266772"), text("520,000")]),
  ];
  let summary = importer
    .run(&rows, &salary_plan(columns), &roster)
    .await
    .unwrap();
  assert_eq!(summary.created, 1);
  assert_eq!(summary.superseded, 1);
  assert!(summary.is_clean());

  let snapshots = snapshots_for(&store, staff[0].id).await;
  assert_eq!(snapshots.len(), 1);
  assert_eq!(snapshots[0]["nominal_salary"], 520_000.0);
}

// ─── Merge entities ──────────────────────────────────────────────────────────

#[tokio::test]
async fn yearly_records_are_unique_per_identity_and_year() {
  let staff = [employee("احمد كريم", None)];
  let (store, importer, roster) = harness(&staff).await;
  let header = row(vec![text("اسم الموظف"), text("كتب الشكر"), text("اللجان")]);
  let columns = resolve_columns(
    &header,
    &[
      FieldSpec::new("full_name", &["اسم الموظف"]),
      FieldSpec::new("thanks_count", &["شكر"]),
      FieldSpec::new("committees_count", &["لجان"]),
    ],
  )
  .unwrap();

  let rows = vec![row(vec![text("احمد كريم"), text("3"), text("1")])];
  let first = importer
    .run(&rows, &yearly_plan(columns.clone(), 2024), &roster)
    .await
    .unwrap();
  assert_eq!(first.created, 1);

  // Same year again with identical counters: in-place, nothing changes.
  let second = importer
    .run(&rows, &yearly_plan(columns.clone(), 2024), &roster)
    .await
    .unwrap();
  assert_eq!(second.created, 0);
  assert_eq!(second.unchanged, 1);

  // New counter value for the same year updates the existing row.
  let bumped = vec![row(vec![text("احمد كريم"), text("4"), text("1")])];
  let third = importer
    .run(&bumped, &yearly_plan(columns.clone(), 2024), &roster)
    .await
    .unwrap();
  assert_eq!(third.updated, 1);

  let stored = store
    .select(
      YearlyRecord::RELATION,
      Filter::eq("employee_id", staff[0].id.to_string()).and("year", 2024),
      &[],
    )
    .await
    .unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0]["thanks_count"], 4.0);

  // A different year is a new row.
  importer
    .run(&rows, &yearly_plan(columns, 2025), &roster)
    .await
    .unwrap();
  let all = store
    .select(
      YearlyRecord::RELATION,
      Filter::eq("employee_id", staff[0].id.to_string()),
      &[],
    )
    .await
    .unwrap();
  assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn duplicate_rows_for_one_identity_create_one_yearly_record() {
  let staff = [employee("احمد كريم", None)];
  let (store, importer, roster) = harness(&staff).await;
  let header = row(vec![text("اسم الموظف"), text("كتب الشكر"), text("اللجان")]);
  let columns = resolve_columns(
    &header,
    &[
      FieldSpec::new("full_name", &["اسم الموظف"]),
      FieldSpec::new("thanks_count", &["شكر"]),
      FieldSpec::new("committees_count", &["لجان"]),
    ],
  )
  .unwrap();

  let rows = vec![
    row(vec![text("احمد كريم"), text("3"), text("1")]),
    row(vec![text("احمد كريم"), text("4"), text("2")]),
  ];
  let summary = importer
    .run(&rows, &yearly_plan(columns, 2024), &roster)
    .await
    .unwrap();
  assert_eq!(summary.created, 1);
  assert_eq!(summary.superseded, 1);

  let stored = store
    .select(
      YearlyRecord::RELATION,
      Filter::eq("employee_id", staff[0].id.to_string()).and("year", 2024),
      &[],
    )
    .await
    .unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0]["thanks_count"], 4.0);
}

// ─── Classification outcomes ─────────────────────────────────────────────────

#[tokio::test]
async fn ambiguous_and_not_found_rows_are_reported_not_written() {
  let staff = [
    employee("محمد علي حسن", None),
    employee("محمد علي كريم", None),
  ];
  let (store, importer, roster) = harness(&staff).await;
  let columns = salary_columns(&["اسم الموظف", "الراتب الاسمي"]);
  let rows = vec![
    row(vec![text("محمد علي"), text("100")]),
    row(vec![text("سعد منصور"), text("200")]),
  ];

  let summary = importer
    .run(&rows, &salary_plan(columns), &roster)
    .await
    .unwrap();

  assert_eq!(summary.ambiguous(), 1);
  assert_eq!(summary.not_found(), 1);
  assert_eq!(summary.created + summary.updated, 0);

  let ambiguous = &summary.unresolved[0];
  assert_eq!(ambiguous.key, "محمد علي");
  assert_eq!(ambiguous.reason, UnresolvedReason::Ambiguous { candidates: 2 });
  // Raw payload retained for operator review.
  assert_eq!(ambiguous.payload.get(1), &text("100"));

  let written = store
    .select(SalarySnapshot::RELATION, Filter::all(), &[])
    .await
    .unwrap();
  assert!(written.is_empty());
}

#[tokio::test]
async fn blank_and_keyless_rows_are_skipped() {
  let staff = [employee("احمد كريم", None)];
  let (_, importer, roster) = harness(&staff).await;
  let columns = salary_columns(&["اسم الموظف", "الراتب الاسمي"]);
  let rows = vec![
    row(vec![]),
    row(vec![CellValue::Empty, text("500")]),
    row(vec![text("  "), text("500")]),
  ];

  let summary = importer
    .run(&rows, &salary_plan(columns), &roster)
    .await
    .unwrap();
  assert_eq!(summary.skipped, 3);
  assert!(summary.is_clean());
}

#[tokio::test]
async fn unparseable_figures_default_to_zero_but_are_counted() {
  let staff = [employee("احمد كريم", None)];
  let (store, importer, roster) = harness(&staff).await;
  let columns = salary_columns(&["اسم الموظف", "الراتب الاسمي"]);
  let rows = vec![row(vec![text("احمد كريم"), text("غير محدد")])];

  let summary = importer
    .run(&rows, &salary_plan(columns), &roster)
    .await
    .unwrap();
  assert_eq!(summary.created, 1);
  assert_eq!(summary.defaulted_numbers, 1);

  let snapshots = snapshots_for(&store, staff[0].id).await;
  assert_eq!(snapshots[0]["nominal_salary"], 0.0);
}

#[tokio::test]
async fn unparseable_counters_default_to_zero_but_are_counted() {
  let staff = [employee("احمد كريم", None)];
  let (store, importer, roster) = harness(&staff).await;
  let header = row(vec![text("اسم الموظف"), text("كتب الشكر"), text("اللجان")]);
  let columns = resolve_columns(
    &header,
    &[
      FieldSpec::new("full_name", &["اسم الموظف"]),
      FieldSpec::new("thanks_count", &["شكر"]),
      FieldSpec::new("committees_count", &["لجان"]),
    ],
  )
  .unwrap();

  let rows = vec![row(vec![text("احمد كريم"), text("لا يوجد"), text("2")])];
  let summary = importer
    .run(&rows, &yearly_plan(columns, 2024), &roster)
    .await
    .unwrap();
  assert_eq!(summary.created, 1);
  assert_eq!(summary.defaulted_numbers, 1);

  let stored = store
    .select(
      YearlyRecord::RELATION,
      Filter::eq("employee_id", staff[0].id.to_string()),
      &[],
    )
    .await
    .unwrap();
  assert_eq!(stored[0]["thanks_count"], 0.0);
  assert_eq!(stored[0]["committees_count"], 2.0);
}

// ─── Missing columns ─────────────────────────────────────────────────────────

#[tokio::test]
async fn absent_column_preserves_stored_values_instead_of_zeroing() {
  let staff = [employee("علي عباس الصباغ", Some("266772"))];
  let (store, importer, roster) = harness(&staff).await;

  // First import has a tax column.
  let with_tax = salary_columns(&[
    "اسم الموظف",
    "الرقم الوظيفي",
    "الراتب الاسمي",
    "الضريبة",
  ]);
  let rows = vec![row(vec![
    text("علي عباس الصباغ"),
    text("266772"),
    text("500,000"),
    text("12,000"),
  ])];
  importer
    .run(&rows, &salary_plan(with_tax), &roster)
    .await
    .unwrap();

  // The next month's file dropped the tax column entirely.
  let without_tax =
    salary_columns(&["اسم الموظف", "الرقم الوظيفي", "الراتب الاسمي"]);
  assert!(!without_tax.contains("tax_deduction"));
  let rows = vec![row(vec![
    text("علي عباس الصباغ"),
    text("266772"),
    text("520,000"),
  ])];
  importer
    .run(&rows, &salary_plan(without_tax), &roster)
    .await
    .unwrap();

  let snapshots = snapshots_for(&store, staff[0].id).await;
  assert_eq!(snapshots.len(), 1);
  assert_eq!(snapshots[0]["nominal_salary"], 520_000.0);
  // Column absent ≠ value absent: the stored deduction survives.
  assert_eq!(snapshots[0]["tax_deduction"], 12_000.0);
}

// ─── Failure isolation ───────────────────────────────────────────────────────

#[tokio::test]
async fn a_rejected_row_does_not_abort_the_rest_of_the_run() {
  // One roster identity exists only in memory, not in the store, so its
  // snapshot insert violates the foreign key. The other row must still land.
  let in_store = employee("سارة محمود", Some("300101"));
  let ghost = employee("علي عباس", Some("266772"));
  let (store, importer, _) = harness(std::slice::from_ref(&in_store)).await;
  let roster = Roster::build(&[in_store.clone(), ghost.clone()]);

  let columns =
    salary_columns(&["اسم الموظف", "الرقم الوظيفي", "الراتب الاسمي"]);
  let rows = vec![
    row(vec![text("علي عباس"), text("266772"), text("100")]),
    row(vec![text("سارة محمود"), text("300101"), text("200")]),
  ];

  let summary = importer
    .run(&rows, &salary_plan(columns), &roster)
    .await
    .unwrap();

  assert_eq!(summary.created, 1);
  assert_eq!(summary.failed(), 1);
  let failure = &summary.failures[0];
  assert!(failure.constraint);
  assert_eq!(failure.key, "علي عباس");
  assert_eq!(failure.relation, SalarySnapshot::RELATION);

  assert_eq!(snapshots_for(&store, in_store.id).await.len(), 1);
}

#[tokio::test]
async fn fatal_configuration_errors_reject_the_run_before_any_write() {
  let staff = [employee("احمد كريم", None)];
  let (store, importer, roster) = harness(&staff).await;
  // No key binding at all.
  let plan = ImportPlan::new(
    RunMode::FullSync,
    salary_entity(),
    salary_columns(&["الراتب الاسمي"]),
  )
  .bindings(vec![FieldBinding::number("nominal_salary")]);

  let rows = vec![row(vec![text("500")])];
  assert!(importer.run(&rows, &plan, &roster).await.is_err());

  let written = store
    .select(SalarySnapshot::RELATION, Filter::all(), &[])
    .await
    .unwrap();
  assert!(written.is_empty());
}

// ─── Patch and manual-edit paths ─────────────────────────────────────────────

#[tokio::test]
async fn update_only_patch_never_conjures_records() {
  let staff = [employee("احمد كريم", None)];
  let (store, importer, roster) = harness(&staff).await;
  let columns = salary_columns(&["اسم الموظف", "الراتب الاسمي"]);
  let entity = EntityPolicy::new(SalarySnapshot::RELATION, WritePolicy::Merge)
    .update_only();
  let plan = ImportPlan::new(RunMode::SingleFieldPatch, entity, columns)
    .keys(KeyBindings { name: Some("full_name".into()), ..KeyBindings::default() })
    .bindings(vec![FieldBinding::number("nominal_salary")]);

  let rows = vec![row(vec![text("احمد كريم"), text("999")])];
  let summary = importer.run(&rows, &plan, &roster).await.unwrap();

  assert_eq!(summary.unchanged, 1);
  assert_eq!(summary.created, 0);
  let written = store
    .select(SalarySnapshot::RELATION, Filter::all(), &[])
    .await
    .unwrap();
  assert!(written.is_empty());
}

#[tokio::test]
async fn manual_edit_goes_through_the_same_policy_and_history() {
  let staff = [employee("سارة محمود", None)];
  let (store, importer, _) = harness(&staff).await;

  let mut snapshot = SalarySnapshot::for_employee(staff[0].id);
  snapshot.net_salary = 650_000.0;
  store
    .insert(SalarySnapshot::RELATION, vec![snapshot.to_row().unwrap()])
    .await
    .unwrap();

  let entity =
    EntityPolicy::new(SalarySnapshot::RELATION, WritePolicy::Merge).update_only();
  let mut patch = Row::new();
  patch.insert("net_salary".into(), Value::from(700_000.0));

  let outcome = importer
    .apply_one(staff[0].id, &entity, patch)
    .await
    .unwrap();
  assert_eq!(outcome, WriteOutcome::Updated);

  let snapshots = snapshots_for(&store, staff[0].id).await;
  assert_eq!(snapshots[0]["net_salary"], 700_000.0);

  let changes = history(&store)
    .changes_for(SalarySnapshot::RELATION, staff[0].id, "net_salary")
    .await
    .unwrap();
  assert_eq!(changes.len(), 1);
  assert_eq!(changes[0].old_value.as_deref(), Some("650000"));
  assert_eq!(changes[0].new_value.as_deref(), Some("700000"));
}
