//! Import plans for the known source files.
//!
//! Each function here replaces one of the original hand-written import
//! scripts: the column keywords, key bindings, and entity policy for one
//! source file, handed to the one engine that runs them all.

use diwan_core::{
  columns::{ColumnMap, FieldSpec},
  model::{AdminSummary, Record, SalarySnapshot, YearlyRecord},
};
use diwan_recon::plan::{
  BindingKind, EntityPolicy, FieldBinding, ImportPlan, KeyBindings, RunMode,
  WritePolicy,
};

use crate::settings::Profile;

// ─── Column keyword specs ────────────────────────────────────────────────────

/// The monthly payroll workbook. Column order shifts between revisions;
/// keywords are what stay put.
pub fn salary_specs() -> Vec<FieldSpec> {
  vec![
    FieldSpec::new("full_name", &["اسم", "موظف"]).required(),
    FieldSpec::new("job_number", &["رقم", "وظيفي"]),
    FieldSpec::new("card_number", &["رقم", "بطاق"]),
    FieldSpec::new("nominal_salary", &["الراتب", "الاسمي"]),
    FieldSpec::new("certificate_allowance", &["مخصصات", "شهادة"]),
    FieldSpec::new("position_allowance", &["مخصصات", "منصب"]),
    FieldSpec::new("transport_allowance", &["مخصصات", "نقل"]),
    FieldSpec::new("marital_allowance", &["مخصصات", "زوجية"]),
    FieldSpec::new("children_allowance", &["مخصصات", "اطفال"]),
    FieldSpec::new("retirement_deduction", &["تقاعد"]),
    FieldSpec::new("tax_deduction", &["ضريبة"]),
    FieldSpec::new("loan_deduction", &["سلف"]),
    FieldSpec::new("net_salary", &["صافي"]),
    FieldSpec::new("bank_branch", &["مصرف"]),
  ]
}

pub fn yearly_specs() -> Vec<FieldSpec> {
  vec![
    FieldSpec::new("full_name", &["اسم"]).required(),
    FieldSpec::new("job_number", &["رقم", "وظيفي"]),
    FieldSpec::new("thanks_count", &["شكر"]),
    FieldSpec::new("committees_count", &["لجان"]),
  ]
}

pub fn leave_specs() -> Vec<FieldSpec> {
  vec![
    FieldSpec::new("full_name", &["اسم"]).required(),
    FieldSpec::new("job_number", &["رقم", "وظيفي"]),
    FieldSpec::new("regular_leave_balance", &["رصيد", "اعتيادية"]),
    FieldSpec::new("sick_leave_balance", &["رصيد", "مرضية"]),
    FieldSpec::new("absence_days", &["غياب"]),
  ]
}

// ─── Plans ───────────────────────────────────────────────────────────────────

fn standard_keys() -> KeyBindings {
  KeyBindings {
    name:        Some("full_name".into()),
    job_number:  Some("job_number".into()),
    card_number: Some("card_number".into()),
    card_scan:   false,
  }
}

fn configured(plan: ImportPlan, profile: &Profile) -> ImportPlan {
  let mut plan = plan.chunked(profile.chunk_size);
  plan.card_range = profile.card_length.min..=profile.card_length.max;
  plan
}

/// Full-replace salary sync: one authoritative snapshot per identity.
pub fn salary_plan(columns: ColumnMap, profile: &Profile) -> ImportPlan {
  let entity = EntityPolicy::new(SalarySnapshot::RELATION, WritePolicy::Replace)
    .stamped("imported_at");
  let plan = ImportPlan::new(RunMode::FullSync, entity, columns)
    .keys(standard_keys())
    .bindings(vec![
      FieldBinding::number("nominal_salary"),
      FieldBinding::number("certificate_allowance"),
      FieldBinding::number("position_allowance"),
      FieldBinding::number("transport_allowance"),
      FieldBinding::number("marital_allowance"),
      FieldBinding::number("children_allowance"),
      FieldBinding::number("retirement_deduction"),
      FieldBinding::number("tax_deduction"),
      FieldBinding::number("loan_deduction"),
      FieldBinding::number("net_salary"),
      FieldBinding::text("bank_branch"),
    ]);
  configured(plan, profile)
}

/// In-place yearly counters, unique per (identity, year).
pub fn yearly_plan(columns: ColumnMap, year: i32, profile: &Profile) -> ImportPlan {
  let entity = EntityPolicy::new(YearlyRecord::RELATION, WritePolicy::Merge)
    .scoped("year", year);
  let plan = ImportPlan::new(RunMode::FullSync, entity, columns)
    .keys(standard_keys())
    .bindings(vec![
      FieldBinding::count("thanks_count"),
      FieldBinding::count("committees_count"),
    ]);
  configured(plan, profile)
}

/// In-place leave balances, one row per identity.
pub fn leave_plan(columns: ColumnMap, profile: &Profile) -> ImportPlan {
  let entity = EntityPolicy::new(AdminSummary::RELATION, WritePolicy::Merge);
  let plan = ImportPlan::new(RunMode::FullSync, entity, columns)
    .keys(standard_keys())
    .bindings(vec![
      FieldBinding::number("regular_leave_balance"),
      FieldBinding::number("sick_leave_balance"),
      FieldBinding::number("absence_days"),
    ]);
  configured(plan, profile)
}

/// One operator-declared column into one field of an existing record.
pub fn patch_plan(
  columns: ColumnMap,
  relation: &str,
  field: &str,
  numeric: bool,
  profile: &Profile,
) -> ImportPlan {
  let entity =
    EntityPolicy::new(relation, WritePolicy::Merge).update_only();
  let kind = if numeric { BindingKind::Number } else { BindingKind::Text };
  let plan = ImportPlan::new(RunMode::SingleFieldPatch, entity, columns)
    .keys(standard_keys())
    .bindings(vec![FieldBinding { field: field.to_owned(), kind }]);
  configured(plan, profile)
}

/// Column specs for a patch run: the standard key columns plus the one
/// operator-declared target column.
pub fn patch_specs(keyword: &str, field: &str) -> Vec<FieldSpec> {
  vec![
    FieldSpec::new("full_name", &["اسم"]).required(),
    FieldSpec::new("job_number", &["رقم", "وظيفي"]),
    FieldSpec::new(field, &[keyword]).required(),
  ]
}
