//! Domain records and their store-row representations.
//!
//! Every record keeps its relation name as an associated constant and
//! round-trips to the store's JSON row shape through serde. UUIDs travel as
//! hyphenated strings, timestamps as RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  error::{Error, Result},
  store::Row,
};

// ─── Record trait ────────────────────────────────────────────────────────────

/// A typed view of one row in a named relation.
pub trait Record: Serialize + DeserializeOwned {
  /// Relation (table) this record lives in.
  const RELATION: &'static str;

  fn to_row(&self) -> Result<Row> {
    match serde_json::to_value(self)? {
      Value::Object(map) => Ok(map),
      other => Err(Error::NotARecord(other)),
    }
  }

  fn from_row(row: Row) -> Result<Self> {
    Ok(serde_json::from_value(Value::Object(row))?)
  }
}

// ─── Employee ────────────────────────────────────────────────────────────────

/// One person — the join point for every dependent record. Never deleted by
/// the pipeline; deletion is an explicit administrative action elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
  pub id:            Uuid,
  /// Stable external key. Unique across identities when present.
  pub job_number:    Option<String>,
  /// Secondary external key used by some source files.
  pub card_number:   Option<String>,
  /// Free text, authoritative for name matching.
  pub full_name:     String,
  /// Derived by the provisioning pass, absent until then.
  pub username:      Option<String>,
  pub role:          String,
  pub department_id: Option<Uuid>,
  pub created_at:    DateTime<Utc>,
}

impl Employee {
  pub fn new(full_name: impl Into<String>) -> Self {
    Self {
      id:            Uuid::new_v4(),
      job_number:    None,
      card_number:   None,
      full_name:     full_name.into(),
      username:      None,
      role:          "employee".to_owned(),
      department_id: None,
      created_at:    Utc::now(),
    }
  }
}

impl Record for Employee {
  const RELATION: &'static str = "employees";
}

// ─── SalarySnapshot ──────────────────────────────────────────────────────────

/// Salary composition for one identity at one import. At most one snapshot
/// per identity is authoritative; a full reimport deletes and reinserts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalarySnapshot {
  pub id:                    Uuid,
  pub employee_id:           Uuid,
  pub nominal_salary:        f64,
  pub certificate_allowance: f64,
  pub position_allowance:    f64,
  pub transport_allowance:   f64,
  pub marital_allowance:     f64,
  pub children_allowance:    f64,
  pub retirement_deduction:  f64,
  pub tax_deduction:         f64,
  pub loan_deduction:        f64,
  pub net_salary:            f64,
  pub bank_branch:           Option<String>,
  pub imported_at:           DateTime<Utc>,
}

impl SalarySnapshot {
  /// A zeroed snapshot for the given identity.
  pub fn for_employee(employee_id: Uuid) -> Self {
    Self {
      id: Uuid::new_v4(),
      employee_id,
      nominal_salary: 0.0,
      certificate_allowance: 0.0,
      position_allowance: 0.0,
      transport_allowance: 0.0,
      marital_allowance: 0.0,
      children_allowance: 0.0,
      retirement_deduction: 0.0,
      tax_deduction: 0.0,
      loan_deduction: 0.0,
      net_salary: 0.0,
      bank_branch: None,
      imported_at: Utc::now(),
    }
  }
}

impl Record for SalarySnapshot {
  const RELATION: &'static str = "salary_snapshots";
}

// ─── YearlyRecord ────────────────────────────────────────────────────────────

/// Per-year counters for one identity. Unique per (identity, year) — enforced
/// by check-then-upsert in the engine, not structurally by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearlyRecord {
  pub id:               Uuid,
  pub employee_id:      Uuid,
  pub year:             i32,
  /// Honors/citations received that year.
  pub thanks_count:     u32,
  pub committees_count: u32,
}

impl YearlyRecord {
  pub fn new(employee_id: Uuid, year: i32) -> Self {
    Self {
      id: Uuid::new_v4(),
      employee_id,
      year,
      thanks_count: 0,
      committees_count: 0,
    }
  }
}

impl Record for YearlyRecord {
  const RELATION: &'static str = "yearly_records";
}

// ─── AdminSummary ────────────────────────────────────────────────────────────

/// Leave balances and related administrative aggregates, one row per
/// identity. Same check-then-upsert lifecycle as [`YearlyRecord`], keyed by
/// identity alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSummary {
  pub id:                    Uuid,
  pub employee_id:           Uuid,
  pub regular_leave_balance: f64,
  pub sick_leave_balance:    f64,
  pub absence_days:          f64,
}

impl AdminSummary {
  pub fn new(employee_id: Uuid) -> Self {
    Self {
      id: Uuid::new_v4(),
      employee_id,
      regular_leave_balance: 0.0,
      sick_leave_balance: 0.0,
      absence_days: 0.0,
    }
  }
}

impl Record for AdminSummary {
  const RELATION: &'static str = "admin_summaries";
}

// ─── FieldChange ─────────────────────────────────────────────────────────────

/// One append-only audit entry: a tracked field changed on some record.
/// Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChange {
  pub id:         Uuid,
  pub table_name: String,
  /// The identity that owns the changed record. Stable across
  /// delete-then-insert replacement, unlike the row id itself.
  pub record_id:  Uuid,
  pub field:      String,
  pub old_value:  Option<String>,
  pub new_value:  Option<String>,
  pub actor:      String,
  pub changed_at: DateTime<Utc>,
}

impl Record for FieldChange {
  const RELATION: &'static str = "field_changes";
}

// ─── Department ──────────────────────────────────────────────────────────────

/// One node of the organizational tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
  pub id:         Uuid,
  pub name:       String,
  pub level:      u32,
  pub parent_id:  Option<Uuid>,
  /// Managing identity, when one is assigned.
  pub manager_id: Option<Uuid>,
}

impl Department {
  pub fn new(name: impl Into<String>, level: u32) -> Self {
    Self {
      id:         Uuid::new_v4(),
      name:       name.into(),
      level,
      parent_id:  None,
      manager_id: None,
    }
  }
}

impl Record for Department {
  const RELATION: &'static str = "departments";
}
