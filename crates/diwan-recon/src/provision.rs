//! Username derivation for identities that lack one.
//!
//! Runs after roster sync so fresh identities pick up credentials in the same
//! pass cadence as the original system: first two name segments romanized and
//! joined with a dot, disambiguated by job number and then by a counter when
//! the base form is taken.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use diwan_core::{
  model::{Employee, Record},
  normalize::normalize,
  store::{Filter, RecordStore, Row, StoreFailure},
};

use crate::{
  history::HistoryRecorder,
  summary::RowFailure,
  Error, Result,
};

/// Rough romanization, enough to build stable ASCII login names. Digraph
/// choices follow the transliterations already in use on the printed badge
/// cards, not any academic scheme.
fn latinize(word: &str) -> String {
  let mut out = String::with_capacity(word.len());
  for c in word.chars() {
    let mapped: &str = match c {
      'ا' | 'ع' => "a",
      'ب' => "b",
      'ت' | 'ط' => "t",
      'ث' => "th",
      'ج' => "j",
      'ح' => "h",
      'خ' => "kh",
      'د' | 'ض' => "d",
      'ذ' | 'ظ' => "dh",
      'ر' => "r",
      'ز' => "z",
      'س' | 'ص' => "s",
      'ش' => "sh",
      'غ' => "gh",
      'ف' => "f",
      'ق' => "q",
      'ك' => "k",
      'ل' => "l",
      'م' => "m",
      'ن' => "n",
      'ه' => "h",
      'و' | 'ؤ' => "w",
      'ي' | 'ئ' => "y",
      'ء' => "",
      c if c.is_ascii_alphanumeric() => {
        out.push(c.to_ascii_lowercase());
        continue;
      }
      _ => continue,
    };
    out.push_str(mapped);
  }
  out
}

/// Derive a login name from a full name, unique against `taken`.
pub fn derive_username(
  full_name: &str,
  job_number: Option<&str>,
  taken: &HashSet<String>,
) -> String {
  let normalized = normalize(full_name);
  let base: String = {
    let parts: Vec<String> = normalized
      .split_whitespace()
      .take(2)
      .map(latinize)
      .filter(|p| !p.is_empty())
      .collect();
    if parts.is_empty() {
      "user".to_owned()
    } else {
      parts.join(".")
    }
  };

  if !taken.contains(&base) {
    return base;
  }
  if let Some(job) = job_number {
    let with_job = format!("{base}.{job}");
    if !taken.contains(&with_job) {
      return with_job;
    }
  }
  (2..)
    .map(|n| format!("{base}{n}"))
    .find(|candidate| !taken.contains(candidate))
    .unwrap_or(base)
}

/// What the provisioning pass did.
#[derive(Debug, Default)]
pub struct ProvisionReport {
  pub provisioned: usize,
  /// Identities that already had a username.
  pub skipped:     usize,
  pub failures:    Vec<RowFailure>,
}

/// Assign usernames to every identity that has none. Existing usernames are
/// never touched, making the pass idempotent.
pub async fn provision_usernames<S: RecordStore>(
  store: &S,
  history: &HistoryRecorder<S>,
) -> Result<ProvisionReport> {
  let rows = store
    .select(Employee::RELATION, Filter::all(), &[])
    .await
    .map_err(Error::store)?;
  let employees: Vec<Employee> = rows
    .into_iter()
    .filter_map(|row| Employee::from_row(row).ok())
    .collect();

  let mut taken: HashSet<String> = employees
    .iter()
    .filter_map(|e| e.username.clone())
    .collect();

  let mut report = ProvisionReport::default();
  for employee in &employees {
    if employee.username.is_some() {
      report.skipped += 1;
      continue;
    }

    let username = derive_username(
      &employee.full_name,
      employee.job_number.as_deref(),
      &taken,
    );
    debug!(employee = %employee.id, %username, "derived username");

    let mut patch = Row::new();
    patch.insert("username".into(), Value::String(username.clone()));
    let written = store
      .update(
        Employee::RELATION,
        patch,
        Filter::eq("id", employee.id.to_string()),
      )
      .await;

    match written {
      Ok(_) => {
        history
          .record(
            Employee::RELATION,
            employee.id,
            "username",
            None,
            Some(username.clone()),
          )
          .await;
        taken.insert(username);
        report.provisioned += 1;
      }
      Err(error) => report.failures.push(RowFailure {
        row_index:  None,
        key:        employee.full_name.clone(),
        relation:   Employee::RELATION.to_owned(),
        message:    error.to_string(),
        constraint: error.kind() == diwan_core::store::ErrorKind::Constraint,
      }),
    }
  }

  Ok(report)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn latinizes_common_names() {
    assert_eq!(latinize("محمد"), "mhmd");
    assert_eq!(latinize("خالد"), "khald");
    assert_eq!(latinize("شهد"), "shhd");
  }

  #[test]
  fn username_joins_first_two_segments() {
    let taken = HashSet::new();
    assert_eq!(
      derive_username("علي عباس الصباغ", Some("266772"), &taken),
      "aly.abas"
    );
  }

  #[test]
  fn collisions_fall_back_to_job_number_then_counter() {
    let mut taken = HashSet::new();
    taken.insert("aly.abas".to_owned());
    assert_eq!(
      derive_username("علي عباس الصباغ", Some("266772"), &taken),
      "aly.abas.266772"
    );

    taken.insert("aly.abas.266772".to_owned());
    assert_eq!(
      derive_username("علي عباس الصباغ", Some("266772"), &taken),
      "aly.abas2"
    );
  }

  #[test]
  fn unmappable_name_falls_back_to_user() {
    let taken = HashSet::new();
    assert_eq!(derive_username("ـــ", None, &taken), "user");
  }
}
