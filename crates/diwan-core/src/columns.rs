//! Header-driven column resolution.
//!
//! The payroll system regenerates its exports monthly and the column order is
//! not stable across revisions. Fields are located by header keywords, never
//! by fixed position.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
  error::{Error, Result},
  normalize::solid,
  row::RawRow,
};

// ─── FieldSpec ───────────────────────────────────────────────────────────────

/// Header-matching configuration for one logical field.
///
/// A column qualifies when *every* keyword appears in its header cell text,
/// compared case- and whitespace-insensitively after normalization. The first
/// qualifying column wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
  /// Logical field name, e.g. `nominal_salary`.
  pub field:    String,
  pub keywords: Vec<String>,
  /// Required fields with no matching header abort the run before any write.
  #[serde(default)]
  pub required: bool,
}

impl FieldSpec {
  pub fn new(field: impl Into<String>, keywords: &[&str]) -> Self {
    Self {
      field:    field.into(),
      keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
      required: false,
    }
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }
}

// ─── ColumnMap ───────────────────────────────────────────────────────────────

/// Resolved mapping from logical field name to column index.
///
/// Fields whose keywords matched no header are absent from the map. Callers
/// must treat absence as "column not present in this file" and skip the field
/// for every row — distinct from a present column holding an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
  columns: HashMap<String, usize>,
}

impl ColumnMap {
  pub fn get(&self, field: &str) -> Option<usize> {
    self.columns.get(field).copied()
  }

  pub fn contains(&self, field: &str) -> bool {
    self.columns.contains_key(field)
  }

  pub fn len(&self) -> usize {
    self.columns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.columns.is_empty()
  }
}

/// Resolve every spec against a header row.
///
/// Only an unmatched `required` spec is an error; everything else about a
/// header, including being entirely empty, resolves to an (possibly empty)
/// map.
pub fn resolve_columns(
  header: &RawRow,
  specs: &[FieldSpec],
) -> Result<ColumnMap> {
  let headers: Vec<String> = header
    .cells()
    .iter()
    .map(|cell| solid(&cell.to_string()))
    .collect();

  let mut columns = HashMap::new();
  for spec in specs {
    let keys: Vec<String> = spec.keywords.iter().map(|k| solid(k)).collect();
    let hit = (!keys.is_empty())
      .then(|| {
        headers
          .iter()
          .position(|header| keys.iter().all(|key| header.contains(key)))
      })
      .flatten();

    match hit {
      Some(index) => {
        columns.insert(spec.field.clone(), index);
      }
      None if spec.required => {
        return Err(Error::RequiredColumnMissing(spec.field.clone()));
      }
      None => {}
    }
  }

  Ok(ColumnMap { columns })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::row::CellValue;

  fn header(cells: &[&str]) -> RawRow {
    RawRow::new(
      cells
        .iter()
        .map(|s| CellValue::Text((*s).to_owned()))
        .collect(),
    )
  }

  fn salary_spec() -> FieldSpec {
    FieldSpec::new("nominal_salary", &["الراتب الاسمي"])
  }

  #[test]
  fn resolves_regardless_of_position() {
    let first = header(&["الراتب الاسمي", "Col B"]);
    let second = header(&["Col A", "الراتب الاسمي", "Col C"]);

    let specs = [salary_spec()];
    let a = resolve_columns(&first, &specs).unwrap();
    let b = resolve_columns(&second, &specs).unwrap();

    assert_eq!(a.get("nominal_salary"), Some(0));
    assert_eq!(b.get("nominal_salary"), Some(1));
  }

  #[test]
  fn absent_header_leaves_field_unmapped() {
    let map = resolve_columns(
      &header(&["الاسم", "الراتب الاسمي"]),
      &[salary_spec(), FieldSpec::new("tax_deduction", &["الضريبة"])],
    )
    .unwrap();

    assert_eq!(map.get("nominal_salary"), Some(1));
    assert_eq!(map.get("tax_deduction"), None);
    assert!(!map.contains("tax_deduction"));
  }

  #[test]
  fn missing_required_column_is_fatal() {
    let result = resolve_columns(
      &header(&["الراتب الاسمي"]),
      &[FieldSpec::new("full_name", &["الاسم"]).required()],
    );

    assert!(matches!(
      result,
      Err(Error::RequiredColumnMissing(field)) if field == "full_name"
    ));
  }

  #[test]
  fn first_matching_column_wins() {
    let map = resolve_columns(
      &header(&["الراتب الكلي", "الراتب الاسمي"]),
      &[FieldSpec::new("some_salary", &["الراتب"])],
    )
    .unwrap();

    assert_eq!(map.get("some_salary"), Some(0));
  }

  #[test]
  fn matching_ignores_case_and_whitespace() {
    let map = resolve_columns(
      &header(&["  الراتب   الاسمي ", "NET Salary"]),
      &[
        salary_spec(),
        FieldSpec::new("net_salary", &["net salary"]),
      ],
    )
    .unwrap();

    assert_eq!(map.get("nominal_salary"), Some(0));
    assert_eq!(map.get("net_salary"), Some(1));
  }

  #[test]
  fn all_keywords_must_appear() {
    let map = resolve_columns(
      &header(&["الراتب", "الراتب الاسمي الشهري"]),
      &[FieldSpec::new("nominal_salary", &["الراتب", "الاسمي"])],
    )
    .unwrap();

    assert_eq!(map.get("nominal_salary"), Some(1));
  }
}
