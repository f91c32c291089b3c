//! Layered identity resolution against the employee roster.
//!
//! Resolution order: an externally-supplied identifier (job number, then
//! card number) wins outright when it hits. Otherwise names are tried: exact
//! match on the normalized full form, then prefix match on the solid forms,
//! on the expectation that the external string is the truncated one (a source
//! file dropping a final ancestor name is routine; extra segments are not).
//!
//! Prefix rather than substring is deliberate: substring matching over a few
//! thousand people sharing common Arabic name components produces far too
//! many false positives.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
  extract::canonical_identifier,
  model::{Department, Employee},
  normalize::{normalize, solid},
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// The classification of one resolution attempt. Ambiguity and absence are
/// outcomes for the operator, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
  /// Exactly one entry fits.
  Unique(Uuid),
  /// More than one entry fits; the caller must not write.
  Ambiguous(Vec<Uuid>),
  NotFound,
}

impl MatchOutcome {
  fn from_candidates(mut hits: Vec<Uuid>) -> Self {
    hits.dedup();
    match hits.len() {
      0 => Self::NotFound,
      1 => Self::Unique(hits[0]),
      _ => Self::Ambiguous(hits),
    }
  }
}

/// Everything extracted from one external row that can drive resolution.
/// All identifier fields are pre-canonicalized digit strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchKey {
  pub job_number:  Option<String>,
  pub card_number: Option<String>,
  pub name:        Option<String>,
}

impl MatchKey {
  /// A key with nothing to match on — the row is structural and must be
  /// skipped, not resolved.
  pub fn is_blank(&self) -> bool {
    self.job_number.is_none()
      && self.card_number.is_none()
      && self.name.as_deref().is_none_or(|n| normalize(n).is_empty())
  }
}

// ─── Roster ──────────────────────────────────────────────────────────────────

/// The read-once-per-run index of all known identities.
///
/// Built at the start of a run and read-only for its duration. Indexes by
/// canonical job number, canonical card number, normalized full name, and a
/// solid-form list for prefix scans.
pub struct Roster {
  len:     usize,
  by_job:  HashMap<String, Uuid>,
  by_card: HashMap<String, Uuid>,
  /// Normalized full name → identities. Distinct people can share a name.
  by_name: HashMap<String, Vec<Uuid>>,
  solids:  Vec<(String, Uuid)>,
}

impl Roster {
  pub fn build(employees: &[Employee]) -> Self {
    let mut by_job = HashMap::new();
    let mut by_card = HashMap::new();
    let mut by_name: HashMap<String, Vec<Uuid>> = HashMap::new();
    let mut solids = Vec::with_capacity(employees.len());

    for employee in employees {
      if let Some(job) =
        employee.job_number.as_deref().and_then(canonical_identifier)
      {
        by_job.insert(job, employee.id);
      }
      if let Some(card) =
        employee.card_number.as_deref().and_then(canonical_identifier)
      {
        by_card.insert(card, employee.id);
      }

      let name = normalize(&employee.full_name);
      if !name.is_empty() {
        by_name.entry(name).or_default().push(employee.id);
        solids.push((solid(&employee.full_name), employee.id));
      }
    }

    Self { len: employees.len(), by_job, by_card, by_name, solids }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Resolve a full match key. Identifier tiers run first and win outright;
  /// an identifier that matches nothing falls through to the name tiers, so
  /// a mistyped job number can still resolve by exact name.
  pub fn resolve(&self, key: &MatchKey) -> MatchOutcome {
    if let Some(job) = key.job_number.as_deref()
      && let Some(&id) = self.by_job.get(job)
    {
      return MatchOutcome::Unique(id);
    }
    if let Some(card) = key.card_number.as_deref()
      && let Some(&id) = self.by_card.get(card)
    {
      return MatchOutcome::Unique(id);
    }
    match key.name.as_deref() {
      Some(name) => self.match_name(name),
      None => MatchOutcome::NotFound,
    }
  }

  /// Name-only resolution: exact normalized match, then prefix on the solid
  /// forms. Tiers short-circuit on the first one yielding any candidate.
  pub fn match_name(&self, raw: &str) -> MatchOutcome {
    let name = normalize(raw);
    if name.is_empty() {
      return MatchOutcome::NotFound;
    }

    if let Some(ids) = self.by_name.get(&name) {
      return MatchOutcome::from_candidates(ids.clone());
    }

    let probe = solid(raw);
    let hits: Vec<Uuid> = self
      .solids
      .iter()
      .filter(|(entry, _)| entry.starts_with(&probe))
      .map(|(_, id)| *id)
      .collect();
    MatchOutcome::from_candidates(hits)
  }
}

// ─── Departments ─────────────────────────────────────────────────────────────

/// Department lookup with the same exact-then-prefix strategy, plus manual
/// override aliases for names known to be ambiguous.
pub struct DepartmentIndex {
  overrides: HashMap<String, Uuid>,
  by_name:   HashMap<String, Vec<Uuid>>,
  solids:    Vec<(String, Uuid)>,
}

impl DepartmentIndex {
  /// `overrides` maps a raw alias to a department id; aliases are consulted
  /// before any matching tier.
  pub fn build(
    departments: &[Department],
    overrides: &[(String, Uuid)],
  ) -> Self {
    let mut by_name: HashMap<String, Vec<Uuid>> = HashMap::new();
    let mut solids = Vec::with_capacity(departments.len());
    for department in departments {
      let name = normalize(&department.name);
      if name.is_empty() {
        continue;
      }
      by_name.entry(name).or_default().push(department.id);
      solids.push((solid(&department.name), department.id));
    }

    let overrides = overrides
      .iter()
      .map(|(alias, id)| (normalize(alias), *id))
      .collect();

    Self { overrides, by_name, solids }
  }

  pub fn resolve(&self, raw: &str) -> MatchOutcome {
    let name = normalize(raw);
    if name.is_empty() {
      return MatchOutcome::NotFound;
    }
    if let Some(&id) = self.overrides.get(&name) {
      return MatchOutcome::Unique(id);
    }
    if let Some(ids) = self.by_name.get(&name) {
      return MatchOutcome::from_candidates(ids.clone());
    }
    let probe = solid(raw);
    let hits: Vec<Uuid> = self
      .solids
      .iter()
      .filter(|(entry, _)| entry.starts_with(&probe))
      .map(|(_, id)| *id)
      .collect();
    MatchOutcome::from_candidates(hits)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn employee(name: &str, job: Option<&str>, card: Option<&str>) -> Employee {
    let mut e = Employee::new(name);
    e.job_number = job.map(str::to_owned);
    e.card_number = card.map(str::to_owned);
    e
  }

  fn roster(employees: &[Employee]) -> Roster {
    Roster::build(employees)
  }

  #[test]
  fn exact_normalized_name_matches() {
    let staff = [employee("أحمد كريم", None, None)];
    let r = roster(&staff);

    // Variant orthography on the external side still hits tier 1.
    assert_eq!(r.match_name("احمد كريم"), MatchOutcome::Unique(staff[0].id));
  }

  #[test]
  fn prefix_tier_resolves_truncated_names() {
    let staff = [employee("محمد علي حسن", None, None)];
    let r = roster(&staff);

    assert_eq!(r.match_name("محمد علي"), MatchOutcome::Unique(staff[0].id));
  }

  #[test]
  fn two_prefix_candidates_are_ambiguous() {
    let staff = [
      employee("محمد علي حسن", None, None),
      employee("محمد علي كريم", None, None),
    ];
    let r = roster(&staff);

    match r.match_name("محمد علي") {
      MatchOutcome::Ambiguous(ids) => assert_eq!(ids.len(), 2),
      other => panic!("expected ambiguous, got {other:?}"),
    }
  }

  #[test]
  fn unknown_name_is_not_found() {
    let r = roster(&[employee("محمد علي حسن", None, None)]);
    assert_eq!(r.match_name("سعد منصور"), MatchOutcome::NotFound);
  }

  #[test]
  fn identifier_wins_over_name() {
    let staff = [
      employee("علي عباس الصباغ", Some("266772"), None),
      // A name-tier trap: exact-prefix of the external name below.
      employee("علي عباس", None, None),
    ];
    let r = roster(&staff);

    let key = MatchKey {
      job_number: Some("266772".into()),
      card_number: None,
      name: Some("علي عباس".into()),
    };
    assert_eq!(r.resolve(&key), MatchOutcome::Unique(staff[0].id));
  }

  #[test]
  fn unmatched_identifier_falls_through_to_name() {
    let staff = [employee("علي عباس الصباغ", Some("266772"), None)];
    let r = roster(&staff);

    let key = MatchKey {
      job_number: Some("999999".into()),
      card_number: None,
      name: Some("علي عباس الصباغ".into()),
    };
    assert_eq!(r.resolve(&key), MatchOutcome::Unique(staff[0].id));
  }

  #[test]
  fn card_number_is_the_second_identifier_tier() {
    let staff = [employee("سارة محمود", None, Some("1050123456"))];
    let r = roster(&staff);

    let key = MatchKey {
      job_number: None,
      card_number: Some("1050123456".into()),
      name: None,
    };
    assert_eq!(r.resolve(&key), MatchOutcome::Unique(staff[0].id));
  }

  #[test]
  fn blank_key_is_detected() {
    assert!(MatchKey::default().is_blank());
    assert!(
      MatchKey { name: Some("  ".into()), ..MatchKey::default() }.is_blank()
    );
    assert!(
      !MatchKey { name: Some("علي".into()), ..MatchKey::default() }.is_blank()
    );
  }

  #[test]
  fn empty_name_never_prefix_matches() {
    let r = roster(&[employee("محمد علي حسن", None, None)]);
    assert_eq!(r.match_name(""), MatchOutcome::NotFound);
    assert_eq!(r.match_name("   "), MatchOutcome::NotFound);
  }

  #[test]
  fn shared_exact_name_is_ambiguous() {
    let staff = [
      employee("حسين جواد", None, None),
      employee("حسين جواد", None, None),
    ];
    let r = roster(&staff);

    match r.match_name("حسين جواد") {
      MatchOutcome::Ambiguous(ids) => assert_eq!(ids.len(), 2),
      other => panic!("expected ambiguous, got {other:?}"),
    }
  }

  #[test]
  fn department_overrides_win() {
    let accounting = Department::new("الحسابات", 2);
    let audit = Department::new("التدقيق والحسابات", 2);
    let index = DepartmentIndex::build(
      &[accounting.clone(), audit.clone()],
      &[("الحسابات".to_owned(), audit.id)],
    );

    // Without the override this would hit the exact tier on `accounting`.
    assert_eq!(index.resolve("الحسابات"), MatchOutcome::Unique(audit.id));
  }

  #[test]
  fn department_prefix_matching_works() {
    let hr = Department::new("الموارد البشرية", 1);
    let index = DepartmentIndex::build(&[hr.clone()], &[]);

    assert_eq!(index.resolve("الموارد"), MatchOutcome::Unique(hr.id));
  }
}
