//! Coercion of loosely-typed cells into identifiers and financial figures.
//!
//! Payroll workbooks arrive with thousands separators, currency suffixes,
//! Arabic-Indic digits, and placeholder text in numeric columns. The import
//! pipeline favors completing a run over aborting on a single dirty cell, so
//! numeric coercion here is total: anything unparseable becomes `0.0`. The
//! fallible [`try_parse_number`] variant exists so callers can count how
//! often that default fired.

use std::ops::RangeInclusive;

use crate::{
  normalize::fold_digits,
  row::{CellValue, RawRow},
};

/// Digit-length envelope of a plausible card/job number token.
pub const CARD_LEN_RANGE: RangeInclusive<usize> = 8..=16;

// ─── Numbers ─────────────────────────────────────────────────────────────────

/// Parse a financial figure from a cell, or `None` when the cell holds
/// nothing recognizably numeric. A date is not a figure.
pub fn try_parse_number(cell: &CellValue) -> Option<f64> {
  match cell {
    CellValue::Number(n) => Some(*n),
    CellValue::Text(s) => parse_numeric_text(s),
    CellValue::Date(_) | CellValue::Empty => None,
  }
}

/// Total variant of [`try_parse_number`]: unparseable cells become `0.0`.
pub fn parse_number(cell: &CellValue) -> f64 {
  try_parse_number(cell).unwrap_or(0.0)
}

/// Extract the leading numeric run from text: fold Arabic-Indic digits, find
/// the first digit, honor a `-` or a closed accounting-style `(…)` wrapper
/// immediately before it, swallow thousands separators, and stop at the
/// first character that cannot extend the number.
fn parse_numeric_text(s: &str) -> Option<f64> {
  let folded = fold_digits(s);
  let chars: Vec<char> = folded.chars().collect();
  let start = chars.iter().position(char::is_ascii_digit)?;

  let before = chars[..start].iter().rev().find(|c| !c.is_whitespace());
  let negative = before == Some(&'-')
    || (before == Some(&'(') && chars[start..].contains(&')'));

  let mut cleaned = String::with_capacity(chars.len() - start + 1);
  if negative {
    cleaned.push('-');
  }
  let mut seen_dot = false;
  for &c in &chars[start..] {
    match c {
      '0'..='9' => cleaned.push(c),
      '.' if !seen_dot => {
        seen_dot = true;
        cleaned.push('.');
      }
      ',' => {}
      _ => break,
    }
  }

  cleaned.trim_end_matches('.').parse().ok()
}

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Canonicalize a job/card number cell to a digit string: Arabic-Indic
/// digits folded, non-digits dropped, leading zeros removed. `None` when no
/// digits remain. Numeric cells must be integral — Excel stores identifiers
/// as floats.
pub fn parse_identifier(cell: &CellValue) -> Option<String> {
  match cell {
    CellValue::Text(s) => canonical_identifier(s),
    CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && *n >= 0.0 => {
      Some(strip_leading_zeros(&format!("{n:.0}")))
    }
    _ => None,
  }
}

/// Text-side identifier canonicalization. Applied to roster values and
/// external cells alike so both sides compare in the same form.
pub fn canonical_identifier(raw: &str) -> Option<String> {
  let digits: String = fold_digits(raw)
    .chars()
    .filter(char::is_ascii_digit)
    .collect();
  if digits.is_empty() {
    None
  } else {
    Some(strip_leading_zeros(&digits))
  }
}

fn strip_leading_zeros(digits: &str) -> String {
  let stripped = digits.trim_start_matches('0');
  if stripped.is_empty() {
    "0".to_owned()
  } else {
    stripped.to_owned()
  }
}

// ─── Card-number scan ────────────────────────────────────────────────────────

/// A card-like token located in a row, with the column it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardHit {
  pub token:  String,
  pub column: usize,
}

impl CardHit {
  /// True when the token came from somewhere other than the declared column.
  pub fn from_fallback(&self, declared: Option<usize>) -> bool {
    declared != Some(self.column)
  }
}

/// Locate a card-number token: the declared column first, then a
/// left-to-right scan of the whole row for the first cell that is entirely
/// digits within the length envelope.
///
/// The fallback scan is a structural heuristic, not a guarantee — any
/// all-digit column of the right width (a phone number, say) can satisfy it
/// when the declared column is blank. Callers should log fallback hits.
pub fn find_card_like_token(
  row: &RawRow,
  declared: Option<usize>,
  len_range: &RangeInclusive<usize>,
) -> Option<CardHit> {
  if let Some(column) = declared
    && let Some(token) = card_token(row.get(column), len_range)
  {
    return Some(CardHit { token, column });
  }

  for (column, cell) in row.cells().iter().enumerate() {
    if declared == Some(column) {
      continue;
    }
    if let Some(token) = card_token(cell, len_range) {
      return Some(CardHit { token, column });
    }
  }

  None
}

/// The cell's digit token when the cell is *entirely* one digit run of the
/// right width. Mixed text is rejected — digits embedded in prose are not a
/// card number.
fn card_token(
  cell: &CellValue,
  len_range: &RangeInclusive<usize>,
) -> Option<String> {
  let digits = match cell {
    CellValue::Text(s) => {
      let folded = fold_digits(s.trim());
      if folded.is_empty() || !folded.chars().all(|c| c.is_ascii_digit()) {
        return None;
      }
      folded
    }
    CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && *n >= 0.0 => {
      format!("{n:.0}")
    }
    _ => return None,
  };

  len_range
    .contains(&digits.chars().count())
    .then(|| strip_leading_zeros(&digits))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_owned())
  }

  // ── Numbers ───────────────────────────────────────────────────────────────

  #[test]
  fn parse_number_is_total() {
    assert_eq!(parse_number(&CellValue::Empty), 0.0);
    assert_eq!(parse_number(&text("")), 0.0);
    assert_eq!(parse_number(&text("غير محدد")), 0.0);
    assert_eq!(parse_number(&text("1,234.5")), 1234.5);
  }

  #[test]
  fn parse_number_passes_numeric_cells_through() {
    assert_eq!(parse_number(&CellValue::Number(500_000.0)), 500_000.0);
    assert_eq!(parse_number(&CellValue::Number(-42.5)), -42.5);
  }

  #[test]
  fn parse_number_handles_separators_and_noise() {
    assert_eq!(parse_number(&text("500,000")), 500_000.0);
    assert_eq!(parse_number(&text("120.50 دينار")), 120.5);
    assert_eq!(parse_number(&text("-1,200")), -1200.0);
  }

  #[test]
  fn parse_number_reads_accounting_negatives() {
    assert_eq!(parse_number(&text("(1,200)")), -1200.0);
    assert_eq!(parse_number(&text("( 500.25 )")), -500.25);
    // An unclosed wrapper is noise, not a sign.
    assert_eq!(parse_number(&text("(1,200")), 1200.0);
  }

  #[test]
  fn parse_number_folds_arabic_digits() {
    assert_eq!(parse_number(&text("٥٠٠٬٠٠٠")), 500_000.0);
    assert_eq!(parse_number(&text("١٢٣٫٤")), 123.4);
  }

  #[test]
  fn try_parse_number_reports_the_default_path() {
    assert_eq!(try_parse_number(&text("n/a")), None);
    assert_eq!(try_parse_number(&CellValue::Empty), None);
    assert_eq!(try_parse_number(&text("7")), Some(7.0));
  }

  #[test]
  fn dates_are_not_figures() {
    let d = CellValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(try_parse_number(&d), None);
    assert_eq!(parse_number(&d), 0.0);
  }

  // ── Identifiers ───────────────────────────────────────────────────────────

  #[test]
  fn parse_identifier_canonicalizes() {
    assert_eq!(parse_identifier(&text(" 266772 ")), Some("266772".into()));
    assert_eq!(parse_identifier(&text("٢٦٦٧٧٢")), Some("266772".into()));
    assert_eq!(
      parse_identifier(&CellValue::Number(266772.0)),
      Some("266772".into())
    );
    assert_eq!(parse_identifier(&text("00123")), Some("123".into()));
  }

  #[test]
  fn parse_identifier_rejects_non_identifiers() {
    assert_eq!(parse_identifier(&CellValue::Empty), None);
    assert_eq!(parse_identifier(&text("—")), None);
    assert_eq!(parse_identifier(&CellValue::Number(12.5)), None);
  }

  // ── Card scan ─────────────────────────────────────────────────────────────

  #[test]
  fn card_scan_prefers_declared_column() {
    let row = RawRow::new(vec![
      text("12345678"),
      text("علي عباس"),
      text("87654321"),
    ]);
    let hit = find_card_like_token(&row, Some(2), &CARD_LEN_RANGE).unwrap();
    assert_eq!(hit.token, "87654321");
    assert_eq!(hit.column, 2);
    assert!(!hit.from_fallback(Some(2)));
  }

  #[test]
  fn card_scan_falls_back_across_the_row() {
    let row = RawRow::new(vec![
      text("علي عباس"),
      CellValue::Empty, // declared card column, blank
      text("2024"),     // too short to be a card
      CellValue::Number(1_050_123_456.0),
    ]);
    let hit = find_card_like_token(&row, Some(1), &CARD_LEN_RANGE).unwrap();
    assert_eq!(hit.token, "1050123456");
    assert_eq!(hit.column, 3);
    assert!(hit.from_fallback(Some(1)));
  }

  #[test]
  fn card_scan_rejects_digits_embedded_in_text() {
    let row = RawRow::new(vec![text("هاتف: 07701234567"), text("x")]);
    assert_eq!(find_card_like_token(&row, None, &CARD_LEN_RANGE), None);
  }

  #[test]
  fn card_scan_empty_row_finds_nothing() {
    let row = RawRow::new(vec![CellValue::Empty, text("  ")]);
    assert_eq!(find_card_like_token(&row, Some(0), &CARD_LEN_RANGE), None);
  }
}
