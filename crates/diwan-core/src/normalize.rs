//! Canonical text forms for Arabic personnel data.
//!
//! The source systems disagree on Arabic orthography: hamza carriers on Alef,
//! Alef-Maksura vs Ya, Ta-Marbuta vs Ha, stray diacritics, tatweel padding,
//! and invisible directional marks all vary between the legacy feed, the
//! payroll workbooks, and manual entry. No comparison in this workspace uses
//! raw text; names and headers are always passed through [`normalize`] first.

/// Invisible formatting characters that survive copy-paste from the legacy
/// tooling and defeat string equality.
const INVISIBLES: [char; 6] = [
  '\u{200B}', // zero-width space
  '\u{200C}', // zero-width non-joiner
  '\u{200D}', // zero-width joiner
  '\u{200E}', // left-to-right mark
  '\u{200F}', // right-to-left mark
  '\u{FEFF}', // byte-order mark
];

const TATWEEL: char = '\u{0640}';

/// Arabic combining marks: fathatan through the U+065x block, plus the
/// superscript Alef used in religious honorifics.
fn is_diacritic(c: char) -> bool {
  matches!(c, '\u{064B}'..='\u{065F}' | '\u{0670}')
}

/// Canonicalize a string for comparison. Pure and total; empty input yields
/// the empty string. Idempotent: applying it twice changes nothing.
///
/// Folding rules: drop invisibles, diacritics, and tatweel; unify the Alef
/// variants (`أ` `إ` `آ`) to bare Alef, Alef-Maksura and Farsi Ya to `ي`,
/// Ta-Marbuta to `ه`; lowercase any Latin; collapse whitespace runs to one
/// space and trim; join the spaced form of the "عبد ال…" compound so both
/// renditions compare equal.
pub fn normalize(input: &str) -> String {
  let mut folded = String::with_capacity(input.len());
  for c in input.chars() {
    if INVISIBLES.contains(&c) || c == TATWEEL || is_diacritic(c) {
      continue;
    }
    match c {
      'أ' | 'إ' | 'آ' => folded.push('ا'),
      'ى' | 'ی' => folded.push('ي'),
      'ة' => folded.push('ه'),
      c if c.is_whitespace() => folded.push(' '),
      c => folded.extend(c.to_lowercase()),
    }
  }

  let mut collapsed = String::with_capacity(folded.len());
  for word in folded.split_whitespace() {
    if !collapsed.is_empty() {
      collapsed.push(' ');
    }
    collapsed.push_str(word);
  }

  // "عبد الرحمن" and "عبدالرحمن" are the same name typed two ways.
  collapsed.replace("عبد ال", "عبدال")
}

/// The normalized form with all whitespace removed.
///
/// Used exclusively for prefix comparison, where token boundaries in the
/// shorter string are unreliable. Never used for exact-match decisions.
pub fn solid(input: &str) -> String {
  normalize(input).split_whitespace().collect()
}

/// Replace Arabic-Indic and extended (Farsi) digits with their ASCII
/// equivalents, and the Arabic decimal/thousands separators with `.` and `,`.
/// Everything else passes through untouched.
pub fn fold_digits(input: &str) -> String {
  input
    .chars()
    .map(|c| match c {
      '\u{0660}'..='\u{0669}' => {
        char::from(b'0' + (c as u32 - 0x0660) as u8)
      }
      '\u{06F0}'..='\u{06F9}' => {
        char::from(b'0' + (c as u32 - 0x06F0) as u8)
      }
      '\u{066B}' => '.', // arabic decimal separator
      '\u{066C}' => ',', // arabic thousands separator
      '\u{060C}' => ',', // arabic comma
      c => c,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_input_yields_empty() {
    assert_eq!(normalize(""), "");
    assert_eq!(normalize("   "), "");
    assert_eq!(solid(""), "");
  }

  #[test]
  fn idempotent() {
    let inputs = [
      "  عَبْد  الرَّحْمَن\u{200F}  أحمد  ",
      "مُصْطَفَى الكاظمي",
      "Ali HASSAN",
      "محـــمد",
    ];
    for input in inputs {
      let once = normalize(input);
      assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
    }
  }

  #[test]
  fn alef_variants_unify() {
    assert_eq!(normalize("أحمد"), normalize("احمد"));
    assert_eq!(normalize("إحمد"), normalize("احمد"));
    assert_eq!(normalize("آحمد"), normalize("احمد"));
  }

  #[test]
  fn ya_and_ta_marbuta_unify() {
    assert_eq!(normalize("مصطفى"), normalize("مصطفي"));
    assert_eq!(normalize("علی"), normalize("علي")); // farsi ya
    assert_eq!(normalize("فاطمة"), normalize("فاطمه"));
  }

  #[test]
  fn diacritics_and_tatweel_stripped() {
    assert_eq!(normalize("مُحَمَّد"), "محمد");
    assert_eq!(normalize("محـــمد"), "محمد");
  }

  #[test]
  fn invisible_marks_stripped() {
    assert_eq!(normalize("محمد\u{200F} علي\u{200B}"), "محمد علي");
    assert_eq!(normalize("\u{FEFF}احمد"), "احمد");
  }

  #[test]
  fn abd_compound_collapses_both_ways() {
    assert_eq!(normalize("عبد الرحمن"), normalize("عبدالرحمن"));
    assert_eq!(normalize("كريم عبد الله"), normalize("كريم عبدالله"));
  }

  #[test]
  fn whitespace_collapsed_and_trimmed() {
    assert_eq!(normalize("  محمد   علي  "), "محمد علي");
    assert_eq!(normalize("محمد\tعلي\nحسن"), "محمد علي حسن");
  }

  #[test]
  fn latin_is_case_folded() {
    assert_eq!(normalize("Ali HASSAN"), "ali hassan");
  }

  #[test]
  fn solid_removes_internal_whitespace() {
    assert_eq!(solid("محمد علي حسن"), "محمدعليحسن");
    assert_eq!(solid("  عبد الرحمن  "), "عبدالرحمن");
  }

  #[test]
  fn digits_fold_to_ascii() {
    assert_eq!(fold_digits("٢٦٦٧٧٢"), "266772");
    assert_eq!(fold_digits("۱۲۳"), "123");
    assert_eq!(fold_digits("١٬٢٣٤٫٥"), "1,234.5");
    assert_eq!(fold_digits("abc 42"), "abc 42");
  }
}
