//! Parser for the legacy reporting-tool employee export.
//!
//! The feed is a DataSet-style XML envelope wrapping repeated item elements,
//! one per employee, produced by a system old enough to ship Arabic text in a
//! Windows codepage rather than UTF-8. Bytes are decoded first (default
//! label `windows-1256`), then walked with quick-xml events.
//!
//! Some feed revisions wrap every scalar in a one-element `<string>` array —
//! an artifact of the exporter's XML binding. The reader unwraps that layer
//! and yields plain optional scalars.

use quick_xml::events::Event;
use tracing::debug;

use crate::{Error, Result};

/// The codepage the legacy exporter actually uses.
pub const DEFAULT_FEED_ENCODING: &str = "windows-1256";

/// One employee as the feed describes them. Every field is optional — the
/// exporter omits elements it has no value for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEmployee {
  pub job_number:          Option<String>,
  pub full_name:           Option<String>,
  pub card_number:         Option<String>,
  /// Free-text certificate/degree description.
  pub certificate:         Option<String>,
  /// Certificate allowance percentage, kept as text — the exporter mixes
  /// "25" and "25%".
  pub certificate_percent: Option<String>,
  pub stage:               Option<String>,
  /// Organizational unit name, free text.
  pub department:          Option<String>,
}

impl FeedEmployee {
  fn is_empty(&self) -> bool {
    self.job_number.is_none()
      && self.full_name.is_none()
      && self.card_number.is_none()
      && self.certificate.is_none()
      && self.certificate_percent.is_none()
      && self.stage.is_none()
      && self.department.is_none()
  }

  fn assign(&mut self, field: &str, text: &str) {
    let text = text.trim();
    if text.is_empty() {
      return;
    }
    let slot = match field {
      "emp_no" | "emp_id" => &mut self.job_number,
      "emp_name" | "full_name" => &mut self.full_name,
      "card_no" => &mut self.card_number,
      "cert_name" | "certificate" => &mut self.certificate,
      "cert_percent" => &mut self.certificate_percent,
      "stage" | "degree_stage" => &mut self.stage,
      "dep_name" | "department" => &mut self.department,
      _ => return,
    };
    match slot {
      Some(existing) => {
        existing.push(' ');
        existing.push_str(text);
      }
      None => *slot = Some(text.to_owned()),
    }
  }
}

fn local_name(name: &[u8]) -> String {
  let local = match name.iter().rposition(|&b| b == b':') {
    Some(pos) => &name[pos + 1..],
    None => name,
  };
  String::from_utf8_lossy(local).to_lowercase()
}

/// Decode and parse a feed export. `encoding_label` is a WHATWG label such
/// as `windows-1256` or `utf-8`.
pub fn read_employee_feed(
  bytes: &[u8],
  encoding_label: &str,
) -> Result<Vec<FeedEmployee>> {
  let encoding = encoding_rs::Encoding::for_label(encoding_label.as_bytes())
    .ok_or_else(|| Error::UnknownEncoding(encoding_label.to_owned()))?;
  let (text, _, _) = encoding.decode(bytes);

  let mut reader = quick_xml::Reader::from_str(&text);
  reader.config_mut().trim_text(true);

  let mut employees: Vec<FeedEmployee> = Vec::new();
  let mut current = FeedEmployee::default();
  // Local element names from the root down to the cursor.
  let mut path: Vec<String> = Vec::new();

  loop {
    match reader.read_event() {
      Ok(Event::Start(ref e)) => {
        path.push(local_name(e.name().as_ref()));
      }
      Ok(Event::Empty(_)) => {}
      Ok(Event::Text(ref e)) => {
        let value = e
          .unescape()
          .map_err(|err| Error::Xml(err.to_string()))?;
        // Depth 3 is a field inside an item; a `<string>` wrapper pushes the
        // real field name one level up.
        let field = match path.as_slice() {
          [_, _, field] => Some(field.as_str()),
          [_, _, field, wrapper] if wrapper == "string" => Some(field.as_str()),
          _ => None,
        };
        if let Some(field) = field {
          current.assign(field, &value);
        }
      }
      Ok(Event::End(_)) => {
        if path.len() == 2 && !current.is_empty() {
          employees.push(std::mem::take(&mut current));
        }
        path.pop();
      }
      Ok(Event::Eof) => break,
      Err(err) => return Err(Error::Xml(err.to_string())),
      _ => {}
    }
  }

  debug!(count = employees.len(), "employee feed parsed");
  Ok(employees)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_plain_scalar_items() {
    let xml = r#"<?xml version="1.0"?>
      <NewDataSet>
        <Employee>
          <emp_no>266772</emp_no>
          <emp_name>علي عباس الصباغ</emp_name>
          <card_no>1050123456</card_no>
          <cert_name>بكالوريوس</cert_name>
          <cert_percent>25</cert_percent>
        </Employee>
        <Employee>
          <emp_no>300101</emp_no>
          <emp_name>سارة محمود</emp_name>
        </Employee>
      </NewDataSet>"#;

    let employees = read_employee_feed(xml.as_bytes(), "utf-8").unwrap();
    assert_eq!(employees.len(), 2);
    assert_eq!(employees[0].job_number.as_deref(), Some("266772"));
    assert_eq!(employees[0].full_name.as_deref(), Some("علي عباس الصباغ"));
    assert_eq!(employees[0].certificate_percent.as_deref(), Some("25"));
    assert_eq!(employees[1].card_number, None);
  }

  #[test]
  fn unwraps_string_array_scalars() {
    let xml = r#"<NewDataSet>
      <Employee>
        <emp_no><string>266772</string></emp_no>
        <emp_name><string>علي عباس</string></emp_name>
      </Employee>
    </NewDataSet>"#;

    let employees = read_employee_feed(xml.as_bytes(), "utf-8").unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0].job_number.as_deref(), Some("266772"));
    assert_eq!(employees[0].full_name.as_deref(), Some("علي عباس"));
  }

  #[test]
  fn decodes_the_legacy_codepage() {
    let xml = "<NewDataSet><Employee><emp_name>علي عباس</emp_name></Employee></NewDataSet>";
    let (encoded, _, unmappable) = encoding_rs::WINDOWS_1256.encode(xml);
    assert!(!unmappable);

    let employees =
      read_employee_feed(&encoded, DEFAULT_FEED_ENCODING).unwrap();
    assert_eq!(employees[0].full_name.as_deref(), Some("علي عباس"));
  }

  #[test]
  fn unknown_elements_and_blank_items_are_ignored() {
    let xml = r#"<NewDataSet>
      <Employee><mystery>42</mystery></Employee>
      <Employee><emp_no>7</emp_no></Employee>
    </NewDataSet>"#;

    let employees = read_employee_feed(xml.as_bytes(), "utf-8").unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0].job_number.as_deref(), Some("7"));
  }

  #[test]
  fn unknown_encoding_label_is_rejected() {
    let result = read_employee_feed(b"<x/>", "no-such-codepage");
    assert!(matches!(result, Err(Error::UnknownEncoding(_))));
  }
}
