//! Conversions between the store's JSON row values and SQLite column values,
//! plus identifier vetting for dynamically-built SQL.
//!
//! Rows cross the `RecordStore` boundary as `serde_json::Map`s; SQLite sees
//! scalars. Strings stay text, integers stay integers, floats become REAL,
//! booleans become 0/1, JSON null becomes SQL NULL. Nested arrays/objects are
//! rejected — no relation in this schema stores structured payloads.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Vet a relation or column name before splicing it into SQL text. Parameters
/// cover values; names cannot be parameterized, so they are whitelisted to
/// `[A-Za-z_][A-Za-z0-9_]*` instead.
pub fn check_identifier(name: &str) -> Result<()> {
  let mut chars = name.chars();
  let head_ok = chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
  if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
    Ok(())
  } else {
    Err(Error::InvalidIdentifier(name.to_owned()))
  }
}

// ─── Values ──────────────────────────────────────────────────────────────────

pub fn encode_value(value: &Value) -> Result<SqlValue> {
  match value {
    Value::Null => Ok(SqlValue::Null),
    Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
    Value::Number(n) => {
      if let Some(i) = n.as_i64() {
        Ok(SqlValue::Integer(i))
      } else if let Some(f) = n.as_f64() {
        Ok(SqlValue::Real(f))
      } else {
        Err(Error::Unencodable(value.clone()))
      }
    }
    Value::String(s) => Ok(SqlValue::Text(s.clone())),
    Value::Array(_) | Value::Object(_) => Err(Error::Unencodable(value.clone())),
  }
}

/// Total in the other direction: every column value this store writes decodes
/// cleanly. Blobs are never written and decode to null; a non-finite REAL has
/// no JSON representation and also decodes to null.
pub fn decode_value(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::Number(i.into()),
    ValueRef::Real(f) => serde_json::Number::from_f64(f)
      .map(Value::Number)
      .unwrap_or(Value::Null),
    ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(_) => Value::Null,
  }
}
