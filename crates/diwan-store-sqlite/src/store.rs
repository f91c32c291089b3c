//! [`SqliteStore`] — the SQLite implementation of [`RecordStore`].

use std::{future::Future, path::Path};

use rusqlite::types::Value as SqlValue;

use diwan_core::store::{Filter, RecordStore, Row};

use crate::{
  encode::{check_identifier, decode_value, encode_value},
  schema::SCHEMA,
  Error, Result,
};

// ─── SQL assembly ────────────────────────────────────────────────────────────

/// Filter → `" WHERE a = ? AND b = ?"` plus the parameter values, in order.
/// The empty filter yields the empty clause.
fn filter_clause(filter: &Filter) -> Result<(String, Vec<SqlValue>)> {
  if filter.is_empty() {
    return Ok((String::new(), vec![]));
  }

  let mut conds = Vec::with_capacity(filter.terms().len());
  let mut params = Vec::with_capacity(filter.terms().len());
  for (column, value) in filter.terms() {
    check_identifier(column)?;
    if value.is_null() {
      // `= NULL` never matches in SQL; the trait's filter semantics treat
      // null as an ordinary value.
      conds.push(format!("{column} IS NULL"));
    } else {
      conds.push(format!("{column} = ?"));
      params.push(encode_value(value)?);
    }
  }

  Ok((format!(" WHERE {}", conds.join(" AND ")), params))
}

/// Row → vetted column names plus encoded values, in matching order.
fn encode_row(row: &Row) -> Result<(Vec<String>, Vec<SqlValue>)> {
  let mut columns = Vec::with_capacity(row.len());
  let mut values = Vec::with_capacity(row.len());
  for (column, value) in row {
    check_identifier(column)?;
    columns.push(column.clone());
    values.push(encode_value(value)?);
  }
  Ok((columns, values))
}

fn insert_sql(relation: &str, columns: &[String]) -> String {
  let placeholders = vec!["?"; columns.len()].join(", ");
  format!(
    "INSERT INTO {relation} ({}) VALUES ({placeholders})",
    columns.join(", ")
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A diwan record store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All SQL is
/// assembled from vetted identifiers with every value parameterized.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  fn select<'a>(
    &'a self,
    relation: &'a str,
    filter: Filter,
    columns: &'a [&'a str],
  ) -> impl Future<Output = Result<Vec<Row>>> + Send + 'a {
    async move {
      check_identifier(relation)?;
      for column in columns {
        check_identifier(column)?;
      }
      let projection = if columns.is_empty() {
        "*".to_owned()
      } else {
        columns.join(", ")
      };
      let (clause, params) = filter_clause(&filter)?;
      let sql = format!("SELECT {projection} FROM {relation}{clause}");

      let rows = self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let names: Vec<String> =
            stmt.column_names().iter().map(|n| (*n).to_owned()).collect();
          let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
              let mut out = Row::new();
              for (index, name) in names.iter().enumerate() {
                out.insert(name.clone(), decode_value(row.get_ref(index)?));
              }
              Ok(out)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?;
      Ok(rows)
    }
  }

  fn insert<'a>(
    &'a self,
    relation: &'a str,
    rows: Vec<Row>,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      check_identifier(relation)?;
      // Encode everything up front so a bad row fails before any write.
      let encoded: Vec<(Vec<String>, Vec<SqlValue>)> =
        rows.iter().map(encode_row).collect::<Result<_>>()?;
      if encoded.is_empty() {
        return Ok(());
      }
      let relation = relation.to_owned();

      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          for (columns, values) in encoded {
            tx.execute(
              &insert_sql(&relation, &columns),
              rusqlite::params_from_iter(values),
            )?;
          }
          tx.commit()?;
          Ok(())
        })
        .await?;
      Ok(())
    }
  }

  fn update<'a>(
    &'a self,
    relation: &'a str,
    patch: Row,
    filter: Filter,
  ) -> impl Future<Output = Result<u64>> + Send + 'a {
    async move {
      check_identifier(relation)?;
      let (set_columns, mut params) = encode_row(&patch)?;
      if set_columns.is_empty() {
        return Ok(0);
      }
      let assignments: Vec<String> =
        set_columns.iter().map(|c| format!("{c} = ?")).collect();
      let (clause, filter_params) = filter_clause(&filter)?;
      params.extend(filter_params);
      let sql = format!(
        "UPDATE {relation} SET {}{clause}",
        assignments.join(", ")
      );

      let affected = self
        .conn
        .call(move |conn| {
          Ok(conn.execute(&sql, rusqlite::params_from_iter(params))?)
        })
        .await?;
      Ok(affected as u64)
    }
  }

  fn delete<'a>(
    &'a self,
    relation: &'a str,
    filter: Filter,
  ) -> impl Future<Output = Result<u64>> + Send + 'a {
    async move {
      check_identifier(relation)?;
      let (clause, params) = filter_clause(&filter)?;
      let sql = format!("DELETE FROM {relation}{clause}");

      let affected = self
        .conn
        .call(move |conn| {
          Ok(conn.execute(&sql, rusqlite::params_from_iter(params))?)
        })
        .await?;
      Ok(affected as u64)
    }
  }

  fn upsert<'a>(
    &'a self,
    relation: &'a str,
    rows: Vec<Row>,
    conflict_key: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      check_identifier(relation)?;
      let key_columns: Vec<String> = conflict_key
        .split(',')
        .map(|k| k.trim().to_owned())
        .collect();
      for key in &key_columns {
        check_identifier(key)?;
      }
      let encoded: Vec<(Vec<String>, Vec<SqlValue>)> =
        rows.iter().map(encode_row).collect::<Result<_>>()?;
      if encoded.is_empty() {
        return Ok(());
      }
      let relation = relation.to_owned();

      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          for (columns, values) in encoded {
            let updates: Vec<String> = columns
              .iter()
              .filter(|c| !key_columns.contains(c))
              .map(|c| format!("{c} = excluded.{c}"))
              .collect();
            let action = if updates.is_empty() {
              "NOTHING".to_owned()
            } else {
              format!("UPDATE SET {}", updates.join(", "))
            };
            let sql = format!(
              "{} ON CONFLICT({}) DO {action}",
              insert_sql(&relation, &columns),
              key_columns.join(", "),
            );
            tx.execute(&sql, rusqlite::params_from_iter(values))?;
          }
          tx.commit()?;
          Ok(())
        })
        .await?;
      Ok(())
    }
  }
}
