//! diwan — the administrative data injector.
//!
//! Reads `diwan.toml` (or the path given with `--config`), opens the SQLite
//! record store, and runs one import, patch, or maintenance pass per
//! invocation. Every pass goes through the reconciliation engine; nothing
//! writes around it.

mod plans;
mod report;
mod settings;

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use diwan_core::{
  columns::{resolve_columns, ColumnMap, FieldSpec},
  extract::canonical_identifier,
  matcher::{DepartmentIndex, MatchKey, MatchOutcome, Roster},
  model::{Department, Employee, Record, SalarySnapshot},
  store::{Filter, RecordStore, Row},
};
use diwan_recon::{
  engine::Importer,
  history::HistoryRecorder,
  plan::{EntityPolicy, WritePolicy},
  provision::provision_usernames,
  sync::{sync_roster, RosterEntry},
};
use diwan_sheets::{SheetOptions, SheetRows, SheetSelector, Workbook};
use diwan_store_sqlite::SqliteStore;

use crate::settings::{Profile, SheetProfile};

#[derive(Parser)]
#[command(author, version, about = "diwan personnel data injector")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "diwan.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Import the monthly salary workbook (full snapshot replace per identity).
  Salaries {
    file: PathBuf,
    /// Worksheet name; overrides the profile.
    #[arg(long)]
    sheet: Option<String>,
    /// Zero-based header row; overrides the profile.
    #[arg(long)]
    header_row: Option<usize>,
  },
  /// Import yearly honors and committee counters.
  Yearly {
    file: PathBuf,
    #[arg(long)]
    year: i32,
    #[arg(long)]
    sheet: Option<String>,
    #[arg(long)]
    header_row: Option<usize>,
  },
  /// Import leave balances and absence aggregates.
  Leave {
    file: PathBuf,
    #[arg(long)]
    sheet: Option<String>,
    #[arg(long)]
    header_row: Option<usize>,
  },
  /// Patch one database field from one workbook column.
  Patch {
    file: PathBuf,
    /// Header keyword locating the source column.
    #[arg(long)]
    keyword: String,
    /// Target column in the record store.
    #[arg(long)]
    field: String,
    #[arg(long, default_value = SalarySnapshot::RELATION)]
    relation: String,
    /// Treat the cell as free text instead of a figure.
    #[arg(long)]
    text: bool,
    #[arg(long)]
    sheet: Option<String>,
    #[arg(long)]
    header_row: Option<usize>,
  },
  /// Edit one identity's salary record by hand.
  Edit {
    /// Full name or job number of the identity.
    query: String,
    /// `field=value` assignments.
    #[arg(required = true)]
    set: Vec<String>,
  },
  /// Sync identities from the legacy XML employee feed.
  RosterSync {
    file: PathBuf,
    /// Create identities for feed entries with no roster match.
    #[arg(long)]
    create_missing: bool,
  },
  /// Derive usernames for identities that have none.
  Provision,
  /// Show the change history for one field of one record.
  History {
    #[arg(long)]
    table: String,
    /// The owning identity id.
    #[arg(long)]
    record: Uuid,
    #[arg(long)]
    field: String,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("DIWAN"))
    .build()
    .context("failed to read config file")?;
  let profile: Profile = settings
    .try_deserialize()
    .context("failed to deserialise profile")?;

  let store_path = expand_tilde(&profile.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );
  let history = HistoryRecorder::new(Arc::clone(&store), profile.actor.clone());
  let importer = Importer::new(Arc::clone(&store), history.clone());

  match cli.command {
    Command::Salaries { file, sheet, header_row } => {
      let options = sheet_options(&profile.sheets.salaries, sheet, header_row);
      let (columns, rows) =
        read_mapped(&file, &options, &plans::salary_specs()).await?;
      let (_, roster) = load_roster(store.as_ref()).await?;
      let summary = importer
        .run(&rows, &plans::salary_plan(columns, &profile), &roster)
        .await?;
      report::print_summary("salary import", &summary);
    }
    Command::Yearly { file, year, sheet, header_row } => {
      let options = sheet_options(&profile.sheets.yearly, sheet, header_row);
      let (columns, rows) =
        read_mapped(&file, &options, &plans::yearly_specs()).await?;
      let (_, roster) = load_roster(store.as_ref()).await?;
      let summary = importer
        .run(&rows, &plans::yearly_plan(columns, year, &profile), &roster)
        .await?;
      report::print_summary(&format!("yearly import ({year})"), &summary);
    }
    Command::Leave { file, sheet, header_row } => {
      let options = sheet_options(&profile.sheets.leave, sheet, header_row);
      let (columns, rows) =
        read_mapped(&file, &options, &plans::leave_specs()).await?;
      let (_, roster) = load_roster(store.as_ref()).await?;
      let summary = importer
        .run(&rows, &plans::leave_plan(columns, &profile), &roster)
        .await?;
      report::print_summary("leave import", &summary);
    }
    Command::Patch { file, keyword, field, relation, text, sheet, header_row } => {
      let options = sheet_options(&profile.sheets.patch, sheet, header_row);
      let (columns, rows) =
        read_mapped(&file, &options, &plans::patch_specs(&keyword, &field))
          .await?;
      let (_, roster) = load_roster(store.as_ref()).await?;
      let plan = plans::patch_plan(columns, &relation, &field, !text, &profile);
      let summary = importer.run(&rows, &plan, &roster).await?;
      report::print_summary(&format!("patch {relation}.{field}"), &summary);
    }
    Command::Edit { query, set } => {
      let (employees, roster) = load_roster(store.as_ref()).await?;
      run_edit(&importer, &employees, &roster, &query, &set).await?;
    }
    Command::RosterSync { file, create_missing } => {
      let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("failed to read {file:?}"))?;
      let feed =
        diwan_sheets::read_employee_feed(&bytes, &profile.feed_encoding)?;
      let entries: Vec<RosterEntry> = feed
        .into_iter()
        .map(|e| RosterEntry {
          job_number:  e.job_number,
          card_number: e.card_number,
          full_name:   e.full_name.unwrap_or_default(),
          role:        e.stage,
          department:  e.department,
        })
        .collect();

      let (_, roster) = load_roster(store.as_ref()).await?;
      let departments = load_departments(store.as_ref(), &profile).await?;
      let summary = sync_roster(
        store.as_ref(),
        &history,
        &entries,
        &roster,
        &departments,
        create_missing,
      )
      .await?;
      report::print_summary("roster sync", &summary);
    }
    Command::Provision => {
      let report = provision_usernames(store.as_ref(), &history).await?;
      report::print_provision(&report);
    }
    Command::History { table, record, field } => {
      let changes = history
        .changes_for(&table, record, &field)
        .await
        .context("failed to read change history")?;
      if changes.is_empty() {
        println!("no recorded changes for {table}/{record}/{field}");
      }
      for change in changes {
        println!(
          "{}  {}  {} -> {}  ({})",
          change.changed_at.format("%Y-%m-%d %H:%M:%S"),
          change.field,
          change.old_value.as_deref().unwrap_or("-"),
          change.new_value.as_deref().unwrap_or("-"),
          change.actor,
        );
      }
    }
  }

  Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Read a workbook and resolve its columns; a missing required column fails
/// here, before the store is touched.
async fn read_mapped(
  file: &Path,
  options: &SheetOptions,
  specs: &[FieldSpec],
) -> anyhow::Result<(ColumnMap, Vec<diwan_core::row::RawRow>)> {
  let bytes = tokio::fs::read(file)
    .await
    .with_context(|| format!("failed to read {file:?}"))?;
  let mut workbook = Workbook::from_bytes(bytes)
    .with_context(|| format!("failed to open workbook {file:?}"))?;
  let SheetRows { header, rows } = workbook.read_sheet(options)?;
  let columns = resolve_columns(&header, specs)
    .context("column mapping failed; check the header row setting")?;
  Ok((columns, rows))
}

fn sheet_options(
  profile: &SheetProfile,
  sheet: Option<String>,
  header_row: Option<usize>,
) -> SheetOptions {
  let selector = match sheet.or_else(|| profile.sheet_name.clone()) {
    Some(name) => SheetSelector::Name(name),
    None => SheetSelector::Index(profile.sheet_index),
  };
  SheetOptions {
    sheet:      selector,
    header_row: header_row.unwrap_or(profile.header_row),
  }
}

/// Read every identity once; the roster is read-only for the rest of the run.
async fn load_roster(
  store: &SqliteStore,
) -> anyhow::Result<(Vec<Employee>, Roster)> {
  let rows = store
    .select(Employee::RELATION, Filter::all(), &[])
    .await
    .context("failed to load the employee roster")?;
  let employees: Vec<Employee> = rows
    .into_iter()
    .filter_map(|row| Employee::from_row(row).ok())
    .collect();
  let roster = Roster::build(&employees);
  Ok((employees, roster))
}

async fn load_departments(
  store: &SqliteStore,
  profile: &Profile,
) -> anyhow::Result<DepartmentIndex> {
  let rows = store
    .select(Department::RELATION, Filter::all(), &[])
    .await
    .context("failed to load departments")?;
  let departments: Vec<Department> = rows
    .into_iter()
    .filter_map(|row| Department::from_row(row).ok())
    .collect();

  let mut overrides = Vec::new();
  for (alias, id) in &profile.department_overrides {
    let id = Uuid::parse_str(id)
      .with_context(|| format!("bad department override id for {alias:?}"))?;
    overrides.push((alias.clone(), id));
  }
  Ok(DepartmentIndex::build(&departments, &overrides))
}

/// Resolve one identity and apply `field=value` assignments to its salary
/// record, through the same engine path as a file import.
async fn run_edit(
  importer: &Importer<SqliteStore>,
  employees: &[Employee],
  roster: &Roster,
  query: &str,
  assignments: &[String],
) -> anyhow::Result<()> {
  let names: HashMap<Uuid, &str> = employees
    .iter()
    .map(|e| (e.id, e.full_name.as_str()))
    .collect();

  let key = if query.chars().any(|c| c.is_ascii_digit()) {
    MatchKey { job_number: canonical_identifier(query), ..MatchKey::default() }
  } else {
    MatchKey { name: Some(query.to_owned()), ..MatchKey::default() }
  };

  let employee = match roster.resolve(&key) {
    MatchOutcome::Unique(id) => id,
    MatchOutcome::Ambiguous(candidates) => {
      println!("{query:?} is ambiguous between:");
      for id in candidates {
        println!("  {}  {}", id, names.get(&id).copied().unwrap_or("?"));
      }
      anyhow::bail!("refine the query until it resolves uniquely");
    }
    MatchOutcome::NotFound => anyhow::bail!("no identity matches {query:?}"),
  };

  let mut patch = Row::new();
  for assignment in assignments {
    let (field, value) = assignment
      .split_once('=')
      .with_context(|| format!("expected field=value, got {assignment:?}"))?;
    let value = match value.trim().parse::<f64>() {
      Ok(number) => Value::from(number),
      Err(_) => Value::from(value.trim()),
    };
    patch.insert(field.trim().to_owned(), value);
  }

  let entity =
    EntityPolicy::new(SalarySnapshot::RELATION, WritePolicy::Merge)
      .stamped("imported_at");
  match importer.apply_one(employee, &entity, patch).await {
    Ok(outcome) => {
      println!(
        "{} ({employee}): {outcome:?}",
        names.get(&employee).copied().unwrap_or("?")
      );
      Ok(())
    }
    Err(failure) => anyhow::bail!("edit rejected: {}", failure.message),
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
