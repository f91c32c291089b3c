//! SQL schema for the diwan SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! `yearly_records` and `admin_summaries` deliberately carry no uniqueness
//! constraint on their logical keys: the hosted store this schema mirrors had
//! none either, and the reconciliation engine's check-then-upsert policy is
//! what keeps them singular per identity (and year).

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS departments (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    level      INTEGER NOT NULL,
    parent_id  TEXT REFERENCES departments(id),
    manager_id TEXT            -- employee id; resolved after roster sync
);

CREATE TABLE IF NOT EXISTS employees (
    id            TEXT PRIMARY KEY,
    job_number    TEXT UNIQUE,  -- stable external key, absent for some staff
    card_number   TEXT,
    full_name     TEXT NOT NULL,
    username      TEXT,         -- written by the provisioning pass
    role          TEXT NOT NULL DEFAULT 'employee',
    department_id TEXT REFERENCES departments(id),
    created_at    TEXT NOT NULL -- ISO 8601 UTC
);

-- At most one authoritative snapshot per identity; a full reimport deletes
-- and reinserts rather than patching.
CREATE TABLE IF NOT EXISTS salary_snapshots (
    id                    TEXT PRIMARY KEY,
    employee_id           TEXT NOT NULL REFERENCES employees(id),
    nominal_salary        REAL NOT NULL DEFAULT 0,
    certificate_allowance REAL NOT NULL DEFAULT 0,
    position_allowance    REAL NOT NULL DEFAULT 0,
    transport_allowance   REAL NOT NULL DEFAULT 0,
    marital_allowance     REAL NOT NULL DEFAULT 0,
    children_allowance    REAL NOT NULL DEFAULT 0,
    retirement_deduction  REAL NOT NULL DEFAULT 0,
    tax_deduction         REAL NOT NULL DEFAULT 0,
    loan_deduction        REAL NOT NULL DEFAULT 0,
    net_salary            REAL NOT NULL DEFAULT 0,
    bank_branch           TEXT,
    imported_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS yearly_records (
    id               TEXT PRIMARY KEY,
    employee_id      TEXT NOT NULL REFERENCES employees(id),
    year             INTEGER NOT NULL,
    thanks_count     INTEGER NOT NULL DEFAULT 0,
    committees_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS admin_summaries (
    id                    TEXT PRIMARY KEY,
    employee_id           TEXT NOT NULL REFERENCES employees(id),
    regular_leave_balance REAL NOT NULL DEFAULT 0,
    sick_leave_balance    REAL NOT NULL DEFAULT 0,
    absence_days          REAL NOT NULL DEFAULT 0
);

-- Strictly append-only. No UPDATE or DELETE is ever issued against this
-- table.
CREATE TABLE IF NOT EXISTS field_changes (
    id         TEXT PRIMARY KEY,
    table_name TEXT NOT NULL,
    record_id  TEXT NOT NULL,  -- owning identity, stable across replacement
    field      TEXT NOT NULL,
    old_value  TEXT,
    new_value  TEXT,
    actor      TEXT NOT NULL,
    changed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS employees_name_idx      ON employees(full_name);
CREATE INDEX IF NOT EXISTS snapshots_employee_idx  ON salary_snapshots(employee_id);
CREATE INDEX IF NOT EXISTS yearly_employee_idx     ON yearly_records(employee_id, year);
CREATE INDEX IF NOT EXISTS summaries_employee_idx  ON admin_summaries(employee_id);
CREATE INDEX IF NOT EXISTS changes_record_idx      ON field_changes(table_name, record_id, field);

PRAGMA user_version = 1;
";
