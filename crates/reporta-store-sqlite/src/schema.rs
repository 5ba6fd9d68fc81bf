//! SQL schema for the Reporta SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Reference copies of records managed elsewhere on the platform.
CREATE TABLE IF NOT EXISTS agencies (
    agency_id INTEGER PRIMARY KEY,
    name      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id   INTEGER PRIMARY KEY,
    agency_id INTEGER NOT NULL,
    username  TEXT NOT NULL,
    full_name TEXT
);

CREATE TABLE IF NOT EXISTS periods (
    period_id INTEGER PRIMARY KEY,
    label     TEXT NOT NULL,
    status    TEXT NOT NULL CHECK (status IN ('open', 'closed'))
);

CREATE TABLE IF NOT EXISTS initiatives (
    initiative_id INTEGER PRIMARY KEY,
    number        TEXT NOT NULL,
    name          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS programs (
    program_id       TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    description      TEXT,
    number           TEXT,
    owner_agency_id  INTEGER NOT NULL,
    initiative_id    INTEGER,
    restrict_editors INTEGER NOT NULL DEFAULT 0,
    start_date       TEXT,              -- YYYY-MM-DD
    end_date         TEXT,              -- YYYY-MM-DD
    created_by       INTEGER NOT NULL,
    created_at       TEXT NOT NULL,     -- RFC 3339 UTC
    updated_at       TEXT NOT NULL,
    is_deleted       INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS program_outcomes (
    program_id TEXT NOT NULL REFERENCES programs(program_id),
    outcome_id INTEGER NOT NULL,
    PRIMARY KEY (program_id, outcome_id)
);

-- Assignments are never deleted; revocation flips `state`.
CREATE TABLE IF NOT EXISTS agency_assignments (
    program_id  TEXT NOT NULL REFERENCES programs(program_id),
    agency_id   INTEGER NOT NULL,
    role        TEXT NOT NULL CHECK (role IN ('owner', 'editor', 'viewer')),
    state       TEXT NOT NULL CHECK (state IN ('active', 'revoked')),
    assigned_by INTEGER NOT NULL,
    notes       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (program_id, agency_id)
);

CREATE TABLE IF NOT EXISTS user_assignments (
    program_id  TEXT NOT NULL REFERENCES programs(program_id),
    user_id     INTEGER NOT NULL,
    role        TEXT NOT NULL CHECK (role IN ('editor', 'viewer')),
    state       TEXT NOT NULL CHECK (state IN ('active', 'revoked')),
    assigned_by INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (program_id, user_id)
);

CREATE TABLE IF NOT EXISTS submissions (
    submission_id TEXT PRIMARY KEY,
    program_id    TEXT NOT NULL REFERENCES programs(program_id),
    period_id     INTEGER NOT NULL,
    state         TEXT NOT NULL CHECK (state IN ('draft', 'finalized')),
    description   TEXT,
    rating        TEXT,
    remarks       TEXT,
    content_json  TEXT,                -- legacy content blob
    created_by    INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    is_deleted    INTEGER NOT NULL DEFAULT 0
);

-- Backstop for the application-level uniqueness check.
CREATE UNIQUE INDEX IF NOT EXISTS submissions_live_idx
    ON submissions(program_id, period_id) WHERE is_deleted = 0;

CREATE TABLE IF NOT EXISTS targets (
    target_id     TEXT PRIMARY KEY,
    submission_id TEXT NOT NULL REFERENCES submissions(submission_id),
    position      INTEGER NOT NULL,
    target_number TEXT,
    text          TEXT NOT NULL,
    status        TEXT
);

CREATE INDEX IF NOT EXISTS targets_submission_idx ON targets(submission_id, position);
CREATE INDEX IF NOT EXISTS agency_assignments_agency_idx ON agency_assignments(agency_id);

PRAGMA user_version = 1;
";
