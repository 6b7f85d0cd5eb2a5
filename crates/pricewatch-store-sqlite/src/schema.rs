//! SQL schema for the Pricewatch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS runs (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    list_id        TEXT NOT NULL,
    started_at     TEXT NOT NULL,    -- ISO 8601 UTC
    completed_at   TEXT,
    observed_count INTEGER NOT NULL DEFAULT 0,
    status         TEXT NOT NULL DEFAULT 'in_progress'  -- 'in_progress' | 'completed' | 'failed'
);

-- Current-state projection per entity; always derived from the
-- chronologically latest history point.
CREATE TABLE IF NOT EXISTS entities (
    handle         TEXT PRIMARY KEY,
    display_name   TEXT,
    current_price  REAL,             -- NULL encodes an unparsable price
    current_status TEXT NOT NULL,
    first_seen     TEXT NOT NULL,
    last_seen      TEXT NOT NULL,
    last_run_id    INTEGER REFERENCES runs(id)
);

-- History points are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS history_points (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    handle      TEXT NOT NULL REFERENCES entities(handle),
    price       REAL,
    status      TEXT NOT NULL,
    observed_at TEXT NOT NULL,
    run_id      INTEGER NOT NULL REFERENCES runs(id),
    UNIQUE (handle, observed_at)
);

-- Tag membership rows are opened and closed, never deleted.
CREATE TABLE IF NOT EXISTS list_memberships (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    handle     TEXT NOT NULL REFERENCES entities(handle),
    tag        TEXT NOT NULL,
    added_at   TEXT NOT NULL,
    removed_at TEXT,
    run_id     INTEGER NOT NULL REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS history_handle_idx     ON history_points(handle);
CREATE INDEX IF NOT EXISTS history_observed_idx   ON history_points(observed_at);
CREATE INDEX IF NOT EXISTS memberships_handle_idx ON list_memberships(handle);
CREATE INDEX IF NOT EXISTS memberships_tag_idx    ON list_memberships(tag);

PRAGMA user_version = 1;
";
