//! SQL schema for the tombstone SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One table for every record type. Soft deletes are UPDATEs; only a hard
-- delete ever issues DELETE.
CREATE TABLE IF NOT EXISTS records (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    record_type  TEXT    NOT NULL,
    created_at   TEXT    NOT NULL,   -- ISO 8601 UTC; set once
    updated_at   TEXT    NOT NULL,   -- ISO 8601 UTC; every persist
    deleted      INTEGER NOT NULL DEFAULT 0,
    deleted_at   TEXT,
    fields_json  TEXT    NOT NULL,   -- payload as a JSON object
    CHECK (deleted IN (0, 1)),
    CHECK ((deleted = 0) = (deleted_at IS NULL))
);

-- Audit entries are strictly append-only and outlive hard-deleted records,
-- so there is no foreign key to `records`.
CREATE TABLE IF NOT EXISTS audit_entries (
    entry_id      TEXT PRIMARY KEY,
    action        TEXT    NOT NULL,  -- 'created' | 'updated' | 'deleted'
    origin        TEXT,
    actor         TEXT,
    record_type   TEXT    NOT NULL,
    record_id     INTEGER NOT NULL,
    snapshot_json TEXT    NOT NULL,
    changes_json  TEXT    NOT NULL DEFAULT '{}',
    recorded_at   TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS records_type_deleted_idx ON records(record_type, deleted);
CREATE INDEX IF NOT EXISTS audit_record_idx         ON audit_entries(record_type, record_id);

PRAGMA user_version = 1;
";
