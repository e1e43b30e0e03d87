//! SQL schema for the record store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Only leaves are stored. Objects exist implicitly through the paths of their
/// descendants, so `null` and `{}` are never written.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS nodes (
    path        TEXT PRIMARY KEY,  -- keys joined by '/'
    value_json  TEXT NOT NULL      -- scalar or array, JSON-encoded
) WITHOUT ROWID;

PRAGMA user_version = 1;
";
