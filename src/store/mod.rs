//! SQLite store for participations and everything hanging off them.
//!
//! - WAL mode, foreign keys enforced, busy timeout for concurrent writers
//! - Dates are `YYYY-MM-DD` text, timestamps `YYYY-MM-DD HH:MM:SS[.f]` text
//! - Schema version lives in `PRAGMA user_version`
//! - Mutations run inside `BEGIN IMMEDIATE` transactions opened by the engine
//!   modules; the query functions here never open transactions themselves.

pub mod challenges;
pub mod migrations;
pub mod participations;
pub mod points;
pub mod quizzes;
pub mod rankings;
pub mod roulette;
pub mod schema;
pub mod stamps;
pub mod users;
pub mod verifications;

use std::path::Path;
use std::str::FromStr;

use rusqlite::{types::Type, Connection, Row};
use serde::{de::DeserializeOwned, Serialize};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),
}

/// Open or create the database file, configure it and run pending migrations.
pub fn open(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (tests).
pub fn open_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// Read a text column into one of the domain's text-backed enums.
pub(crate) fn text_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Read a JSON text column.
pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// True for UNIQUE / PRIMARY KEY / CHECK failures.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_memory().expect("open");
        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("get foreign_keys");
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_constraint_detection() {
        let conn = open_memory().expect("open");
        conn.execute(
            "INSERT INTO users (user_id, display_name, updated_at) VALUES ('u1', 'A', '2026-10-01 00:00:00')",
            [],
        )
        .expect("insert");
        let err = conn
            .execute(
                "INSERT INTO users (user_id, display_name, updated_at) VALUES ('u1', 'B', '2026-10-01 00:00:00')",
                [],
            )
            .expect_err("duplicate");
        assert!(is_constraint_violation(&err));
    }
}
