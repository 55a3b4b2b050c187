//! Schema versioning keyed on `PRAGMA user_version`. Only v1 exists; a later version adds
//! its upgrade step here.

use rusqlite::Connection;

use super::{schema, StoreError, SCHEMA_VERSION};

/// Create the schema on a fresh database and refuse one written by a newer build.
pub fn run(conn: &Connection) -> Result<(), StoreError> {
    let current_version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current_version == 0 {
        tracing::info!(target: "challenge_engine", "Initializing database schema v{SCHEMA_VERSION}");
        conn.execute_batch(schema::SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "database version {current_version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    Ok(())
}
