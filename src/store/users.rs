//! Display names as last reported by the identity provider.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::domain::User;

pub fn upsert(conn: &Connection, user: &User, now: NaiveDateTime) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, display_name, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name, updated_at = excluded.updated_at",
        params![user.id, user.display_name, now],
    )?;
    Ok(())
}
