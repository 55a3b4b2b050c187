//! Stamp rows, pre-materialized per participation and claimed in ascending order.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::Stamp;

/// Create stamps `1..=total`; existing numbers are left alone.
pub fn materialize(conn: &Connection, participation_id: i64, total: u32) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO stamps (participation_id, stamp_number, is_achieved) VALUES (?1, ?2, 0)",
    )?;
    for number in 1..=total {
        stmt.execute(params![participation_id, number])?;
    }
    Ok(())
}

pub fn reset_all(conn: &Connection, participation_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE stamps SET is_achieved = 0, achieved_date = NULL WHERE participation_id = ?1",
        [participation_id],
    )?;
    Ok(())
}

/// Claim the lowest unachieved stamp in one statement. Returns its number, or
/// `None` when every stamp is already achieved.
pub fn claim_next(conn: &Connection, participation_id: i64, date: NaiveDate) -> rusqlite::Result<Option<u32>> {
    conn.query_row(
        "UPDATE stamps SET is_achieved = 1, achieved_date = ?2
         WHERE id = (SELECT id FROM stamps
                     WHERE participation_id = ?1 AND is_achieved = 0
                     ORDER BY stamp_number LIMIT 1)
           AND is_achieved = 0
         RETURNING stamp_number",
        params![participation_id, date],
        |row| row.get(0),
    )
    .optional()
}

pub fn achieved_on(conn: &Connection, participation_id: i64, date: NaiveDate) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM stamps
             WHERE participation_id = ?1 AND is_achieved = 1 AND achieved_date = ?2)",
        params![participation_id, date],
        |row| row.get(0),
    )
}

pub fn list(conn: &Connection, participation_id: i64) -> rusqlite::Result<Vec<Stamp>> {
    let mut stmt = conn.prepare(
        "SELECT stamp_number, is_achieved, achieved_date FROM stamps
         WHERE participation_id = ?1 ORDER BY stamp_number",
    )?;
    let rows = stmt
        .query_map([participation_id], |row| {
            Ok(Stamp {
                stamp_number: row.get(0)?,
                is_achieved: row.get(1)?,
                achieved_date: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
