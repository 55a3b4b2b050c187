//! Verification rows: at most one per (participation, date, slot).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{json_col, to_json};
use crate::domain::{Verification, VerificationPayload};

const COLUMNS: &str = "id, participation_id, verification_date, verification_time, verification_slot,
     verification_data, is_verified, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Verification> {
    Ok(Verification {
        id: row.get(0)?,
        participation_id: row.get(1)?,
        verification_date: row.get(2)?,
        verification_time: row.get(3)?,
        verification_slot: row.get(4)?,
        verification_data: json_col(row, 5)?,
        is_verified: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn count_on(conn: &Connection, participation_id: i64, date: NaiveDate) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM verifications WHERE participation_id = ?1 AND verification_date = ?2",
        params![participation_id, date],
        |row| row.get(0),
    )
}

pub fn slot_taken(conn: &Connection, participation_id: i64, date: NaiveDate, slot: u32) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM verifications
             WHERE participation_id = ?1 AND verification_date = ?2 AND verification_slot = ?3)",
        params![participation_id, date, slot],
        |row| row.get(0),
    )
}

/// Insert only while the day's count is below `quota`. The count and the insert are one
/// statement and the UNIQUE index rejects a second row for the same slot, so neither
/// invariant depends on the caller's earlier reads.
///
/// Returns `Ok(None)` when the quota is already met; a duplicate slot surfaces as a
/// constraint violation.
pub fn insert_within_quota(
    conn: &Connection,
    participation_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    slot: u32,
    payload: &VerificationPayload,
    quota: u32,
    now: NaiveDateTime,
) -> rusqlite::Result<Option<i64>> {
    let inserted = conn.execute(
        "INSERT INTO verifications (participation_id, verification_date, verification_time,
             verification_slot, verification_data, is_verified, created_at)
         SELECT ?1, ?2, ?3, ?4, ?5, 1, ?6
         WHERE (SELECT COUNT(*) FROM verifications
                WHERE participation_id = ?1 AND verification_date = ?2) < ?7",
        params![participation_id, date, time, slot, to_json(payload)?, now, quota],
    )?;
    Ok((inserted == 1).then(|| conn.last_insert_rowid()))
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<Verification>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM verifications WHERE id = ?1"),
        [id],
        from_row,
    )
    .optional()
}

pub fn list(conn: &Connection, participation_id: i64, date: Option<NaiveDate>) -> rusqlite::Result<Vec<Verification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM verifications
         WHERE participation_id = ?1 AND (?2 IS NULL OR verification_date = ?2)
         ORDER BY verification_date, verification_slot"
    ))?;
    let rows = stmt
        .query_map(params![participation_id, date], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete_all(conn: &Connection, participation_id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM verifications WHERE participation_id = ?1", [participation_id])
}
