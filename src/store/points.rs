//! Local point ledger: balances plus an append-only history keyed by idempotency key.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointHistoryRow {
    pub amount: i64,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

/// Credit `amount` once per `idempotency_key`. Writes the history row first; the
/// balance (created on first credit) only moves if that row was new.
/// Returns false when the key was already used.
pub fn credit(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    reason: &str,
    idempotency_key: &str,
    now: NaiveDateTime,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO point_history (user_id, amount, reason, idempotency_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(idempotency_key) DO NOTHING",
        params![user_id, amount, reason, idempotency_key, now],
    )?;
    if inserted == 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO point_balances (user_id, balance, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET
             balance = point_balances.balance + excluded.balance,
             updated_at = excluded.updated_at",
        params![user_id, amount, now],
    )?;
    Ok(true)
}

pub fn balance(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE((SELECT balance FROM point_balances WHERE user_id = ?1), 0)",
        [user_id],
        |row| row.get(0),
    )
}

/// Most recent first.
pub fn history(conn: &Connection, user_id: &str, limit: u32) -> rusqlite::Result<Vec<PointHistoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT amount, reason, created_at FROM point_history
         WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id, limit], |row| {
            Ok(PointHistoryRow {
                amount: row.get(0)?,
                reason: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
