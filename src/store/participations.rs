//! Participation rows. One row per (challenge, user), reused across re-enrollment.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::text_col;
use crate::domain::{ChallengeType, Participation, ParticipationStatus};

const COLUMNS: &str = "id, challenge_id, user_id, status, start_date, end_date, total_required_count,
     total_verification_count, today_verification_count, achievement_rate,
     last_verification_date, is_reward_claimed, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Participation> {
    Ok(Participation {
        id: row.get(0)?,
        challenge_id: row.get(1)?,
        user_id: row.get(2)?,
        status: text_col(row, 3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        total_required_count: row.get(6)?,
        total_verification_count: row.get(7)?,
        today_verification_count: row.get(8)?,
        achievement_rate: row.get(9)?,
        last_verification_date: row.get(10)?,
        is_reward_claimed: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub fn find(conn: &Connection, challenge_id: i64, user_id: &str) -> rusqlite::Result<Option<Participation>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM participations WHERE challenge_id = ?1 AND user_id = ?2"),
        params![challenge_id, user_id],
        from_row,
    )
    .optional()
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Participation> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM participations WHERE id = ?1"),
        [id],
        from_row,
    )
}

/// Insert the row, or reset the existing one to a fresh `participating` state.
/// Returns the (stable) participation id.
pub fn upsert_enrollment(
    conn: &Connection,
    challenge_id: i64,
    user_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_required_count: u32,
    now: NaiveDateTime,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "INSERT INTO participations (challenge_id, user_id, status, start_date, end_date,
             total_required_count, created_at, updated_at)
         VALUES (?1, ?2, 'participating', ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(challenge_id, user_id) DO UPDATE SET
             status = 'participating',
             start_date = excluded.start_date,
             end_date = excluded.end_date,
             total_required_count = excluded.total_required_count,
             total_verification_count = 0,
             today_verification_count = 0,
             achievement_rate = 0,
             last_verification_date = NULL,
             is_reward_claimed = 0,
             updated_at = excluded.updated_at
         RETURNING id",
        params![challenge_id, user_id, start_date, end_date, total_required_count, now],
        |row| row.get(0),
    )
}

/// Count the user's other live participations in challenges of `challenge_type`.
/// Rows whose end date has passed read as expired and do not count.
pub fn count_active_of_type(
    conn: &Connection,
    user_id: &str,
    challenge_type: ChallengeType,
    excluding_challenge: i64,
    today: NaiveDate,
) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM participations p
         JOIN challenges c ON c.id = p.challenge_id
         WHERE p.user_id = ?1
           AND p.status = 'participating'
           AND p.end_date >= ?4
           AND c.challenge_type = ?2
           AND p.challenge_id != ?3",
        params![user_id, challenge_type.as_str(), excluding_challenge, today],
        |row| row.get(0),
    )
}

pub fn set_status(
    conn: &Connection,
    id: i64,
    status: ParticipationStatus,
    now: NaiveDateTime,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE participations SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), now],
    )?;
    Ok(())
}

/// Progress written after a verification insert, within the same transaction.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub total_verification_count: u32,
    pub today_verification_count: u32,
    pub achievement_rate: f64,
    pub status: ParticipationStatus,
    pub verification_date: NaiveDate,
}

pub fn record_progress(conn: &Connection, id: i64, p: &Progress, now: NaiveDateTime) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE participations SET
             total_verification_count = ?2,
             today_verification_count = ?3,
             achievement_rate = ?4,
             status = ?5,
             last_verification_date = ?6,
             updated_at = ?7
         WHERE id = ?1",
        params![
            id,
            p.total_verification_count,
            p.today_verification_count,
            p.achievement_rate,
            p.status.as_str(),
            p.verification_date,
            now,
        ],
    )?;
    Ok(())
}

/// Flip `is_reward_claimed` once. Returns false if it was already set.
pub fn mark_reward_claimed(conn: &Connection, id: i64, now: NaiveDateTime) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE participations SET is_reward_claimed = 1, updated_at = ?2
         WHERE id = ?1 AND is_reward_claimed = 0",
        params![id, now],
    )?;
    Ok(updated == 1)
}
