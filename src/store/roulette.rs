//! Roulette settings and the spin log (one spin per challenge, user and day).

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use super::{json_col, to_json};
use crate::domain::{RouletteSegment, RouletteSettings, RouletteSpin};

pub fn upsert_settings(conn: &Connection, s: &RouletteSettings) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO roulette_settings (challenge_id, segments) VALUES (?1, ?2)
         ON CONFLICT(challenge_id) DO UPDATE SET segments = excluded.segments",
        params![s.challenge_id, to_json(&s.segments)?],
    )?;
    Ok(())
}

pub fn settings(conn: &Connection, challenge_id: i64) -> rusqlite::Result<Option<RouletteSettings>> {
    conn.query_row(
        "SELECT challenge_id, segments FROM roulette_settings WHERE challenge_id = ?1",
        [challenge_id],
        |row| {
            Ok(RouletteSettings {
                challenge_id: row.get(0)?,
                segments: json_col(row, 1)?,
            })
        },
    )
    .optional()
}

pub fn spin_on(
    conn: &Connection,
    challenge_id: i64,
    user_id: &str,
    date: NaiveDate,
) -> rusqlite::Result<Option<RouletteSpin>> {
    conn.query_row(
        "SELECT id, challenge_id, user_id, participation_id, spin_date, won_index, won_segment, created_at
         FROM roulette_spins WHERE challenge_id = ?1 AND user_id = ?2 AND spin_date = ?3",
        params![challenge_id, user_id, date],
        |row| {
            let won_index: i64 = row.get(5)?;
            Ok(RouletteSpin {
                id: row.get(0)?,
                challenge_id: row.get(1)?,
                user_id: row.get(2)?,
                participation_id: row.get(3)?,
                spin_date: row.get(4)?,
                won_index: won_index as usize,
                won_segment: json_col(row, 6)?,
                created_at: row.get(7)?,
            })
        },
    )
    .optional()
}

/// Log a spin. A second spin for the same day fails on the UNIQUE index.
pub fn insert_spin(
    conn: &Connection,
    challenge_id: i64,
    user_id: &str,
    participation_id: i64,
    date: NaiveDate,
    won_index: usize,
    won_segment: &RouletteSegment,
    now: NaiveDateTime,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO roulette_spins (challenge_id, user_id, participation_id, spin_date, won_index,
             won_segment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            challenge_id,
            user_id,
            participation_id,
            date,
            won_index as i64,
            to_json(won_segment)?,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
