//! Leaderboard projection, upserted per (challenge, user).

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::domain::RankingRow;

/// Write the latest rate. `completed_at` only ever moves from NULL to a value.
pub fn upsert(
    conn: &Connection,
    challenge_id: i64,
    user_id: &str,
    achievement_rate: f64,
    completed_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO rankings (challenge_id, user_id, achievement_rate, completed_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(challenge_id, user_id) DO UPDATE SET
             achievement_rate = excluded.achievement_rate,
             completed_at = COALESCE(rankings.completed_at, excluded.completed_at),
             updated_at = excluded.updated_at",
        params![challenge_id, user_id, achievement_rate, completed_at, now],
    )?;
    Ok(())
}

/// Start over at zero (re-enrollment).
pub fn reset(conn: &Connection, challenge_id: i64, user_id: &str, now: NaiveDateTime) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO rankings (challenge_id, user_id, achievement_rate, completed_at, updated_at)
         VALUES (?1, ?2, 0, NULL, ?3)
         ON CONFLICT(challenge_id, user_id) DO UPDATE SET
             achievement_rate = 0, completed_at = NULL, updated_at = excluded.updated_at",
        params![challenge_id, user_id, now],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, challenge_id: i64, user_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM rankings WHERE challenge_id = ?1 AND user_id = ?2",
        params![challenge_id, user_id],
    )?;
    Ok(())
}

/// All rows for a challenge with display names; unsorted.
pub fn list(conn: &Connection, challenge_id: i64) -> rusqlite::Result<Vec<RankingRow>> {
    let mut stmt = conn.prepare(
        "SELECT r.user_id, COALESCE(u.display_name, r.user_id), r.achievement_rate, r.completed_at
         FROM rankings r LEFT JOIN users u ON u.user_id = r.user_id
         WHERE r.challenge_id = ?1",
    )?;
    let rows = stmt
        .query_map([challenge_id], |row| {
            Ok(RankingRow {
                user_id: row.get(0)?,
                display_name: row.get(1)?,
                achievement_rate: row.get(2)?,
                completed_at: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn test_completed_at_sticks() {
        let conn = crate::store::open_memory().expect("open");
        crate::store::challenges::upsert(&conn, &testkit::manual_challenge(1, 1)).expect("challenge");
        let t1 = testkit::at("2026-10-05", 9, 0);
        let t2 = testkit::at("2026-10-06", 9, 0);

        upsert(&conn, 1, "u1", 100.0, Some(t1), t1).expect("complete");
        upsert(&conn, 1, "u1", 100.0, Some(t2), t2).expect("again");
        let rows = list(&conn, 1).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].completed_at, Some(t1));
        assert_eq!(rows[0].display_name, "u1");

        reset(&conn, 1, "u1", t2).expect("reset");
        let rows = list(&conn, 1).expect("list");
        assert_eq!(rows[0].achievement_rate, 0.0);
        assert_eq!(rows[0].completed_at, None);

        delete(&conn, 1, "u1").expect("delete");
        assert!(list(&conn, 1).expect("list").is_empty());
    }
}
