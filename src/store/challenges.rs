//! Challenge catalog rows.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{json_col, text_col, to_json};
use crate::domain::Challenge;

const COLUMNS: &str = "id, title, challenge_type, verification_method, recruitment_start, recruitment_end,
     operation_start, operation_end, challenge_duration_days, daily_verification_count,
     time_slots, max_participants, current_participants, total_stamp_count, reward";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Challenge> {
    let reward: Option<String> = row.get(14)?;
    let reward = match reward {
        Some(_) => Some(json_col(row, 14)?),
        None => None,
    };
    Ok(Challenge {
        id: row.get(0)?,
        title: row.get(1)?,
        challenge_type: text_col(row, 2)?,
        verification_method: text_col(row, 3)?,
        recruitment_start: row.get(4)?,
        recruitment_end: row.get(5)?,
        operation_start: row.get(6)?,
        operation_end: row.get(7)?,
        challenge_duration_days: row.get(8)?,
        daily_verification_count: row.get(9)?,
        time_slots: json_col(row, 10)?,
        max_participants: row.get(11)?,
        current_participants: row.get(12)?,
        total_stamp_count: row.get(13)?,
        reward,
    })
}

/// Insert or refresh a catalog entry. `current_participants` is owned by the
/// engine and survives a refresh.
pub fn upsert(conn: &Connection, c: &Challenge) -> rusqlite::Result<()> {
    let reward = c.reward.as_ref().map(to_json).transpose()?;
    conn.execute(
        "INSERT INTO challenges (id, title, challenge_type, verification_method, recruitment_start,
             recruitment_end, operation_start, operation_end, challenge_duration_days,
             daily_verification_count, time_slots, max_participants, total_stamp_count, reward)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             challenge_type = excluded.challenge_type,
             verification_method = excluded.verification_method,
             recruitment_start = excluded.recruitment_start,
             recruitment_end = excluded.recruitment_end,
             operation_start = excluded.operation_start,
             operation_end = excluded.operation_end,
             challenge_duration_days = excluded.challenge_duration_days,
             daily_verification_count = excluded.daily_verification_count,
             time_slots = excluded.time_slots,
             max_participants = excluded.max_participants,
             total_stamp_count = excluded.total_stamp_count,
             reward = excluded.reward",
        params![
            c.id,
            c.title,
            c.challenge_type.as_str(),
            c.verification_method.as_str(),
            c.recruitment_start,
            c.recruitment_end,
            c.operation_start,
            c.operation_end,
            c.challenge_duration_days,
            c.daily_verification_count,
            to_json(&c.time_slots)?,
            c.max_participants,
            c.total_stamp_count,
            reward,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<Challenge>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM challenges WHERE id = ?1"),
        [id],
        from_row,
    )
    .optional()
}

/// Take one seat. A single guarded UPDATE, so concurrent enrollments can
/// never push the counter past `max_participants`. Returns false when full.
pub fn try_take_seat(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE challenges SET current_participants = current_participants + 1
         WHERE id = ?1 AND (max_participants IS NULL OR current_participants < max_participants)",
        [id],
    )?;
    Ok(updated == 1)
}

pub fn release_seat(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE challenges SET current_participants = current_participants - 1
         WHERE id = ?1 AND current_participants > 0",
        [id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn test_upsert_and_get() {
        let conn = crate::store::open_memory().expect("open");
        let c = testkit::manual_challenge(1, 2);
        upsert(&conn, &c).expect("upsert");
        let loaded = get(&conn, 1).expect("get").expect("present");
        assert_eq!(loaded, c);
        assert!(get(&conn, 99).expect("get").is_none());
    }

    #[test]
    fn test_refresh_keeps_participant_count() {
        let conn = crate::store::open_memory().expect("open");
        let mut c = testkit::manual_challenge(1, 1);
        upsert(&conn, &c).expect("upsert");
        assert!(try_take_seat(&conn, 1).expect("seat"));
        c.title = "renamed".into();
        upsert(&conn, &c).expect("refresh");
        let loaded = get(&conn, 1).expect("get").expect("present");
        assert_eq!(loaded.title, "renamed");
        assert_eq!(loaded.current_participants, 1);
    }

    #[test]
    fn test_seats_are_capped() {
        let conn = crate::store::open_memory().expect("open");
        let mut c = testkit::manual_challenge(1, 1);
        c.max_participants = Some(1);
        upsert(&conn, &c).expect("upsert");
        assert!(try_take_seat(&conn, 1).expect("first"));
        assert!(!try_take_seat(&conn, 1).expect("second"));
        release_seat(&conn, 1).expect("release");
        release_seat(&conn, 1).expect("release again");
        assert_eq!(get(&conn, 1).expect("get").expect("present").current_participants, 0);
    }
}
