//! Quiz catalog rows and the append-only attempt log.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{json_col, text_col, to_json};
use crate::domain::{Quiz, QuizAttempt};

pub fn upsert(conn: &Connection, q: &Quiz) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO quizzes (id, challenge_id, quiz_type, question, options, correct_answers, hint)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             challenge_id = excluded.challenge_id,
             quiz_type = excluded.quiz_type,
             question = excluded.question,
             options = excluded.options,
             correct_answers = excluded.correct_answers,
             hint = excluded.hint",
        params![
            q.id,
            q.challenge_id,
            q.kind.as_str(),
            q.question,
            to_json(&q.options)?,
            to_json(&q.correct_answers)?,
            q.hint,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<Quiz>> {
    conn.query_row(
        "SELECT id, challenge_id, quiz_type, question, options, correct_answers, hint
         FROM quizzes WHERE id = ?1",
        [id],
        |row| {
            Ok(Quiz {
                id: row.get(0)?,
                challenge_id: row.get(1)?,
                kind: text_col(row, 2)?,
                question: row.get(3)?,
                options: json_col(row, 4)?,
                correct_answers: json_col(row, 5)?,
                hint: row.get(6)?,
            })
        },
    )
    .optional()
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<QuizAttempt> {
    Ok(QuizAttempt {
        id: row.get(0)?,
        quiz_id: row.get(1)?,
        participation_id: row.get(2)?,
        attempt_date: row.get(3)?,
        selected: json_col(row, 4)?,
        is_correct: row.get(5)?,
        attempt_count: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Attempts for one quiz by one participation on one day, oldest first.
pub fn attempts_on(
    conn: &Connection,
    quiz_id: i64,
    participation_id: i64,
    date: NaiveDate,
) -> rusqlite::Result<Vec<QuizAttempt>> {
    let mut stmt = conn.prepare(
        "SELECT id, quiz_id, participation_id, attempt_date, selected_answer, is_correct, attempt_count, created_at
         FROM quiz_attempts
         WHERE quiz_id = ?1 AND participation_id = ?2 AND attempt_date = ?3
         ORDER BY attempt_count",
    )?;
    let rows = stmt
        .query_map(params![quiz_id, participation_id, date], attempt_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Append an attempt. `(quiz, participation, date, attempt_count)` is unique, so two
/// racing attempts cannot both claim the same ordinal.
pub fn insert_attempt(
    conn: &Connection,
    quiz_id: i64,
    participation_id: i64,
    date: NaiveDate,
    selected: &[String],
    is_correct: bool,
    attempt_count: u32,
    now: NaiveDateTime,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO quiz_attempts (quiz_id, participation_id, attempt_date, selected_answer,
             is_correct, attempt_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![quiz_id, participation_id, date, to_json(&selected)?, is_correct, attempt_count, now],
    )?;
    Ok(conn.last_insert_rowid())
}
