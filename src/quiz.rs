//! Quiz Engine: grading, the two-attempts-a-day rule, and delegation of correct answers
//! to the Verification Recorder.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::domain::{answer_token, Quiz, QuizKind, VerificationPayload};
use crate::error::{ChallengeError, Result};
use crate::store::{challenges, participations, quizzes};
use crate::verification::{self, RecordOutcome};

pub const MAX_ATTEMPTS_PER_DAY: u32 = 2;

#[derive(Debug, Clone)]
pub struct AttemptOutcome {
  pub is_correct: bool,
  pub attempt_count: u32,
  pub can_retry: bool,
  /// Only on a wrong answer.
  pub hint: Option<String>,
  /// Revealed once the question is settled for the day.
  pub correct_answers: Option<Vec<String>>,
  /// `None` when wrong, or when the day's verification quota was already met.
  pub recorded: Option<RecordOutcome>,
}

/// Question as shown to a participant; never carries the answers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
  pub id: i64,
  pub challenge_id: i64,
  pub kind: QuizKind,
  pub question: String,
  pub options: Vec<String>,
  pub attempts_today: u32,
  pub solved_today: bool,
  pub can_attempt: bool,
}

/// Accept `true`, `"true"`, `3`, or an array of those. Everything becomes a string so it
/// compares against the stored answer set (`3.0` reads as `3`).
pub fn normalize_selection(kind: QuizKind, raw: &Value) -> Result<Vec<String>> {
  let selected = match raw {
    Value::Array(items) => items
      .iter()
      .map(|v| answer_token(v).ok_or_else(|| ChallengeError::Validation("answers must be strings, numbers or booleans".into())))
      .collect::<Result<Vec<_>>>()?,
    other => vec![answer_token(other).ok_or_else(|| ChallengeError::Validation("an answer is required".into()))?],
  };

  if selected.is_empty() {
    return Err(ChallengeError::Validation("an answer is required".into()));
  }
  if kind == QuizKind::Ox && selected.len() != 1 {
    return Err(ChallengeError::Validation("an O/X quiz takes exactly one answer".into()));
  }
  Ok(selected)
}

/// OX: the single answer must be in the correct set. Multi-select: every pick must be
/// correct and the number of picks must equal the number of correct answers. Order does
/// not matter; duplicates are not collapsed.
pub fn grade(quiz: &Quiz, selected: &[String]) -> bool {
  match quiz.kind {
    QuizKind::Ox => selected.len() == 1 && quiz.correct_answers.contains(&selected[0]),
    QuizKind::MultipleChoice => {
      selected.len() == quiz.correct_answers.len() && selected.iter().all(|s| quiz.correct_answers.contains(s))
    }
  }
}

fn load_quiz(conn: &Connection, challenge_id: i64, quiz_id: i64) -> Result<Quiz> {
  quizzes::get(conn, quiz_id)?
    .filter(|q| q.challenge_id == challenge_id)
    .ok_or(ChallengeError::NotFound("quiz"))
}

#[instrument(level = "info", skip(conn, raw_selected), fields(%challenge_id, %quiz_id, %user_id, slot))]
pub fn attempt(
  conn: &mut Connection,
  challenge_id: i64,
  quiz_id: i64,
  user_id: &str,
  raw_selected: &Value,
  slot: u32,
  now: NaiveDateTime,
) -> Result<AttemptOutcome> {
  let today = now.date();
  let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let challenge = challenges::get(&tx, challenge_id)?.ok_or(ChallengeError::NotFound("challenge"))?;
  let quiz = load_quiz(&tx, challenge_id, quiz_id)?;
  let selected = normalize_selection(quiz.kind, raw_selected)?;

  let participation =
    participations::find(&tx, challenge_id, user_id)?.ok_or(ChallengeError::NotFound("participation"))?;
  if !participation.is_active(today) {
    return Err(ChallengeError::NotParticipating);
  }

  let prior = quizzes::attempts_on(&tx, quiz.id, participation.id, today)?;
  if prior.iter().any(|a| a.is_correct) {
    return Err(ChallengeError::AlreadyCorrect);
  }
  let prior_count = u32::try_from(prior.len()).unwrap_or(u32::MAX);
  if prior_count >= MAX_ATTEMPTS_PER_DAY {
    return Err(ChallengeError::RetriesExhausted);
  }

  let is_correct = grade(&quiz, &selected);
  let attempt_count = prior_count + 1;
  quizzes::insert_attempt(&tx, quiz.id, participation.id, today, &selected, is_correct, attempt_count, now)?;

  let recorded = if is_correct {
    let payload = VerificationPayload::Quiz { quiz_id: quiz.id, selected: selected.clone(), is_correct: true };
    let sp = tx.savepoint()?;
    match verification::record_in(&sp, &challenge, &participation, slot, &payload, now) {
      Ok(outcome) => {
        sp.commit()?;
        Some(outcome)
      }
      // Correctness still counts; the day just has no capacity left.
      Err(ChallengeError::DailyQuotaReached) => {
        debug!(target: "challenge", participation = participation.id, "Correct answer past daily quota; verification skipped");
        None
      }
      Err(e) => return Err(e),
    }
  } else {
    None
  };
  tx.commit()?;

  let can_retry = !is_correct && attempt_count < MAX_ATTEMPTS_PER_DAY;
  info!(target: "challenge", quiz = quiz.id, attempt_count, is_correct, recorded = recorded.is_some(), "Quiz attempt");

  Ok(AttemptOutcome {
    is_correct,
    attempt_count,
    can_retry,
    hint: if is_correct { None } else { quiz.hint.clone() },
    correct_answers: (!can_retry).then(|| quiz.correct_answers.clone()),
    recorded,
  })
}

#[instrument(level = "debug", skip(conn), fields(%challenge_id, %quiz_id, %user_id))]
pub fn view(conn: &Connection, challenge_id: i64, quiz_id: i64, user_id: &str, now: NaiveDateTime) -> Result<QuizView> {
  let today = now.date();
  let quiz = load_quiz(conn, challenge_id, quiz_id)?;
  let (attempts_today, solved_today, active) = match participations::find(conn, challenge_id, user_id)? {
    Some(p) => {
      let attempts = quizzes::attempts_on(conn, quiz.id, p.id, today)?;
      (
        u32::try_from(attempts.len()).unwrap_or(u32::MAX),
        attempts.iter().any(|a| a.is_correct),
        p.is_active(today),
      )
    }
    None => (0, false, false),
  };

  Ok(QuizView {
    id: quiz.id,
    challenge_id: quiz.challenge_id,
    kind: quiz.kind,
    question: quiz.question,
    options: quiz.options,
    attempts_today,
    solved_today,
    can_attempt: active && !solved_today && attempts_today < MAX_ATTEMPTS_PER_DAY,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::participation;
  use crate::store::verifications;
  use crate::testkit::{self, at};
  use serde_json::json;

  fn setup() -> Connection {
    let mut challenge = testkit::quiz_challenge(1);
    challenge.daily_verification_count = 1;
    let mut conn = testkit::store_with(&[challenge]);
    quizzes::upsert(&conn, &testkit::ox_quiz(10, 1)).expect("quiz");
    quizzes::upsert(&conn, &testkit::multi_quiz(11, 1)).expect("quiz");
    participation::enroll(&mut conn, 1, &testkit::user("u1"), at("2026-10-05", 8, 0)).expect("enroll");
    conn
  }

  #[test]
  fn selection_normalization() {
    assert_eq!(normalize_selection(QuizKind::Ox, &json!(true)).expect("bool"), vec!["true"]);
    assert_eq!(normalize_selection(QuizKind::Ox, &json!(" O ")).expect("str"), vec!["O"]);
    assert_eq!(normalize_selection(QuizKind::MultipleChoice, &json!(["a", 2])).expect("arr"), vec!["a", "2"]);
    assert!(normalize_selection(QuizKind::Ox, &json!(["a", "b"])).is_err());
    assert!(normalize_selection(QuizKind::MultipleChoice, &json!([])).is_err());
    assert!(normalize_selection(QuizKind::Ox, &json!(null)).is_err());
    assert!(normalize_selection(QuizKind::Ox, &json!({"a": 1})).is_err());
  }

  #[test]
  fn integral_numbers_match_either_form() {
    assert_eq!(normalize_selection(QuizKind::Ox, &json!(1.0)).expect("float"), vec!["1"]);
    assert_eq!(normalize_selection(QuizKind::Ox, &json!(1)).expect("int"), vec!["1"]);
    assert_eq!(normalize_selection(QuizKind::Ox, &json!(1.5)).expect("frac"), vec!["1.5"]);

    let mut quiz = testkit::ox_quiz(1, 1);
    quiz.correct_answers = vec!["1".into()];
    let picked = normalize_selection(QuizKind::Ox, &json!(1.0)).expect("float");
    assert!(grade(&quiz, &picked));
  }

  #[test]
  fn ox_grading() {
    let mut quiz = testkit::ox_quiz(1, 1);
    quiz.correct_answers = vec!["true".into()];
    assert!(grade(&quiz, &["true".to_string()]));
    assert!(!grade(&quiz, &["false".to_string()]));
  }

  #[test]
  fn multi_select_is_set_equality_by_count() {
    let quiz = testkit::multi_quiz(1, 1);
    let pick = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    assert!(grade(&quiz, &pick(&["kale", "spinach"])));
    assert!(!grade(&quiz, &pick(&["spinach"])));
    assert!(!grade(&quiz, &pick(&["spinach", "kale", "carrot"])));
    // duplicates pass the count check; kept as-is
    assert!(grade(&quiz, &pick(&["spinach", "spinach"])));
  }

  #[test]
  fn wrong_then_wrong_then_exhausted() {
    let mut conn = setup();
    let now = at("2026-10-05", 9, 0);

    let first = attempt(&mut conn, 1, 10, "u1", &json!(true), 1, now).expect("first");
    assert!(!first.is_correct);
    assert!(first.can_retry);
    assert_eq!(first.hint.as_deref(), Some("Think about what dissolves in water."));
    assert!(first.correct_answers.is_none());

    let second = attempt(&mut conn, 1, 10, "u1", &json!(true), 1, now).expect("second");
    assert_eq!(second.attempt_count, 2);
    assert!(!second.can_retry);
    assert_eq!(second.correct_answers, Some(vec!["false".to_string()]));

    assert!(matches!(attempt(&mut conn, 1, 10, "u1", &json!(false), 1, now), Err(ChallengeError::RetriesExhausted)));

    // a new day brings fresh attempts
    let next = attempt(&mut conn, 1, 10, "u1", &json!(false), 1, at("2026-10-06", 9, 0)).expect("next day");
    assert!(next.is_correct);
  }

  #[test]
  fn correct_answer_records_verification() {
    let mut conn = setup();
    let out = attempt(&mut conn, 1, 10, "u1", &json!(false), 1, at("2026-10-05", 9, 0)).expect("attempt");
    assert!(out.is_correct);
    assert!(!out.can_retry);
    assert!(out.hint.is_none());
    let recorded = out.recorded.expect("recorded");
    assert_eq!(recorded.participation.total_verification_count, 1);
    assert_eq!(recorded.stamp_awarded, Some(1));

    assert!(matches!(
      attempt(&mut conn, 1, 10, "u1", &json!(false), 1, at("2026-10-05", 9, 5)),
      Err(ChallengeError::AlreadyCorrect)
    ));
  }

  #[test]
  fn correct_answer_past_quota_is_still_logged() {
    let mut conn = setup();
    let now = at("2026-10-05", 9, 0);
    attempt(&mut conn, 1, 10, "u1", &json!(false), 1, now).expect("ox");
    let out = attempt(&mut conn, 1, 11, "u1", &json!(["spinach", "kale"]), 1, now).expect("multi");
    assert!(out.is_correct);
    assert!(out.recorded.is_none());

    let p = participations::find(&conn, 1, "u1").expect("find").expect("row");
    assert_eq!(verifications::count_on(&conn, p.id, now.date()).expect("count"), 1);
    let logged = quizzes::attempts_on(&conn, 11, p.id, now.date()).expect("attempts");
    assert_eq!(logged.len(), 1);
    assert!(logged[0].is_correct);
  }

  #[test]
  fn requires_active_participation_and_matching_quiz() {
    let mut conn = setup();
    let now = at("2026-10-05", 9, 0);
    assert!(matches!(attempt(&mut conn, 1, 10, "nobody", &json!(true), 1, now), Err(ChallengeError::NotFound("participation"))));
    assert!(matches!(attempt(&mut conn, 1, 99, "u1", &json!(true), 1, now), Err(ChallengeError::NotFound("quiz"))));
    assert!(matches!(attempt(&mut conn, 2, 10, "u1", &json!(true), 1, now), Err(ChallengeError::NotFound(_))));
    assert!(matches!(
      attempt(&mut conn, 1, 10, "u1", &json!(true), 1, at("2026-10-30", 9, 0)),
      Err(ChallengeError::NotParticipating)
    ));
  }

  #[test]
  fn view_hides_answers_and_tracks_the_day() {
    let mut conn = setup();
    let now = at("2026-10-05", 9, 0);
    let before = view(&conn, 1, 10, "u1", now).expect("view");
    assert!(before.can_attempt);
    let body = serde_json::to_value(&before).expect("json");
    assert!(body.get("correctAnswers").is_none());

    attempt(&mut conn, 1, 10, "u1", &json!(false), 1, now).expect("attempt");
    let after = view(&conn, 1, 10, "u1", now).expect("view");
    assert!(after.solved_today);
    assert!(!after.can_attempt);
    assert_eq!(after.attempts_today, 1);

    assert!(!view(&conn, 1, 10, "stranger", now).expect("view").can_attempt);
  }
}
