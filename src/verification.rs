//! Verification Recorder and Stamp Ledger.
//!
//! `record_in` is the single mutation path shared by manual check-ins, correct quiz
//! answers and roulette spins. It runs inside the caller's IMMEDIATE transaction and:
//!   - validates slot, status, personal window, daily quota, slot reuse, slot time window
//!   - inserts the proof (guarded by the quota predicate and the UNIQUE slot index)
//!   - advances counters, achievement rate and completion
//!   - claims the next stamp the first time the daily quota is met
//!   - refreshes the leaderboard projection

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, instrument};

use crate::domain::{
  achievement_rate, Challenge, Participation, ParticipationStatus, Stamp, Verification, VerificationMethod,
  VerificationPayload,
};
use crate::error::{ChallengeError, Result};
use crate::store::{self, challenges, participations, rankings, stamps, verifications};

#[derive(Debug, Clone)]
pub struct RecordOutcome {
  pub verification: Verification,
  /// Participation after the update.
  pub participation: Participation,
  /// True only on the verification that pushed the rate to 100.
  pub just_completed: bool,
  pub stamp_awarded: Option<u32>,
}

/// Manual check-in for `user_id` on `challenge_id`.
#[instrument(level = "info", skip(conn, payload), fields(%challenge_id, %user_id, slot))]
pub fn record(
  conn: &mut Connection,
  challenge_id: i64,
  user_id: &str,
  slot: u32,
  payload: VerificationPayload,
  now: NaiveDateTime,
) -> Result<RecordOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let challenge = challenges::get(&tx, challenge_id)?.ok_or(ChallengeError::NotFound("challenge"))?;

  if payload.is_engine_produced() {
    return Err(ChallengeError::Validation(
      "quiz and roulette proofs are recorded through their own endpoints".into(),
    ));
  }
  if challenge.verification_method == VerificationMethod::Roulette {
    return Err(ChallengeError::Validation("this challenge is verified by spinning the roulette".into()));
  }
  if payload.challenge_type() != challenge.challenge_type {
    return Err(ChallengeError::Validation(format!(
      "payload kind '{}' does not match challenge type '{}'",
      payload.challenge_type(),
      challenge.challenge_type
    )));
  }

  let participation =
    participations::find(&tx, challenge_id, user_id)?.ok_or(ChallengeError::NotFound("participation"))?;
  let outcome = record_in(&tx, &challenge, &participation, slot, &payload, now)?;
  tx.commit()?;
  Ok(outcome)
}

/// Shared recorder body; `participation` must have been read inside the same transaction.
pub(crate) fn record_in(
  conn: &Connection,
  challenge: &Challenge,
  participation: &Participation,
  slot: u32,
  payload: &VerificationPayload,
  now: NaiveDateTime,
) -> Result<RecordOutcome> {
  let today = now.date();
  let quota = challenge.daily_verification_count;

  if slot == 0 || slot > quota {
    return Err(ChallengeError::Validation(format!("slot must be between 1 and {quota}")));
  }
  if participation.status != ParticipationStatus::Participating {
    return Err(ChallengeError::NotParticipating);
  }
  if today > participation.end_date {
    return Err(ChallengeError::WindowClosed);
  }
  if verifications::count_on(conn, participation.id, today)? >= quota {
    debug!(target: "challenge", participation = participation.id, "Daily quota already met");
    return Err(ChallengeError::DailyQuotaReached);
  }
  if verifications::slot_taken(conn, participation.id, today, slot)? {
    return Err(ChallengeError::SlotAlreadyVerified(slot));
  }
  if let Some(window) = challenge.slot_window(slot) {
    if !window.contains(now.time()) {
      debug!(target: "challenge", slot, start = %window.start, end = %window.end, at = %now.time(), "Outside slot window");
      return Err(ChallengeError::OutsideTimeWindow(slot));
    }
  }

  let verification_id =
    match verifications::insert_within_quota(conn, participation.id, today, now.time(), slot, payload, quota, now) {
      Ok(Some(id)) => id,
      Ok(None) => return Err(ChallengeError::DailyQuotaReached),
      Err(e) if store::is_constraint_violation(&e) => return Err(ChallengeError::SlotAlreadyVerified(slot)),
      Err(e) => return Err(e.into()),
    };

  let today_count = verifications::count_on(conn, participation.id, today)?;
  let total = participation.total_verification_count + 1;
  let rate = achievement_rate(total, participation.total_required_count);
  let just_completed = rate >= 100.0;
  let status = if just_completed { ParticipationStatus::Completed } else { ParticipationStatus::Participating };

  participations::record_progress(
    conn,
    participation.id,
    &participations::Progress {
      total_verification_count: total,
      today_verification_count: today_count,
      achievement_rate: rate,
      status,
      verification_date: today,
    },
    now,
  )?;

  let stamp_awarded = if today_count == quota { award_daily_stamp(conn, participation.id, today)? } else { None };

  rankings::upsert(conn, challenge.id, &participation.user_id, rate, just_completed.then_some(now), now)?;

  let verification =
    verifications::get(conn, verification_id)?.ok_or(ChallengeError::NotFound("verification"))?;
  let updated = participations::get(conn, participation.id)?;

  info!(
    target: "challenge",
    challenge_id = challenge.id,
    participation = participation.id,
    slot,
    total,
    today_count,
    rate = %format!("{:.1}", rate),
    just_completed,
    stamp = ?stamp_awarded,
    "Verification recorded"
  );

  Ok(RecordOutcome { verification, participation: updated, just_completed, stamp_awarded })
}

/// One stamp per day the quota is met: skip if a stamp is already dated today.
fn award_daily_stamp(conn: &Connection, participation_id: i64, today: NaiveDate) -> Result<Option<u32>> {
  if stamps::achieved_on(conn, participation_id, today)? {
    return Ok(None);
  }
  let claimed = stamps::claim_next(conn, participation_id, today)?;
  if let Some(number) = claimed {
    info!(target: "challenge", participation = participation_id, stamp = number, "Stamp claimed");
  }
  Ok(claimed)
}

#[instrument(level = "debug", skip(conn), fields(%challenge_id, %user_id))]
pub fn list(conn: &Connection, challenge_id: i64, user_id: &str, date: Option<NaiveDate>) -> Result<Vec<Verification>> {
  let participation =
    participations::find(conn, challenge_id, user_id)?.ok_or(ChallengeError::NotFound("participation"))?;
  Ok(verifications::list(conn, participation.id, date)?)
}

#[instrument(level = "debug", skip(conn), fields(%challenge_id, %user_id))]
pub fn list_stamps(conn: &Connection, challenge_id: i64, user_id: &str) -> Result<Vec<Stamp>> {
  let participation =
    participations::find(conn, challenge_id, user_id)?.ok_or(ChallengeError::NotFound("participation"))?;
  Ok(stamps::list(conn, participation.id)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{ChallengeType, TimeSlot};
  use crate::participation;
  use crate::testkit::{self, at, day};
  use chrono::NaiveTime;

  fn memo() -> VerificationPayload {
    VerificationPayload::Supplement { name: None, memo: Some("vitamin d".into()) }
  }

  fn enrolled(challenge: Challenge) -> Connection {
    let mut conn = testkit::store_with(&[challenge.clone()]);
    participation::enroll(&mut conn, challenge.id, &testkit::user("u1"), at("2026-10-05", 8, 0)).expect("enroll");
    conn
  }

  #[test]
  fn records_and_advances_rate() {
    let mut conn = enrolled(testkit::manual_challenge(1, 2));
    let out = record(&mut conn, 1, "u1", 1, memo(), at("2026-10-05", 9, 0)).expect("record");
    assert_eq!(out.participation.total_verification_count, 1);
    assert_eq!(out.participation.today_verification_count, 1);
    assert!((out.participation.achievement_rate - 100.0 / 14.0).abs() < 1e-9);
    assert_eq!(out.stamp_awarded, None);
    assert!(!out.just_completed);

    let out = record(&mut conn, 1, "u1", 2, memo(), at("2026-10-05", 20, 0)).expect("record");
    assert_eq!(out.participation.today_verification_count, 2);
    assert_eq!(out.stamp_awarded, Some(1));
  }

  #[test]
  fn quota_and_slot_conflicts() {
    let mut conn = enrolled(testkit::manual_challenge(1, 2));
    let now = at("2026-10-05", 9, 0);
    record(&mut conn, 1, "u1", 1, memo(), now).expect("slot 1");
    assert!(matches!(record(&mut conn, 1, "u1", 1, memo(), now), Err(ChallengeError::SlotAlreadyVerified(1))));
    record(&mut conn, 1, "u1", 2, memo(), now).expect("slot 2");
    assert!(matches!(record(&mut conn, 1, "u1", 2, memo(), now), Err(ChallengeError::DailyQuotaReached)));
    assert!(matches!(record(&mut conn, 1, "u1", 3, memo(), now), Err(ChallengeError::Validation(_))));

    // next day the quota is fresh and the daily counter restarts
    let out = record(&mut conn, 1, "u1", 1, memo(), at("2026-10-06", 9, 0)).expect("next day");
    assert_eq!(out.participation.today_verification_count, 1);
    assert_eq!(out.participation.total_verification_count, 3);
  }

  #[test]
  fn time_windows_bind_slots() {
    let mut challenge = testkit::manual_challenge(1, 2);
    challenge.time_slots = vec![TimeSlot {
      start: NaiveTime::from_hms_opt(6, 0, 0).expect("t"),
      end: NaiveTime::from_hms_opt(9, 0, 0).expect("t"),
      label: "morning".into(),
    }];
    let mut conn = enrolled(challenge);

    assert!(matches!(
      record(&mut conn, 1, "u1", 1, memo(), at("2026-10-05", 9, 1)),
      Err(ChallengeError::OutsideTimeWindow(1))
    ));
    record(&mut conn, 1, "u1", 1, memo(), at("2026-10-05", 9, 0)).expect("window end is inclusive");
    // slot 2 has no configured window
    record(&mut conn, 1, "u1", 2, memo(), at("2026-10-05", 23, 30)).expect("unrestricted slot");
  }

  #[test]
  fn completion_flips_status_and_stops_recording() {
    let mut challenge = testkit::manual_challenge(1, 1);
    challenge.challenge_duration_days = 2;
    challenge.total_stamp_count = 2;
    let mut conn = enrolled(challenge);

    let first = record(&mut conn, 1, "u1", 1, memo(), at("2026-10-05", 9, 0)).expect("day 1");
    assert_eq!(first.participation.achievement_rate, 50.0);
    let second = record(&mut conn, 1, "u1", 1, memo(), at("2026-10-06", 9, 0)).expect("day 2");
    assert!(second.just_completed);
    assert_eq!(second.participation.status, ParticipationStatus::Completed);
    assert_eq!(second.participation.achievement_rate, 100.0);
    assert_eq!(second.stamp_awarded, Some(2));

    assert!(matches!(
      record(&mut conn, 1, "u1", 1, memo(), at("2026-10-07", 9, 0)),
      Err(ChallengeError::NotParticipating)
    ));
    let board = crate::store::rankings::list(&conn, 1).expect("rankings");
    assert_eq!(board[0].completed_at, Some(at("2026-10-06", 9, 0)));
  }

  #[test]
  fn personal_window_closes_after_end_date() {
    let mut conn = enrolled(testkit::manual_challenge(1, 1));
    // enrolled 2026-10-05 for 7 days
    record(&mut conn, 1, "u1", 1, memo(), at("2026-10-12", 9, 0)).expect("last day");
    assert!(matches!(
      record(&mut conn, 1, "u1", 1, memo(), at("2026-10-13", 9, 0)),
      Err(ChallengeError::WindowClosed)
    ));
  }

  #[test]
  fn payload_must_match_challenge_type() {
    let mut conn = enrolled(testkit::manual_challenge(1, 1));
    let steps = VerificationPayload::Steps { steps: 8000 };
    assert!(matches!(
      record(&mut conn, 1, "u1", 1, steps, at("2026-10-05", 9, 0)),
      Err(ChallengeError::Validation(_))
    ));
    let quiz = VerificationPayload::Quiz { quiz_id: 1, selected: vec![], is_correct: true };
    assert!(matches!(
      record(&mut conn, 1, "u1", 1, quiz, at("2026-10-05", 9, 0)),
      Err(ChallengeError::Validation(_))
    ));
  }

  #[test]
  fn unknown_rows_are_not_found() {
    let mut conn = enrolled(testkit::manual_challenge(1, 1));
    assert!(matches!(
      record(&mut conn, 9, "u1", 1, memo(), at("2026-10-05", 9, 0)),
      Err(ChallengeError::NotFound("challenge"))
    ));
    assert!(matches!(
      record(&mut conn, 1, "stranger", 1, memo(), at("2026-10-05", 9, 0)),
      Err(ChallengeError::NotFound("participation"))
    ));
  }

  #[test]
  fn rate_never_decreases_and_stamps_trail_quota_days() {
    let mut challenge = testkit::manual_challenge(1, 2);
    challenge.challenge_type = ChallengeType::Supplement;
    let mut conn = enrolled(challenge);
    let mut last_rate = 0.0;
    for (d, slots) in [("2026-10-05", 2), ("2026-10-06", 1), ("2026-10-07", 2)] {
      for slot in 1..=slots {
        let out = record(&mut conn, 1, "u1", slot, memo(), at(d, 10, 0)).expect("record");
        assert!(out.participation.achievement_rate >= last_rate);
        last_rate = out.participation.achievement_rate;
      }
    }
    let achieved = list_stamps(&conn, 1, "u1").expect("stamps").into_iter().filter(|s| s.is_achieved).count();
    // quota met on two distinct days
    assert_eq!(achieved, 2);
    assert_eq!(list(&conn, 1, "u1", Some(day("2026-10-06"))).expect("list").len(), 1);
  }

  #[test]
  fn racing_duplicates_store_one_row() {
    let conn = enrolled(testkit::manual_challenge(1, 2));
    let challenge = challenges::get(&conn, 1).expect("get").expect("challenge");
    let stale = participations::find(&conn, 1, "u1").expect("find").expect("participation");
    let now = at("2026-10-05", 9, 0);

    // Both callers read the same pre-insert participation.
    record_in(&conn, &challenge, &stale, 1, &memo(), now).expect("first");
    let err = record_in(&conn, &challenge, &stale, 1, &memo(), now).expect_err("second");
    assert!(matches!(err, ChallengeError::SlotAlreadyVerified(1)));
    assert_eq!(verifications::count_on(&conn, stale.id, now.date()).expect("count"), 1);
    let p = participations::get(&conn, stale.id).expect("get");
    assert_eq!(p.total_verification_count, 1);
  }
}
