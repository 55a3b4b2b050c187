//! Participation Manager: enroll, cancel, read, and reward claims.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, instrument};

use crate::domain::{ChallengeType, Participation, ParticipationStatus, Reward, RewardType, User};
use crate::error::{ChallengeError, Result};
use crate::ledger::{self, PointCredit};
use crate::store::{challenges, participations, rankings, stamps, users, verifications};

#[instrument(level = "info", skip(conn, user), fields(%challenge_id, user_id = %user.id))]
pub fn enroll(conn: &mut Connection, challenge_id: i64, user: &User, now: NaiveDateTime) -> Result<Participation> {
  let today = now.date();
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let challenge = challenges::get(&tx, challenge_id)?.ok_or(ChallengeError::NotFound("challenge"))?;

  if today < challenge.recruitment_start {
    return Err(ChallengeError::NotOpen);
  }
  if today > challenge.recruitment_end {
    return Err(ChallengeError::RecruitmentClosed);
  }
  if matches!(challenge.max_participants, Some(max) if challenge.current_participants >= max) {
    debug!(target: "challenge", current = challenge.current_participants, "Challenge is full");
    return Err(ChallengeError::RecruitmentClosed);
  }

  if let Some(existing) = participations::find(&tx, challenge_id, &user.id)? {
    match existing.effective_status(today) {
      ParticipationStatus::Participating => return Err(ChallengeError::AlreadyParticipating),
      ParticipationStatus::Completed => return Err(ChallengeError::TerminalState("completed")),
      ParticipationStatus::Expired => return Err(ChallengeError::TerminalState("expired")),
      ParticipationStatus::Cancelled => {}
    }
  }

  if challenge.challenge_type != ChallengeType::HealthHabit
    && participations::count_active_of_type(&tx, &user.id, challenge.challenge_type, challenge_id, today)? > 0
  {
    return Err(ChallengeError::DuplicateTypeParticipation);
  }

  let required = challenge
    .total_required_count()
    .ok_or_else(|| ChallengeError::Validation("required verification count overflows".into()))?;
  let end_date = today
    .checked_add_days(chrono::Days::new(u64::from(challenge.challenge_duration_days)))
    .ok_or_else(|| ChallengeError::Validation("challenge duration overflows the calendar".into()))?;

  // Seat first: the guarded increment is the capacity check that holds under contention.
  if !challenges::try_take_seat(&tx, challenge_id)? {
    return Err(ChallengeError::RecruitmentClosed);
  }

  users::upsert(&tx, user, now)?;
  let id = participations::upsert_enrollment(
    &tx,
    challenge_id,
    &user.id,
    today,
    end_date,
    required,
    now,
  )?;
  stamps::materialize(&tx, id, challenge.total_stamp_count)?;
  stamps::reset_all(&tx, id)?;
  rankings::reset(&tx, challenge_id, &user.id, now)?;

  let participation = participations::get(&tx, id)?;
  tx.commit()?;

  info!(
    target: "challenge",
    participation = participation.id,
    start = %participation.start_date,
    end = %participation.end_date,
    required = participation.total_required_count,
    "Enrolled"
  );
  Ok(participation)
}

/// Cancel an active participation. Verifications are erased and stamps reset so a
/// later re-enroll starts from a clean slate. Cancelling twice is a no-op.
#[instrument(level = "info", skip(conn), fields(%challenge_id, %user_id))]
pub fn cancel(conn: &mut Connection, challenge_id: i64, user_id: &str, now: NaiveDateTime) -> Result<()> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let participation =
    participations::find(&tx, challenge_id, user_id)?.ok_or(ChallengeError::NotFound("participation"))?;

  match participation.effective_status(now.date()) {
    ParticipationStatus::Completed => return Err(ChallengeError::TerminalState("completed")),
    ParticipationStatus::Expired => return Err(ChallengeError::TerminalState("expired")),
    ParticipationStatus::Cancelled => {
      debug!(target: "challenge", participation = participation.id, "Already cancelled");
      return Ok(());
    }
    ParticipationStatus::Participating => {}
  }

  let erased = verifications::delete_all(&tx, participation.id)?;
  stamps::reset_all(&tx, participation.id)?;
  rankings::delete(&tx, challenge_id, user_id)?;
  challenges::release_seat(&tx, challenge_id)?;
  participations::set_status(&tx, participation.id, ParticipationStatus::Cancelled, now)?;
  tx.commit()?;

  info!(target: "challenge", participation = participation.id, erased, "Cancelled");
  Ok(())
}

/// Read-only view with expiry and the daily counter derived for `now`.
#[instrument(level = "debug", skip(conn), fields(%challenge_id, %user_id))]
pub fn get(conn: &Connection, challenge_id: i64, user_id: &str, now: NaiveDateTime) -> Result<Participation> {
  let participation =
    participations::find(conn, challenge_id, user_id)?.ok_or(ChallengeError::NotFound("participation"))?;
  Ok(participation.as_of(now.date()))
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
  pub participation: Participation,
  pub reward: Option<Reward>,
  /// Set when the reward was points; forward it once the transaction committed.
  pub credit: Option<PointCredit>,
}

#[instrument(level = "info", skip(conn), fields(%challenge_id, %user_id))]
pub fn claim_reward(conn: &mut Connection, challenge_id: i64, user_id: &str, now: NaiveDateTime) -> Result<ClaimOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let challenge = challenges::get(&tx, challenge_id)?.ok_or(ChallengeError::NotFound("challenge"))?;
  let participation =
    participations::find(&tx, challenge_id, user_id)?.ok_or(ChallengeError::NotFound("participation"))?;

  if participation.status != ParticipationStatus::Completed {
    return Err(ChallengeError::NotCompleted);
  }
  if !participations::mark_reward_claimed(&tx, participation.id, now)? {
    return Err(ChallengeError::RewardAlreadyClaimed);
  }

  let credit = match &challenge.reward {
    Some(reward) if reward.reward_type == RewardType::Point && reward.value > 0 => {
      let credit = PointCredit::challenge_reward(user_id, participation.id, reward.value, &challenge.title);
      ledger::credit_local(&tx, &credit, now)?;
      Some(credit)
    }
    _ => None,
  };

  let participation = participations::get(&tx, participation.id)?;
  tx.commit()?;

  info!(target: "challenge", participation = participation.id, reward = ?challenge.reward.as_ref().map(|r| r.reward_type), "Reward claimed");
  Ok(ClaimOutcome { participation, reward: challenge.reward, credit })
}
